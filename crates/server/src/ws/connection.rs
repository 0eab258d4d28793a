/// Agent 连接句柄
///
/// 每个设备连接对应一个句柄，所有出站帧都经由同一个写任务发送

use axum::extract::ws::Message as AxumWsMessage;
use futures_util::{Sink, SinkExt};
use relay_common::{utils, RelayError};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// 写入结果回执
pub type WriteAck = oneshot::Sender<Result<(), String>>;

/// 交给写任务的出站指令
#[derive(Debug)]
pub enum Outbound {
    /// 发送文本帧，可选地回报写入结果
    Frame { text: String, ack: Option<WriteAck> },
    /// 关闭连接
    Close,
}

impl Outbound {
    /// 等待结果的一方已放弃（例如发送超时），该帧不应再写出
    fn is_abandoned(&self) -> bool {
        matches!(self, Self::Frame { ack: Some(ack), .. } if ack.is_closed())
    }
}

/// Agent 连接
#[derive(Debug)]
pub struct AgentConnection {
    /// 连接 ID（仅用于日志）
    pub connection_id: String,

    /// 建立连接的时间
    pub connected_at: chrono::DateTime<chrono::Utc>,

    /// 写任务的输入通道
    sender: mpsc::UnboundedSender<Outbound>,

    closed: AtomicBool,
}

impl AgentConnection {
    /// 创建新的连接句柄，返回写任务需要消费的接收端
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let connection = Arc::new(Self {
            connection_id: utils::connection_id(),
            connected_at: chrono::Utc::now(),
            sender: tx,
            closed: AtomicBool::new(false),
        });

        (connection, rx)
    }

    /// 连接是否已关闭（会话已结束或写任务已退出）
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.sender.is_closed()
    }

    /// 标记连接已关闭
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// 发送文本帧，不等待写入结果
    pub fn push(&self, text: String) -> Result<(), RelayError> {
        self.sender
            .send(Outbound::Frame { text, ack: None })
            .map_err(|_| RelayError::delivery_failed("连接已关闭"))
    }

    /// 发送文本帧并等待写任务回报结果（带超时）
    pub async fn send(&self, text: String, timeout: Duration) -> Result<(), RelayError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(Outbound::Frame { text, ack: Some(tx) })
            .map_err(|_| RelayError::delivery_failed("连接已关闭"))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(RelayError::delivery_failed(e)),
            // 写任务退出时丢弃了回执
            Ok(Err(_)) => Err(RelayError::delivery_failed("连接已关闭")),
            Err(_) => Err(RelayError::delivery_failed(format!(
                "发送超时: {}秒",
                timeout.as_secs_f32()
            ))),
        }
    }

    /// 请求写任务关闭连接
    pub fn close(&self) {
        if self.sender.send(Outbound::Close).is_err() {
            debug!("连接 {} 的写任务已退出", self.connection_id);
        }
    }
}

/// 写任务：按顺序写出所有出站帧
pub async fn run_writer<S>(mut ws_sender: S, mut rx: mpsc::UnboundedReceiver<Outbound>)
where
    S: Sink<AxumWsMessage> + Unpin,
    S::Error: Display,
{
    while let Some(outbound) = rx.recv().await {
        if outbound.is_abandoned() {
            // 调用方已收到 DeliveryFailed，迟到的写入会导致设备重复执行
            debug!("丢弃已超时的出站帧");
            continue;
        }

        match outbound {
            Outbound::Frame { text, ack } => {
                let result = ws_sender
                    .send(AxumWsMessage::Text(text))
                    .await
                    .map_err(|e| e.to_string());
                let failed = result.is_err();

                if let Err(e) = &result {
                    error!("发送消息失败: {}", e);
                }
                if let Some(ack) = ack {
                    let _ = ack.send(result);
                }
                if failed {
                    break;
                }
            }
            Outbound::Close => {
                let _ = ws_sender.close().await;
                break;
            }
        }
    }
    debug!("消息发送任务结束");
}

/// 测试用的写端：每次写入前等待 `delay`，并把写出的文本帧转交给接收端
#[cfg(test)]
pub(crate) fn recording_sink(
    delay: Duration,
) -> (
    std::pin::Pin<Box<dyn Sink<AxumWsMessage, Error = String> + Send>>,
    mpsc::UnboundedReceiver<String>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = futures_util::sink::unfold(tx, move |tx, msg: AxumWsMessage| async move {
        tokio::time::sleep(delay).await;
        if let AxumWsMessage::Text(text) = msg {
            let _ = tx.send(text);
        }
        Ok::<_, String>(tx)
    });
    (Box::pin(sink), rx)
}
