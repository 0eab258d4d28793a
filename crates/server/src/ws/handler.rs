/// WebSocket 连接处理器
///
/// 处理设备的 WebSocket 连接：读循环驱动会话状态机，写任务独占连接的发送端

use super::connection::{run_writer, AgentConnection};
use super::session::AgentSession;
use crate::app_state::AppState;
use axum::extract::ws::{Message as AxumWsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::StreamExt;
use relay_common::{RelayError, ServerReply};
use tracing::{debug, error, info, warn};

/// WebSocket 升级处理器
pub async fn handle_agent_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_agent_connection(socket, state))
}

/// 处理设备 WebSocket 连接
async fn handle_agent_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();

    let (connection, rx) = AgentConnection::new();
    info!("新的设备 WebSocket 连接: {}", connection.connection_id);

    // 创建消息发送任务（唯一的写者）
    let mut send_task = tokio::spawn(run_writer(ws_sender, rx));

    let mut session = AgentSession::new(connection.clone(), state.registry());

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(msg)) => {
                        if !handle_incoming_message(msg, &mut session).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("接收消息错误: conn={}, error={}", connection.connection_id, e);
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut send_task => {
                debug!("发送任务已结束: {}", connection.connection_id);
                break;
            }
        }
    }

    // 清理：撤销注册
    session.close().await;
    send_task.abort();

    let elapsed = chrono::Utc::now() - connection.connected_at;
    info!(
        "设备连接已关闭: conn={}, 持续 {} 秒",
        connection.connection_id,
        elapsed.num_seconds()
    );
}

/// 处理收到的帧，返回 false 表示连接应结束
async fn handle_incoming_message(msg: AxumWsMessage, session: &mut AgentSession) -> bool {
    let text = match msg {
        AxumWsMessage::Text(text) => text,
        AxumWsMessage::Binary(data) => match String::from_utf8(data) {
            Ok(text) => text,
            Err(_) => {
                warn!("收到非 UTF-8 二进制帧: conn={}", session.connection().connection_id);
                return send_reply(session, ServerReply::from_error(&RelayError::MalformedMessage));
            }
        },
        AxumWsMessage::Close(frame) => {
            debug!("收到关闭帧: {:?}", frame);
            return false;
        }
        AxumWsMessage::Ping(_) | AxumWsMessage::Pong(_) => return true,
    };

    match session.handle_text(&text).await {
        Some(reply) => send_reply(session, reply),
        None => true,
    }
}

/// 经由写任务回复设备，返回 false 表示连接已不可写
fn send_reply(session: &AgentSession, reply: ServerReply) -> bool {
    match reply.to_json() {
        Ok(json) => {
            if let Err(e) = session.connection().push(json) {
                warn!("发送应答失败: {}", e);
                return false;
            }
        }
        Err(e) => error!("序列化应答失败: {}", e),
    }
    true
}
