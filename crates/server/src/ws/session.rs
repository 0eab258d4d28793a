/// Agent 会话
///
/// 管理单个设备连接的生命周期：Connected -> Registered(pi_id) -> Closed

use super::connection::AgentConnection;
use super::registry::ConnectionRegistry;
use relay_common::{AgentMessage, RelayError, ServerReply};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 会话状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// 已连接，未注册
    Connected,
    /// 已注册
    Registered(String),
    /// 已关闭
    Closed,
}

/// 单个设备连接的会话
pub struct AgentSession {
    connection: Arc<AgentConnection>,
    registry: ConnectionRegistry,
    state: SessionState,
}

impl AgentSession {
    pub fn new(connection: Arc<AgentConnection>, registry: ConnectionRegistry) -> Self {
        Self {
            connection,
            registry,
            state: SessionState::Connected,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn connection(&self) -> &Arc<AgentConnection> {
        &self.connection
    }

    /// 当前注册的 pi_id
    pub fn pi_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Registered(id) => Some(id),
            _ => None,
        }
    }

    /// 处理一条文本帧，返回需要回给设备的应答
    pub async fn handle_text(&mut self, text: &str) -> Option<ServerReply> {
        if self.state == SessionState::Closed {
            return None;
        }

        let message = match AgentMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    "收到无效消息: conn={}, pi_id={:?}",
                    self.connection.connection_id,
                    self.pi_id()
                );
                return Some(ServerReply::from_error(&e));
            }
        };

        match message {
            AgentMessage::Register { pi_id: Some(pi_id) } => {
                self.register(pi_id).await;
                Some(ServerReply::registered())
            }
            AgentMessage::Register { pi_id: None } => {
                warn!("注册消息缺少 pi_id: conn={}", self.connection.connection_id);
                Some(ServerReply::from_error(&RelayError::MissingIdentifier))
            }
            AgentMessage::Other(data) => {
                info!("📥 [Pi -> Server] 收到消息: pi_id={:?}, data={}", self.pi_id(), data);
                None
            }
        }
    }

    /// 注册（或重新注册）到注册表
    async fn register(&mut self, pi_id: String) {
        // 换用新 pi_id 时先撤销旧注册，只保留最近一次注册
        if let SessionState::Registered(previous) = &self.state {
            if *previous != pi_id {
                self.registry
                    .remove_if_owner(previous, &self.connection)
                    .await;
            }
        }

        let superseded = self.registry.put(pi_id.clone(), self.connection.clone()).await;

        if let Some(old) = superseded {
            if !Arc::ptr_eq(&old, &self.connection) {
                // 被新连接取代的旧连接不再可达，主动关闭
                info!(
                    "设备 {} 重新连接，关闭旧连接 {}",
                    pi_id, old.connection_id
                );
                old.close();
            }
        }

        self.state = SessionState::Registered(pi_id);
    }

    /// 连接关闭：标记句柄关闭并撤销自己的注册
    pub async fn close(&mut self) {
        self.connection.mark_closed();

        let state = std::mem::replace(&mut self.state, SessionState::Closed);
        if let SessionState::Registered(pi_id) = state {
            if self.registry.remove_if_owner(&pi_id, &self.connection).await {
                info!("设备已断开: {}", pi_id);
            } else {
                debug!("设备 {} 的注册已被其他连接接管", pi_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::connection::Outbound;
    use tokio::sync::mpsc;

    fn session(registry: &ConnectionRegistry) -> (AgentSession, mpsc::UnboundedReceiver<Outbound>) {
        let (conn, rx) = AgentConnection::new();
        (AgentSession::new(conn, registry.clone()), rx)
    }

    #[tokio::test]
    async fn test_register() {
        let registry = ConnectionRegistry::new();
        let (mut s, _rx_s) = session(&registry);

        let reply = s.handle_text(r#"{"type":"register","pi_id":"pi_1"}"#).await;
        assert_eq!(reply, Some(ServerReply::registered()));
        assert_eq!(s.state(), &SessionState::Registered("pi_1".to_string()));
        assert!(Arc::ptr_eq(&registry.get("pi_1").await.unwrap(), s.connection()));
    }

    #[tokio::test]
    async fn test_register_without_id() {
        let registry = ConnectionRegistry::new();
        let (mut s, _rx_s) = session(&registry);

        let reply = s.handle_text(r#"{"type":"register"}"#).await;
        assert_eq!(
            reply,
            Some(ServerReply::Error {
                error: "missing_pi_id".to_string()
            })
        );
        assert_eq!(s.state(), &SessionState::Connected);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_session() {
        let registry = ConnectionRegistry::new();
        let (mut s, _rx_s) = session(&registry);

        let reply = s.handle_text("{oops").await;
        assert_eq!(
            reply,
            Some(ServerReply::Error {
                error: "invalid_json".to_string()
            })
        );
        assert_eq!(s.state(), &SessionState::Connected);

        // 后续合法消息照常处理
        let reply = s.handle_text(r#"{"type":"register","pi_id":"pi_1"}"#).await;
        assert_eq!(reply, Some(ServerReply::registered()));

        let reply = s.handle_text("still not json").await;
        assert!(matches!(reply, Some(ServerReply::Error { .. })));
        assert_eq!(s.pi_id(), Some("pi_1"));
    }

    #[tokio::test]
    async fn test_other_messages_are_only_logged() {
        let registry = ConnectionRegistry::new();
        let (mut s, _rx_s) = session(&registry);

        assert_eq!(s.handle_text(r#"{"type":"status","ok":true}"#).await, None);
        assert_eq!(s.state(), &SessionState::Connected);
    }

    #[tokio::test]
    async fn test_close_removes_own_registration() {
        let registry = ConnectionRegistry::new();
        let (mut s, _rx_s) = session(&registry);

        s.handle_text(r#"{"type":"register","pi_id":"pi_1"}"#).await;
        s.close().await;

        assert_eq!(s.state(), &SessionState::Closed);
        assert!(s.connection().is_closed());
        assert!(registry.get("pi_1").await.is_none());
    }

    #[tokio::test]
    async fn test_stale_session_close_keeps_newer_registration() {
        let registry = ConnectionRegistry::new();
        let (mut s1, _rx_s1) = session(&registry);
        let (mut s2, _rx_s2) = session(&registry);

        s1.handle_text(r#"{"type":"register","pi_id":"A"}"#).await;
        s2.handle_text(r#"{"type":"register","pi_id":"A"}"#).await;
        s1.close().await;

        let current = registry.get("A").await.unwrap();
        assert!(Arc::ptr_eq(&current, s2.connection()));
    }

    #[tokio::test]
    async fn test_superseded_connection_is_asked_to_close() {
        let registry = ConnectionRegistry::new();
        let (c1, mut rx1) = AgentConnection::new();
        let mut s1 = AgentSession::new(c1, registry.clone());
        let (mut s2, _rx_s2) = session(&registry);

        s1.handle_text(r#"{"type":"register","pi_id":"A"}"#).await;
        s2.handle_text(r#"{"type":"register","pi_id":"A"}"#).await;

        assert!(matches!(rx1.try_recv(), Ok(Outbound::Close)));
    }

    #[tokio::test]
    async fn test_reregister_same_id_does_not_close_self() {
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = AgentConnection::new();
        let mut s = AgentSession::new(conn, registry.clone());

        s.handle_text(r#"{"type":"register","pi_id":"A"}"#).await;
        s.handle_text(r#"{"type":"register","pi_id":"A"}"#).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(registry.snapshot().await, vec!["A"]);
    }

    #[tokio::test]
    async fn test_reregister_under_new_id_drops_old_id() {
        let registry = ConnectionRegistry::new();
        let (mut s, _rx_s) = session(&registry);

        s.handle_text(r#"{"type":"register","pi_id":"old"}"#).await;
        s.handle_text(r#"{"type":"register","pi_id":"new"}"#).await;
        assert_eq!(registry.snapshot().await, vec!["new"]);

        s.close().await;
        assert!(registry.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_after_disconnect() {
        let registry = ConnectionRegistry::new();
        let (mut p1, _rx_p1) = session(&registry);
        let (mut p2, _rx_p2) = session(&registry);

        p1.handle_text(r#"{"type":"register","pi_id":"p1"}"#).await;
        p2.handle_text(r#"{"type":"register","pi_id":"p2"}"#).await;
        p1.close().await;

        assert_eq!(registry.snapshot().await, vec!["p2"]);
    }
}
