/// WebSocket 模块
/// 
/// 管理设备的 WebSocket 连接与注册表

pub mod connection;
pub mod handler;
pub mod registry;
pub mod session;

pub use connection::AgentConnection;
pub use handler::handle_agent_websocket;
pub use registry::ConnectionRegistry;
pub use session::{AgentSession, SessionState};
