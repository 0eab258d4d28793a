/// 中继消息协议
/// 
/// 设备与 Server 之间基于 WebSocket 文本帧的 JSON 消息

pub mod message;

pub use message::{AgentMessage, RelayCommand, ServerReply};
