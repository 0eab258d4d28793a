/// Pi Relay - 公共库
/// 
/// 提供 Server 与设备端共享的消息协议、错误类型和工具函数

pub mod errors;
pub mod protocol;
pub mod utils;

// 重新导出常用类型
pub use errors::{RelayError, Result};
pub use protocol::{AgentMessage, RelayCommand, ServerReply};
