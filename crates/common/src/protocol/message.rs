/// 中继消息定义

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RelayError;

/// 设备 -> Server 的消息
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    /// 注册消息：`{"type": "register", "pi_id": "..."}`
    Register {
        /// 缺失、为空或不是字符串时为 None
        pi_id: Option<String>,
    },
    /// 其他任意 JSON 消息（例如状态上报），只记录日志
    Other(Value),
}

impl AgentMessage {
    /// 从文本帧解析
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_str(text).map_err(|_| RelayError::MalformedMessage)?;

        if value.get("type").and_then(Value::as_str) == Some("register") {
            let pi_id = value
                .get("pi_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            return Ok(Self::Register { pi_id });
        }

        Ok(Self::Other(value))
    }

    /// 构造注册消息（设备端与测试使用）
    pub fn register(pi_id: impl Into<String>) -> Value {
        serde_json::json!({ "type": "register", "pi_id": pi_id.into() })
    }
}

/// Server -> 设备 的应答帧
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ServerReply {
    Status { status: String },
    Error { error: String },
}

impl ServerReply {
    /// 注册成功
    pub fn registered() -> Self {
        Self::Status {
            status: "registered".to_string(),
        }
    }

    /// 由错误生成应答
    pub fn from_error(err: &RelayError) -> Self {
        Self::Error {
            error: err.reason(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Server -> 设备 的命令帧
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayCommand {
    /// `{"type": "command", "command": "..."}`
    Command { command: String },
}

impl RelayCommand {
    pub fn command(command: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
        }
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
