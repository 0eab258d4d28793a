use thiserror::Error;

/// 中继错误类型
///
/// 所有错误都只影响当前请求或当前连接，不会导致进程退出
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// 设备发送了无法解析的帧（会话继续）
    #[error("无效的 JSON 消息")]
    MalformedMessage,

    /// 注册消息缺少 pi_id（会话继续）
    #[error("注册消息缺少 pi_id")]
    MissingIdentifier,

    #[error("令牌无效")]
    Unauthorized,

    #[error("缺少必要参数")]
    BadRequest,

    /// 目标设备没有可用的在线连接
    #[error("设备未连接: {0}")]
    AgentUnreachable(String),

    /// 向看似存活的连接写入失败
    #[error("{0}")]
    DeliveryFailed(String),
}

impl RelayError {
    /// 对外暴露的原因码
    pub fn reason(&self) -> String {
        match self {
            Self::MalformedMessage => "invalid_json".to_string(),
            Self::MissingIdentifier => "missing_pi_id".to_string(),
            Self::Unauthorized => "invalid_token".to_string(),
            Self::BadRequest => "missing_parameters".to_string(),
            Self::AgentUnreachable(_) => "pi_not_connected".to_string(),
            Self::DeliveryFailed(message) => message.clone(),
        }
    }

    /// 写入失败
    pub fn delivery_failed(message: impl Into<String>) -> Self {
        Self::DeliveryFailed(message.into())
    }

    /// 设备不可达
    pub fn unreachable(pi_id: impl Into<String>) -> Self {
        Self::AgentUnreachable(pi_id.into())
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, RelayError>;
