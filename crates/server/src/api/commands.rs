/// 命令控制接口

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use relay_common::RelayError;
use serde::{Deserialize, Serialize};

use crate::{app_state::AppState, services::CommandService};

/// 发送命令的查询参数
#[derive(Debug, Deserialize)]
pub struct SendQuery {
    pub pi_id: Option<String>,
    pub command: Option<String>,
    /// 配置了 RELAY_SECRET 时必须与之一致
    pub token: Option<String>,
}

/// 发送命令响应
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SendResponse {
    fn sent() -> Self {
        Self {
            status: "sent".to_string(),
            reason: None,
        }
    }

    fn error(err: &RelayError) -> Self {
        Self {
            status: "error".to_string(),
            reason: Some(err.reason()),
        }
    }
}

/// 在线设备列表响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub connected_pis: Vec<String>,
}

/// 错误对应的 HTTP 状态码
fn error_status(err: &RelayError) -> StatusCode {
    match err {
        RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
        RelayError::BadRequest
        | RelayError::MalformedMessage
        | RelayError::MissingIdentifier => StatusCode::BAD_REQUEST,
        RelayError::AgentUnreachable(_) => StatusCode::NOT_FOUND,
        RelayError::DeliveryFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 向设备发送命令
/// 
/// 例如：GET /send?pi_id=pi_1234&command=on
pub async fn send_command(
    State(state): State<AppState>,
    Query(query): Query<SendQuery>,
) -> Result<Json<SendResponse>, (StatusCode, Json<SendResponse>)> {
    let service = CommandService::new(state);
    match service
        .send_command(
            query.pi_id.as_deref(),
            query.command.as_deref(),
            query.token.as_deref(),
        )
        .await
    {
        Ok(()) => Ok(Json(SendResponse::sent())),
        Err(e) => Err((error_status(&e), Json(SendResponse::error(&e)))),
    }
}

/// 获取在线设备列表
pub async fn list_pis(State(state): State<AppState>) -> Json<ListResponse> {
    let service = CommandService::new(state);
    Json(ListResponse {
        connected_pis: service.list_agents().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status() {
        assert_eq!(error_status(&RelayError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(error_status(&RelayError::BadRequest), StatusCode::BAD_REQUEST);
        assert_eq!(error_status(&RelayError::unreachable("pi_1")), StatusCode::NOT_FOUND);
        assert_eq!(
            error_status(&RelayError::delivery_failed("reset")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_bodies() {
        let sent = serde_json::to_value(SendResponse::sent()).unwrap();
        assert_eq!(sent, serde_json::json!({"status": "sent"}));

        let missing = serde_json::to_value(SendResponse::error(&RelayError::BadRequest)).unwrap();
        assert_eq!(
            missing,
            serde_json::json!({"status": "error", "reason": "missing_parameters"})
        );
    }
}
