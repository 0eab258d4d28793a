pub mod commands;

use axum::{routing::get, Router};

use crate::app_state::AppState;

/// 控制接口路由（统一入口）
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/send", get(commands::send_command))
        .route("/pis", get(commands::list_pis))
}
