/// Pi Relay - Server
/// 
/// 设备通过 WebSocket 长连接注册，外部客户端通过 HTTP 接口向设备转发命令

pub mod api;
pub mod app_state;
pub mod config;
pub mod services;
pub mod ws;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app_state::AppState;

/// 构建应用路由
pub fn build_router(state: AppState) -> Router {
    // 设置CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws::handle_agent_websocket))
        .merge(api::api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> &'static str {
    "Pi Relay Server"
}

async fn health_handler() -> &'static str {
    "OK"
}
