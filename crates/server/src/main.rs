/// Pi Relay - Server
/// 
/// 中继服务器主程序

use relay_server::{app_state::AppState, build_router, config, ws::ConnectionRegistry};
use std::net::SocketAddr;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 加载配置
    let cfg = config::Config::from_env()?;

    // 初始化日志
    // RUST_LOG 优先，否则使用 LOG_LEVEL
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level))
        )
        .init();

    info!("🚀 启动 Pi Relay Server...");
    info!("✅ 配置加载成功");

    if cfg.is_open_mode() {
        warn!("⚠️ 未设置 RELAY_SECRET，控制接口处于开放模式，接受任意 token");
    }

    // 初始化连接注册表
    let registry = ConnectionRegistry::new();

    // 启动过期连接清理
    registry.clone().start_sweeper(cfg.sweep_interval_secs);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server_port));
    let app = build_router(AppState::new(registry, cfg));

    // 启动服务器
    info!("🎯 服务器监听在 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
