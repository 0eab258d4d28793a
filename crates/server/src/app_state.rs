/// 应用全局状态

use crate::config::Config;
use crate::ws::ConnectionRegistry;
use std::sync::Arc;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 设备连接注册表
    pub registry: ConnectionRegistry,
    /// 运行配置
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(registry: ConnectionRegistry, config: Config) -> Self {
        Self {
            registry,
            config: Arc::new(config),
        }
    }

    /// 获取连接注册表
    pub fn registry(&self) -> ConnectionRegistry {
        self.registry.clone()
    }
}
