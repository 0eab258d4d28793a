/// 配置管理

use anyhow::Context;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// 共享密钥；为 None 时控制接口接受任意 token（开放模式）
    pub relay_secret: Option<String>,
    pub send_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 6789,
            relay_secret: None,
            send_timeout_secs: 10,
            sweep_interval_secs: 30,
            log_level: "debug".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载配置
    pub fn from_source<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let server_port = match get("PORT").or_else(|| get("SERVER_PORT")) {
            Some(port) => port.parse::<u16>().with_context(|| format!("无效的端口: {}", port))?,
            None => defaults.server_port,
        };

        // 空字符串视为未设置
        let relay_secret = get("RELAY_SECRET").filter(|secret| !secret.is_empty());

        let send_timeout_secs = match get("RELAY_SEND_TIMEOUT_SECS") {
            Some(v) => v
                .parse::<u64>()
                .with_context(|| format!("无效的 RELAY_SEND_TIMEOUT_SECS: {}", v))?,
            None => defaults.send_timeout_secs,
        };

        let sweep_interval_secs = match get("RELAY_SWEEP_INTERVAL_SECS") {
            Some(v) => v
                .parse::<u64>()
                .with_context(|| format!("无效的 RELAY_SWEEP_INTERVAL_SECS: {}", v))?,
            None => defaults.sweep_interval_secs,
        };

        let log_level = get("LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            server_port,
            relay_secret,
            send_timeout_secs,
            sweep_interval_secs,
            log_level,
        })
    }

    /// 是否处于开放模式（未配置密钥）
    pub fn is_open_mode(&self) -> bool {
        self.relay_secret.is_none()
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}
