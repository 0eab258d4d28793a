/// Agent 连接注册表
///
/// 维护 pi_id -> 在线连接 的映射，是"设备是否可达"的唯一依据。
/// 每个操作只在内部短暂持锁，调用方无需额外加锁。

use super::connection::AgentConnection;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 连接注册表
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    /// 所有连接的映射：pi_id -> AgentConnection
    connections: Arc<RwLock<HashMap<String, Arc<AgentConnection>>>>,
}

impl ConnectionRegistry {
    /// 创建新的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入映射（覆盖已有映射），返回被替换的旧连接
    pub async fn put(
        &self,
        pi_id: impl Into<String>,
        connection: Arc<AgentConnection>,
    ) -> Option<Arc<AgentConnection>> {
        let pi_id = pi_id.into();
        let previous = {
            let mut connections = self.connections.write().await;
            connections.insert(pi_id.clone(), connection.clone())
        };

        info!("设备已注册: {} ({})", pi_id, connection.connection_id);
        previous
    }

    /// 获取指定设备的连接
    pub async fn get(&self, pi_id: &str) -> Option<Arc<AgentConnection>> {
        let connections = self.connections.read().await;
        connections.get(pi_id).cloned()
    }

    /// 仅当当前映射仍指向同一个连接时才移除
    ///
    /// 旧会话断开时不会误删同一 pi_id 的新注册
    pub async fn remove_if_owner(&self, pi_id: &str, connection: &Arc<AgentConnection>) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(pi_id) {
            Some(current) if Arc::ptr_eq(current, connection) => {
                connections.remove(pi_id);
                info!("设备已注销: {} ({})", pi_id, connection.connection_id);
                true
            }
            Some(_) => {
                debug!(
                    "跳过注销: {} 已被其他连接占用 ({})",
                    pi_id, connection.connection_id
                );
                false
            }
            None => false,
        }
    }

    /// 当前已注册的 pi_id 快照（升序）
    pub async fn snapshot(&self) -> Vec<String> {
        let mut ids: Vec<String> = {
            let connections = self.connections.read().await;
            connections.keys().cloned().collect()
        };
        ids.sort();
        ids
    }

    /// 已注册设备数量
    pub async fn count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// 清理已关闭的连接
    /// 返回被清理的 pi_id 列表
    pub async fn prune_closed(&self) -> Vec<String> {
        let stale: Vec<(String, Arc<AgentConnection>)> = {
            let connections = self.connections.read().await;
            connections
                .iter()
                .filter(|(_, conn)| conn.is_closed())
                .map(|(id, conn)| (id.clone(), conn.clone()))
                .collect()
        };

        let mut removed = Vec::new();
        for (pi_id, conn) in stale {
            if self.remove_if_owner(&pi_id, &conn).await {
                removed.push(pi_id);
            }
        }
        removed
    }

    /// 启动过期连接清理任务
    pub fn start_sweeper(self, check_interval_secs: u64) {
        if check_interval_secs == 0 {
            info!("过期连接清理任务已禁用");
            return;
        }
        info!("✅ 连接清理任务已启动（每 {} 秒）", check_interval_secs);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(check_interval_secs));

            loop {
                interval.tick().await;

                let removed = self.prune_closed().await;
                if !removed.is_empty() {
                    warn!(
                        "连接清理: 移除了 {} 个已关闭的连接: {:?}，剩余 {} 个在线设备",
                        removed.len(),
                        removed,
                        self.count().await
                    );
                }
            }
        });
    }
}
