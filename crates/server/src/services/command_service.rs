/// 命令分发服务
/// 
/// 查找目标设备并通过其连接转发命令；同时提供在线设备查询

use crate::app_state::AppState;
use relay_common::{RelayCommand, RelayError, Result};
use tracing::{info, warn};

pub struct CommandService {
    state: AppState,
}

impl CommandService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 校验 token；未配置密钥时接受任意 token
    fn authorize(&self, token: Option<&str>) -> Result<()> {
        match self.state.config.relay_secret.as_deref() {
            Some(secret) if token != Some(secret) => Err(RelayError::Unauthorized),
            _ => Ok(()),
        }
    }

    /// 向设备发送命令
    ///
    /// 只等待写入完成，不等待设备确认；失败不重试
    pub async fn send_command(
        &self,
        pi_id: Option<&str>,
        command: Option<&str>,
        token: Option<&str>,
    ) -> Result<()> {
        self.authorize(token)?;

        let (pi_id, command) = match (pi_id, command) {
            (Some(pi_id), Some(command)) if !pi_id.is_empty() && !command.is_empty() => {
                (pi_id, command)
            }
            _ => return Err(RelayError::BadRequest),
        };

        let registry = self.state.registry();
        let connection = registry
            .get(pi_id)
            .await
            .ok_or_else(|| RelayError::unreachable(pi_id))?;

        if connection.is_closed() {
            // 会话未及时清理的过期连接
            registry.remove_if_owner(pi_id, &connection).await;
            warn!("设备 {} 的连接已关闭，已移除过期注册", pi_id);
            return Err(RelayError::unreachable(pi_id));
        }

        let payload = RelayCommand::command(command)
            .to_json()
            .map_err(|e| RelayError::delivery_failed(e.to_string()))?;

        info!("📤 [Server -> Pi] 发送命令: pi_id={}, command={}", pi_id, command);
        connection
            .send(payload, self.state.config.send_timeout())
            .await
            .map_err(|e| {
                warn!("命令发送失败: pi_id={}, error={}", pi_id, e);
                e
            })
    }

    /// 获取在线设备列表
    pub async fn list_agents(&self) -> Vec<String> {
        self.state.registry().snapshot().await
    }
}
