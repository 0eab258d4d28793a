/// 工具函数集合

use uuid::Uuid;

/// 生成唯一 ID
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// 生成连接 ID
pub fn connection_id() -> String {
    format!("conn-{}", generate_id())
}
