/// 服务层
/// 
/// 提供业务逻辑处理

pub mod command_service;

pub use command_service::CommandService;
