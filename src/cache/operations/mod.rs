/// 缓存操作
/// 提供两个键族的读写功能

// 用户缓存操作
pub mod user;

// 会话缓存操作
pub mod session;

// 重新导出常用操作
pub use session::SessionCacheOperations;
pub use user::UserCacheOperations;
