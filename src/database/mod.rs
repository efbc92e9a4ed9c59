// 数据库模块
// 包含数据库实体定义和存储库操作

pub mod models; // 数据库实体定义
pub mod repositories; // 存储库操作实现

// 重新导出常用类型，方便其他模块使用
pub use models::user::{Gender, NewUser, User};
pub use repositories::{MemoryUserRepository, PgUserRepository, StoreError, UserRepository};
