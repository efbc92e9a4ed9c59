// 存储库模块
// 用户表的读写接口，以及 Postgres 和内存两种实现

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::database::models::user::{NewUser, User};

pub mod memory;
pub mod user;

pub use memory::MemoryUserRepository;
pub use user::PgUserRepository;

/// 持久化存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database call timed out after {0:?}")]
    Timeout(Duration),
    #[error("database unavailable: {0}")]
    Unavailable(String),
    /// 用户名唯一约束冲突，由上层转换成重复注册
    #[error("user {0} already exists")]
    UniqueViolation(String),
}

/// 用户存储库
///
/// 只负责按用户名增查改，不掺杂任何缓存策略。
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 按用户名查找，不存在时返回 `Ok(None)`
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, StoreError>;

    /// 插入新用户，用户名已存在时返回 [`StoreError::UniqueViolation`]
    async fn insert(&self, user: &NewUser) -> Result<User, StoreError>;

    /// 按用户名更新昵称并自增版本号，返回受影响的行数
    async fn update_nickname(
        &self,
        name: &str,
        nickname: &str,
        modifier: &str,
    ) -> Result<u64, StoreError>;
}
