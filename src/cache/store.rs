use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// 缓存访问错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache call timed out after {0:?}")]
    Timeout(Duration),
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// 带版本保护的写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Written,
    /// 缓存里已有更新的快照，或者要替换的键不存在
    Skipped,
}

/// 键值缓存的最小接口
///
/// 值都是用户快照的 JSON 字节。两个键族之间没有任何事务，
/// 调用方自己负责顺序以及如何对待部分失败。
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 读取，未命中返回 `Ok(None)`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// 无条件写入并设置过期时间
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// 键不存在或已缓存快照的版本不高于 `version` 时写入，并重置过期时间
    async fn set_if_newer(
        &self,
        key: &str,
        value: &[u8],
        version: i64,
        ttl: Duration,
    ) -> Result<CacheWrite, CacheError>;

    /// 只替换已存在且版本不高于 `version` 的键，保留原有过期时间
    async fn replace_if_newer(
        &self,
        key: &str,
        value: &[u8],
        version: i64,
    ) -> Result<CacheWrite, CacheError>;
}

/// 从快照 JSON 中取出 `version` 字段，解析失败时返回 None
pub(crate) fn snapshot_version(bytes: &[u8]) -> Option<i64> {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()?
        .get("version")?
        .as_i64()
}

/// redis 的过期时间以秒为单位且必须大于 0
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
