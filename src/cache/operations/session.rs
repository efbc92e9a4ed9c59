use std::sync::Arc;
use std::time::Duration;

use crate::cache::keys::user_keys;
use crate::cache::store::{CacheError, CacheStore, CacheWrite};
use crate::database::models::user::User;

/// 会话缓存操作（按会话标识的键族）
///
/// 会话对应的值就是登录时刻的用户快照，它存在与否是唯一的登录凭据。
#[derive(Clone)]
pub struct SessionCacheOperations {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl SessionCacheOperations {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// 缓存新会话
    pub async fn cache_session(&self, session: &str, user: &User) -> Result<(), CacheError> {
        let key = user_keys::session_key(session);
        let json = serde_json::to_vec(user)?;
        self.store.set(&key, &json, self.ttl).await
    }

    /// 获取会话
    pub async fn get_session(&self, session: &str) -> Result<Option<User>, CacheError> {
        let key = user_keys::session_key(session);
        match self.store.get(&key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// 用新快照刷新已存在的会话，不会复活已过期或已删除的会话，也不延长过期时间
    pub async fn refresh_session(&self, session: &str, user: &User) -> Result<CacheWrite, CacheError> {
        let key = user_keys::session_key(session);
        let json = serde_json::to_vec(user)?;
        self.store.replace_if_newer(&key, &json, user.version).await
    }

    /// 删除会话
    pub async fn remove_session(&self, session: &str) -> Result<(), CacheError> {
        let key = user_keys::session_key(session);
        self.store.delete(&key).await
    }
}
