use std::sync::Arc;
use std::time::Duration;

use crate::cache::keys::user_keys;
use crate::cache::store::{CacheError, CacheStore, CacheWrite};
use crate::database::models::user::User;

/// 用户信息缓存操作（按用户名的键族）
#[derive(Clone)]
pub struct UserCacheOperations {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl UserCacheOperations {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// 从缓存获取用户信息
    pub async fn get_cached_user(&self, user_name: &str) -> Result<Option<User>, CacheError> {
        let key = user_keys::user_info_key(user_name);
        match self.store.get(&key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// 将用户信息写入缓存，已缓存的快照更新时跳过
    pub async fn cache_user(&self, user: &User) -> Result<CacheWrite, CacheError> {
        let key = user_keys::user_info_key(&user.name);
        let json = serde_json::to_vec(user)?;
        self.store
            .set_if_newer(&key, &json, user.version, self.ttl)
            .await
    }

    /// 从缓存中删除用户
    pub async fn remove_user_from_cache(&self, user_name: &str) -> Result<(), CacheError> {
        let key = user_keys::user_info_key(user_name);
        self.store.delete(&key).await
    }
}
