use std::sync::Arc;

use crate::cache::{CacheError, CacheWrite, UserCacheOperations};
use crate::database::{User, UserRepository};
use crate::error::AppError;

use super::RequestContext;

/// 用户信息的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Store,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub user: User,
    pub source: Source,
}

/// 缓存旁路读取：先查按用户名的缓存，未命中再查数据库并回填
///
/// 命中缓存时直接信任，不做新鲜度检查。
#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserRepository>,
    cache: UserCacheOperations,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserRepository>, cache: UserCacheOperations) -> Self {
        Self { users, cache }
    }

    /// 读取用户并在数据库命中时回填缓存
    pub async fn resolve(&self, ctx: &RequestContext, user_name: &str) -> Result<User, AppError> {
        let resolved = self.lookup(ctx, user_name).await?;
        if resolved.source == Source::Store {
            self.remember(ctx, &resolved.user).await;
        }
        Ok(resolved.user)
    }

    /// 只读不回填，登录时要先校验密码再决定是否回填
    pub async fn lookup(&self, ctx: &RequestContext, user_name: &str) -> Result<Resolved, AppError> {
        match self.cache.get_cached_user(user_name).await {
            Ok(Some(user)) if user.name == user_name => {
                tracing::debug!(request_id = %ctx.request_id, "cache hit for user {}", user_name);
                return Ok(Resolved {
                    user,
                    source: Source::Cache,
                });
            }
            Ok(Some(user)) => {
                // 只有键被写坏时才会出现，按未命中处理
                tracing::warn!(
                    request_id = %ctx.request_id,
                    "cached entry for {} holds user {}, treating as miss",
                    user_name,
                    user.name
                );
                self.forget(ctx, user_name).await;
            }
            Ok(None) => {}
            Err(CacheError::Serialization(e)) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    "corrupt cache entry for {}: {}",
                    user_name,
                    e
                );
                self.forget(ctx, user_name).await;
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    "cache read for {} failed, falling back to store: {}",
                    user_name,
                    e
                );
            }
        }

        let user = self
            .users
            .find_by_name(user_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("用户 {} 尚未注册", user_name)))?;

        Ok(Resolved {
            user,
            source: Source::Store,
        })
    }

    /// 尽力回填缓存，失败只记日志
    pub async fn remember(&self, ctx: &RequestContext, user: &User) {
        match self.cache.cache_user(user).await {
            Ok(CacheWrite::Written) => {
                tracing::debug!(request_id = %ctx.request_id, "cached user {}", user.name);
            }
            Ok(CacheWrite::Skipped) => {
                tracing::debug!(
                    request_id = %ctx.request_id,
                    "newer snapshot of {} already cached",
                    user.name
                );
            }
            Err(e) => {
                tracing::error!(
                    request_id = %ctx.request_id,
                    "cache user {} failed: {}",
                    user.name,
                    e
                );
            }
        }
    }

    async fn forget(&self, ctx: &RequestContext, user_name: &str) {
        if let Err(e) = self.cache.remove_user_from_cache(user_name).await {
            tracing::warn!(
                request_id = %ctx.request_id,
                "drop cache entry for {} failed: {}",
                user_name,
                e
            );
        }
    }
}
