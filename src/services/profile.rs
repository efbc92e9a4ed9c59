use std::sync::Arc;

use crate::cache::{CacheWrite, SessionCacheOperations, UserCacheOperations};
use crate::database::{User, UserRepository};
use crate::error::AppError;

use super::session::SessionManager;
use super::{RequestContext, check_session_owner};

/// 修改结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// 没有匹配的行，缓存不做任何改动
    Unchanged,
}

/// 资料修改：先写数据库，再尽力级联刷新两个键族
///
/// 级联中的缓存失败都不影响结果，只会降低新鲜度。
/// 并发修改同一用户时，版本号保证旧快照不会覆盖新快照。
#[derive(Clone)]
pub struct ProfileMutator {
    users: Arc<dyn UserRepository>,
    user_cache: UserCacheOperations,
    session_cache: SessionCacheOperations,
    sessions: SessionManager,
    strict_session_owner: bool,
}

impl ProfileMutator {
    pub fn new(
        users: Arc<dyn UserRepository>,
        user_cache: UserCacheOperations,
        session_cache: SessionCacheOperations,
        sessions: SessionManager,
        strict_session_owner: bool,
    ) -> Self {
        Self {
            users,
            user_cache,
            session_cache,
            sessions,
            strict_session_owner,
        }
    }

    pub async fn update_nickname(
        &self,
        ctx: &RequestContext,
        user_name: &str,
        nickname: &str,
    ) -> Result<UpdateOutcome, AppError> {
        tracing::info!(
            request_id = %ctx.request_id,
            "update_nickname access from user_name={}",
            user_name
        );
        if ctx.session.is_empty() || user_name.is_empty() {
            return Err(AppError::validation("请求参数不合法"));
        }
        if nickname.is_empty() {
            return Err(AppError::validation("昵称不能为空"));
        }

        let owner = self.sessions.authenticate(ctx).await?;
        check_session_owner(ctx, &owner, user_name, self.strict_session_owner)?;

        let affected = self
            .users
            .update_nickname(user_name, nickname, &owner.name)
            .await?;
        if affected != 1 {
            tracing::info!(
                request_id = %ctx.request_id,
                "update_nickname matched {} rows for {}, caches untouched",
                affected,
                user_name
            );
            return Ok(UpdateOutcome::Unchanged);
        }

        match self.users.find_by_name(user_name).await {
            Ok(Some(fresh)) => self.cascade(ctx, &owner, &fresh).await,
            Ok(None) => {
                tracing::error!(
                    request_id = %ctx.request_id,
                    "{} vanished right after update, invalidating caches",
                    user_name
                );
                self.invalidate(ctx, &owner, user_name).await;
            }
            Err(e) => {
                tracing::error!(
                    request_id = %ctx.request_id,
                    "re-read of {} failed, invalidating caches: {}",
                    user_name,
                    e
                );
                self.invalidate(ctx, &owner, user_name).await;
            }
        }

        Ok(UpdateOutcome::Updated)
    }

    async fn cascade(&self, ctx: &RequestContext, owner: &User, fresh: &User) {
        match self.user_cache.cache_user(fresh).await {
            Ok(CacheWrite::Written) => {}
            Ok(CacheWrite::Skipped) => {
                tracing::debug!(
                    request_id = %ctx.request_id,
                    "newer snapshot of {} already cached",
                    fresh.name
                );
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    "refresh cached user {} failed, dropping entry: {}",
                    fresh.name,
                    e
                );
                self.drop_user_entry(ctx, &fresh.name).await;
            }
        }

        // 会话属于别的用户时不能把这份快照塞进去
        if owner.name != fresh.name {
            return;
        }

        match self.session_cache.refresh_session(&ctx.session, fresh).await {
            Ok(CacheWrite::Written) => {}
            Ok(CacheWrite::Skipped) => {
                tracing::debug!(
                    request_id = %ctx.request_id,
                    "session not refreshed, gone or holding a newer snapshot"
                );
            }
            Err(e) => {
                // 宁可让用户重新登录，也不留下过期的会话快照
                tracing::error!(
                    request_id = %ctx.request_id,
                    "update session failed, invalidating: {}",
                    e
                );
                self.sessions.invalidate(ctx).await;
            }
        }
    }

    async fn invalidate(&self, ctx: &RequestContext, owner: &User, user_name: &str) {
        self.drop_user_entry(ctx, user_name).await;
        if owner.name == user_name {
            self.sessions.invalidate(ctx).await;
        }
    }

    async fn drop_user_entry(&self, ctx: &RequestContext, user_name: &str) {
        if let Err(e) = self.user_cache.remove_user_from_cache(user_name).await {
            tracing::warn!(
                request_id = %ctx.request_id,
                "drop cached user {} failed: {}",
                user_name,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::keys::{session_key, user_info_key};
    use crate::cache::{CacheStore, MemoryCacheStore};
    use crate::services::test_support::*;

    fn mutator(f: &Fixture) -> ProfileMutator {
        let s = settings(false);
        let cache: Arc<dyn CacheStore> = f.cache.clone();
        let users: Arc<dyn UserRepository> = f.repo.clone();
        let user_cache = UserCacheOperations::new(cache.clone(), s.user_cache_ttl);
        let session_cache = SessionCacheOperations::new(cache, s.session_cache_ttl);
        let resolver = crate::services::IdentityResolver::new(users.clone(), user_cache.clone());
        let sessions = SessionManager::new(resolver, session_cache.clone());
        ProfileMutator::new(users, user_cache, session_cache, sessions, false)
    }

    fn cached_user(cache: &MemoryCacheStore, key: &str) -> User {
        serde_json::from_slice(&cache.raw(key).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn cascade_reaches_both_key_families() {
        let f = fixture();
        f.register("alice", "secret").await;
        let ctx = f.login("alice", "secret").await;

        f.service.update_nickname(&ctx, "alice", "Bob").await.unwrap();

        let resolved = f.service.resolve(&ctx, "alice").await.unwrap();
        assert_eq!(resolved.nickname, "Bob");
        let authed = f.service.authenticate(&ctx).await.unwrap();
        assert_eq!(authed.nickname, "Bob");
        assert_eq!(authed.version, 2);
    }

    #[tokio::test]
    async fn zero_rows_reports_success_without_touching_caches() {
        let f = fixture();
        f.register("alice", "secret").await;
        let ctx = f.login("alice", "secret").await;

        let outcome = mutator(&f)
            .update_nickname(&ctx, "ghost", "Bob")
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Unchanged);
        assert!(!f.cache.contains(&user_info_key("ghost")));
        assert_eq!(
            cached_user(&f.cache, &session_key(&ctx.session)).nickname,
            "alice-nick"
        );

        // 对外仍然报告成功
        f.service.update_nickname(&ctx, "ghost", "Bob").await.unwrap();
    }

    #[tokio::test]
    async fn session_refresh_failure_invalidates_session() {
        let f = fixture();
        f.register("alice", "secret").await;
        let ctx = f.login("alice", "secret").await;
        f.cache.fail_writes_with_prefix("session_");

        f.service.update_nickname(&ctx, "alice", "Bob").await.unwrap();

        assert!(!f.cache.contains(&session_key(&ctx.session)));
        assert_eq!(cached_user(&f.cache, &user_info_key("alice")).nickname, "Bob");
        assert_eq!(f.repo.peek("alice").unwrap().nickname, "Bob");
    }

    #[tokio::test]
    async fn user_cache_failure_drops_entry_but_succeeds() {
        let f = fixture();
        f.register("alice", "secret").await;
        let ctx = f.login("alice", "secret").await;
        assert!(f.cache.contains(&user_info_key("alice")));
        f.cache.fail_writes_with_prefix("userinfo_");

        f.service.update_nickname(&ctx, "alice", "Bob").await.unwrap();

        assert!(!f.cache.contains(&user_info_key("alice")));
        assert_eq!(
            cached_user(&f.cache, &session_key(&ctx.session)).nickname,
            "Bob"
        );
    }

    #[tokio::test]
    async fn store_outage_on_update_is_fatal() {
        let f = fixture();
        f.register("alice", "secret").await;
        let ctx = f.login("alice", "secret").await;
        f.repo.set_unavailable(true);

        let err = f
            .service
            .update_nickname(&ctx, "alice", "Bob")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }

    #[tokio::test]
    async fn missing_inputs_are_validation_errors() {
        let f = fixture();
        let anonymous = RequestContext::anonymous();
        assert!(matches!(
            f.service.update_nickname(&anonymous, "alice", "Bob").await.unwrap_err(),
            AppError::Validation(_)
        ));
        let ctx = RequestContext::new("tok");
        assert!(matches!(
            f.service.update_nickname(&ctx, "", "Bob").await.unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            f.service.update_nickname(&ctx, "alice", "").await.unwrap_err(),
            AppError::Validation(_)
        ));
        assert_eq!(f.repo.calls(), 0);
    }

    #[tokio::test]
    async fn expired_session_cannot_update() {
        let f = fixture();
        f.register("alice", "secret").await;
        let err = f
            .service
            .update_nickname(&RequestContext::new("stale"), "alice", "Bob")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
        assert_eq!(f.repo.peek("alice").unwrap().nickname, "alice-nick");
    }

    #[tokio::test]
    async fn mismatched_owner_updates_target_but_keeps_own_session() {
        let f = fixture();
        f.register("alice", "secret").await;
        f.register("bob", "hunter2").await;
        let ctx = f.login("alice", "secret").await;

        f.service.update_nickname(&ctx, "bob", "B.").await.unwrap();

        assert_eq!(f.repo.peek("bob").unwrap().nickname, "B.");
        assert_eq!(f.repo.peek("bob").unwrap().modifier, "alice");
        let own = f.service.authenticate(&ctx).await.unwrap();
        assert_eq!(own.name, "alice");
    }

    #[tokio::test]
    async fn stale_cascade_does_not_overwrite_newer_snapshot() {
        let f = fixture();
        f.register("alice", "secret").await;
        let ctx = f.login("alice", "secret").await;

        f.service.update_nickname(&ctx, "alice", "first").await.unwrap();
        let newer = f.repo.peek("alice").unwrap();

        // 模拟另一个请求更晚写入的快照
        let mut future = newer.clone();
        future.nickname = "second".into();
        future.version = newer.version + 1;
        f.cache.put_raw(
            &user_info_key("alice"),
            &serde_json::to_vec(&future).unwrap(),
            Duration::from_secs(60),
        );

        // 旧版本回填被拒绝
        let write = UserCacheOperations::new(f.cache.clone(), Duration::from_secs(60))
            .cache_user(&newer)
            .await
            .unwrap();
        assert_eq!(write, CacheWrite::Skipped);
        assert_eq!(
            cached_user(&f.cache, &user_info_key("alice")).nickname,
            "second"
        );
    }

    #[tokio::test]
    async fn refresh_never_recreates_logged_out_session() {
        let f = fixture();
        f.register("alice", "secret").await;
        let ctx = f.login("alice", "secret").await;
        let fresh = f.repo.peek("alice").unwrap();

        f.service.logout(&ctx).await.unwrap();
        let write = SessionCacheOperations::new(f.cache.clone(), Duration::from_secs(60))
            .refresh_session(&ctx.session, &fresh)
            .await
            .unwrap();
        assert_eq!(write, CacheWrite::Skipped);
        assert!(!f.cache.contains(&session_key(&ctx.session)));
    }
}
