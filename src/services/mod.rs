// 用户服务模块
// 缓存旁路读取、会话管理、资料修改和注册，HTTP 层只和这里的 UserService 打交道

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::cache::{CacheStore, SessionCacheOperations, UserCacheOperations};
use crate::config::Config;
use crate::database::{Gender, User, UserRepository};
use crate::error::AppError;

pub mod identity;
pub mod profile;
pub mod registration;
pub mod session;

pub use identity::{IdentityResolver, Resolved, Source};
pub use profile::{ProfileMutator, UpdateOutcome};
pub use registration::{RegisterCommand, Registrar};
pub use session::SessionManager;

/// 请求级上下文，由传输层为每个请求创建并显式传入各个组件
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    /// 会话标识，未登录时为空串
    pub session: String,
}

impl RequestContext {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            session: session.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(String::new())
    }
}

/// 返回给客户端的用户资料，不包含密码
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub user_name: String,
    pub age: i32,
    pub gender: Gender,
    pub nick_name: String,
}

impl From<User> for ProfileView {
    fn from(user: User) -> Self {
        Self {
            user_name: user.name,
            age: user.age,
            gender: user.gender,
            nick_name: user.nickname,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub user_cache_ttl: Duration,
    pub session_cache_ttl: Duration,
    pub strict_session_owner: bool,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            user_cache_ttl: config.user_cache_ttl(),
            session_cache_ttl: config.session_cache_ttl(),
            strict_session_owner: config.strict_session_owner,
        }
    }
}

/// 会话所属用户和请求的用户名不一致时的处理
///
/// 默认只记录日志并放行，与旧版行为保持一致；`strict` 时拒绝。
pub(crate) fn check_session_owner(
    ctx: &RequestContext,
    owner: &User,
    user_name: &str,
    strict: bool,
) -> Result<(), AppError> {
    if owner.name == user_name {
        return Ok(());
    }
    tracing::warn!(
        request_id = %ctx.request_id,
        "session of {} does not match requested user {}",
        owner.name,
        user_name
    );
    if strict {
        return Err(AppError::auth("会话与用户不匹配"));
    }
    Ok(())
}

/// 用户服务，组装各个组件，对传输层提供五个操作
#[derive(Clone)]
pub struct UserService {
    registrar: Registrar,
    resolver: IdentityResolver,
    sessions: SessionManager,
    profiles: ProfileMutator,
    strict_session_owner: bool,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        cache: Arc<dyn CacheStore>,
        settings: ServiceSettings,
    ) -> Self {
        let user_cache = UserCacheOperations::new(cache.clone(), settings.user_cache_ttl);
        let session_cache = SessionCacheOperations::new(cache, settings.session_cache_ttl);

        let resolver = IdentityResolver::new(users.clone(), user_cache.clone());
        let sessions = SessionManager::new(resolver.clone(), session_cache.clone());
        let profiles = ProfileMutator::new(
            users.clone(),
            user_cache,
            session_cache,
            sessions.clone(),
            settings.strict_session_owner,
        );

        Self {
            registrar: Registrar::new(users),
            resolver,
            sessions,
            profiles,
            strict_session_owner: settings.strict_session_owner,
        }
    }

    pub async fn register(&self, ctx: &RequestContext, cmd: RegisterCommand) -> Result<(), AppError> {
        self.registrar.register(ctx, cmd).await.map(|_| ())
    }

    pub async fn login(
        &self,
        ctx: &RequestContext,
        user_name: &str,
        password: &str,
    ) -> Result<String, AppError> {
        self.sessions.login(ctx, user_name, password).await
    }

    pub async fn logout(&self, ctx: &RequestContext) -> Result<(), AppError> {
        self.sessions.logout(ctx).await
    }

    /// 会话校验
    pub async fn authenticate(&self, ctx: &RequestContext) -> Result<User, AppError> {
        self.sessions.authenticate(ctx).await
    }

    /// 缓存旁路读取用户
    pub async fn resolve(&self, ctx: &RequestContext, user_name: &str) -> Result<User, AppError> {
        self.resolver.resolve(ctx, user_name).await
    }

    /// 读取会话中的用户资料
    pub async fn get_profile(
        &self,
        ctx: &RequestContext,
        user_name: &str,
    ) -> Result<ProfileView, AppError> {
        tracing::info!(
            request_id = %ctx.request_id,
            "get_profile access from user_name={}",
            user_name
        );
        if ctx.session.is_empty() || user_name.is_empty() {
            return Err(AppError::validation("请求参数不合法"));
        }

        let owner = self.sessions.authenticate(ctx).await?;
        check_session_owner(ctx, &owner, user_name, self.strict_session_owner)?;

        Ok(ProfileView::from(owner))
    }

    /// 修改昵称
    ///
    /// 用户名不存在时同样返回成功，调用方无法区分两种情况。
    pub async fn update_nickname(
        &self,
        ctx: &RequestContext,
        user_name: &str,
        nickname: &str,
    ) -> Result<(), AppError> {
        self.profiles
            .update_nickname(ctx, user_name, nickname)
            .await
            .map(|_| ())
    }
}
