use chrono::Utc;

use crate::cache::{CacheError, SessionCacheOperations};
use crate::database::User;
use crate::error::AppError;
use crate::utils::generate_session_token;

use super::identity::{IdentityResolver, Source};
use super::RequestContext;

/// 会话管理：登录签发会话、校验会话、登出删除会话
///
/// 会话缓存里有快照就算已登录，不再回查数据库。
#[derive(Clone)]
pub struct SessionManager {
    resolver: IdentityResolver,
    sessions: SessionCacheOperations,
}

impl SessionManager {
    pub fn new(resolver: IdentityResolver, sessions: SessionCacheOperations) -> Self {
        Self { resolver, sessions }
    }

    /// 用户登录，成功时返回新的会话标识
    pub async fn login(
        &self,
        ctx: &RequestContext,
        user_name: &str,
        password: &str,
    ) -> Result<String, AppError> {
        tracing::debug!(request_id = %ctx.request_id, "login access from {}", user_name);
        if user_name.is_empty() || password.is_empty() {
            return Err(AppError::validation("用户名和密码不能为空"));
        }

        let resolved = match self.resolver.lookup(ctx, user_name).await {
            Ok(resolved) => resolved,
            Err(AppError::NotFound(_)) => {
                tracing::info!(request_id = %ctx.request_id, "login for unknown user {}", user_name);
                return Err(AppError::auth("用户名或密码错误"));
            }
            Err(e) => return Err(e),
        };

        // 明文比对
        if resolved.user.password != password {
            tracing::info!(request_id = %ctx.request_id, "wrong password for {}", user_name);
            return Err(AppError::auth("用户名或密码错误"));
        }

        // 密码正确后才回填，失败的登录不留下缓存
        if resolved.source == Source::Store {
            self.resolver.remember(ctx, &resolved.user).await;
        }

        let session = generate_session_token(&resolved.user.name, Utc::now());
        if let Err(e) = self.sessions.cache_session(&session, &resolved.user).await {
            tracing::error!(
                request_id = %ctx.request_id,
                "store session for {} failed: {}",
                user_name,
                e
            );
            return Err(AppError::Cache(e));
        }

        tracing::info!(request_id = %ctx.request_id, "login succeeded for {}", user_name);
        Ok(session)
    }

    /// 校验会话，返回会话中的用户快照
    pub async fn authenticate(&self, ctx: &RequestContext) -> Result<User, AppError> {
        if ctx.session.is_empty() {
            return Err(AppError::auth("未登录"));
        }

        match self.sessions.get_session(&ctx.session).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                tracing::info!(request_id = %ctx.request_id, "session missing or expired");
                Err(AppError::auth("会话不存在或已过期"))
            }
            Err(CacheError::Serialization(e)) => {
                // 快照不可信，直接作废
                tracing::warn!(request_id = %ctx.request_id, "corrupt session snapshot: {}", e);
                self.invalidate(ctx).await;
                Err(AppError::auth("会话不存在或已过期"))
            }
            Err(e) => Err(AppError::Cache(e)),
        }
    }

    /// 登出，先确认会话存在再删除，重复登出会失败
    pub async fn logout(&self, ctx: &RequestContext) -> Result<(), AppError> {
        let user = self.authenticate(ctx).await?;

        self.sessions.remove_session(&ctx.session).await.map_err(|e| {
            tracing::error!(request_id = %ctx.request_id, "delete session failed: {}", e);
            AppError::Cache(e)
        })?;

        tracing::info!(request_id = %ctx.request_id, "{} logged out", user.name);
        Ok(())
    }

    /// 尽力删除会话，失败只记日志
    pub(crate) async fn invalidate(&self, ctx: &RequestContext) {
        if let Err(e) = self.sessions.remove_session(&ctx.session).await {
            tracing::error!(request_id = %ctx.request_id, "invalidate session failed: {}", e);
        }
    }
}
