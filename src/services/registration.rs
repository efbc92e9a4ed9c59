use std::sync::Arc;

use crate::database::{Gender, NewUser, StoreError, User, UserRepository};
use crate::error::AppError;

use super::RequestContext;

/// 注册参数
#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub user_name: String,
    pub password: String,
    pub age: i32,
    pub gender: String,
    pub nick_name: String,
}

impl RegisterCommand {
    /// 用户名、密码不能为空，年龄必须大于 0，性别只支持男和女
    fn validate(self) -> Result<NewUser, AppError> {
        if self.user_name.is_empty() || self.password.is_empty() || self.age <= 0 {
            return Err(AppError::validation("注册参数不合法"));
        }
        let gender: Gender = self
            .gender
            .parse()
            .map_err(|_| AppError::validation("注册参数不合法"))?;

        Ok(NewUser {
            name: self.user_name,
            gender,
            age: self.age,
            password: self.password,
            nickname: self.nick_name,
        })
    }
}

/// 用户注册，不涉及缓存
#[derive(Clone)]
pub struct Registrar {
    users: Arc<dyn UserRepository>,
}

impl Registrar {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub async fn register(&self, ctx: &RequestContext, cmd: RegisterCommand) -> Result<User, AppError> {
        let new_user = cmd.validate().inspect_err(|_| {
            tracing::warn!(request_id = %ctx.request_id, "register param invalid");
        })?;

        if self.users.find_by_name(&new_user.name).await?.is_some() {
            tracing::info!(
                request_id = %ctx.request_id,
                "user {} already registered",
                new_user.name
            );
            return Err(duplicate(&new_user.name));
        }

        match self.users.insert(&new_user).await {
            Ok(user) => {
                tracing::info!(request_id = %ctx.request_id, "registered user {}", user.name);
                Ok(user)
            }
            // 查询和插入之间被别人抢先注册
            Err(StoreError::UniqueViolation(name)) => Err(duplicate(&name)),
            Err(e) => Err(AppError::Store(e)),
        }
    }
}

fn duplicate(name: &str) -> AppError {
    AppError::Duplicate(format!("用户 {} 已经注册，不能重复注册", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    #[tokio::test]
    async fn register_then_resolve_returns_matching_record() {
        let f = fixture();
        let ctx = RequestContext::anonymous();
        f.service
            .register(&ctx, command("alice", "secret", 30, "female"))
            .await
            .unwrap();

        let user = f.service.resolve(&ctx, "alice").await.unwrap();
        assert_eq!(user.name, "alice");
        assert_eq!(user.password, "secret");
        assert_eq!(user.age, 30);
        assert_eq!(user.gender, Gender::Female);
        assert_eq!(user.nickname, "alice-nick");
        assert_eq!(user.creator, "alice");
        assert_eq!(user.modifier, "alice");
    }

    #[tokio::test]
    async fn second_registration_is_duplicate() {
        let f = fixture();
        let ctx = RequestContext::anonymous();
        f.service
            .register(&ctx, command("alice", "secret", 30, "female"))
            .await
            .unwrap();

        let err = f
            .service
            .register(&ctx, command("alice", "other", 41, "male"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
    }

    #[tokio::test]
    async fn invalid_input_fails_before_store_access() {
        let f = fixture();
        let ctx = RequestContext::anonymous();
        let cases = [
            command("alice", "secret", 0, "female"),
            command("alice", "secret", -3, "female"),
            command("alice", "secret", 30, "other"),
            command("alice", "", 30, "female"),
            command("", "secret", 30, "female"),
        ];

        for cmd in cases {
            let err = f.service.register(&ctx, cmd).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert_eq!(f.repo.calls(), 0);
    }

    #[tokio::test]
    async fn registration_does_not_touch_cache() {
        let f = fixture();
        f.register("alice", "secret").await;
        assert!(!f.cache.contains(&crate::cache::keys::user_info_key("alice")));
    }

    #[tokio::test]
    async fn store_outage_is_store_error() {
        let f = fixture();
        f.repo.set_unavailable(true);
        let err = f
            .service
            .register(&RequestContext::anonymous(), command("alice", "secret", 30, "male"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }
}
