use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{StoreError, UserRepository};
use crate::database::models::user::{NewUser, User};
use crate::utils::bounded;

const USER_COLUMNS: &str = r#"
    id, name, gender, age, password, nickname,
    creator, create_time, modifier, modify_time, version
"#;

/// 用户存储库的 Postgres 实现
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE name = $1", USER_COLUMNS);

        bounded(
            self.timeout,
            async {
                let user = sqlx::query_as::<_, User>(&query)
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await?;
                Ok::<_, StoreError>(user)
            },
            StoreError::Timeout,
        )
        .await
    }

    async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        let query = format!(
            r#"
            INSERT INTO users (name, gender, age, password, nickname, creator, modifier)
            VALUES ($1, $2, $3, $4, $5, $1, $1)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let result = bounded(
            self.timeout,
            async {
                let created = sqlx::query_as::<_, User>(&query)
                    .bind(&user.name)
                    .bind(user.gender.as_str())
                    .bind(user.age)
                    .bind(&user.password)
                    .bind(&user.nickname)
                    .fetch_one(&self.pool)
                    .await?;
                Ok::<_, StoreError>(created)
            },
            StoreError::Timeout,
        )
        .await;

        match result {
            Ok(created) => {
                tracing::info!("Inserted user {} (id={})", created.name, created.id);
                Ok(created)
            }
            Err(StoreError::Database(sqlx::Error::Database(db)))
                if db.is_unique_violation() =>
            {
                Err(StoreError::UniqueViolation(user.name.clone()))
            }
            Err(e) => {
                tracing::error!("Failed to insert user {}: {:?}", user.name, e);
                Err(e)
            }
        }
    }

    async fn update_nickname(
        &self,
        name: &str,
        nickname: &str,
        modifier: &str,
    ) -> Result<u64, StoreError> {
        bounded(
            self.timeout,
            async {
                let result = sqlx::query(
                    r#"
                    UPDATE users
                    SET nickname = $1, modifier = $2, modify_time = NOW(), version = version + 1
                    WHERE name = $3
                    "#,
                )
                .bind(nickname)
                .bind(modifier)
                .bind(name)
                .execute(&self.pool)
                .await?;
                Ok::<_, StoreError>(result.rows_affected())
            },
            StoreError::Timeout,
        )
        .await
    }
}
