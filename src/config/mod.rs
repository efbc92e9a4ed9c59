use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub database_url: String,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub db_max_connections: u32,
    /// 按用户名缓存的过期时间（秒）
    pub user_cache_ttl_secs: u64,
    /// 按会话缓存的过期时间（秒）
    pub session_cache_ttl_secs: u64,
    pub session_cookie_max_age_secs: i64,
    pub store_timeout_ms: u64,
    pub cache_timeout_ms: u64,
    /// 会话用户与请求用户名不一致时是否直接拒绝
    pub strict_session_owner: bool,
    pub static_dir: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// 从任意键值来源解析配置，便于测试
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));
        let or_default = |key: &'static str, default: &str| {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        Ok(Config {
            app_name: or_default("APP_NAME", "user-directory"),
            app_version: or_default("APP_VERSION", env!("CARGO_PKG_VERSION")),
            database_url: required("DATABASE_URL")?,
            redis_url: required("REDIS_URL")?,
            server_host: or_default("SERVER_HOST", "0.0.0.0"),
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            api_base_uri: or_default("API_BASE_URI", "/api"),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            user_cache_ttl_secs: parse_or(&lookup, "USER_CACHE_TTL", 3600)?,
            session_cache_ttl_secs: parse_or(&lookup, "SESSION_CACHE_TTL", 3600)?,
            session_cookie_max_age_secs: parse_or(&lookup, "SESSION_COOKIE_MAX_AGE", 3600)?,
            store_timeout_ms: parse_or(&lookup, "STORE_TIMEOUT_MS", 2000)?,
            cache_timeout_ms: parse_or(&lookup, "CACHE_TIMEOUT_MS", 500)?,
            strict_session_owner: parse_or(&lookup, "STRICT_SESSION_OWNER", false)?,
            static_dir: lookup("STATIC_DIR").filter(|dir| !dir.is_empty()),
        })
    }

    pub fn user_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.user_cache_ttl_secs)
    }

    pub fn session_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.session_cache_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
