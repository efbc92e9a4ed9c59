use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cache::CacheError;
use crate::database::StoreError;
use crate::utils::{error_codes, error_to_api_response};

/// 对外暴露的错误类型，每个公开操作要么成功，要么返回其中一种
#[derive(Debug, Error)]
pub enum AppError {
    /// 参数缺失或非法
    #[error("{0}")]
    Validation(String),
    /// 用户名密码错误，或会话缺失、过期
    #[error("{0}")]
    Auth(String),
    /// 重复注册
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        AppError::Auth(msg.into())
    }

    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
            AppError::Auth(_) => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED),
            AppError::Duplicate(_) => (StatusCode::CONFLICT, error_codes::USER_EXISTS),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR),
            AppError::Cache(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_codes::CACHE_UNAVAILABLE,
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 基础设施错误的细节只进日志，不返回给客户端
        let error_message = match &self {
            AppError::Store(e) => {
                tracing::error!("store error: {}", e);
                "数据库错误".to_string()
            }
            AppError::Cache(e) => {
                tracing::error!("cache error: {}", e);
                "缓存服务不可用".to_string()
            }
            other => other.to_string(),
        };

        (status, error_to_api_response::<()>(code, error_message)).into_response()
    }
}
