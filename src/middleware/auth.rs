use axum::{extract::Request, middleware::Next, response::Response};
use axum_extra::extract::cookie::CookieJar;

use crate::{error::AppError, services::RequestContext};

/// 保存会话标识的 cookie 名
pub const SESSION_COOKIE: &str = "user_session";

/// 受保护路由的守卫，只确认 cookie 存在且非空
///
/// 会话是否有效由用户服务判断，这里只负责为请求创建上下文。
pub async fn session_guard(
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .unwrap_or_default();

    if session.is_empty() {
        tracing::info!("request to {} without session cookie", request.uri().path());
        return Err(AppError::auth("未登录"));
    }

    request.extensions_mut().insert(RequestContext::new(session));
    Ok(next.run(request).await)
}
