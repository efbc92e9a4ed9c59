use axum::{
    extract::{Extension, Json, Query, State, rejection::JsonRejection},
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::{
    AppState,
    error::AppError,
    middleware::SESSION_COOKIE,
    services::RequestContext,
    utils::success_to_api_response,
};

use super::model::{
    EmptyResponse, LoginRequest, LoginResponse, ProfileQuery, RegisterRequest, RegisterResponse,
    UpdateNicknameRequest,
};

/// 请求体无法解析时按参数错误返回统一的响应结构
fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::validation(format!("请求参数不合法: {}", e.body_text())))
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_body(payload)?;
    let user_name = req.user_name.clone();

    state
        .users
        .register(&RequestContext::anonymous(), req.into())
        .await?;

    Ok(success_to_api_response(RegisterResponse { user_name }))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_body(payload)?;

    let session = state
        .users
        .login(&RequestContext::anonymous(), &req.user_name, &req.password)
        .await?;

    // 会话标识只通过 cookie 下发
    let cookie = Cookie::build((SESSION_COOKIE, session))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::seconds(
            state.config.session_cookie_max_age_secs,
        ));

    Ok((
        jar.add(cookie),
        success_to_api_response(LoginResponse {
            user_name: req.user_name,
        }),
    ))
}

#[axum::debug_handler]
pub async fn logout(
    Extension(ctx): Extension<RequestContext>,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    state.users.logout(&ctx).await?;

    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        success_to_api_response(EmptyResponse {}),
    ))
}

#[axum::debug_handler]
pub async fn get_profile(
    Extension(ctx): Extension<RequestContext>,
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.users.get_profile(&ctx, &query.username).await?;
    Ok(success_to_api_response(view))
}

#[axum::debug_handler]
pub async fn update_nickname(
    Extension(ctx): Extension<RequestContext>,
    State(state): State<AppState>,
    payload: Result<Json<UpdateNicknameRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = parse_body(payload)?;

    state
        .users
        .update_nickname(&ctx, &req.user_name, &req.new_nick_name)
        .await?;

    Ok(success_to_api_response(EmptyResponse {}))
}
