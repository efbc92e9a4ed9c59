use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::services::ServeDir;

use config::Config;
use middleware::{log_errors, session_guard};
use services::UserService;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: UserService,
}

/// 组装全部路由和中间件
pub fn build_router(state: AppState) -> Router {
    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        .route("/users/register", post(routes::user::register))
        .route("/users/login", post(routes::user::login));

    let protected_routes = Router::new()
        .route("/users/logout", post(routes::user::logout))
        .route("/users/profile", get(routes::user::get_profile))
        .route("/users/update-nickname", put(routes::user::update_nickname))
        .layer(axum::middleware::from_fn(session_guard));

    let api = public_routes.merge(protected_routes);
    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(base, api)
    };

    let mut router = router.route("/ping", get(routes::health::ping));

    if let Some(dir) = &state.config.static_dir {
        tracing::info!("Serving static files from {}", dir);
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = router.layer(tower_http::cors::CorsLayer::permissive());

    router.with_state(state)
}
