use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use user_directory::{
    AppState, build_router,
    cache::{MemoryCacheStore, keys::user_info_key},
    config::Config,
    database::MemoryUserRepository,
    services::{ServiceSettings, UserService},
};

struct TestApp {
    router: Router,
    repo: Arc<MemoryUserRepository>,
    cache: Arc<MemoryCacheStore>,
}

fn test_app() -> TestApp {
    let config = Config::from_source(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/users".into()),
        "REDIS_URL" => Some("redis://localhost".into()),
        _ => None,
    })
    .unwrap();

    let repo = Arc::new(MemoryUserRepository::new());
    let cache = Arc::new(MemoryCacheStore::new());
    let users = UserService::new(repo.clone(), cache.clone(), ServiceSettings::from(&config));

    TestApp {
        router: build_router(AppState { config, users }),
        repo,
        cache,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        session: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(session) = session {
            builder = builder.header(header::COOKIE, format!("user_session={}", session));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn register_alice(&self) {
        let response = self
            .send(
                Method::POST,
                "/api/users/register",
                None,
                Some(json!({
                    "user_name": "alice",
                    "password": "secret",
                    "age": 30,
                    "gender": "female",
                    "nick_name": "Ali",
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    async fn profile(&self, session: &str) -> (StatusCode, Value) {
        let response = self
            .send(
                Method::GET,
                "/api/users/profile?username=alice",
                Some(session),
                None,
            )
            .await;
        let status = response.status();
        (status, json_body(response).await)
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn session_from(response: &Response) -> Option<String> {
    let cookie = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let pair = cookie.split(';').next()?;
    pair.strip_prefix("user_session=").map(str::to_string)
}

#[tokio::test]
async fn register_login_update_logout_flow() {
    let app = test_app();
    app.register_alice().await;

    let response = app
        .send(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "user_name": "alice", "password": "secret" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let session = session_from(&response).expect("login sets the session cookie");
    assert!(!session.is_empty());

    let (status, body) = app.profile(&session).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["resp_data"]["nick_name"], "Ali");
    assert!(body["resp_data"].get("password").is_none());

    let response = app
        .send(
            Method::PUT,
            "/api/users/update-nickname",
            Some(&session),
            Some(json!({ "user_name": "alice", "new_nick_name": "A." })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = app.profile(&session).await;
    assert_eq!(body["resp_data"]["nick_name"], "A.");
    assert_eq!(app.repo.peek("alice").unwrap().nickname, "A.");

    let response = app
        .send(Method::POST, "/api/users/logout", Some(&session), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cleared.starts_with("user_session="));

    let (status, body) = app.profile(&session).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1002);
}

#[tokio::test]
async fn wrong_password_creates_no_cache_entries() {
    let app = test_app();
    app.register_alice().await;

    let response = app
        .send(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "user_name": "alice", "password": "wrong" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(json_body(response).await["code"], 1002);

    assert!(!app.cache.contains(&user_info_key("alice")));
    assert!(app.cache.keys_with_prefix("session_").is_empty());
}

#[tokio::test]
async fn invalid_registration_is_rejected_before_store_access() {
    let app = test_app();

    for (age, gender) in [(0, "female"), (30, "other")] {
        let response = app
            .send(
                Method::POST,
                "/api/users/register",
                None,
                Some(json!({
                    "user_name": "alice",
                    "password": "secret",
                    "age": age,
                    "gender": gender,
                    "nick_name": "Ali",
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], 1000);
    }
    assert_eq!(app.repo.calls(), 0);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = test_app();
    app.register_alice().await;

    let response = app
        .send(
            Method::POST,
            "/api/users/register",
            None,
            Some(json!({
                "user_name": "alice",
                "password": "other",
                "age": 22,
                "gender": "male",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["code"], 1001);
}

#[tokio::test]
async fn protected_routes_require_session_cookie() {
    let app = test_app();

    let response = app
        .send(Method::GET, "/api/users/profile?username=alice", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], 1002);

    let response = app
        .send(Method::POST, "/api/users/logout", Some(""), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_uses_error_envelope() {
    let app = test_app();
    let response = app
        .send(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "user_name": "alice" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], 1000);
}

#[tokio::test]
async fn cache_outage_on_login_is_service_unavailable() {
    let app = test_app();
    app.register_alice().await;
    app.cache.set_unavailable(true);

    let response = app
        .send(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "user_name": "alice", "password": "secret" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["code"], 5001);
}

#[tokio::test]
async fn ping_reports_app_info() {
    let app = test_app();
    let response = app.send(Method::GET, "/ping", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["resp_data"]["app_name"], "user-directory");
    assert!(body["resp_data"]["server_time"].is_string());
}
