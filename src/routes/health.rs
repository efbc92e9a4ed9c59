use axum::{extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AppState, utils::success_to_api_response};

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub app_name: String,
    pub version: String,
    pub server_time: DateTime<Utc>,
}

/// 健康检查
pub async fn ping(State(state): State<AppState>) -> impl IntoResponse {
    success_to_api_response(PingResponse {
        app_name: state.config.app_name.clone(),
        version: state.config.app_version.clone(),
        server_time: Utc::now(),
    })
}
