use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::{error::ApiError, routes::AppState};

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let stats = state.dispatcher.stats().await;
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "filestore-dispatcher",
        "version": env!("CARGO_PKG_VERSION"),
        "dispatcher": stats,
    }))
}

/// 存活探测，固定返回 "Hello"
pub async fn hello(State(state): State<AppState>) -> &'static str {
    state.dispatcher.hello()
}

/// Prometheus文本格式的指标
pub async fn metrics_snapshot(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => ApiError::NotFound.into_response(),
    }
}
