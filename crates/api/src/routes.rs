use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;

use filestore_dispatcher::DispatcherService;

use crate::handlers::{
    health::{health_check, hello, metrics_snapshot},
    jobs::{next_result, push_result, submit_job},
    workers::{list_workers, pull_job, queue_snapshot, register_worker},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<DispatcherService>,
    /// 未启用指标时为None，`/metrics` 返回404
    pub metrics: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    let body_limit = state.dispatcher.config().max_request_bytes();

    Router::new()
        // 健康检查与存活探测
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_snapshot))
        .route("/api/hello", get(hello))
        // Worker侧API
        .route("/api/workers", get(list_workers))
        .route("/api/workers/register", post(register_worker))
        .route("/api/workers/{id}/queue", get(queue_snapshot))
        .route("/api/workers/{id}/jobs/next", post(pull_job))
        .route("/api/results", post(push_result))
        // 客户端API
        .route("/api/jobs", post(submit_job))
        .route("/api/results/next", get(next_result))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
