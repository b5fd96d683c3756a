//! # Filestore API
//!
//! 调度器的HTTP接口，Worker与客户端都通过这里访问调度器。
//!
//! ## API 端点
//!
//! ### Worker侧
//! - `POST /api/workers/register` - 注册Worker
//! - `GET /api/workers/{id}/queue?timeout_ms=` - 队列快照（不消费）
//! - `POST /api/workers/{id}/jobs/next` - 取出下一个作业（无作业时204）
//! - `POST /api/results` - 推送作业结果
//! - `GET /api/workers` - 已注册Worker列表
//!
//! ### 客户端
//! - `POST /api/jobs` - 提交作业（202）
//! - `GET /api/results/next?timeout_ms=` - 按提交顺序拉取结果（超时204）
//! - `GET /api/hello` - 存活探测
//!
//! ### 运维
//! - `GET /health` - 健康检查
//! - `GET /metrics` - Prometheus指标

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;

use filestore_dispatcher::DispatcherService;
use middleware::{request_logging, trace_layer};
use routes::{create_routes, AppState};

pub use error::{ApiError, ApiResult};

/// 创建完整的API应用
pub fn create_app(dispatcher: Arc<DispatcherService>, metrics: Option<PrometheusHandle>) -> Router {
    let state = AppState {
        dispatcher,
        metrics,
    };

    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
