use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use filestore_core::{ApiResponse, Job, WorkerInfo, WorkerRegistration};

use super::WaitParams;
use crate::{error::ApiResult, routes::AppState};

/// 注册Worker
pub async fn register_worker(
    State(state): State<AppState>,
    Json(registration): Json<WorkerRegistration>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state
        .dispatcher
        .register_worker(&registration.worker_id)
        .await?;
    info!(worker_id = %registration.worker_id, "Worker注册请求处理完成");

    Ok(Json(ApiResponse::success_empty()))
}

/// 获取Worker队列快照（不消费作业）
pub async fn queue_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<WaitParams>,
) -> ApiResult<Json<ApiResponse<Vec<Job>>>> {
    let jobs = state.dispatcher.queue_snapshot(&id, params.wait()).await?;
    Ok(Json(ApiResponse::success(jobs)))
}

/// 取出Worker的下一个作业，没有作业时返回204
pub async fn pull_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    match state.dispatcher.pull_job(&id).await? {
        Some(job) => Ok(Json(ApiResponse::success(job)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// 获取已注册Worker列表
pub async fn list_workers(State(state): State<AppState>) -> Json<ApiResponse<Vec<WorkerInfo>>> {
    Json(ApiResponse::success(state.dispatcher.workers().await))
}
