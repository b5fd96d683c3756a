use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use filestore_core::{ApiResponse, Job};

use super::WaitParams;
use crate::{error::ApiResult, routes::AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub job_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultAck {
    /// false表示结果迟到或无人等待，已被丢弃
    pub accepted: bool,
}

/// 客户端提交作业
pub async fn submit_job(
    State(state): State<AppState>,
    Json(job): Json<Job>,
) -> ApiResult<(StatusCode, Json<ApiResponse<SubmissionReceipt>>)> {
    let command = job.command();
    let job_id = state.dispatcher.submit_job(job).await?;
    info!(%job_id, %command, "作业已接受");

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(SubmissionReceipt { job_id })),
    ))
}

/// Worker推送作业结果
pub async fn push_result(
    State(state): State<AppState>,
    Json(job): Json<Job>,
) -> ApiResult<Json<ApiResponse<ResultAck>>> {
    let job_id = job.id;
    let accepted = state.dispatcher.push_internal_result(job).await?;
    debug!(%job_id, accepted, "收到Worker结果");

    Ok(Json(ApiResponse::success(ResultAck { accepted })))
}

/// 客户端阻塞拉取下一个结果，超时返回204
pub async fn next_result(
    State(state): State<AppState>,
    Query(params): Query<WaitParams>,
) -> Response {
    match state.dispatcher.get_external_result(params.wait()).await {
        Some(job) => Json(ApiResponse::success(job)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
