use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tower::ServiceExt;

use filestore_api::create_app;
use filestore_core::{ApiResponse, DispatcherConfig, Job, JobOutcome, JobRequest, WorkerInfo};
use filestore_dispatcher::DispatcherService;

fn test_app() -> Router {
    let config = DispatcherConfig {
        await_timeout_ms: 300,
        max_result_poll_ms: 2_000,
        max_snapshot_wait_ms: 50,
        ..DispatcherConfig::default()
    };
    create_app(Arc::new(DispatcherService::new(config)), None)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_hello_endpoint() {
    let response = test_app().oneshot(get("/api/hello")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Hello");
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = test_app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dispatcher"]["registered_workers"], 0);
}

#[tokio::test]
async fn test_metrics_disabled() {
    let response = test_app().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_and_list_workers() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post_json("/api/workers/register", json!({"worker_id": "w1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/workers")).await.unwrap();
    let body: ApiResponse<Vec<WorkerInfo>> = read_json(response).await;
    let workers = body.data.unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].id, "w1");
}

#[tokio::test]
async fn test_pull_job_status_codes() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post_json("/api/workers/ghost/jobs/next", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.clone()
        .oneshot(post_json("/api/workers/register", json!({"worker_id": "w1"})))
        .await
        .unwrap();
    let response = app
        .oneshot(post_json("/api/workers/w1/jobs/next", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_queue_snapshot_unknown_worker() {
    let response = test_app()
        .oneshot(get("/api/workers/ghost/queue?timeout_ms=10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_rejects_upload_data_without_token() {
    let job = Job::new(JobRequest::UploadData {
        file_name: "a.txt".to_string(),
        file_contents: b"abc".to_vec(),
        high_reliability: false,
    });

    let response = test_app()
        .oneshot(post_json("/api/jobs", serde_json::to_value(&job).unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_next_result_times_out_with_no_content() {
    let response = test_app()
        .oneshot(get("/api/results/next?timeout_ms=10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_submit_without_workers_delivers_failure() {
    let app = test_app();
    let job = Job::new(JobRequest::List);

    let response = app
        .clone()
        .oneshot(post_json("/api/jobs", serde_json::to_value(&job).unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .oneshot(get("/api/results/next?timeout_ms=1000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<Job> = read_json(response).await;
    let outcome = body.data.unwrap();
    assert_eq!(outcome.id, job.id);
    assert!(matches!(outcome.result, Some(JobOutcome::Failure { .. })));
}

#[tokio::test]
async fn test_list_round_trip_through_worker_endpoints() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/api/workers/register", json!({"worker_id": "w1"})))
        .await
        .unwrap();

    let job = Job::new(JobRequest::List);
    app.clone()
        .oneshot(post_json("/api/jobs", serde_json::to_value(&job).unwrap()))
        .await
        .unwrap();

    // 路由在后台任务中进行，等待作业出现在队列中
    let response = app
        .clone()
        .oneshot(get("/api/workers/w1/queue?timeout_ms=1000"))
        .await
        .unwrap();
    let snapshot: ApiResponse<Vec<Job>> = read_json(response).await;
    assert_eq!(snapshot.data.unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(post_json("/api/workers/w1/jobs/next", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let pulled: ApiResponse<Job> = read_json(response).await;
    let mut pulled = pulled.data.unwrap();
    assert_eq!(pulled.id, job.id);

    pulled
        .stamp(
            JobOutcome::Listing {
                files_list: vec!["notes.txt".to_string()],
            },
            "w1",
        )
        .unwrap();
    let response = app
        .clone()
        .oneshot(post_json("/api/results", serde_json::to_value(&pulled).unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/api/results/next?timeout_ms=1000"))
        .await
        .unwrap();
    let body: ApiResponse<Job> = read_json(response).await;
    let outcome = body.data.unwrap();
    assert_eq!(
        outcome.result,
        Some(JobOutcome::Listing {
            files_list: vec!["notes.txt".to_string()],
        })
    );
    assert!(outcome.produced_by.is_none());
}
