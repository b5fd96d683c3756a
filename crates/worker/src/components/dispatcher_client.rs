use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

use filestore_core::{ApiResponse, FileStoreError, FileStoreResult, Job};

/// HTTP client for the worker-facing dispatcher endpoints
pub struct DispatcherClient {
    dispatcher_url: String,
    worker_id: String,
    http_client: reqwest::Client,
}

impl DispatcherClient {
    pub fn new(dispatcher_url: impl Into<String>, worker_id: impl Into<String>) -> Self {
        Self {
            dispatcher_url: dispatcher_url.into().trim_end_matches('/').to_string(),
            worker_id: worker_id.into(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub async fn register(&self) -> FileStoreResult<()> {
        let url = format!("{}/api/workers/register", self.dispatcher_url);
        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "worker_id": self.worker_id }))
            .send()
            .await
            .map_err(|e| network_error("Dispatcher connection error", e))?;

        if response.status().is_success() {
            info!(
                "Successfully registered worker {} with dispatcher",
                self.worker_id
            );
            Ok(())
        } else {
            Err(self.unexpected_status("Worker registration failed", response).await)
        }
    }

    /// Take the next job from this worker's queue, `None` when the queue is empty
    pub async fn pull_job(&self) -> FileStoreResult<Option<Job>> {
        let url = format!(
            "{}/api/workers/{}/jobs/next",
            self.dispatcher_url, self.worker_id
        );
        let response = self
            .http_client
            .post(&url)
            .send()
            .await
            .map_err(|e| network_error("Failed to pull job", e))?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let job: Job = read_data(response).await?;
                debug!("Pulled job {} ({})", job.id, job.command());
                Ok(Some(job))
            }
            StatusCode::NOT_FOUND => Err(FileStoreError::UnknownWorker {
                id: self.worker_id.clone(),
            }),
            _ => Err(self.unexpected_status("Failed to pull job", response).await),
        }
    }

    /// Push a processed job; returns false when the dispatcher discarded it as late
    pub async fn push_result(&self, job: &Job) -> FileStoreResult<bool> {
        let url = format!("{}/api/results", self.dispatcher_url);
        let response = self
            .http_client
            .post(&url)
            .json(job)
            .send()
            .await
            .map_err(|e| network_error("Failed to push result", e))?;

        if !response.status().is_success() {
            return Err(self.unexpected_status("Failed to push result", response).await);
        }

        let ack: serde_json::Value = read_data(response).await?;
        let accepted = ack
            .get("accepted")
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if !accepted {
            warn!("Dispatcher discarded late result for job {}", job.id);
        }
        Ok(accepted)
    }

    /// Wait up to `timeout` for this worker's queue to become non-empty
    pub async fn queue_snapshot(&self, timeout: Duration) -> FileStoreResult<Vec<Job>> {
        let url = format!(
            "{}/api/workers/{}/queue",
            self.dispatcher_url, self.worker_id
        );
        let response = self
            .http_client
            .get(&url)
            .query(&[("timeout_ms", timeout.as_millis() as u64)])
            .send()
            .await
            .map_err(|e| network_error("Failed to fetch queue snapshot", e))?;

        match response.status() {
            status if status.is_success() => read_data(response).await,
            StatusCode::NOT_FOUND => Err(FileStoreError::UnknownWorker {
                id: self.worker_id.clone(),
            }),
            _ => Err(self
                .unexpected_status("Failed to fetch queue snapshot", response)
                .await),
        }
    }

    async fn unexpected_status(&self, context: &str, response: reqwest::Response) -> FileStoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!("{}: HTTP {} - {}", context, status, body);
        FileStoreError::Network(format!("{context}: HTTP {status} - {body}"))
    }
}

fn network_error(context: &str, error: reqwest::Error) -> FileStoreError {
    FileStoreError::Network(format!("{context}: {error}"))
}

async fn read_data<T: DeserializeOwned>(response: reqwest::Response) -> FileStoreResult<T> {
    let envelope: ApiResponse<T> = response
        .json()
        .await
        .map_err(|e| network_error("Invalid dispatcher response", e))?;
    envelope
        .into_data()
        .ok_or_else(|| FileStoreError::Network("Dispatcher response carried no data".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = DispatcherClient::new("http://localhost:8080/", "w1");
        assert_eq!(client.dispatcher_url, "http://localhost:8080");
        assert_eq!(client.worker_id(), "w1");
    }

    #[tokio::test]
    async fn test_unreachable_dispatcher_is_network_error() {
        let client = DispatcherClient::new("http://127.0.0.1:1", "w1");
        assert!(matches!(
            client.register().await,
            Err(FileStoreError::Network(_))
        ));
        assert!(matches!(
            client.pull_job().await,
            Err(FileStoreError::Network(_))
        ));
    }
}
