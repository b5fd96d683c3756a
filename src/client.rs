use std::time::Duration;

use anyhow::{Context, Result};
use filestore_core::{ApiResponse, CorrelationToken, Job, JobOutcome, JobRequest};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct SubmissionReceipt {
    job_id: Uuid,
}

/// 面向客户端接口的HTTP客户端：提交作业，并为每次提交拉取一次结果
pub struct FileStoreClient {
    base_url: String,
    result_timeout: Duration,
    http_client: Client,
}

impl FileStoreClient {
    pub fn new(base_url: impl Into<String>, result_timeout: Duration) -> Result<Self> {
        // 结果拉取是长轮询，HTTP超时要留出余量
        let http_client = Client::builder()
            .timeout(result_timeout + Duration::from_secs(10))
            .build()
            .context("创建HTTP客户端失败")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            result_timeout,
            http_client,
        })
    }

    /// 存活探测
    pub async fn hello(&self) -> Result<String> {
        let response = self
            .http_client
            .get(format!("{}/api/hello", self.base_url))
            .send()
            .await
            .context("连接调度器失败")?;

        if !response.status().is_success() {
            return Err(error_from_response("存活探测失败", response).await);
        }
        response.text().await.context("读取响应失败")
    }

    pub async fn submit(&self, job: &Job) -> Result<Uuid> {
        let response = self
            .http_client
            .post(format!("{}/api/jobs", self.base_url))
            .json(job)
            .send()
            .await
            .context("提交作业失败")?;

        if !response.status().is_success() {
            return Err(error_from_response("调度器拒绝了作业", response).await);
        }

        let body: ApiResponse<SubmissionReceipt> =
            response.json().await.context("解析提交回执失败")?;
        let receipt = body
            .into_data()
            .ok_or_else(|| anyhow::anyhow!("提交回执缺少数据"))?;
        debug!(job_id = %receipt.job_id, command = %job.command(), "作业已提交");
        Ok(receipt.job_id)
    }

    /// 阻塞拉取下一个结果，超时返回None
    pub async fn next_result(&self) -> Result<Option<Job>> {
        let response = self
            .http_client
            .get(format!("{}/api/results/next", self.base_url))
            .query(&[("timeout_ms", self.result_timeout.as_millis() as u64)])
            .send()
            .await
            .context("拉取结果失败")?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let body: ApiResponse<Job> = response.json().await.context("解析结果失败")?;
                Ok(body.into_data())
            }
            _ => Err(error_from_response("拉取结果失败", response).await),
        }
    }

    /// 提交一个作业并拉取它的结果
    pub async fn execute(&self, job: Job) -> Result<Job> {
        let job_id = self.submit(&job).await?;
        let result = self
            .next_result()
            .await?
            .ok_or_else(|| anyhow::anyhow!("等待作业 {job_id} 的结果超时"))?;

        if result.id != job_id {
            return Err(anyhow::anyhow!(
                "收到的结果 {} 不属于本次提交 {}，可能有其他客户端同时在使用调度器",
                result.id,
                job_id
            ));
        }
        Ok(result)
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let result = self.execute(Job::new(JobRequest::List)).await?;
        match outcome_of(result)? {
            JobOutcome::Listing { files_list } => Ok(files_list),
            other => Err(unexpected_outcome(&other)),
        }
    }

    /// 两阶段上传：负载均衡模式下由第一阶段返回的令牌绑定Worker
    pub async fn upload(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        high_reliability: bool,
    ) -> Result<JobOutcome> {
        let init = Job::new(JobRequest::UploadInit {
            file_name: file_name.to_string(),
            file_size: contents.len() as u64,
            high_reliability,
        });
        let init_result = self.execute(init).await?;
        let token = init_result.token;
        match outcome_of(init_result)? {
            JobOutcome::Ready => {}
            other => return Err(unexpected_outcome(&other)),
        }

        let mut data = Job::new(JobRequest::UploadData {
            file_name: file_name.to_string(),
            file_contents: contents,
            high_reliability,
        });
        if !high_reliability {
            let token: CorrelationToken =
                token.ok_or_else(|| anyhow::anyhow!("调度器没有返回上传令牌"))?;
            data = data.with_token(token);
        }

        outcome_of(self.execute(data).await?)
    }

    /// 返回None表示文件不存在
    pub async fn download(&self, file_name: &str) -> Result<Option<Vec<u8>>> {
        let job = Job::new(JobRequest::Download {
            file_name: file_name.to_string(),
        });
        match outcome_of(self.execute(job).await?)? {
            JobOutcome::File { file_contents, .. } => Ok(file_contents),
            other => Err(unexpected_outcome(&other)),
        }
    }

    /// 删除第一阶段：文件是否存在于任一Worker
    pub async fn file_exists(&self, file_name: &str) -> Result<bool> {
        let job = Job::new(JobRequest::DeleteInit {
            file_name: file_name.to_string(),
        });
        match outcome_of(self.execute(job).await?)? {
            JobOutcome::FileStatus { file_exists, .. } => Ok(file_exists),
            other => Err(unexpected_outcome(&other)),
        }
    }

    /// 删除第二阶段，`confirmed` 为false时各Worker都不会删除
    pub async fn confirm_delete(&self, file_name: &str, confirmed: bool) -> Result<JobOutcome> {
        let job = Job::new(JobRequest::DeleteConfirm {
            file_name: file_name.to_string(),
            confirmed,
        });
        outcome_of(self.execute(job).await?)
    }
}

/// 取出结果，Failure转换为错误
fn outcome_of(job: Job) -> Result<JobOutcome> {
    match job.result {
        Some(JobOutcome::Failure { ref reason }) => Err(anyhow::anyhow!("{} 失败: {}", job.command(), reason)),
        Some(outcome) => Ok(outcome),
        None => Err(anyhow::anyhow!("作业 {} 没有结果", job.id)),
    }
}

fn unexpected_outcome(outcome: &JobOutcome) -> anyhow::Error {
    anyhow::anyhow!("意外的作业结果: {outcome:?}")
}

async fn error_from_response(context: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = body["error"]["message"]
        .as_str()
        .unwrap_or("未知错误")
        .to_string();
    anyhow::anyhow!("{context} ({status}): {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use filestore_api::create_app;
    use filestore_core::DispatcherConfig;
    use filestore_dispatcher::DispatcherService;
    use tokio::net::TcpListener;

    async fn spawn_dispatcher() -> String {
        let config = DispatcherConfig {
            await_timeout_ms: 200,
            ..DispatcherConfig::default()
        };
        let app = create_app(Arc::new(DispatcherService::new(config)), None);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn test_hello() {
        let url = spawn_dispatcher().await;
        let client = FileStoreClient::new(format!("{url}/"), Duration::from_secs(2)).unwrap();
        assert_eq!(client.hello().await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_list_without_workers_fails() {
        let url = spawn_dispatcher().await;
        let client = FileStoreClient::new(url, Duration::from_secs(2)).unwrap();

        let error = client.list().await.unwrap_err();
        assert!(error.to_string().contains("list"));
    }

    #[tokio::test]
    async fn test_upload_data_without_token_is_rejected() {
        let url = spawn_dispatcher().await;
        let client = FileStoreClient::new(url, Duration::from_secs(2)).unwrap();

        let job = Job::new(JobRequest::UploadData {
            file_name: "a.txt".to_string(),
            file_contents: b"abc".to_vec(),
            high_reliability: false,
        });
        let error = client.submit(&job).await.unwrap_err();
        assert!(error.to_string().contains("400"));
    }

    #[test]
    fn test_outcome_of_maps_failure() {
        let mut job = Job::new(JobRequest::List);
        job.result = Some(JobOutcome::failure("没有可用的Worker"));
        assert!(outcome_of(job).is_err());

        let mut job = Job::new(JobRequest::List);
        job.result = Some(JobOutcome::Listing {
            files_list: vec!["a".to_string()],
        });
        assert!(matches!(outcome_of(job), Ok(JobOutcome::Listing { .. })));
    }
}
