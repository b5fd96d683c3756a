use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use filestore_core::{
    DispatcherConfig, FileStoreError, FileStoreResult, Job, WorkerInfo,
};

use crate::collector::ResultCollector;
use crate::outcome_queue::OutcomeQueue;
use crate::registry::WorkerRegistry;
use crate::router::JobRouter;
use crate::strategies::{FewestFilesStrategy, WorkerSelectionStrategy};
use crate::tokens::CorrelationTokenManager;

/// 存活探测的固定应答
pub const HELLO: &str = "Hello";

/// 调度器运行状态
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStats {
    pub registered_workers: usize,
    pub live_tokens: usize,
    pub in_flight_jobs: u64,
    pub ready_outcomes: usize,
}

/// 调度器服务：对外暴露的RPC操作集合
pub struct DispatcherService {
    registry: Arc<WorkerRegistry>,
    tokens: Arc<CorrelationTokenManager>,
    collector: Arc<ResultCollector>,
    outcomes: Arc<OutcomeQueue>,
    router: Arc<JobRouter>,
    config: DispatcherConfig,
}

impl DispatcherService {
    pub fn new(config: DispatcherConfig) -> Self {
        Self::with_strategy(config, Arc::new(FewestFilesStrategy::new()))
    }

    pub fn with_strategy(
        config: DispatcherConfig,
        strategy: Arc<dyn WorkerSelectionStrategy>,
    ) -> Self {
        let registry = Arc::new(WorkerRegistry::new());
        let tokens = Arc::new(CorrelationTokenManager::new());
        let collector = Arc::new(ResultCollector::new());
        let outcomes = Arc::new(OutcomeQueue::new());

        info!("初始化调度器，Worker选择策略: {}", strategy.name());
        let router = Arc::new(JobRouter::new(
            registry.clone(),
            tokens.clone(),
            collector.clone(),
            outcomes.clone(),
            strategy,
            config.clone(),
        ));

        Self {
            registry,
            tokens,
            collector,
            outcomes,
            router,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn hello(&self) -> &'static str {
        HELLO
    }

    pub async fn register_worker(&self, worker_id: &str) -> FileStoreResult<()> {
        if worker_id.trim().is_empty() {
            return Err(FileStoreError::InvalidJob("Worker id不能为空".to_string()));
        }
        self.registry.register(worker_id).await;
        Ok(())
    }

    /// 返回Worker队列快照，等待时间被限制在配置的上限内
    pub async fn queue_snapshot(
        &self,
        worker_id: &str,
        wait: Option<Duration>,
    ) -> FileStoreResult<Vec<Job>> {
        let limit = Duration::from_millis(self.config.max_snapshot_wait_ms);
        let wait = wait.map_or(limit, |wait| wait.min(limit));
        self.registry.snapshot(worker_id, wait).await
    }

    pub async fn pull_job(&self, worker_id: &str) -> FileStoreResult<Option<Job>> {
        self.registry.pull_next(worker_id).await
    }

    /// Worker推送内部结果；返回false表示结果迟到已被丢弃
    pub async fn push_internal_result(&self, job: Job) -> FileStoreResult<bool> {
        self.collector.push(job).await
    }

    /// 接受客户端提交并异步路由，返回提交id
    pub async fn submit_job(&self, job: Job) -> FileStoreResult<Uuid> {
        let submission = self.router.accept(job).await?;
        let job_id = submission.job.id;

        let router = self.router.clone();
        tokio::spawn(async move {
            router.route(submission).await;
        });

        debug!("作业 {} 已进入路由", job_id);
        Ok(job_id)
    }

    /// 按接受顺序取出下一个客户端可见结果
    pub async fn get_external_result(&self, wait: Option<Duration>) -> Option<Job> {
        let limit = Duration::from_millis(self.config.max_result_poll_ms);
        let wait = wait.map_or(limit, |wait| wait.min(limit));
        self.outcomes.next(wait).await
    }

    pub async fn workers(&self) -> Vec<WorkerInfo> {
        self.registry.workers().await
    }

    pub async fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            registered_workers: self.registry.len().await,
            live_tokens: self.tokens.len().await,
            in_flight_jobs: self.outcomes.in_flight().await,
            ready_outcomes: self.outcomes.ready_len().await,
        }
    }
}
