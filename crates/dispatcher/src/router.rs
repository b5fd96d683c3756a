use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use filestore_core::{
    DispatcherConfig, FileStoreError, FileStoreResult, Job, JobOutcome, JobRequest, WorkerId,
};

use crate::collector::{ResultCollector, ResultSet};
use crate::outcome_queue::{OutcomeQueue, OutcomeTicket};
use crate::registry::WorkerRegistry;
use crate::strategies::{WorkerLoad, WorkerSelectionStrategy};
use crate::tokens::CorrelationTokenManager;

/// 已被接受、等待路由的提交
#[derive(Debug)]
pub struct Submission {
    pub job: Job,
    /// 负载均衡上传第二阶段由令牌兑换得到的Worker
    pub bound_worker: Option<WorkerId>,
    ticket: OutcomeTicket,
}

/// 作业路由器：按命令执行分发与聚合的状态机
pub struct JobRouter {
    registry: Arc<WorkerRegistry>,
    tokens: Arc<CorrelationTokenManager>,
    collector: Arc<ResultCollector>,
    outcomes: Arc<OutcomeQueue>,
    strategy: Arc<dyn WorkerSelectionStrategy>,
    config: DispatcherConfig,
    /// 已接受但尚未交付结果的提交id，结果按id匹配，同一id不能并行
    in_flight: Mutex<HashSet<Uuid>>,
}

impl JobRouter {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        tokens: Arc<CorrelationTokenManager>,
        collector: Arc<ResultCollector>,
        outcomes: Arc<OutcomeQueue>,
        strategy: Arc<dyn WorkerSelectionStrategy>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            tokens,
            collector,
            outcomes,
            strategy,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// 同步接受提交：校验负载、兑换令牌并预留结果位置
    ///
    /// 这里返回的错误属于协议违规，不会产生结果作业。
    pub async fn accept(&self, job: Job) -> FileStoreResult<Submission> {
        job.request.validate()?;
        if job.is_processed() {
            return Err(FileStoreError::InvalidJob(format!(
                "提交的作业 {} 不能携带结果",
                job.id
            )));
        }

        if !self.in_flight.lock().await.insert(job.id) {
            return Err(FileStoreError::InvalidJob(format!(
                "作业 {} 正在处理中，不能重复提交",
                job.id
            )));
        }

        let bound_worker = match self.bind_upload_worker(&job).await {
            Ok(bound_worker) => bound_worker,
            Err(e) => {
                self.in_flight.lock().await.remove(&job.id);
                return Err(e);
            }
        };

        let ticket = self.outcomes.reserve().await;
        metrics::counter!("filestore_jobs_submitted_total", "command" => job.command().as_str())
            .increment(1);
        debug!(
            "接受作业 {} ({})，结果序号 {}",
            job.id,
            job.command(),
            ticket.sequence()
        );

        Ok(Submission {
            job,
            bound_worker,
            ticket,
        })
    }

    /// 负载均衡上传数据必须携带令牌，兑换得到第一阶段选中的Worker
    async fn bind_upload_worker(&self, job: &Job) -> FileStoreResult<Option<WorkerId>> {
        match &job.request {
            JobRequest::UploadData {
                high_reliability: false,
                ..
            } => {
                let token = job.token.ok_or_else(|| {
                    FileStoreError::InvalidJob("负载均衡上传数据缺少关联令牌".to_string())
                })?;
                Ok(Some(self.tokens.redeem(&token).await?))
            }
            _ => Ok(None),
        }
    }

    /// 执行路由并把结果按接受顺序放入结果队列
    pub async fn route(&self, submission: Submission) {
        let Submission {
            job,
            bound_worker,
            ticket,
        } = submission;

        let resolved = self.resolve(&job, bound_worker).await;
        self.in_flight.lock().await.remove(&job.id);
        self.outcomes.deliver(ticket, resolved).await;
    }

    /// 执行命令状态机，任何错误都转换为客户端可见的Failure结果
    pub async fn resolve(&self, job: &Job, bound_worker: Option<WorkerId>) -> Job {
        let command = job.command();
        let started = Instant::now();

        let result = match &job.request {
            JobRequest::List => self.handle_list(job).await,
            JobRequest::UploadInit {
                high_reliability: false,
                ..
            } => self.handle_balanced_upload_init(job).await,
            JobRequest::UploadInit {
                high_reliability: true,
                ..
            } => self.handle_replicated_upload_init(job).await,
            JobRequest::UploadData {
                high_reliability: false,
                file_contents,
                ..
            } => {
                let timeout = self.config.upload_timeout(file_contents.len() as u64);
                self.handle_balanced_upload_data(job, bound_worker, timeout)
                    .await
            }
            JobRequest::UploadData {
                high_reliability: true,
                file_name,
                file_contents,
            } => {
                let size = file_contents.len() as u64;
                self.handle_replicated_upload_data(job, file_name, size)
                    .await
            }
            JobRequest::DeleteInit { file_name } => self.handle_delete_init(job, file_name).await,
            JobRequest::DeleteConfirm {
                file_name,
                confirmed,
            } => {
                self.handle_delete_confirm(job, file_name, *confirmed)
                    .await
            }
            JobRequest::Download { file_name } => self.handle_download(job, file_name).await,
        };

        metrics::histogram!("filestore_job_duration_seconds", "command" => command.as_str())
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(resolved) => {
                debug!("作业 {} ({}) 完成", job.id, command);
                resolved
            }
            Err(e) => {
                warn!("作业 {} ({}) 处理失败: {}", job.id, command, e);
                metrics::counter!("filestore_job_failures_total", "command" => command.as_str())
                    .increment(1);
                job.resolved(JobOutcome::failure(e.to_string()))
            }
        }
    }

    async fn handle_list(&self, job: &Job) -> FileStoreResult<Job> {
        let set = self.broadcast(job, self.config.await_timeout()).await?;

        let mut files = BTreeSet::new();
        let mut answered = 0;
        for (_, outcome) in set.outcomes() {
            if let JobOutcome::Listing { files_list } = outcome {
                answered += 1;
                files.extend(files_list.iter().cloned());
            }
        }

        if answered == 0 {
            return Err(FileStoreError::AggregationFailure(
                "没有可用的Worker".to_string(),
            ));
        }

        Ok(job.resolved(JobOutcome::Listing {
            files_list: files.into_iter().collect(),
        }))
    }

    async fn handle_balanced_upload_init(&self, job: &Job) -> FileStoreResult<Job> {
        let listings = self.collect_listings(job).await?;
        let candidates: Vec<WorkerLoad> = listings
            .iter()
            .map(|(worker, files)| WorkerLoad::new(worker.clone(), files.len()))
            .collect();

        let worker = self
            .strategy
            .select_worker(&candidates)
            .await?
            .ok_or(FileStoreError::NoWorkersRegistered)?;
        debug!("{} 策略为作业 {} 选择Worker {}", self.strategy.name(), job.id, worker);

        let reply = self
            .send_to(&worker, job, self.config.await_timeout())
            .await?;
        match reply_outcome(reply)? {
            JobOutcome::Ready => {
                let token = self.tokens.issue(&worker).await;
                info!("作业 {} 上传准备完成，签发关联令牌", job.id);
                Ok(job.resolved(JobOutcome::Ready).with_token(token))
            }
            other => Ok(job.resolved(other)),
        }
    }

    async fn handle_replicated_upload_init(&self, job: &Job) -> FileStoreResult<Job> {
        let set = self.broadcast(job, self.config.await_timeout()).await?;
        require_unanimous(&set, |outcome| matches!(outcome, JobOutcome::Ready))?;
        Ok(job.resolved(JobOutcome::Ready))
    }

    async fn handle_balanced_upload_data(
        &self,
        job: &Job,
        bound_worker: Option<WorkerId>,
        timeout: Duration,
    ) -> FileStoreResult<Job> {
        let worker = bound_worker.ok_or_else(|| {
            FileStoreError::Internal(format!("作业 {} 没有令牌绑定的Worker", job.id))
        })?;

        let reply = self.send_to(&worker, job, timeout).await?;
        Ok(job.resolved(reply_outcome(reply)?))
    }

    async fn handle_replicated_upload_data(
        &self,
        job: &Job,
        file_name: &str,
        file_size: u64,
    ) -> FileStoreResult<Job> {
        let set = self
            .broadcast(job, self.config.upload_timeout(file_size))
            .await?;
        require_unanimous(&set, |outcome| {
            matches!(outcome, JobOutcome::Uploaded { .. })
        })?;

        Ok(job.resolved(JobOutcome::Uploaded {
            file_name: file_name.to_string(),
            file_size,
        }))
    }

    async fn handle_delete_init(&self, job: &Job, file_name: &str) -> FileStoreResult<Job> {
        let set = self.broadcast(job, self.config.await_timeout()).await?;
        if set.is_empty() {
            return Err(FileStoreError::AggregationFailure(
                "没有Worker响应删除查询".to_string(),
            ));
        }

        let file_exists = set.outcomes().any(|(_, outcome)| {
            matches!(
                outcome,
                JobOutcome::FileStatus {
                    file_exists: true,
                    ..
                }
            )
        });

        Ok(job.resolved(JobOutcome::FileStatus {
            file_name: file_name.to_string(),
            file_exists,
        }))
    }

    async fn handle_delete_confirm(
        &self,
        job: &Job,
        file_name: &str,
        confirmed: bool,
    ) -> FileStoreResult<Job> {
        let set = self.broadcast(job, self.config.await_timeout()).await?;

        if !confirmed {
            info!("作业 {} 的删除被取消: {}", job.id, file_name);
            return Ok(job.resolved(JobOutcome::Aborted {
                file_name: file_name.to_string(),
            }));
        }

        require_unanimous(&set, |outcome| {
            matches!(outcome, JobOutcome::Deleted { .. })
        })?;
        Ok(job.resolved(JobOutcome::Deleted {
            file_name: file_name.to_string(),
        }))
    }

    async fn handle_download(&self, job: &Job, file_name: &str) -> FileStoreResult<Job> {
        let listings = self.collect_listings(job).await?;
        let holder = listings
            .iter()
            .find(|(_, files)| files.iter().any(|name| name == file_name))
            .map(|(worker, _)| worker.clone());

        let Some(worker) = holder else {
            debug!("没有Worker持有文件 {}", file_name);
            return Ok(job.resolved(JobOutcome::File {
                file_name: file_name.to_string(),
                file_contents: None,
            }));
        };

        let reply = self
            .send_to(&worker, job, self.config.await_timeout())
            .await?;
        Ok(job.resolved(reply_outcome(reply)?))
    }

    /// 广播一个List子作业，返回按注册顺序排列的各Worker文件列表
    async fn collect_listings(&self, job: &Job) -> FileStoreResult<Vec<(WorkerId, Vec<String>)>> {
        let listing = job.sub_job(JobRequest::List);
        let set = self.broadcast(&listing, self.config.await_timeout()).await?;

        let listings: Vec<(WorkerId, Vec<String>)> = set
            .outcomes()
            .filter_map(|(worker, outcome)| match outcome {
                JobOutcome::Listing { files_list } => Some((worker.clone(), files_list.clone())),
                _ => None,
            })
            .collect();

        if listings.is_empty() {
            return Err(FileStoreError::AggregationFailure(
                "没有可用的Worker".to_string(),
            ));
        }
        Ok(listings)
    }

    /// 向所有Worker广播并等待结果，超时未响应的Worker被驱逐
    async fn broadcast(&self, job: &Job, timeout: Duration) -> FileStoreResult<ResultSet> {
        let dispatched_at = Utc::now();
        self.collector.open(job.id).await;
        let targets = match self.registry.enqueue_all(job).await {
            Ok(targets) => targets,
            Err(e) => {
                self.collector.close(job.id).await;
                return Err(e);
            }
        };

        let set = self.collector.await_all(job.id, &targets, timeout).await;
        self.collector.close(job.id).await;
        self.evict_unresponsive(&set.missing, dispatched_at).await;
        Ok(set)
    }

    /// 向单个Worker发送作业并等待结果，超时的Worker被驱逐
    async fn send_to(&self, worker_id: &str, job: &Job, timeout: Duration) -> FileStoreResult<Job> {
        let dispatched_at = Utc::now();
        self.collector.open(job.id).await;
        if let Err(e) = self.registry.enqueue(worker_id, job.replica()).await {
            self.collector.close(job.id).await;
            return Err(e);
        }

        let result = self.collector.await_one(job.id, worker_id, timeout).await;
        self.collector.close(job.id).await;

        if let Err(FileStoreError::WorkerTimeout { .. }) = &result {
            self.evict_unresponsive(&[worker_id.to_string()], dispatched_at)
                .await;
        }
        result
    }

    /// 等待期间重新注册的Worker不会被驱逐，它的新队列里没有这个作业
    async fn evict_unresponsive(&self, workers: &[WorkerId], dispatched_at: DateTime<Utc>) {
        for worker in workers {
            if self.registry.evict(worker, dispatched_at).await {
                let revoked = self.tokens.revoke_worker(worker).await;
                warn!("Worker {} 响应超时已被驱逐，作废关联令牌 {} 个", worker, revoked);
                metrics::counter!("filestore_worker_evictions_total").increment(1);
            }
        }
    }
}

fn reply_outcome(reply: Job) -> FileStoreResult<JobOutcome> {
    let job_id = reply.id;
    reply
        .result
        .ok_or_else(|| FileStoreError::Internal(format!("作业 {job_id} 的结果为空")))
}

/// 要求所有目标Worker都响应且结果都满足条件
fn require_unanimous<F>(set: &ResultSet, accepted: F) -> FileStoreResult<()>
where
    F: Fn(&JobOutcome) -> bool,
{
    if !set.is_complete() {
        return Err(FileStoreError::AggregationFailure(format!(
            "{} 个Worker未响应: {}",
            set.missing.len(),
            set.missing.join(", ")
        )));
    }

    for (worker, job) in &set.results {
        match &job.result {
            Some(outcome) if accepted(outcome) => {}
            Some(JobOutcome::Failure { reason }) => {
                return Err(FileStoreError::AggregationFailure(format!(
                    "Worker {worker} 执行失败: {reason}"
                )));
            }
            _ => {
                return Err(FileStoreError::AggregationFailure(format!(
                    "Worker {worker} 返回了意外的结果"
                )));
            }
        }
    }

    Ok(())
}
