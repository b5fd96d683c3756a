use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use filestore_core::{FileStoreError, FileStoreResult, Job, WorkerId, WorkerInfo};

/// 单个Worker的待处理队列
struct WorkerQueue {
    jobs: VecDeque<Job>,
    registered_at: DateTime<Utc>,
    last_poll_at: Option<DateTime<Utc>>,
    notify: Arc<Notify>,
}

impl WorkerQueue {
    fn new() -> Self {
        Self {
            jobs: VecDeque::new(),
            registered_at: Utc::now(),
            last_poll_at: None,
            notify: Arc::new(Notify::new()),
        }
    }

    fn info(&self, id: &str) -> WorkerInfo {
        WorkerInfo {
            id: id.to_string(),
            registered_at: self.registered_at,
            last_poll_at: self.last_poll_at,
            pending_jobs: self.jobs.len(),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    /// 注册顺序，决定"第一个遇到的Worker"
    order: Vec<WorkerId>,
    queues: HashMap<WorkerId, WorkerQueue>,
}

/// Worker注册表：维护每个已注册Worker的FIFO作业队列
#[derive(Default)]
pub struct WorkerRegistry {
    state: Mutex<RegistryState>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册Worker，重复注册时以最后一次为准，旧队列中的作业被丢弃
    pub async fn register(&self, worker_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let replaced = state.queues.insert(worker_id.to_string(), WorkerQueue::new());

        match replaced {
            Some(old) => {
                if !old.jobs.is_empty() {
                    warn!(
                        "Worker {} 重新注册，丢弃旧队列中的 {} 个作业",
                        worker_id,
                        old.jobs.len()
                    );
                }
                old.notify.notify_waiters();
                true
            }
            None => {
                state.order.push(worker_id.to_string());
                info!("Worker {} 注册成功，当前Worker数: {}", worker_id, state.order.len());
                metrics::gauge!("filestore_registered_workers").set(state.order.len() as f64);
                false
            }
        }
    }

    /// 追加作业到指定Worker队列尾部
    pub async fn enqueue(&self, worker_id: &str, job: Job) -> FileStoreResult<()> {
        let mut state = self.state.lock().await;
        let queue = state
            .queues
            .get_mut(worker_id)
            .ok_or_else(|| FileStoreError::UnknownWorker {
                id: worker_id.to_string(),
            })?;

        debug!("作业 {} ({}) 进入Worker {} 队列", job.id, job.command(), worker_id);
        queue.jobs.push_back(job);
        queue.notify.notify_waiters();
        Ok(())
    }

    /// 向所有已注册Worker各投递一份副本，返回投递时的Worker快照（按注册顺序）
    pub async fn enqueue_all(&self, job: &Job) -> FileStoreResult<Vec<WorkerId>> {
        let mut state = self.state.lock().await;
        if state.order.is_empty() {
            return Err(FileStoreError::NoWorkersRegistered);
        }

        let targets = state.order.clone();
        for worker_id in &targets {
            if let Some(queue) = state.queues.get_mut(worker_id) {
                queue.jobs.push_back(job.replica());
                queue.notify.notify_waiters();
            }
        }

        debug!(
            "作业 {} ({}) 广播给 {} 个Worker",
            job.id,
            job.command(),
            targets.len()
        );
        Ok(targets)
    }

    /// 取出队头作业，队列为空时返回None
    pub async fn pull_next(&self, worker_id: &str) -> FileStoreResult<Option<Job>> {
        let mut state = self.state.lock().await;
        let queue = state
            .queues
            .get_mut(worker_id)
            .ok_or_else(|| FileStoreError::UnknownWorker {
                id: worker_id.to_string(),
            })?;

        queue.last_poll_at = Some(Utc::now());
        Ok(queue.jobs.pop_front())
    }

    /// 返回队列内容的快照，不消费作业
    ///
    /// 队列为空时最多等待 `timeout`，期间有作业入队则立即返回。
    pub async fn snapshot(&self, worker_id: &str, timeout: Duration) -> FileStoreResult<Vec<Job>> {
        let deadline = Instant::now() + timeout;

        loop {
            let notify: Arc<Notify>;
            let notified;
            {
                let mut state = self.state.lock().await;
                let queue = state
                    .queues
                    .get_mut(worker_id)
                    .ok_or_else(|| FileStoreError::UnknownWorker {
                        id: worker_id.to_string(),
                    })?;
                queue.last_poll_at = Some(Utc::now());

                if !queue.jobs.is_empty() {
                    return Ok(queue.jobs.iter().cloned().collect());
                }

                // 持锁时注册等待，入队方同样持锁通知，不会丢失唤醒
                notify = queue.notify.clone();
                notified = notify.notified();
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    /// 移除在 `dispatched_at` 之前注册的Worker及其队列，返回是否驱逐
    ///
    /// 之后重新注册的实例拿到的是新队列，不受旧作业超时的影响。
    pub async fn evict(&self, worker_id: &str, dispatched_at: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().await;
        match state.queues.get(worker_id) {
            Some(queue) if queue.registered_at > dispatched_at => {
                debug!("Worker {} 在作业分发后重新注册，跳过驱逐", worker_id);
                return false;
            }
            Some(_) => {}
            None => return false,
        }

        let Some(queue) = state.queues.remove(worker_id) else {
            return false;
        };
        state.order.retain(|id| id != worker_id);
        queue.notify.notify_waiters();
        warn!(
            "驱逐Worker {}，丢弃 {} 个未处理作业",
            worker_id,
            queue.jobs.len()
        );
        metrics::gauge!("filestore_registered_workers").set(state.order.len() as f64);
        true
    }

    pub async fn workers(&self) -> Vec<WorkerInfo> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter_map(|id| state.queues.get(id).map(|queue| queue.info(id)))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
