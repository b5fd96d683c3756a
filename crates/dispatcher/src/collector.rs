use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use filestore_core::{FileStoreError, FileStoreResult, Job, JobOutcome, WorkerId};

/// 一次广播收集到的结果
///
/// `results` 按投递时的Worker顺序排列，`missing` 为超时未响应的Worker。
#[derive(Debug, Default, Clone)]
pub struct ResultSet {
    pub results: Vec<(WorkerId, Job)>,
    pub missing: Vec<WorkerId>,
}

impl ResultSet {
    /// 按Worker顺序遍历已写入结果的作业
    pub fn outcomes(&self) -> impl Iterator<Item = (&WorkerId, &JobOutcome)> {
        self.results
            .iter()
            .filter_map(|(id, job)| job.result.as_ref().map(|outcome| (id, outcome)))
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Default)]
struct CollectorState {
    /// 正在等待结果的作业id
    open: HashSet<Uuid>,
    pending: VecDeque<Job>,
}

/// 结果收集器：接收Worker推送的内部结果，并按 (作业id, Worker) 匹配给等待方
#[derive(Default)]
pub struct ResultCollector {
    state: Mutex<CollectorState>,
    notify: Notify,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始等待某个作业的结果，必须在作业入队之前调用
    pub async fn open(&self, job_id: Uuid) {
        self.state.lock().await.open.insert(job_id);
    }

    /// 结束等待并丢弃该作业的剩余结果，返回丢弃数量
    pub async fn close(&self, job_id: Uuid) -> usize {
        let mut state = self.state.lock().await;
        state.open.remove(&job_id);
        let before = state.pending.len();
        state.pending.retain(|job| job.id != job_id);
        let discarded = before - state.pending.len();
        if discarded > 0 {
            debug!("作业 {} 结束等待，丢弃 {} 个多余结果", job_id, discarded);
        }
        discarded
    }

    /// 接收Worker推送的结果；作业已不在等待中时丢弃并返回false
    pub async fn push(&self, job: Job) -> FileStoreResult<bool> {
        if job.result.is_none() {
            return Err(FileStoreError::InvalidJob(format!(
                "作业 {} 的结果为空",
                job.id
            )));
        }
        let Some(worker_id) = job.produced_by.clone() else {
            return Err(FileStoreError::InvalidJob(format!(
                "作业 {} 缺少处理Worker标识",
                job.id
            )));
        };

        let mut state = self.state.lock().await;
        if !state.open.contains(&job.id) {
            warn!(
                "丢弃迟到或未知的结果: 作业 {} ({}) 来自Worker {}",
                job.id,
                job.command(),
                worker_id
            );
            metrics::counter!("filestore_results_discarded_total").increment(1);
            return Ok(false);
        }

        debug!("收到Worker {} 对作业 {} 的结果", worker_id, job.id);
        state.pending.push_back(job);
        self.notify.notify_waiters();
        Ok(true)
    }

    /// 等待指定Worker对某作业的结果
    pub async fn await_one(
        &self,
        job_id: Uuid,
        worker_id: &str,
        timeout: Duration,
    ) -> FileStoreResult<Job> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified;
            {
                let mut state = self.state.lock().await;
                let position = state.pending.iter().position(|job| {
                    job.id == job_id && job.produced_by.as_deref() == Some(worker_id)
                });
                if let Some(job) = position.and_then(|pos| state.pending.remove(pos)) {
                    return Ok(job);
                }
                notified = self.notify.notified();
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(FileStoreError::WorkerTimeout {
                    id: worker_id.to_string(),
                });
            }
        }
    }

    /// 等待所有目标Worker对某作业的结果，直到全部到达或超时
    pub async fn await_all(&self, job_id: Uuid, targets: &[WorkerId], timeout: Duration) -> ResultSet {
        let deadline = Instant::now() + timeout;
        let mut found: HashMap<WorkerId, Job> = HashMap::new();

        loop {
            let notified;
            {
                let mut state = self.state.lock().await;
                let mut index = 0;
                while index < state.pending.len() {
                    let wanted = {
                        let job = &state.pending[index];
                        job.id == job_id
                            && job.produced_by.as_ref().is_some_and(|worker| {
                                targets.contains(worker) && !found.contains_key(worker)
                            })
                    };

                    if !wanted {
                        index += 1;
                        continue;
                    }
                    if let Some(job) = state.pending.remove(index) {
                        if let Some(worker) = job.produced_by.clone() {
                            found.insert(worker, job);
                        }
                    }
                }

                if found.len() == targets.len() {
                    break;
                }
                notified = self.notify.notified();
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                break;
            }
        }

        let mut set = ResultSet::default();
        for worker in targets {
            match found.remove(worker) {
                Some(job) => set.results.push((worker.clone(), job)),
                None => set.missing.push(worker.clone()),
            }
        }
        set
    }
}
