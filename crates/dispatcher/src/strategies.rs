use async_trait::async_trait;
use tracing::debug;

use filestore_core::{FileStoreResult, WorkerId};

/// 候选Worker及其当前持有的文件数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLoad {
    pub worker_id: WorkerId,
    pub file_count: usize,
}

impl WorkerLoad {
    pub fn new(worker_id: impl Into<WorkerId>, file_count: usize) -> Self {
        Self {
            worker_id: worker_id.into(),
            file_count,
        }
    }
}

/// 负载均衡上传时的Worker选择策略
#[async_trait]
pub trait WorkerSelectionStrategy: Send + Sync {
    /// 候选列表按Worker注册顺序排列，为空时返回None
    async fn select_worker(&self, candidates: &[WorkerLoad]) -> FileStoreResult<Option<WorkerId>>;

    fn name(&self) -> &str;
}

/// 选择文件数最少的Worker，数量相同时取第一个遇到的
#[derive(Debug, Default)]
pub struct FewestFilesStrategy;

impl FewestFilesStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkerSelectionStrategy for FewestFilesStrategy {
    async fn select_worker(&self, candidates: &[WorkerLoad]) -> FileStoreResult<Option<WorkerId>> {
        let mut selected: Option<&WorkerLoad> = None;
        for candidate in candidates {
            match selected {
                Some(best) if candidate.file_count >= best.file_count => {}
                _ => selected = Some(candidate),
            }
        }

        match selected {
            Some(worker) => {
                debug!(
                    "最少文件策略选择Worker: {} (文件数: {}, 候选数: {})",
                    worker.worker_id,
                    worker.file_count,
                    candidates.len()
                );
                Ok(Some(worker.worker_id.clone()))
            }
            None => {
                debug!("没有可用的Worker节点");
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "FewestFiles"
    }
}
