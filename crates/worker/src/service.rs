use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use filestore_core::{FileStoreResult, WorkerConfig};

use crate::components::{DiskFileStore, DispatcherClient, JobExecutor, WorkerLifecycle};

/// `Worker_<pid>@<hostname>`, used when no worker id is configured
pub fn default_worker_id() -> String {
    let hostname = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string());
    format!("Worker_{}@{}", std::process::id(), hostname)
}

pub fn resolve_worker_id(config: &WorkerConfig) -> String {
    if config.worker_id.trim().is_empty() {
        default_worker_id()
    } else {
        config.worker_id.clone()
    }
}

/// Storage worker process: file store, executor and poll loop wired together
pub struct WorkerService {
    worker_id: String,
    store: Arc<DiskFileStore>,
    lifecycle: WorkerLifecycle,
}

impl WorkerService {
    pub async fn new(config: &WorkerConfig) -> FileStoreResult<Self> {
        let worker_id = resolve_worker_id(config);
        let store = Arc::new(DiskFileStore::open(&config.storage_root, &worker_id).await?);
        let executor = Arc::new(JobExecutor::new(store.clone()));
        let client = Arc::new(DispatcherClient::new(
            config.dispatcher_url.clone(),
            worker_id.clone(),
        ));

        let lifecycle = WorkerLifecycle::new(
            client,
            executor,
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_millis(config.max_backoff_ms),
        );

        info!(
            "Worker {} storing files in {}",
            worker_id,
            store.directory().display()
        );

        Ok(Self {
            worker_id,
            store,
            lifecycle,
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn store(&self) -> &DiskFileStore {
        &self.store
    }

    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> FileStoreResult<()> {
        self.lifecycle.run(shutdown_rx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::FileStore;

    #[test]
    fn test_default_worker_id_format() {
        let id = default_worker_id();
        assert!(id.starts_with(&format!("Worker_{}@", std::process::id())));
    }

    #[test]
    fn test_configured_worker_id_wins() {
        let config = WorkerConfig {
            worker_id: "storage-1".to_string(),
            ..WorkerConfig::default()
        };
        assert_eq!(resolve_worker_id(&config), "storage-1");
        assert!(resolve_worker_id(&WorkerConfig::default()).starts_with("Worker_"));
    }

    #[tokio::test]
    async fn test_new_creates_worker_directory() {
        let root = tempfile::tempdir().unwrap();
        let config = WorkerConfig {
            worker_id: "storage-1".to_string(),
            storage_root: root.path().to_string_lossy().into_owned(),
            ..WorkerConfig::default()
        };

        let service = WorkerService::new(&config).await.unwrap();
        assert_eq!(service.worker_id(), "storage-1");
        assert!(root.path().join("storage-1").is_dir());
        assert!(service.store().list().await.unwrap().is_empty());
    }
}
