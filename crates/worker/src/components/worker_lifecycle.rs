use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use filestore_core::{FileStoreError, FileStoreResult};

use super::{DispatcherClient, JobExecutor};

/// Outcome of a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Processed,
    Idle,
}

/// Pull → execute → push loop with exponential backoff while idle
pub struct WorkerLifecycle {
    client: Arc<DispatcherClient>,
    executor: Arc<JobExecutor>,
    poll_interval: Duration,
    max_backoff: Duration,
}

impl WorkerLifecycle {
    pub fn new(
        client: Arc<DispatcherClient>,
        executor: Arc<JobExecutor>,
        poll_interval: Duration,
        max_backoff: Duration,
    ) -> Self {
        Self {
            client,
            executor,
            poll_interval,
            max_backoff: max_backoff.max(poll_interval),
        }
    }

    pub fn worker_id(&self) -> &str {
        self.client.worker_id()
    }

    /// Run until a shutdown signal arrives
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> FileStoreResult<()> {
        if !self.register_until_ready(&mut shutdown_rx).await {
            info!("Worker {} stopped before registration", self.worker_id());
            return Ok(());
        }

        info!("Worker {} entering poll loop", self.worker_id());
        let mut backoff = self.poll_interval;

        loop {
            if shutdown_requested(&mut shutdown_rx) {
                break;
            }

            let keep_running = match self.poll_once().await {
                Ok(PollOutcome::Processed) => {
                    backoff = self.poll_interval;
                    continue;
                }
                // 空闲时在调度器上等待新作业，而不是单纯休眠
                Ok(PollOutcome::Idle) => tokio::select! {
                    result = self.client.queue_snapshot(backoff) => match result {
                        Ok(_) => true,
                        Err(e) => self.handle_poll_error(e, &mut shutdown_rx, backoff).await,
                    },
                    _ = shutdown_rx.recv() => false,
                },
                Err(e) => self.handle_poll_error(e, &mut shutdown_rx, backoff).await,
            };

            if !keep_running {
                break;
            }
            backoff = (backoff * 2).min(self.max_backoff);
        }

        info!("Worker {} poll loop shutting down", self.worker_id());
        Ok(())
    }

    /// Pull a single job, execute it and push the result back
    pub async fn poll_once(&self) -> FileStoreResult<PollOutcome> {
        let Some(job) = self.client.pull_job().await? else {
            return Ok(PollOutcome::Idle);
        };

        let processed = self.executor.process(job, self.worker_id()).await?;
        self.client.push_result(&processed).await?;
        Ok(PollOutcome::Processed)
    }

    /// Returns false when shutdown was requested while backing off
    async fn handle_poll_error(
        &self,
        error: FileStoreError,
        shutdown_rx: &mut broadcast::Receiver<()>,
        backoff: Duration,
    ) -> bool {
        match error {
            FileStoreError::UnknownWorker { .. } => {
                warn!(
                    "Worker {} is no longer registered with the dispatcher, registering again",
                    self.worker_id()
                );
                match self.client.register().await {
                    Ok(()) => true,
                    Err(e) => {
                        error!("Re-registration failed: {}", e);
                        self.sleep_or_shutdown(shutdown_rx, backoff).await
                    }
                }
            }
            other => {
                warn!("Polling failed, retrying in {:?}: {}", backoff, other);
                self.sleep_or_shutdown(shutdown_rx, backoff).await
            }
        }
    }

    async fn register_until_ready(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
        let mut backoff = self.poll_interval;
        loop {
            match self.client.register().await {
                Ok(()) => return true,
                Err(e) => {
                    warn!("Registration failed, retrying in {:?}: {}", backoff, e);
                    if !self.sleep_or_shutdown(shutdown_rx, backoff).await {
                        return false;
                    }
                    backoff = (backoff * 2).min(self.max_backoff);
                }
            }
        }
    }

    /// Returns false when shutdown was requested during the sleep
    async fn sleep_or_shutdown(
        &self,
        shutdown_rx: &mut broadcast::Receiver<()>,
        duration: Duration,
    ) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = shutdown_rx.recv() => false,
        }
    }
}

fn shutdown_requested(shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    use tokio::sync::broadcast::error::TryRecvError;

    match shutdown_rx.try_recv() {
        Ok(()) | Err(TryRecvError::Closed) | Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Empty) => false,
    }
}
