use std::sync::Arc;

use tracing::{debug, info, warn};

use filestore_core::{FileStoreResult, Job, JobOutcome, JobRequest};

use super::file_store::{validate_file_name, FileStore};

/// Executes dispatcher jobs against the local file store
pub struct JobExecutor {
    store: Arc<dyn FileStore>,
}

impl JobExecutor {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    /// Execute a pulled job and stamp it with this worker's outcome
    pub async fn process(&self, mut job: Job, worker_id: &str) -> FileStoreResult<Job> {
        let outcome = self.execute(&job.request).await;
        if let JobOutcome::Failure { reason } = &outcome {
            warn!("Job {} ({}) failed: {}", job.id, job.command(), reason);
        } else {
            debug!("Job {} ({}) completed", job.id, job.command());
        }

        job.stamp(outcome, worker_id)?;
        Ok(job)
    }

    /// Local errors never escape: they become a `Failure` outcome
    pub async fn execute(&self, request: &JobRequest) -> JobOutcome {
        match self.try_execute(request).await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::failure(e.to_string()),
        }
    }

    async fn try_execute(&self, request: &JobRequest) -> FileStoreResult<JobOutcome> {
        if let Some(file_name) = request.file_name() {
            validate_file_name(file_name)?;
        }

        let outcome = match request {
            JobRequest::UploadInit {
                file_name,
                file_size,
                ..
            } => {
                debug!("Ready to receive {} ({} bytes)", file_name, file_size);
                JobOutcome::Ready
            }
            JobRequest::UploadData {
                file_name,
                file_contents,
                ..
            } => {
                self.store.write(file_name, file_contents).await?;
                info!("Stored {} ({} bytes)", file_name, file_contents.len());
                JobOutcome::Uploaded {
                    file_name: file_name.clone(),
                    file_size: file_contents.len() as u64,
                }
            }
            JobRequest::List => JobOutcome::Listing {
                files_list: self.store.list().await?,
            },
            JobRequest::DeleteInit { file_name } => JobOutcome::FileStatus {
                file_name: file_name.clone(),
                file_exists: self.store.exists(file_name).await?,
            },
            JobRequest::DeleteConfirm {
                file_name,
                confirmed: true,
            } => {
                // 不存在的文件视为已删除
                if self.store.delete(file_name).await? {
                    info!("Deleted {}", file_name);
                }
                JobOutcome::Deleted {
                    file_name: file_name.clone(),
                }
            }
            JobRequest::DeleteConfirm {
                file_name,
                confirmed: false,
            } => JobOutcome::Aborted {
                file_name: file_name.clone(),
            },
            JobRequest::Download { file_name } => JobOutcome::File {
                file_name: file_name.clone(),
                file_contents: self.store.read(file_name).await?,
            },
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::file_store::DiskFileStore;

    async fn executor() -> (tempfile::TempDir, JobExecutor) {
        let root = tempfile::tempdir().unwrap();
        let store = DiskFileStore::open(root.path(), "w1").await.unwrap();
        (root, JobExecutor::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_upload_then_list_and_download() {
        let (_root, executor) = executor().await;

        let ready = executor
            .execute(&JobRequest::UploadInit {
                file_name: "a.txt".to_string(),
                file_size: 3,
                high_reliability: false,
            })
            .await;
        assert_eq!(ready, JobOutcome::Ready);

        let uploaded = executor
            .execute(&JobRequest::UploadData {
                file_name: "a.txt".to_string(),
                file_contents: b"abc".to_vec(),
                high_reliability: false,
            })
            .await;
        assert_eq!(
            uploaded,
            JobOutcome::Uploaded {
                file_name: "a.txt".to_string(),
                file_size: 3,
            }
        );

        let listing = executor.execute(&JobRequest::List).await;
        assert_eq!(
            listing,
            JobOutcome::Listing {
                files_list: vec!["a.txt".to_string()],
            }
        );

        let file = executor
            .execute(&JobRequest::Download {
                file_name: "a.txt".to_string(),
            })
            .await;
        assert_eq!(
            file,
            JobOutcome::File {
                file_name: "a.txt".to_string(),
                file_contents: Some(b"abc".to_vec()),
            }
        );
    }

    #[tokio::test]
    async fn test_delete_flow() {
        let (_root, executor) = executor().await;
        executor
            .execute(&JobRequest::UploadData {
                file_name: "gone.txt".to_string(),
                file_contents: b"x".to_vec(),
                high_reliability: true,
            })
            .await;

        let declined = executor
            .execute(&JobRequest::DeleteConfirm {
                file_name: "gone.txt".to_string(),
                confirmed: false,
            })
            .await;
        assert!(matches!(declined, JobOutcome::Aborted { .. }));

        let status = executor
            .execute(&JobRequest::DeleteInit {
                file_name: "gone.txt".to_string(),
            })
            .await;
        assert!(matches!(
            status,
            JobOutcome::FileStatus {
                file_exists: true,
                ..
            }
        ));

        for _ in 0..2 {
            // 第二次删除文件已不存在，同样视为成功
            let deleted = executor
                .execute(&JobRequest::DeleteConfirm {
                    file_name: "gone.txt".to_string(),
                    confirmed: true,
                })
                .await;
            assert!(matches!(deleted, JobOutcome::Deleted { .. }));
        }
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let (_root, executor) = executor().await;
        let file = executor
            .execute(&JobRequest::Download {
                file_name: "missing".to_string(),
            })
            .await;
        assert_eq!(
            file,
            JobOutcome::File {
                file_name: "missing".to_string(),
                file_contents: None,
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_name_becomes_failure() {
        let (_root, executor) = executor().await;
        let outcome = executor
            .execute(&JobRequest::UploadInit {
                file_name: "../x".to_string(),
                file_size: 1,
                high_reliability: false,
            })
            .await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_process_stamps_worker() {
        let (_root, executor) = executor().await;
        let job = executor
            .process(Job::new(JobRequest::List), "w1")
            .await
            .unwrap();
        assert_eq!(job.produced_by.as_deref(), Some("w1"));
        assert!(job.is_processed());
    }
}
