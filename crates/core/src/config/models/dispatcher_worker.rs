use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::{ConfigValidator, ValidationUtils};
use crate::errors::{FileStoreError, FileStoreResult};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub bind_address: String,
    /// AwaitOne/AwaitAll的默认超时
    pub await_timeout_ms: u64,
    /// UploadData超时 = base + per_mb * ceil(文件大小 / 1MB)
    pub upload_timeout_base_ms: u64,
    pub upload_timeout_per_mb_ms: u64,
    /// 客户端阻塞拉取结果的最长等待时间
    pub max_result_poll_ms: u64,
    /// Worker获取队列快照的最长等待时间
    pub max_snapshot_wait_ms: u64,
    /// 单个HTTP请求体上限，上传的文件内容包含在请求体中
    pub max_request_size_mb: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            await_timeout_ms: 5_000,
            upload_timeout_base_ms: 5_000,
            upload_timeout_per_mb_ms: 1_000,
            max_result_poll_ms: 60_000,
            max_snapshot_wait_ms: 5_000,
            max_request_size_mb: 256,
        }
    }
}

impl DispatcherConfig {
    pub fn await_timeout(&self) -> Duration {
        Duration::from_millis(self.await_timeout_ms)
    }

    pub fn max_request_bytes(&self) -> usize {
        usize::try_from(self.max_request_size_mb.saturating_mul(BYTES_PER_MB)).unwrap_or(usize::MAX)
    }

    /// 按声明的文件大小放大上传超时
    pub fn upload_timeout(&self, file_size: u64) -> Duration {
        let megabytes = file_size.div_ceil(BYTES_PER_MB);
        Duration::from_millis(
            self.upload_timeout_base_ms
                .saturating_add(self.upload_timeout_per_mb_ms.saturating_mul(megabytes)),
        )
    }
}

impl ConfigValidator for DispatcherConfig {
    fn validate(&self) -> FileStoreResult<()> {
        ValidationUtils::validate_bind_address(&self.bind_address, "dispatcher.bind_address")?;
        ValidationUtils::validate_timeout_ms(self.await_timeout_ms, "dispatcher.await_timeout_ms")?;
        ValidationUtils::validate_timeout_ms(
            self.upload_timeout_base_ms,
            "dispatcher.upload_timeout_base_ms",
        )?;
        ValidationUtils::validate_timeout_ms(
            self.max_result_poll_ms,
            "dispatcher.max_result_poll_ms",
        )?;
        ValidationUtils::validate_timeout_ms(
            self.max_snapshot_wait_ms,
            "dispatcher.max_snapshot_wait_ms",
        )?;
        if self.max_request_size_mb == 0 {
            return Err(FileStoreError::Configuration(
                "dispatcher.max_request_size_mb must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 为空时使用 `Worker_<pid>@<hostname>`
    pub worker_id: String,
    pub dispatcher_url: String,
    pub storage_root: String,
    pub poll_interval_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: String::new(),
            dispatcher_url: "http://127.0.0.1:8080".to_string(),
            storage_root: "data/workers".to_string(),
            poll_interval_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

impl ConfigValidator for WorkerConfig {
    fn validate(&self) -> FileStoreResult<()> {
        ValidationUtils::validate_url(&self.dispatcher_url, "worker.dispatcher_url")?;
        ValidationUtils::validate_not_empty(&self.storage_root, "worker.storage_root")?;
        ValidationUtils::validate_timeout_ms(self.poll_interval_ms, "worker.poll_interval_ms")?;
        ValidationUtils::validate_timeout_ms(self.max_backoff_ms, "worker.max_backoff_ms")?;

        if self.max_backoff_ms < self.poll_interval_ms {
            return Err(FileStoreError::Configuration(
                "worker.max_backoff_ms must not be smaller than worker.poll_interval_ms"
                    .to_string(),
            ));
        }

        if self.worker_id.contains('/') || self.worker_id.contains('\\') {
            return Err(FileStoreError::Configuration(
                "worker.worker_id must not contain path separators".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_config_validation() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = config.clone();
        invalid_config.await_timeout_ms = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.bind_address = "not-an-address".to_string();
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_upload_timeout_scales_with_size() {
        let config = DispatcherConfig {
            upload_timeout_base_ms: 2_000,
            upload_timeout_per_mb_ms: 500,
            ..DispatcherConfig::default()
        };

        assert_eq!(config.upload_timeout(0), Duration::from_millis(2_000));
        assert_eq!(config.upload_timeout(1), Duration::from_millis(2_500));
        assert_eq!(
            config.upload_timeout(3 * BYTES_PER_MB),
            Duration::from_millis(3_500)
        );
        assert!(config.upload_timeout(10 * BYTES_PER_MB) > config.upload_timeout(BYTES_PER_MB));
    }

    #[test]
    fn test_worker_config_validation() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = config.clone();
        invalid_config.dispatcher_url = "127.0.0.1:8080".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.max_backoff_ms = 10;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.worker_id = "../escape".to_string();
        assert!(invalid_config.validate().is_err());
    }
}
