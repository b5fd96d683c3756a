use serde::{Deserialize, Serialize};

use crate::config::validation::{ConfigValidator, ValidationUtils};
use crate::errors::{FileStoreError, FileStoreResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub dispatcher_url: String,
    pub result_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dispatcher_url: "http://127.0.0.1:8080".to_string(),
            result_timeout_ms: 60_000,
        }
    }
}

impl ConfigValidator for ClientConfig {
    fn validate(&self) -> FileStoreResult<()> {
        ValidationUtils::validate_url(&self.dispatcher_url, "client.dispatcher_url")?;
        ValidationUtils::validate_timeout_ms(self.result_timeout_ms, "client.result_timeout_ms")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> FileStoreResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(FileStoreError::Configuration(format!(
                "Invalid log level: {}. Valid options: {:?}",
                self.log_level, valid_levels
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(FileStoreError::Configuration(format!(
                "Invalid log format: {}. Valid options: {:?}",
                self.log_format, valid_formats
            )));
        }

        Ok(())
    }
}
