use crate::errors::{FileStoreError, FileStoreResult};

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> FileStoreResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> FileStoreResult<()> {
        if value.trim().is_empty() {
            return Err(FileStoreError::Configuration(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate a millisecond timeout: non-zero and at most one hour
    pub fn validate_timeout_ms(timeout_ms: u64, field_name: &str) -> FileStoreResult<()> {
        if timeout_ms == 0 {
            return Err(FileStoreError::Configuration(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if timeout_ms > 3_600_000 {
            return Err(FileStoreError::Configuration(format!(
                "{field_name} must be less than or equal to 3600000"
            )));
        }
        Ok(())
    }

    /// Validate that a URL has a valid format
    pub fn validate_url(url: &str, field_name: &str) -> FileStoreResult<()> {
        Self::validate_not_empty(url, field_name)?;

        if !url.contains("://") {
            return Err(FileStoreError::Configuration(format!(
                "{field_name} must be a valid URL with protocol"
            )));
        }

        Ok(())
    }

    /// Validate a socket bind address such as `0.0.0.0:8080`
    pub fn validate_bind_address(address: &str, field_name: &str) -> FileStoreResult<()> {
        address
            .parse::<std::net::SocketAddr>()
            .map(|_| ())
            .map_err(|e| {
                FileStoreError::Configuration(format!("{field_name} is not a valid address: {e}"))
            })
    }
}
