use crate::{BlobBackend, RuntimeConfig};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("queue.{field} must not be empty")]
    EmptyQueueKey { field: &'static str },
    #[error("blob.bucket must not be empty when backend is s3")]
    MissingBlobBucket,
    #[error("blob.fs_root must not be empty when backend is fs")]
    MissingBlobFsRoot,
    #[error("warehouse.{field} must not be empty")]
    EmptyWarehouseField { field: &'static str },
    #[error("warehouse.job_timeout_ms must be greater than zero")]
    NonPositiveJobTimeout,
    #[error("backup.root must not be empty")]
    MissingBackupRoot,
    #[error("scheduler.tick_interval_minutes must be greater than zero")]
    NonPositiveTickInterval,
}

pub fn validate_config(config: &RuntimeConfig) -> Result<(), ConfigError> {
    if config.queue.gps_key.trim().is_empty() {
        return Err(ConfigError::EmptyQueueKey { field: "gps_key" });
    }
    if config.queue.mobile_key.trim().is_empty() {
        return Err(ConfigError::EmptyQueueKey {
            field: "mobile_key",
        });
    }

    match config.blob.backend {
        BlobBackend::S3 if config.blob.bucket.trim().is_empty() => {
            return Err(ConfigError::MissingBlobBucket);
        }
        BlobBackend::Fs if config.blob.fs_root.trim().is_empty() => {
            return Err(ConfigError::MissingBlobFsRoot);
        }
        _ => {}
    }

    if config.warehouse.gps_table.trim().is_empty() {
        return Err(ConfigError::EmptyWarehouseField { field: "gps_table" });
    }
    if config.warehouse.mobile_table.trim().is_empty() {
        return Err(ConfigError::EmptyWarehouseField {
            field: "mobile_table",
        });
    }
    if config.warehouse.job_timeout_ms == 0 {
        return Err(ConfigError::NonPositiveJobTimeout);
    }

    if config.backup.root.trim().is_empty() {
        return Err(ConfigError::MissingBackupRoot);
    }

    if config.scheduler.tick_interval_minutes == 0 {
        return Err(ConfigError::NonPositiveTickInterval);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&RuntimeConfig::default()).is_ok());
    }

    #[test]
    fn rejects_empty_queue_key() {
        let mut config = RuntimeConfig::default();
        config.queue.gps_key = String::new();
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::EmptyQueueKey { field: "gps_key" })
        );
    }

    #[test]
    fn rejects_zero_job_timeout() {
        let mut config = RuntimeConfig::default();
        config.warehouse.job_timeout_ms = 0;
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::NonPositiveJobTimeout)
        );
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let mut config = RuntimeConfig::default();
        config.scheduler.tick_interval_minutes = 0;
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::NonPositiveTickInterval)
        );
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let mut config = RuntimeConfig::default();
        config.blob.backend = BlobBackend::S3;
        config.blob.bucket = String::new();
        assert_eq!(validate_config(&config), Err(ConfigError::MissingBlobBucket));
    }
}
