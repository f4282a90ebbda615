// locus-config - Unified configuration for the drain-and-ship service
//
// Loaded from, in priority order (highest first):
// 1. Environment variables, prefixed `LOCUS_`
// 2. A TOML file named by `LOCUS_CONFIG`, or `./config.toml` if present
// 3. Built-in defaults

use locus_core::types::{Family, LoadPriority};
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod sources;
mod validation;

pub use validation::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub gps_key: String,
    pub mobile_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            gps_key: "gps:history:global".to_string(),
            mobile_key: "mobile:history:global".to_string(),
        }
    }
}

impl QueueConfig {
    pub fn key_for(&self, family: Family) -> &str {
        match family {
            Family::Gps => &self.gps_key,
            Family::Mobile => &self.mobile_key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    /// Local filesystem tree; simulation mode only.
    Fs,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    pub backend: BlobBackend,
    pub bucket: String,
    pub gps_prefix: String,
    pub mobile_prefix: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Root directory used when `backend == Fs`.
    pub fs_root: String,
}

impl BlobConfig {
    pub fn prefix_for(&self, family: Family) -> &str {
        match family {
            Family::Gps => &self.gps_prefix,
            Family::Mobile => &self.mobile_prefix,
        }
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackend::Fs,
            bucket: "locus-data".to_string(),
            gps_prefix: "gps-data".to_string(),
            mobile_prefix: "mobile-data".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            fs_root: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub project: String,
    pub dataset: String,
    pub region: String,
    pub gps_table: String,
    pub mobile_table: String,
    pub job_timeout_ms: u64,
    pub max_bad_records: u32,
    pub priority: LoadPriority,
    /// Base URL for the REST job client; empty selects the simulated client.
    #[serde(default)]
    pub endpoint: String,
}

impl WarehouseConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn table_for(&self, family: Family) -> &str {
        match family {
            Family::Gps => &self.gps_table,
            Family::Mobile => &self.mobile_table,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            dataset: String::new(),
            region: "us-east-1".to_string(),
            gps_table: "gps_events".to_string(),
            mobile_table: "mobile_events".to_string(),
            job_timeout_ms: 300_000,
            max_bad_records: 0,
            priority: LoadPriority::Batch,
            endpoint: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub root: String,
    pub max_retries: u32,
    pub quarantine_retention_hours: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            root: "./backups".to_string(),
            max_retries: 3,
            quarantine_retention_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub tick_interval_minutes: u64,
    /// How long shutdown waits for an in-flight cycle to finish before
    /// moving on without it.
    pub shutdown_grace_period_seconds: u64,
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_minutes * 60)
    }

    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period_seconds)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_minutes: 5,
            shutdown_grace_period_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            blob: BlobConfig::default(),
            warehouse: WarehouseConfig::default(),
            backup: BackupConfig::default(),
            scheduler: SchedulerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority, then validate it.
    pub fn load() -> anyhow::Result<Self> {
        let config = sources::load_config()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = RuntimeConfig::default();
        assert_eq!(config.queue.gps_key, "gps:history:global");
        assert_eq!(config.backup.max_retries, 3);
        assert_eq!(config.scheduler.tick_interval_minutes, 5);
        assert_eq!(config.warehouse.job_timeout_ms, 300_000);
    }
}
