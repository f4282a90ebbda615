// Configuration source loading, priority high to low:
// env vars (LOCUS_*) > TOML file (LOCUS_CONFIG path, else ./config.toml) > defaults

use crate::{BlobBackend, LogFormat, RuntimeConfig};
use anyhow::{Context, Result};
use locus_core::types::LoadPriority;
use std::env;
use std::path::Path;

const ENV_PREFIX: &str = "LOCUS_";

pub fn load_config() -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::default();

    if let Some(file_config) = load_from_file()? {
        config = file_config;
    }

    apply_env_overrides(&mut config)?;

    Ok(config)
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var("LOCUS_CONFIG") {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        let config: RuntimeConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {path}"))?;
        return Ok(Some(config));
    }

    if Path::new("./config.toml").exists() {
        let content = std::fs::read_to_string("./config.toml")
            .context("failed to read ./config.toml")?;
        let config: RuntimeConfig =
            toml::from_str(&content).context("failed to parse ./config.toml")?;
        return Ok(Some(config));
    }

    Ok(None)
}

fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<()> {
    // Scheduler
    if let Some(v) = get_env_u64("TICK_INTERVAL_MINUTES")? {
        config.scheduler.tick_interval_minutes = v;
    }
    if let Some(v) = get_env_u64("SHUTDOWN_GRACE_PERIOD_SECONDS")? {
        config.scheduler.shutdown_grace_period_seconds = v;
    }

    // Queue
    if let Some(v) = get_env_string("QUEUE_GPS_KEY")? {
        config.queue.gps_key = v;
    }
    if let Some(v) = get_env_string("QUEUE_MOBILE_KEY")? {
        config.queue.mobile_key = v;
    }

    // Blob
    if let Some(v) = get_env_string("BLOB_BACKEND")? {
        config.blob.backend = match v.to_lowercase().as_str() {
            "s3" | "aws" => BlobBackend::S3,
            _ => BlobBackend::Fs,
        };
    }
    if let Some(v) = get_env_string("BLOB_BUCKET")? {
        config.blob.bucket = v;
    }
    if let Some(v) = get_env_string("BLOB_GPS_PREFIX")? {
        config.blob.gps_prefix = v;
    }
    if let Some(v) = get_env_string("BLOB_MOBILE_PREFIX")? {
        config.blob.mobile_prefix = v;
    }
    if let Some(v) = get_env_string("BLOB_REGION")? {
        config.blob.region = v;
    }
    if let Some(v) = get_env_string("BLOB_ENDPOINT")? {
        config.blob.endpoint = Some(v);
    }
    if let Some(v) = get_env_string("BLOB_FS_ROOT")? {
        config.blob.fs_root = v;
    }

    // Warehouse
    if let Some(v) = get_env_string("WAREHOUSE_PROJECT")? {
        config.warehouse.project = v;
    }
    if let Some(v) = get_env_string("WAREHOUSE_DATASET")? {
        config.warehouse.dataset = v;
    }
    if let Some(v) = get_env_string("WAREHOUSE_REGION")? {
        config.warehouse.region = v;
    }
    if let Some(v) = get_env_string("WAREHOUSE_GPS_TABLE")? {
        config.warehouse.gps_table = v;
    }
    if let Some(v) = get_env_string("WAREHOUSE_MOBILE_TABLE")? {
        config.warehouse.mobile_table = v;
    }
    if let Some(v) = get_env_u64("WAREHOUSE_JOB_TIMEOUT_MS")? {
        config.warehouse.job_timeout_ms = v;
    }
    if let Some(v) = get_env_u32("WAREHOUSE_MAX_BAD_RECORDS")? {
        config.warehouse.max_bad_records = v;
    }
    if let Some(v) = get_env_string("WAREHOUSE_PRIORITY")? {
        config.warehouse.priority = match v.to_uppercase().as_str() {
            "INTERACTIVE" => LoadPriority::Interactive,
            _ => LoadPriority::Batch,
        };
    }
    if let Some(v) = get_env_string("WAREHOUSE_ENDPOINT")? {
        config.warehouse.endpoint = v;
    }

    // Backup
    if let Some(v) = get_env_string("BACKUP_ROOT")? {
        config.backup.root = v;
    }
    if let Some(v) = get_env_u32("BACKUP_MAX_RETRIES")? {
        config.backup.max_retries = v;
    }
    if let Some(v) = get_env_u64("BACKUP_QUARANTINE_RETENTION_HOURS")? {
        config.backup.quarantine_retention_hours = v;
    }

    // Server / logging
    if let Some(v) = get_env_string("LISTEN_ADDR")? {
        config.server.listen_addr = v;
    }
    if let Some(v) = get_env_string("LOG_LEVEL")? {
        config.server.log_level = v;
    }
    if let Some(v) = get_env_string("LOG_FORMAT")? {
        config.server.log_format = match v.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn get_env_string(key: &str) -> Result<Option<String>> {
    let full_key = format!("{ENV_PREFIX}{key}");
    match env::var(&full_key) {
        Ok(val) if !val.is_empty() => Ok(Some(val)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read env var {full_key}")),
    }
}

fn get_env_u64(key: &str) -> Result<Option<u64>> {
    let full_key = format!("{ENV_PREFIX}{key}");
    match get_env_string(key)? {
        Some(val) => Ok(Some(
            val.parse::<u64>()
                .with_context(|| format!("{full_key} must be a valid number"))?,
        )),
        None => Ok(None),
    }
}

fn get_env_u32(key: &str) -> Result<Option<u32>> {
    let full_key = format!("{ENV_PREFIX}{key}");
    match get_env_string(key)? {
        Some(val) => Ok(Some(
            val.parse::<u32>()
                .with_context(|| format!("{full_key} must be a valid number"))?,
        )),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the tests that
    // touch them so they don't race each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn env_override_takes_priority_over_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("LOCUS_QUEUE_GPS_KEY", "custom:gps:key");
        let config = load_config().unwrap();
        assert_eq!(config.queue.gps_key, "custom:gps:key");
        env::remove_var("LOCUS_QUEUE_GPS_KEY");
    }

    #[test]
    fn missing_env_keeps_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("LOCUS_BACKUP_MAX_RETRIES");
        let config = load_config().unwrap();
        assert_eq!(config.backup.max_retries, 3);
    }
}
