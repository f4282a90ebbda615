//! BatchShipper: encode, upload, load, and fall back to backup on failure.

use chrono::Utc;
use locus_backup::LocalBackupStore;
use locus_blob::BlobStoreClient;
use locus_config::{BlobConfig, WarehouseConfig};
use locus_core::naming::blob_name;
use locus_core::ndjson::encode_records;
use locus_core::types::{Batch, BlobMetadata, LoadOptions, ShipOutcome};
use locus_core::PipelineError;
use locus_warehouse::WarehouseClient;
use metrics::counter;
use std::sync::Arc;

/// Result of stages 1-5, before the step-6 backup fallback is applied. Kept
/// separate from `ShipOutcome` because `BackupReplayer` needs the bare
/// attempt result to mark an *existing* backup entry, rather than have a
/// fresh one created by `ship`.
pub enum AttemptOutcome {
    Success {
        records_shipped: usize,
        job_id: Option<String>,
        bytes_processed: Option<u64>,
    },
    Fail {
        last_error: String,
    },
}

pub struct BatchShipper {
    blob: Arc<dyn BlobStoreClient>,
    warehouse: Arc<dyn WarehouseClient>,
    backup: Arc<LocalBackupStore>,
    blob_config: BlobConfig,
    warehouse_config: WarehouseConfig,
}

impl BatchShipper {
    pub fn new(
        blob: Arc<dyn BlobStoreClient>,
        warehouse: Arc<dyn WarehouseClient>,
        backup: Arc<LocalBackupStore>,
        blob_config: BlobConfig,
        warehouse_config: WarehouseConfig,
    ) -> Self {
        Self {
            blob,
            warehouse,
            backup,
            blob_config,
            warehouse_config,
        }
    }

    /// Full contract: attempt the batch, and on failure persist it as a new
    /// backup entry. This is what the normal drain-then-ship path uses.
    pub async fn ship(&self, batch: Batch) -> ShipOutcome {
        let family = batch.family;
        let records = batch.records.clone();

        match self.attempt(&batch).await {
            AttemptOutcome::Success {
                records_shipped,
                job_id,
                bytes_processed,
            } => ShipOutcome::Success {
                records_shipped,
                job_id,
                bytes_processed,
            },
            AttemptOutcome::Fail { last_error } => {
                self.create_backup(family, records, last_error).await
            }
        }
    }

    /// Stages 1-5 only: skip-empty, encode, upload, load, success. Never
    /// touches the backup store. Used directly by both `ship` (above) and
    /// `BackupReplayer`, which owns the backup-mutation decision itself.
    pub async fn attempt(&self, batch: &Batch) -> AttemptOutcome {
        // Stage 1: skip-empty.
        if batch.is_empty() {
            return AttemptOutcome::Success {
                records_shipped: 0,
                job_id: None,
                bytes_processed: None,
            };
        }

        let family = batch.family;
        let record_count = batch.len();

        // Stage 2: encode.
        let body = match encode_records(&batch.records) {
            Ok(body) => body,
            Err(e) => {
                return AttemptOutcome::Fail {
                    last_error: format!("encoding failure: {e}"),
                }
            }
        };

        // Stage 3: upload.
        let uploaded_at = Utc::now();
        let name = blob_name(
            self.blob_config.prefix_for(family),
            uploaded_at,
            &batch.processing_id,
        );
        let metadata = BlobMetadata::new(family, batch.processing_id.clone(), record_count);

        let upload = match self.blob.upload(&name, body, metadata).await {
            Ok(upload) => upload,
            Err(e) => {
                tracing::warn!(family = %family, error_kind = e.kind(), error = %e, "blob upload failed");
                record_permanent_config_failure("blob", family, &e);
                return AttemptOutcome::Fail {
                    last_error: e.to_string(),
                };
            }
        };

        // Stage 4: load.
        let table = self.warehouse_config.table_for(family);
        let options = LoadOptions {
            region: self.warehouse_config.region.clone(),
            max_bad_records: self.warehouse_config.max_bad_records,
            priority: self.warehouse_config.priority,
            timeout_ms: self.warehouse_config.job_timeout_ms,
        };

        let job_id = match self.warehouse.start_load(&upload.uri, table, &options).await {
            Ok(job_id) => job_id,
            Err(e) => {
                tracing::warn!(family = %family, error_kind = e.kind(), error = %e, "warehouse start_load failed");
                record_permanent_config_failure("warehouse", family, &e);
                return AttemptOutcome::Fail {
                    last_error: e.to_string(),
                };
            }
        };

        let job = match self
            .warehouse
            .await_load(&job_id, self.warehouse_config.job_timeout())
            .await
        {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(family = %family, error_kind = e.kind(), error = %e, "warehouse await_load failed");
                record_permanent_config_failure("warehouse", family, &e);
                return AttemptOutcome::Fail {
                    last_error: e.to_string(),
                };
            }
        };

        if !job.is_success() {
            let reason = if job.errors.is_empty() {
                "load job did not report rows loaded".to_string()
            } else {
                job.errors.join("; ")
            };
            tracing::warn!(family = %family, reason = %reason, "load job did not succeed");
            return AttemptOutcome::Fail { last_error: reason };
        }

        // Stage 5: success.
        counter!("locus.records.shipped", "family" => family.as_str()).increment(record_count as u64);
        AttemptOutcome::Success {
            records_shipped: record_count,
            job_id: Some(job.job_id),
            bytes_processed: job.bytes_processed,
        }
    }

    /// Stage 6: persist a freshly-failed batch as a brand-new backup entry.
    async fn create_backup(
        &self,
        family: locus_core::types::Family,
        records: Vec<locus_core::types::Record>,
        last_error: String,
    ) -> ShipOutcome {
        match self.backup.create(family, records, Some(last_error.clone())).await {
            Ok(backup_id) => {
                counter!("locus.backup.created", "family" => family.as_str()).increment(1);
                ShipOutcome::RecoverableFail { backup_id }
            }
            Err(e) => {
                tracing::error!(family = %family, error_kind = e.kind(), error = %e, "backup persist failed, cycle is fatal");
                counter!("locus.backup.persist_fatal", "family" => family.as_str()).increment(1);
                ShipOutcome::FatalFail {
                    reason: format!("{last_error}; backup persist also failed: {e}"),
                }
            }
        }
    }
}

/// A `PermanentConfig` error needs operator attention (bad credentials,
/// unknown bucket/table); surfaced as its own alertable metric rather than
/// folded into the generic shipped/rejected counters.
fn record_permanent_config_failure(system: &'static str, family: locus_core::types::Family, e: &PipelineError) {
    if matches!(e, PipelineError::PermanentConfig { .. }) {
        counter!("locus.warehouse.permanent_config_error", "system" => system, "family" => family.as_str())
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_config::BackupConfig;
    use locus_core::types::{Family, GpsRecord, Record};
    use locus_warehouse::{SimulatedOutcome, SimulatedWarehouseClient};
    use opendal::{services, Operator};

    fn memory_blob_store() -> Arc<dyn BlobStoreClient> {
        let op = Operator::new(services::Memory::default()).unwrap().finish();
        Arc::new(locus_blob::OpenDalBlobStore::new(op))
    }

    async fn backup_store() -> (Arc<LocalBackupStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = BackupConfig {
            root: dir.path().to_string_lossy().into_owned(),
            max_retries: 3,
            quarantine_retention_hours: 24,
        };
        (
            Arc::new(LocalBackupStore::open(&config).await.unwrap()),
            dir,
        )
    }

    fn gps_batch(n: usize) -> Batch {
        let records = (0..n)
            .map(|i| {
                Record::Gps(GpsRecord {
                    device_id: format!("D{i}"),
                    lat: 1.0,
                    lng: 2.0,
                    timestamp: Utc::now(),
                })
            })
            .collect();
        Batch::new(Family::Gps, records, Utc::now())
    }

    #[tokio::test]
    async fn empty_batch_ships_as_trivial_success() {
        let (backup, _dir) = backup_store().await;
        let shipper = BatchShipper::new(
            memory_blob_store(),
            Arc::new(SimulatedWarehouseClient::new()),
            backup,
            BlobConfig::default(),
            WarehouseConfig::default(),
        );

        let outcome = shipper.ship(gps_batch(0)).await;
        assert!(matches!(
            outcome,
            ShipOutcome::Success {
                records_shipped: 0,
                job_id: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn happy_path_uploads_and_loads() {
        let (backup, _dir) = backup_store().await;
        let shipper = BatchShipper::new(
            memory_blob_store(),
            Arc::new(SimulatedWarehouseClient::new()),
            backup,
            BlobConfig::default(),
            WarehouseConfig::default(),
        );

        let outcome = shipper.ship(gps_batch(3)).await;
        match outcome {
            ShipOutcome::Success {
                records_shipped,
                job_id,
                ..
            } => {
                assert_eq!(records_shipped, 3);
                assert!(job_id.is_some());
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_failure_falls_back_to_backup() {
        let (backup, _dir) = backup_store().await;
        let warehouse = Arc::new(SimulatedWarehouseClient::new());
        warehouse.queue_outcome(SimulatedOutcome::Failure {
            errors: vec!["schema mismatch".to_string()],
        });

        let shipper = BatchShipper::new(
            memory_blob_store(),
            warehouse,
            backup.clone(),
            BlobConfig::default(),
            WarehouseConfig::default(),
        );

        let outcome = shipper.ship(gps_batch(2)).await;
        match outcome {
            ShipOutcome::RecoverableFail { backup_id } => {
                let pending = backup.list_pending().await.unwrap();
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].backup_id, backup_id);
                assert_eq!(pending[0].records.len(), 2);
            }
            other => panic!("expected recoverable fail, got {other:?}"),
        }
    }
}
