//! BackupReplayer: retries pending backups oldest-first, ahead of new drains.

use crate::shipper::{AttemptOutcome, BatchShipper};
use chrono::Utc;
use locus_backup::LocalBackupStore;
use locus_core::types::{BackupEntry, Batch};
use locus_core::PipelineError;
use metrics::counter;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub exhausted: usize,
}

pub struct BackupReplayer {
    backup: Arc<LocalBackupStore>,
    shipper: Arc<BatchShipper>,
}

impl BackupReplayer {
    pub fn new(backup: Arc<LocalBackupStore>, shipper: Arc<BatchShipper>) -> Self {
        Self { backup, shipper }
    }

    /// Attempts every pending backup, oldest-first, serially. A replay
    /// failure increments that entry's retry count and continues to the
    /// next entry. Stops only if the backup store itself becomes unusable.
    pub async fn replay(&self) -> Result<ReplayReport, PipelineError> {
        let pending = self.backup.list_pending().await?;
        let mut report = ReplayReport::default();

        for entry in pending {
            report.attempted += 1;
            let batch = reconstruct_batch(&entry);

            match self.shipper.attempt(&batch).await {
                AttemptOutcome::Success { .. } => {
                    self.backup.mark_attempt(entry.backup_id, true, None).await?;
                    report.succeeded += 1;
                    counter!("locus.backup.replay_success", "family" => entry.family.as_str())
                        .increment(1);
                }
                AttemptOutcome::Fail { last_error } => {
                    let updated = self
                        .backup
                        .mark_attempt(entry.backup_id, false, Some(last_error))
                        .await?;
                    report.failed += 1;
                    if updated.status == locus_core::types::BackupStatus::Exhausted {
                        report.exhausted += 1;
                        tracing::error!(backup_id = entry.backup_id, family = %entry.family, "backup exhausted retries, moved to quarantine");
                        counter!("locus.backup.retry_exhausted", "family" => entry.family.as_str())
                            .increment(1);
                    } else {
                        counter!("locus.backup.replay_failed", "family" => entry.family.as_str())
                            .increment(1);
                    }
                }
            }
        }

        Ok(report)
    }
}

fn reconstruct_batch(entry: &BackupEntry) -> Batch {
    // A fresh processing id: the replayed blob is a new object, not a
    // pointer to any prior attempt.
    Batch::new(entry.family, entry.records.clone(), Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_blob::BlobStoreClient;
    use locus_config::{BackupConfig, BlobConfig, WarehouseConfig};
    use locus_core::types::{Family, GpsRecord, Record};
    use locus_warehouse::{SimulatedOutcome, SimulatedWarehouseClient};
    use opendal::{services, Operator};

    fn memory_blob_store() -> Arc<dyn BlobStoreClient> {
        let op = Operator::new(services::Memory::default()).unwrap().finish();
        Arc::new(locus_blob::OpenDalBlobStore::new(op))
    }

    async fn backup_store(max_retries: u32) -> (Arc<LocalBackupStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = BackupConfig {
            root: dir.path().to_string_lossy().into_owned(),
            max_retries,
            quarantine_retention_hours: 24,
        };
        (
            Arc::new(LocalBackupStore::open(&config).await.unwrap()),
            dir,
        )
    }

    fn gps_records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::Gps(GpsRecord {
                    device_id: format!("D{i}"),
                    lat: 1.0,
                    lng: 2.0,
                    timestamp: Utc::now(),
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn replay_of_healthy_backend_clears_pending_entry() {
        let (backup, _dir) = backup_store(3).await;
        backup
            .create(Family::Gps, gps_records(3), Some("prior failure".into()))
            .await
            .unwrap();

        let shipper = Arc::new(BatchShipper::new(
            memory_blob_store(),
            Arc::new(SimulatedWarehouseClient::new()),
            backup.clone(),
            BlobConfig::default(),
            WarehouseConfig::default(),
        ));
        let replayer = BackupReplayer::new(backup.clone(), shipper);

        let report = replayer.replay().await.unwrap();
        assert_eq!(report.attempted, 1);
        assert_eq!(report.succeeded, 1);
        assert!(backup.list_pending().await.unwrap().is_empty());
    }

    /// A backup with max_retries=3 fails 4 consecutive cycles, ending up
    /// quarantined and absent from list_pending.
    #[tokio::test]
    async fn four_consecutive_failures_exhaust_and_quarantine() {
        let (backup, _dir) = backup_store(3).await;
        backup.create(Family::Gps, gps_records(1), None).await.unwrap();

        let warehouse = Arc::new(SimulatedWarehouseClient::new());
        let shipper = Arc::new(BatchShipper::new(
            memory_blob_store(),
            warehouse.clone(),
            backup.clone(),
            BlobConfig::default(),
            WarehouseConfig::default(),
        ));
        let replayer = BackupReplayer::new(backup.clone(), shipper);

        for cycle in 1..=4 {
            warehouse.queue_outcome(SimulatedOutcome::Failure {
                errors: vec!["still broken".to_string()],
            });
            let report = replayer.replay().await.unwrap();
            if cycle < 4 {
                assert_eq!(report.exhausted, 0, "cycle {cycle} must not exhaust yet");
                assert_eq!(backup.list_pending().await.unwrap().len(), 1);
            } else {
                assert_eq!(report.exhausted, 1, "4th consecutive failure must exhaust");
            }
        }

        assert!(backup.list_pending().await.unwrap().is_empty());
        assert_eq!(backup.list_quarantined().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replay_does_not_duplicate_backup_entries_on_repeat_failure() {
        let (backup, _dir) = backup_store(3).await;
        backup.create(Family::Gps, gps_records(1), None).await.unwrap();

        let warehouse = Arc::new(SimulatedWarehouseClient::new());
        warehouse.queue_outcome(SimulatedOutcome::Failure {
            errors: vec!["nope".to_string()],
        });
        let shipper = Arc::new(BatchShipper::new(
            memory_blob_store(),
            warehouse,
            backup.clone(),
            BlobConfig::default(),
            WarehouseConfig::default(),
        ));
        let replayer = BackupReplayer::new(backup.clone(), shipper);

        replayer.replay().await.unwrap();
        let pending = backup.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1, "a failed replay must not create a second entry");
        assert_eq!(pending[0].retry_count, 1);
    }
}
