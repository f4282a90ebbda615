//! CycleCoordinator: `idle -> replaying -> draining -> shipping -> idle`.

use crate::drainer::AtomicDrainer;
use crate::replayer::{BackupReplayer, ReplayReport};
use crate::shipper::BatchShipper;
use locus_core::types::{Family, ShipOutcome};
use locus_core::PipelineError;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of one family's drain+ship stage within a cycle.
#[derive(Debug)]
pub enum FamilyOutcome {
    Shipped(ShipOutcome),
    /// The drain itself failed (queue store unreachable); the family never
    /// reached the shipper this cycle.
    DrainFailed(String),
}

#[derive(Debug)]
pub struct CycleResult {
    pub cycle_id: String,
    pub replay: ReplayReport,
    pub gps: FamilyOutcome,
    pub mobile: FamilyOutcome,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleResult),
    SkippedBusy,
    ReplayFatal(String),
}

/// The single serialization point between ticks: a tick that finds this
/// held is dropped, not queued.
pub struct CycleCoordinator {
    drainer: Arc<AtomicDrainer>,
    shipper: Arc<BatchShipper>,
    replayer: Arc<BackupReplayer>,
    cycle_lock: Mutex<()>,
}

impl CycleCoordinator {
    pub fn new(
        drainer: Arc<AtomicDrainer>,
        shipper: Arc<BatchShipper>,
        replayer: Arc<BackupReplayer>,
    ) -> Self {
        Self {
            drainer,
            shipper,
            replayer,
            cycle_lock: Mutex::new(()),
        }
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        let _permit = match self.cycle_lock.try_lock() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!("cycle skipped: previous cycle still running");
                counter!("locus.cycle.skipped_busy").increment(1);
                return CycleOutcome::SkippedBusy;
            }
        };

        let cycle_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("cycle", cycle_id = %cycle_id);
        let _entered = span.enter();

        // Stage: replaying. Every pending backup is attempted before any
        // new batch is shipped.
        let replay = match self.replayer.replay().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error_kind = e.kind(), error = %e, "backup replay failed fatally, aborting cycle");
                counter!("locus.cycle.replay_fatal").increment(1);
                return CycleOutcome::ReplayFatal(e.to_string());
            }
        };

        // Stage: draining. Both families concurrently, independent failure
        // domains.
        let (gps_drain, mobile_drain) = tokio::join!(
            self.drainer.drain(Family::Gps),
            self.drainer.drain(Family::Mobile),
        );

        // Stage: shipping. Both families concurrently.
        let (gps, mobile) = tokio::join!(
            self.process_family(Family::Gps, gps_drain),
            self.process_family(Family::Mobile, mobile_drain),
        );

        record_outcome_metrics(Family::Gps, &gps);
        record_outcome_metrics(Family::Mobile, &mobile);

        CycleOutcome::Completed(CycleResult {
            cycle_id,
            replay,
            gps,
            mobile,
        })
    }

    async fn process_family(
        &self,
        family: Family,
        drain_result: Result<locus_core::types::Batch, PipelineError>,
    ) -> FamilyOutcome {
        match drain_result {
            Ok(batch) => FamilyOutcome::Shipped(self.shipper.ship(batch).await),
            Err(e) => {
                tracing::error!(family = %family, error_kind = e.kind(), error = %e, "drain failed");
                FamilyOutcome::DrainFailed(e.to_string())
            }
        }
    }
}

fn record_outcome_metrics(family: Family, outcome: &FamilyOutcome) {
    match outcome {
        FamilyOutcome::Shipped(ShipOutcome::Success { records_shipped, .. }) => {
            tracing::info!(family = %family, records_shipped, "family shipped successfully");
        }
        FamilyOutcome::Shipped(ShipOutcome::RecoverableFail { backup_id }) => {
            tracing::warn!(family = %family, backup_id, "family routed to backup");
        }
        FamilyOutcome::Shipped(ShipOutcome::FatalFail { reason }) => {
            tracing::error!(family = %family, reason = %reason, "family ship fatally failed");
            counter!("locus.cycle.ship_fatal", "family" => family.as_str()).increment(1);
        }
        FamilyOutcome::DrainFailed(reason) => {
            tracing::error!(family = %family, reason = %reason, "family drain failed");
            counter!("locus.cycle.drain_failed", "family" => family.as_str()).increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_backup::LocalBackupStore;
    use locus_blob::BlobStoreClient;
    use locus_config::{BackupConfig, BlobConfig, QueueConfig, WarehouseConfig};
    use locus_queue::{InMemoryQueueStore, QueueStoreClient};
    use locus_warehouse::SimulatedWarehouseClient;
    use opendal::{services, Operator};

    fn memory_blob_store() -> Arc<dyn BlobStoreClient> {
        let op = Operator::new(services::Memory::default()).unwrap().finish();
        Arc::new(locus_blob::OpenDalBlobStore::new(op))
    }

    async fn coordinator() -> (CycleCoordinator, Arc<dyn QueueStoreClient>, QueueConfig, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backup_config = BackupConfig {
            root: dir.path().to_string_lossy().into_owned(),
            max_retries: 3,
            quarantine_retention_hours: 24,
        };
        let backup = Arc::new(LocalBackupStore::open(&backup_config).await.unwrap());
        let queue: Arc<dyn QueueStoreClient> = Arc::new(InMemoryQueueStore::new());
        let queue_config = QueueConfig::default();

        let drainer = Arc::new(AtomicDrainer::new(queue.clone(), queue_config.clone()));
        let shipper = Arc::new(BatchShipper::new(
            memory_blob_store(),
            Arc::new(SimulatedWarehouseClient::new()),
            backup.clone(),
            BlobConfig::default(),
            WarehouseConfig::default(),
        ));
        let replayer = Arc::new(BackupReplayer::new(backup, shipper.clone()));
        let coordinator = CycleCoordinator::new(drainer, shipper, replayer);

        (coordinator, queue, queue_config, dir)
    }

    #[tokio::test]
    async fn empty_cycle_completes_with_trivial_success_both_families() {
        let (coordinator, _queue, _keys, _dir) = coordinator().await;
        let outcome = coordinator.run_cycle().await;
        match outcome {
            CycleOutcome::Completed(result) => {
                assert!(matches!(
                    result.gps,
                    FamilyOutcome::Shipped(ShipOutcome::Success { records_shipped: 0, .. })
                ));
                assert!(matches!(
                    result.mobile,
                    FamilyOutcome::Shipped(ShipOutcome::Success { records_shipped: 0, .. })
                ));
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn seeded_gps_queue_ships_and_drains() {
        let (coordinator, queue, keys, _dir) = coordinator().await;
        queue
            .append_many(
                &keys.gps_key,
                vec![r#"{"deviceId":"A","lat":1.0,"lng":2.0,"timestamp":"2024-01-15T10:30:00Z"}"#
                    .to_string()],
            )
            .await
            .unwrap();

        let outcome = coordinator.run_cycle().await;
        match outcome {
            CycleOutcome::Completed(result) => {
                assert!(matches!(
                    result.gps,
                    FamilyOutcome::Shipped(ShipOutcome::Success { records_shipped: 1, .. })
                ));
            }
            other => panic!("expected completed cycle, got {other:?}"),
        }
        assert_eq!(queue.length(&keys.gps_key).await.unwrap(), 0);
    }

    /// Overlapping ticks never both enter the cycle.
    #[tokio::test]
    async fn concurrent_ticks_one_is_skipped_busy() {
        let (coordinator, _queue, _keys, _dir) = coordinator().await;
        let coordinator = Arc::new(coordinator);

        let held = coordinator.cycle_lock.lock().await;
        let result = coordinator.run_cycle().await;
        assert!(matches!(result, CycleOutcome::SkippedBusy));
        drop(held);
    }
}
