//! Client wiring: turns a validated `RuntimeConfig` into the concrete
//! implementations the pipeline's capability interfaces need, constructed
//! once and owned by the coordinator rather than rebuilt per cycle.

use anyhow::{Context, Result};
use locus_backup::LocalBackupStore;
use locus_blob::OpenDalBlobStore;
use locus_config::RuntimeConfig;
use locus_pipeline::{AtomicDrainer, BackupReplayer, BatchShipper, CycleCoordinator};
use locus_queue::InMemoryQueueStore;
use locus_warehouse::{ReqwestHttpClient, RestWarehouseClient, SimulatedWarehouseClient, WarehouseClient};
use std::sync::Arc;

pub async fn build_coordinator(config: &RuntimeConfig) -> Result<CycleCoordinator> {
    // No external queue backend is wired up yet; the in-process simulation
    // is the only implementation this binary ships.
    let queue = Arc::new(InMemoryQueueStore::new());

    let blob = Arc::new(
        OpenDalBlobStore::from_config(&config.blob)
            .context("failed to construct blob store client")?,
    );

    let warehouse: Arc<dyn WarehouseClient> = if config.warehouse.endpoint.is_empty() {
        tracing::warn!("WAREHOUSE endpoint not configured, using in-memory simulated warehouse client");
        Arc::new(SimulatedWarehouseClient::new())
    } else {
        Arc::new(RestWarehouseClient::new(
            Arc::new(ReqwestHttpClient::default()),
            config.warehouse.endpoint.clone(),
            config.warehouse.project.clone(),
            config.warehouse.dataset.clone(),
        ))
    };

    let backup = Arc::new(
        LocalBackupStore::open(&config.backup)
            .await
            .context("failed to open local backup store")?,
    );

    let drainer = Arc::new(AtomicDrainer::new(queue, config.queue.clone()));
    let shipper = Arc::new(BatchShipper::new(
        blob,
        warehouse,
        backup.clone(),
        config.blob.clone(),
        config.warehouse.clone(),
    ));
    let replayer = Arc::new(BackupReplayer::new(backup, shipper.clone()));

    Ok(CycleCoordinator::new(drainer, shipper, replayer))
}
