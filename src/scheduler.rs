//! The external tick source driving the pipeline. A fixed-cadence
//! `tokio::time::interval`; each tick invokes `CycleCoordinator::run_cycle`.

use locus_pipeline::{CycleCoordinator, CycleOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Signals the scheduler loop to stop entering new cycles. Shared with
/// `run()` so a caller can ask for shutdown without dropping the loop's
/// future mid-cycle.
#[derive(Default)]
pub struct ShutdownHandle {
    notify: Notify,
}

impl ShutdownHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

pub async fn run(
    coordinator: Arc<CycleCoordinator>,
    tick_interval: Duration,
    shutdown: Arc<ShutdownHandle>,
) {
    let mut interval = tokio::time::interval(tick_interval);
    // The first tick fires immediately; skip it so the process doesn't run a
    // cycle before it has finished starting up.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.notify.notified() => {
                info!("scheduler shutting down, no new cycle will be started");
                break;
            }
        }

        // Not raced against shutdown: once a cycle starts it runs to
        // completion, so a signal arriving mid-cycle is only observed on
        // the next loop iteration's select.
        match coordinator.run_cycle().await {
            CycleOutcome::Completed(result) => {
                info!(cycle_id = %result.cycle_id, "cycle completed");
            }
            CycleOutcome::SkippedBusy => {
                warn!("tick skipped: previous cycle still running");
            }
            CycleOutcome::ReplayFatal(reason) => {
                warn!(reason = %reason, "cycle aborted: backup replay failed fatally");
            }
        }
    }
}
