//! locus-pipeline - the atomic drain-and-ship pipeline.
//!
//! Ties `locus-queue`, `locus-blob`, `locus-warehouse`, and `locus-backup`
//! together behind four stages: drain, ship, replay, coordinate. Structured
//! concurrency via `tokio::join!`, no locks on the hot path besides the
//! cycle mutex and `LocalBackupStore`'s per-backupId mutex.

mod coordinator;
mod drainer;
mod replayer;
mod shipper;

pub use coordinator::{CycleCoordinator, CycleOutcome, CycleResult, FamilyOutcome};
pub use drainer::AtomicDrainer;
pub use replayer::{BackupReplayer, ReplayReport};
pub use shipper::{AttemptOutcome, BatchShipper};
