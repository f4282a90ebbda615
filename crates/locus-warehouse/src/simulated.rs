//! In-memory `WarehouseClient` for tests and local/dev runs without a real
//! warehouse endpoint, selected whenever `WarehouseConfig::endpoint` is empty.

use crate::WarehouseClient;
use async_trait::async_trait;
use locus_core::types::{LoadJob, LoadOptions, TerminalState};
use locus_core::PipelineError;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// What a simulated job should report once `await_load` is called.
#[derive(Debug, Clone)]
pub enum SimulatedOutcome {
    /// Succeeds with the given row count.
    Success { rows_loaded: u64, bytes_processed: u64 },
    /// Reaches `TerminalState::Error` with the given messages.
    Failure { errors: Vec<String> },
    /// Never reaches a terminal state; `await_load` always times out.
    NeverCompletes,
}

impl Default for SimulatedOutcome {
    fn default() -> Self {
        SimulatedOutcome::Success {
            rows_loaded: 1,
            bytes_processed: 0,
        }
    }
}

struct PendingJob {
    blob_uri: String,
    destination_table: String,
    submitted_at: chrono::DateTime<chrono::Utc>,
    outcome: SimulatedOutcome,
}

/// Jobs resolve with `default_outcome` unless a per-job override was queued
/// with `queue_outcome` before `start_load` is called.
pub struct SimulatedWarehouseClient {
    jobs: Mutex<HashMap<String, PendingJob>>,
    queued_outcomes: Mutex<Vec<SimulatedOutcome>>,
    default_outcome: SimulatedOutcome,
    next_id: Mutex<u64>,
}

impl Default for SimulatedWarehouseClient {
    fn default() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            queued_outcomes: Mutex::new(Vec::new()),
            default_outcome: SimulatedOutcome::default(),
            next_id: Mutex::new(1),
        }
    }
}

impl SimulatedWarehouseClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_outcome(outcome: SimulatedOutcome) -> Self {
        Self {
            default_outcome: outcome,
            ..Self::default()
        }
    }

    /// Queues an outcome (FIFO) to be used for the next job `start_load`
    /// creates, overriding `default_outcome` for that one job.
    pub fn queue_outcome(&self, outcome: SimulatedOutcome) {
        self.queued_outcomes.lock().unwrap().push(outcome);
    }
}

#[async_trait]
impl WarehouseClient for SimulatedWarehouseClient {
    async fn start_load(
        &self,
        blob_uri: &str,
        table: &str,
        _options: &LoadOptions,
    ) -> Result<String, PipelineError> {
        let mut next_id = self.next_id.lock().unwrap();
        let job_id = format!("sim-job-{}", *next_id);
        *next_id += 1;
        drop(next_id);

        let outcome = {
            let mut queued = self.queued_outcomes.lock().unwrap();
            if queued.is_empty() {
                self.default_outcome.clone()
            } else {
                queued.remove(0)
            }
        };

        self.jobs.lock().unwrap().insert(
            job_id.clone(),
            PendingJob {
                blob_uri: blob_uri.to_string(),
                destination_table: table.to_string(),
                submitted_at: chrono::Utc::now(),
                outcome,
            },
        );

        Ok(job_id)
    }

    async fn await_load(&self, job_id: &str, timeout: Duration) -> Result<LoadJob, PipelineError> {
        let job = self
            .jobs
            .lock()
            .unwrap()
            .remove(job_id)
            .ok_or_else(|| PipelineError::permanent_config("warehouse", format!("unknown job {job_id}")))?;

        match job.outcome {
            SimulatedOutcome::NeverCompletes => {
                tokio::time::sleep(timeout).await;
                Err(PipelineError::transient(
                    "warehouse",
                    format!("job {job_id} did not reach a terminal state within {timeout:?}"),
                ))
            }
            SimulatedOutcome::Success {
                rows_loaded,
                bytes_processed,
            } => Ok(LoadJob {
                job_id: job_id.to_string(),
                blob_uri: job.blob_uri,
                destination_table: job.destination_table,
                submitted_at: job.submitted_at,
                completed_at: Some(chrono::Utc::now()),
                rows_loaded: Some(rows_loaded),
                bytes_processed: Some(bytes_processed),
                terminal_state: TerminalState::Done,
                errors: Vec::new(),
            }),
            SimulatedOutcome::Failure { errors } => Ok(LoadJob {
                job_id: job_id.to_string(),
                blob_uri: job.blob_uri,
                destination_table: job.destination_table,
                submitted_at: job.submitted_at,
                completed_at: Some(chrono::Utc::now()),
                rows_loaded: None,
                bytes_processed: None,
                terminal_state: TerminalState::Error,
                errors,
            }),
        }
    }
}
