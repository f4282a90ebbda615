//! locus-warehouse - WarehouseClient capability interface.
//!
//! Vocabulary and polling shape follow the BigQuery Jobs API: a load job is
//! started against a `project.dataset.table` destination and polled by
//! `job_id` until it reaches a terminal state. The REST plumbing mirrors
//! `otlp2parquet-storage::iceberg`'s catalog client: a thin `HttpClient`
//! trait underneath, a typed client on top that only knows JSON shapes.

mod http;
mod rest;
mod simulated;

pub use crate::http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use rest::RestWarehouseClient;
pub use simulated::SimulatedWarehouseClient;

use async_trait::async_trait;
use locus_core::types::{LoadJob, LoadOptions};
use locus_core::PipelineError;
use std::time::Duration;

#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Submit a load job for the NDJSON blob at `blob_uri` into `table`.
    /// Returns the warehouse's job id; does not wait for completion.
    async fn start_load(
        &self,
        blob_uri: &str,
        table: &str,
        options: &LoadOptions,
    ) -> Result<String, PipelineError>;

    /// Poll `job_id` until it reaches a terminal state or `timeout` elapses.
    /// A timeout is reported as a `TransientIo` error, treated the same as
    /// any other shipping failure and routed to backup.
    async fn await_load(&self, job_id: &str, timeout: Duration) -> Result<LoadJob, PipelineError>;
}
