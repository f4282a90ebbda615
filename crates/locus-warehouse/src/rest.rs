//! REST `WarehouseClient`, shaped around the BigQuery Jobs API: submit a
//! load job with `POST .../jobs`, then poll `GET .../jobs/{id}` until
//! `status.state == "DONE"`.

use crate::http::HttpClient;
use crate::WarehouseClient;
use async_trait::async_trait;
use locus_core::types::{LoadJob, LoadOptions, TerminalState};
use locus_core::PipelineError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct RestWarehouseClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    project: String,
    dataset: String,
}

impl RestWarehouseClient {
    pub fn new(http: Arc<dyn HttpClient>, base_url: String, project: String, dataset: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            project,
            dataset,
        }
    }

    fn jobs_url(&self) -> String {
        format!("{}/projects/{}/jobs", self.base_url, self.project)
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/projects/{}/jobs/{}", self.base_url, self.project, job_id)
    }
}

#[derive(Debug, Serialize)]
struct LoadJobRequest<'a> {
    configuration: LoadJobConfig<'a>,
}

#[derive(Debug, Serialize)]
struct LoadJobConfig<'a> {
    load: LoadConfig<'a>,
}

#[derive(Debug, Serialize)]
struct LoadConfig<'a> {
    #[serde(rename = "sourceUris")]
    source_uris: Vec<&'a str>,
    #[serde(rename = "destinationTable")]
    destination_table: DestinationTable<'a>,
    #[serde(rename = "sourceFormat")]
    source_format: &'static str,
    #[serde(rename = "maxBadRecords")]
    max_bad_records: u32,
    priority: &'static str,
}

#[derive(Debug, Serialize)]
struct DestinationTable<'a> {
    #[serde(rename = "projectId")]
    project_id: &'a str,
    #[serde(rename = "datasetId")]
    dataset_id: &'a str,
    #[serde(rename = "tableId")]
    table_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    #[serde(rename = "jobReference")]
    job_reference: JobReference,
    #[serde(default)]
    status: Option<JobStatus>,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
struct JobReference {
    #[serde(rename = "jobId")]
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    state: String,
    #[serde(default)]
    errors: Vec<JobError>,
}

#[derive(Debug, Deserialize)]
struct JobError {
    message: String,
}

#[derive(Debug, Deserialize, Default)]
struct JobStatistics {
    #[serde(default)]
    load: Option<LoadStatistics>,
    #[serde(rename = "totalBytesProcessed", default)]
    total_bytes_processed: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LoadStatistics {
    #[serde(rename = "outputRows", default)]
    output_rows: Option<String>,
}

#[async_trait]
impl WarehouseClient for RestWarehouseClient {
    async fn start_load(
        &self,
        blob_uri: &str,
        table: &str,
        options: &LoadOptions,
    ) -> Result<String, PipelineError> {
        let priority = match options.priority {
            locus_core::types::LoadPriority::Batch => "BATCH",
            locus_core::types::LoadPriority::Interactive => "INTERACTIVE",
        };
        let request = LoadJobRequest {
            configuration: LoadJobConfig {
                load: LoadConfig {
                    source_uris: vec![blob_uri],
                    destination_table: DestinationTable {
                        project_id: &self.project,
                        dataset_id: &self.dataset,
                        table_id: table,
                    },
                    source_format: "NEWLINE_DELIMITED_JSON",
                    max_bad_records: options.max_bad_records,
                    priority,
                },
            },
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| PipelineError::permanent_config("warehouse", e.to_string()))?;

        let response = self.http.post(&self.jobs_url(), body).await?;
        if !response.is_success() {
            return Err(PipelineError::transient(
                "warehouse",
                format!("start_load failed with status {}", response.status),
            ));
        }
        let job: JobResponse = response.json()?;
        Ok(job.job_reference.job_id)
    }

    async fn await_load(&self, job_id: &str, timeout: Duration) -> Result<LoadJob, PipelineError> {
        let submitted_at = chrono::Utc::now();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let response = self.http.get(&self.job_url(job_id)).await?;
            if !response.is_success() {
                return Err(PipelineError::transient(
                    "warehouse",
                    format!("poll failed with status {}", response.status),
                ));
            }
            let job: JobResponse = response.json()?;
            let status = job.status.unwrap_or(JobStatus {
                state: "RUNNING".to_string(),
                errors: Vec::new(),
            });

            if status.state == "DONE" {
                let stats = job.statistics.unwrap_or_default();
                let rows_loaded = stats
                    .load
                    .and_then(|l| l.output_rows)
                    .and_then(|s| s.parse::<u64>().ok());
                let bytes_processed = stats
                    .total_bytes_processed
                    .and_then(|s| s.parse::<u64>().ok());
                let errors: Vec<String> = status.errors.into_iter().map(|e| e.message).collect();
                let terminal_state = if errors.is_empty() {
                    TerminalState::Done
                } else {
                    TerminalState::Error
                };

                return Ok(LoadJob {
                    job_id: job_id.to_string(),
                    blob_uri: String::new(),
                    destination_table: String::new(),
                    submitted_at,
                    completed_at: Some(chrono::Utc::now()),
                    rows_loaded,
                    bytes_processed,
                    terminal_state,
                    errors,
                });
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(PipelineError::transient(
                    "warehouse",
                    format!("job {job_id} did not reach a terminal state within {timeout:?}"),
                ));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
