//! Domain types shared by every stage of the drain-and-ship pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two record kinds processed by the system. Each family owns its
/// own queue key, blob prefix, and warehouse table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Gps,
    Mobile,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Gps => "gps",
            Family::Mobile => "mobile",
        }
    }

    pub const ALL: [Family; 2] = [Family::Gps, Family::Mobile];
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape as it arrives on the wire from the queue store: a UTF-8 JSON string.
/// Timestamps are kept as raw strings here so the Validator can distinguish
/// "not JSON" from "JSON but timestamp won't parse".
#[derive(Debug, Clone, Deserialize)]
pub struct RawGpsRecord {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: String,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMobileRecord {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: String,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A record that has passed shape validation: unknown top-level fields have
/// been stripped, to minimize warehouse load-job errors, and the timestamp
/// has been parsed to a concrete instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Gps(GpsRecord),
    Mobile(MobileRecord),
}

impl Record {
    pub fn family(&self) -> Family {
        match self {
            Record::Gps(_) => Family::Gps,
            Record::Mobile(_) => Family::Mobile,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Record::Gps(r) => r.timestamp,
            Record::Mobile(r) => r.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsRecord {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileRecord {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub email: String,
}

/// Output of one `AtomicDrainer::drain` call.
#[derive(Debug, Clone)]
pub struct Batch {
    pub family: Family,
    pub records: Vec<Record>,
    pub drained_at: DateTime<Utc>,
    pub processing_id: String,
}

impl Batch {
    pub fn new(family: Family, records: Vec<Record>, drained_at: DateTime<Utc>) -> Self {
        Self {
            family,
            records,
            drained_at,
            processing_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Metadata attached to an uploaded blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMetadata {
    #[serde(rename = "dataType")]
    pub data_type: Family,
    #[serde(rename = "processingId")]
    pub processing_id: String,
    #[serde(rename = "recordCount")]
    pub record_count: usize,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: DateTime<Utc>,
    pub format: String,
}

impl BlobMetadata {
    pub fn new(family: Family, processing_id: String, record_count: usize) -> Self {
        Self {
            data_type: family,
            processing_id,
            record_count,
            uploaded_at: Utc::now(),
            format: "newline_delimited_json".to_string(),
        }
    }
}

/// Result of a successful blob upload.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub uri: String,
    pub size_bytes: u64,
}

/// Options passed to `WarehouseClient::start_load`.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub region: String,
    pub max_bad_records: u32,
    pub priority: LoadPriority,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPriority {
    Batch,
    Interactive,
}

/// One warehouse ingest task.
#[derive(Debug, Clone)]
pub struct LoadJob {
    pub job_id: String,
    pub blob_uri: String,
    pub destination_table: String,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rows_loaded: Option<u64>,
    pub bytes_processed: Option<u64>,
    pub terminal_state: TerminalState,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Running,
    Done,
    Error,
}

impl LoadJob {
    /// Successful iff terminal state is done, errors are empty, and at
    /// least one row loaded.
    pub fn is_success(&self) -> bool {
        self.terminal_state == TerminalState::Done
            && self.errors.is_empty()
            && self.rows_loaded.unwrap_or(0) > 0
    }
}

/// Status of a `BackupEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Pending,
    InProgress,
    Exhausted,
}

/// A failed batch persisted to disk by `LocalBackupStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    pub backup_id: u64,
    pub family: Family,
    pub records: Vec<Record>,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub status: BackupStatus,
}

/// Why a single record was dropped from a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    MalformedJson,
    OutOfRangeLat,
    OutOfRangeLng,
    UnparseableTimestamp,
    EmptyIdentifier,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::MalformedJson => "malformed_json",
            RejectionReason::OutOfRangeLat => "out_of_range_lat",
            RejectionReason::OutOfRangeLng => "out_of_range_lng",
            RejectionReason::UnparseableTimestamp => "unparseable_timestamp",
            RejectionReason::EmptyIdentifier => "empty_identifier",
        };
        f.write_str(s)
    }
}

/// Outcome of a single `BatchShipper::ship` call: a tagged result with at
/// least a success, a recoverable failure, and a fatal failure case.
#[derive(Debug)]
pub enum ShipOutcome {
    /// Batch shipped (or was empty), nothing to do.
    Success {
        records_shipped: usize,
        job_id: Option<String>,
        bytes_processed: Option<u64>,
    },
    /// Shipping failed but the records are now durably in the backup store.
    RecoverableFail { backup_id: u64 },
    /// Shipping failed and the records could not be protected; fatal to the cycle.
    FatalFail { reason: String },
}
