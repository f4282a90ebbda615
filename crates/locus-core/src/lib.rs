//! locus-core - Domain model and pure logic shared by every pipeline stage.
//!
//! Nothing in this crate performs I/O: record shape, validation,
//! NDJSON encoding, naming conventions, and the error taxonomy all live
//! here so they can be unit tested without a queue, blob store, or
//! warehouse in the loop.

pub mod error;
pub mod naming;
pub mod ndjson;
pub mod types;
pub mod validator;

pub use error::PipelineError;
pub use types::{
    BackupEntry, BackupStatus, Batch, BlobMetadata, Family, GpsRecord, LoadJob, LoadOptions,
    LoadPriority, MobileRecord, Record, RejectionReason, ShipOutcome, TerminalState, UploadResult,
};
