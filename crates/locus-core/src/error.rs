//! Error taxonomy. Each variant is a *kind*, not a wrapper around one
//! vendor's error type, so the pipeline can classify failures from any of
//! the three external systems identically.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network/timeout/5xx from the queue store, blob store, or warehouse.
    #[error("transient I/O error calling {system}: {message}")]
    TransientIo { system: &'static str, message: String },

    /// Missing credentials, unknown bucket/table, auth denied.
    #[error("permanent configuration error calling {system}: {message}")]
    PermanentConfig { system: &'static str, message: String },

    /// Local disk write impossible; fatal to the cycle.
    #[error("local backup store is unusable: {message}")]
    BackupPersistFatal { message: String },

    /// A backup entry exhausted its retry budget.
    #[error("backup {backup_id} exhausted {max_retries} retries")]
    RetryExhausted { backup_id: u64, max_retries: u32 },
}

impl PipelineError {
    /// Whether a cross-cycle retry (via the backup store) could plausibly
    /// succeed. `BackupPersistFatal` and `RetryExhausted` are not retryable
    /// by definition: the former can't even be captured, the latter has
    /// already exhausted its budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::TransientIo { .. } | PipelineError::PermanentConfig { .. }
        )
    }

    pub fn transient(system: &'static str, message: impl Into<String>) -> Self {
        PipelineError::TransientIo {
            system,
            message: message.into(),
        }
    }

    pub fn permanent_config(system: &'static str, message: impl Into<String>) -> Self {
        PipelineError::PermanentConfig {
            system,
            message: message.into(),
        }
    }

    /// Discriminant name for structured logging and metrics, kept stable
    /// independent of the `Display` message.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::TransientIo { .. } => "transient_io",
            PipelineError::PermanentConfig { .. } => "permanent_config",
            PipelineError::BackupPersistFatal { .. } => "backup_persist_fatal",
            PipelineError::RetryExhausted { .. } => "retry_exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_permanent_are_retryable() {
        assert!(PipelineError::transient("blob", "connection reset").is_retryable());
        assert!(PipelineError::permanent_config("warehouse", "unknown table").is_retryable());
    }

    #[test]
    fn fatal_kinds_are_not_retryable() {
        assert!(!PipelineError::BackupPersistFatal {
            message: "disk full".into()
        }
        .is_retryable());
        assert!(!PipelineError::RetryExhausted {
            backup_id: 1,
            max_retries: 3
        }
        .is_retryable());
    }
}
