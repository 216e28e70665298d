// error.rs - Error types for the audit subsystem.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// The log file could not be opened or created.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to append mission record: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// A line is not a valid mission record.
    #[error("malformed audit record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The hash chain is broken: a line was inserted, removed or edited.
    #[error("integrity check failed at line {line}: expected previous hash {expected}, found {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },

    /// The sink refused the record for a reason of its own.
    #[error("audit sink unavailable: {reason}")]
    Unavailable { reason: String },
}
