// error.rs - Error types for the intent boundary.

use thiserror::Error;

/// Why an upstream candidate could not become an [`Intent`](crate::Intent).
///
/// Each variant names the offending field so rejections can be logged and
/// asserted on without parsing the message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntentError {
    /// A required field was absent (or null) in the candidate.
    #[error("candidate intent is missing required field '{field}'")]
    MissingField { field: &'static str },

    /// A field was present but empty after trimming.
    #[error("candidate intent field '{field}' is empty")]
    EmptyField { field: &'static str },

    /// The category string is not one of the known disaster categories.
    #[error("unknown disaster category '{value}'")]
    UnknownCategory { value: String },

    /// The payload must be a JSON object; anything else is refused.
    #[error("payload must be a JSON object, got {kind}")]
    PayloadNotObject { kind: &'static str },
}

/// Why a free-text report was refused by the sanitizer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("report is empty")]
    Empty,

    #[error("report matched a prompt-injection pattern: '{matched}'")]
    InjectionDetected { matched: String },

    /// A built-in pattern could not be compiled, so no report can be scanned.
    #[error("sanitizer pattern unavailable: {reason}")]
    PatternUnavailable { reason: String },
}
