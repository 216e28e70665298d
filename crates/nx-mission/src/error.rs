// error.rs - Error types for delegation and the mission lifecycle.

use std::path::PathBuf;

use nx_connector_fs::ExecutionFailure;
use nx_intent::IntentError;
use nx_policy::ContainmentError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// A delegation reaches beyond the scope of the agent asked to carry it out.
///
/// Usually raised by a Sub-agent, no matter what the Commander decided. The
/// Commander raises the same refusals against its own scope before it
/// delegates. Either way the mission ends in `DENIED_BY_AUTHORITY`.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthorityExceeded {
    #[error("sub-agent '{agent}': null byte in filename '{filename}'")]
    NullByte { agent: String, filename: String },

    #[error(
        "sub-agent '{agent}': extension {} of '{filename}' is not in {allowed:?}",
        .extension.as_deref().unwrap_or("(none)")
    )]
    ExtensionNotAllowed {
        agent: String,
        filename: String,
        extension: Option<String>,
        allowed: Vec<String>,
    },

    #[error("sub-agent '{agent}': {error}")]
    OutsideRoot {
        agent: String,
        error: ContainmentError,
    },

    /// The Sub-agent resolved the delegation to a different file than the
    /// one the Shield approved.
    #[error(
        "sub-agent '{agent}': resolved {} but the policy approved {}",
        .resolved.display(),
        .approved.display()
    )]
    PathMismatch {
        agent: String,
        approved: PathBuf,
        resolved: PathBuf,
    },
}

impl AuthorityExceeded {
    pub const RULE: &'static str = "AUTHORITY_EXCEEDED";

    pub fn rule_id(&self) -> &'static str {
        "RULE:AUTHORITY_EXCEEDED"
    }

    /// The delegation field the violation was found in.
    pub fn field(&self) -> &'static str {
        "filename"
    }

    pub fn agent(&self) -> &str {
        match self {
            AuthorityExceeded::NullByte { agent, .. }
            | AuthorityExceeded::ExtensionNotAllowed { agent, .. }
            | AuthorityExceeded::OutsideRoot { agent, .. }
            | AuthorityExceeded::PathMismatch { agent, .. } => agent,
        }
    }
}

/// Why a delegation handed straight to a Sub-agent did not produce a record.
#[derive(Debug, Error)]
pub enum DelegationError {
    #[error(transparent)]
    Authority(#[from] AuthorityExceeded),

    #[error(transparent)]
    Execution(#[from] ExecutionFailure),
}

/// Errors from driving a mission. Denials and execution failures are not
/// errors; they are outcomes on the report.
#[derive(Debug, Error)]
pub enum MissionError {
    /// The candidate could not be turned into an intent. No mission started.
    #[error("invalid candidate intent: {0}")]
    InvalidIntent(#[from] IntentError),

    #[error("invalid transition from {from} to {to} for mission {mission_id}")]
    InvalidTransition {
        mission_id: Uuid,
        from: String,
        to: String,
    },
}
