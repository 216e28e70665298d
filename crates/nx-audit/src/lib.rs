//! # nx-audit
//!
//! Exactly one [`MissionRecord`] per mission, whatever terminal state the
//! mission reached, written to an [`AuditSink`].
//!
//! [`AuditLog`] is the file-backed sink: JSON Lines, one record per line,
//! each record carrying the SHA-256 of the line before it so that inserted,
//! removed or edited lines break [`AuditLog::verify_chain`].
//!
//! ```rust,no_run
//! use nx_audit::{AuditLog, AuditSink, MissionOutcome, MissionRecord};
//! use nx_intent::ActionType;
//! use uuid::Uuid;
//!
//! let log = AuditLog::open("/tmp/audit.jsonl").unwrap();
//! let record = MissionRecord::new(Uuid::new_v4(), ActionType::WriteDispatchLog, MissionOutcome::Executed)
//!     .with_resolved_path("/srv/dispatch/flood.json");
//! log.record(record).unwrap();
//! ```

pub mod error;
pub mod hasher;
pub mod log;
pub mod record;
pub mod sink;

pub use error::AuditError;
pub use log::AuditLog;
pub use record::{MissionOutcome, MissionRecord};
pub use sink::{AuditSink, MemorySink};
