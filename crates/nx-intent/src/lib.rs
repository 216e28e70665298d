//! # nx-intent
//!
//! The structured, immutable [`Intent`] value the rest of the Nexus pipeline
//! reasons about, plus the boundary that produces it from untrusted input.
//!
//! Upstream collaborators hand over a [`CandidateIntent`] in which every field
//! may be missing or malformed. [`parse_candidate`] turns it into either a
//! valid [`Intent`] or an [`IntentError`]; the policy pipeline only ever sees
//! the former.
//!
//! Two deterministic helpers cover the offline path where no reasoning
//! service is involved:
//!
//! - [`sanitize_report`] cleans a free-text emergency report.
//! - [`extract_candidate`] derives a candidate from that report with plain
//!   token lookups, never a second model call.

pub mod error;
pub mod extract;
pub mod intent;
pub mod sanitize;

pub use error::{IntentError, SanitizeError};
pub use extract::{extract_candidate, tokenize};
pub use intent::{
    parse_candidate, ActionType, CandidateIntent, DisasterCategory, Intent, ParseResult,
};
pub use sanitize::{sanitize_report, MAX_REPORT_LENGTH};
