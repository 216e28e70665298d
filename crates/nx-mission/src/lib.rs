//! # nx-mission
//!
//! Bounded delegation between a broad-authority [`Commander`] and
//! narrow-authority [`SubAgent`]s.
//!
//! The Commander runs every intent through the Shield. On an allow it hands a
//! Sub-agent a [`Delegation`] holding nothing but the payload and a filename.
//! The Sub-agent then checks that delegation against its own, narrower
//! [`AuthorityScope`](nx_policy::AuthorityScope) before it writes anything.
//! Passing the Commander's check never stands in for the Sub-agent's.
//!
//! Each mission walks the [`MissionState`] machine and ends in exactly one
//! terminal state. Exactly one audit record is emitted for it.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use nx_audit::AuditLog;
//! use nx_intent::CandidateIntent;
//! use nx_mission::Commander;
//! use nx_policy::NexusConfig;
//!
//! let config = NexusConfig::load(Path::new("nexus.toml")).unwrap();
//! let audit = Arc::new(AuditLog::open(&config.audit_log).unwrap());
//! let commander = Commander::from_config(&config, audit).unwrap();
//! let report = commander
//!     .run_candidate(
//!         CandidateIntent::new("WRITE_DISPATCH_LOG", "flood_dispatch.json")
//!             .with_justification("500 water units, 200 rescue boats"),
//!     )
//!     .unwrap();
//! println!("{}", report.outcome);
//! ```

pub mod commander;
pub mod delegation;
pub mod error;
pub mod report;
pub mod state;
pub mod sub_agent;

pub use commander::Commander;
pub use delegation::Delegation;
pub use error::{AuthorityExceeded, DelegationError, MissionError};
pub use report::MissionReport;
pub use state::{Mission, MissionState};
pub use sub_agent::{Authorized, SubAgent};
