//! # nx-policy
//!
//! The Shield: a deterministic, rule-based gate every proposed mission passes
//! before anything touches the filesystem.
//!
//! [`evaluate`] runs three ordered phases and stops at the first violation:
//!
//! 1. **Action-type allowlist** (default deny)
//! 2. **Content block**: conjunctive keyword clusters and regex patterns
//! 3. **Directory scope**: canonical containment under the policy root
//!
//! A denial is a normal [`PolicyDecision`] value, never an error. Errors in
//! this crate are configuration errors ([`ConfigError`]), and those are fatal
//! at startup.
//!
//! The crate also owns the pieces the Commander and its Sub-agents share:
//! [`resolve_within`] (the one containment algorithm both sides run
//! independently) and [`AuthorityScope`] (what each role may do).

pub mod config;
pub mod containment;
pub mod engine;
pub mod error;
pub mod handle;
pub mod scope;

pub use config::{
    BlockedPattern, CommanderSettings, KeywordCluster, NexusConfig, NexusFile, PolicyConfig,
    PolicySettings, SubAgentConfig, SubAgentSettings,
};
pub use containment::{resolve_within, ContainmentError, ValidatedPath};
pub use engine::{
    evaluate, evaluate_with_trace, EvaluationStep, EvaluationTrace, PolicyDecision, PolicyRule,
    ViolationDetail,
};
pub use error::ConfigError;
pub use handle::PolicyHandle;
pub use scope::{validate_delegation, AgentRole, AuthorityScope};
