// error.rs - Configuration errors for the policy subsystem.
//
// Every variant is fatal: a process that cannot build an unambiguous policy
// must refuse to start rather than run with a partial one.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating policy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read policy config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML/YAML for the expected schema.
    #[error("failed to parse policy config at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// The file extension does not name a supported format.
    #[error("unsupported policy config format for {path} (expected .toml, .yaml or .yml)")]
    UnsupportedFormat { path: PathBuf },

    /// A root directory is missing or cannot be canonicalised.
    #[error("root directory {path} is unusable: {source}")]
    RootDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A root directory path exists but is not a directory.
    #[error("root directory {path} is not a directory")]
    RootNotDirectory { path: PathBuf },

    /// An allowlist names an action type the system does not know.
    #[error("unknown action type '{value}' in allowlist")]
    UnknownActionType { value: String },

    /// A keyword cluster has no terms (it would match every text).
    #[error("blocked keyword cluster #{index} is empty")]
    EmptyCluster { index: usize },

    /// A cluster term is not a single alphabetic word.
    #[error("blocked keyword term '{term}' must be a single alphabetic word")]
    InvalidClusterTerm { term: String },

    /// A blocked pattern failed to compile.
    #[error("invalid blocked pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// `max_depth` must allow at least direct children of the root.
    #[error("max_depth must be at least 1, got {value}")]
    InvalidMaxDepth { value: usize },

    /// A file extension in a scope is malformed.
    #[error("invalid file extension '{value}' in scope '{scope}'")]
    InvalidExtension { scope: String, value: String },

    /// No Sub-agent is configured, so nothing could ever execute.
    #[error("at least one sub-agent must be configured")]
    NoSubAgents,

    /// Two Sub-agents share a name.
    #[error("duplicate sub-agent name '{name}'")]
    DuplicateSubAgent { name: String },

    /// A Sub-agent's scope is not contained in the Commander's.
    #[error("sub-agent '{agent}' exceeds the commander's authority on {dimension}")]
    ScopeNotNarrower { agent: String, dimension: String },

    /// A Sub-agent's scope equals the Commander's in every dimension.
    #[error("sub-agent '{agent}' must have strictly narrower authority than the commander")]
    ScopeNotStrictlyNarrower { agent: String },

    /// An allowlisted action type has no Sub-agent able to execute it.
    #[error("allowlisted action type {action_type} is not covered by any sub-agent")]
    UncoveredActionType { action_type: String },
}
