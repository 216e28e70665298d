// scope.rs - Authority scopes and the startup delegation check.
//
// Each role holds an immutable AuthorityScope: a root directory, a set of file
// extensions and a set of action types. The Commander's scope must contain
// every Sub-agent's scope and be strictly broader than each. That is checked
// once, when the config is compiled, never per request.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use nx_intent::ActionType;
use serde::Serialize;

use crate::config::PolicyConfig;
use crate::containment::{resolve_within, ContainmentError, ValidatedPath};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Commander,
    SubAgent,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AgentRole::Commander => "commander",
            AgentRole::SubAgent => "sub_agent",
        })
    }
}

/// What one agent may touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorityScope {
    name: String,
    role: AgentRole,
    root_directory: PathBuf,
    allowed_extensions: BTreeSet<String>,
    allowed_action_types: BTreeSet<ActionType>,
}

impl AuthorityScope {
    /// `root_directory` must already be canonical; extensions must already be
    /// normalised (see [`normalize_extensions`]).
    pub fn new(
        role: AgentRole,
        name: impl Into<String>,
        root_directory: PathBuf,
        allowed_extensions: BTreeSet<String>,
        allowed_action_types: BTreeSet<ActionType>,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            root_directory,
            allowed_extensions,
            allowed_action_types,
        }
    }

    /// The Commander's scope: the policy's root and allowlist plus `extensions`.
    pub fn commander(policy: &PolicyConfig, extensions: BTreeSet<String>) -> Self {
        Self::new(
            AgentRole::Commander,
            "commander",
            policy.root_directory().to_path_buf(),
            extensions,
            policy.allowed_action_types().clone(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn allowed_extensions(&self) -> &BTreeSet<String> {
        &self.allowed_extensions
    }

    pub fn allowed_action_types(&self) -> &BTreeSet<ActionType> {
        &self.allowed_action_types
    }

    /// Case-insensitive; a leading dot is ignored.
    pub fn permits_extension(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.allowed_extensions.contains(&ext)
    }

    pub fn permits_action(&self, action_type: ActionType) -> bool {
        self.allowed_action_types.contains(&action_type)
    }

    /// Run the shared containment check against this scope's root.
    pub fn resolve(&self, candidate: &str) -> Result<ValidatedPath, ContainmentError> {
        resolve_within(&self.root_directory, candidate)
    }

    /// The first dimension in which `other` reaches beyond this scope.
    pub fn exceeded_dimension(&self, other: &AuthorityScope) -> Option<&'static str> {
        if !other.root_directory.starts_with(&self.root_directory) {
            Some("root_directory")
        } else if !other.allowed_extensions.is_subset(&self.allowed_extensions) {
            Some("allowed_extensions")
        } else if !other.allowed_action_types.is_subset(&self.allowed_action_types) {
            Some("allowed_action_types")
        } else {
            None
        }
    }

    pub fn contains(&self, other: &AuthorityScope) -> bool {
        self.exceeded_dimension(other).is_none()
    }

    /// Contains `other` and is larger in at least one dimension.
    pub fn is_strictly_broader_than(&self, other: &AuthorityScope) -> bool {
        self.contains(other)
            && (self.root_directory != other.root_directory
                || self.allowed_extensions.len() > other.allowed_extensions.len()
                || self.allowed_action_types.len() > other.allowed_action_types.len())
    }
}

/// Lower-case, strip a leading dot, and reject anything that is not a plain
/// alphanumeric extension.
pub fn normalize_extensions(scope: &str, raw: &[String]) -> Result<BTreeSet<String>, ConfigError> {
    raw.iter()
        .map(|value| {
            let ext = value.trim().trim_start_matches('.').to_ascii_lowercase();
            if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                Err(ConfigError::InvalidExtension {
                    scope: scope.to_string(),
                    value: value.clone(),
                })
            } else {
                Ok(ext)
            }
        })
        .collect()
}

/// Check the delegation invariants between the Commander and its Sub-agents.
///
/// - at least one Sub-agent exists
/// - the Commander contains every Sub-agent and is strictly broader than each
/// - every allowlisted action type can be executed by some Sub-agent
pub fn validate_delegation(
    commander: &AuthorityScope,
    sub_agents: &[AuthorityScope],
    allowlist: &BTreeSet<ActionType>,
) -> Result<(), ConfigError> {
    if sub_agents.is_empty() {
        return Err(ConfigError::NoSubAgents);
    }

    for sub in sub_agents {
        if let Some(dimension) = commander.exceeded_dimension(sub) {
            return Err(ConfigError::ScopeNotNarrower {
                agent: sub.name.clone(),
                dimension: dimension.to_string(),
            });
        }
        if !commander.is_strictly_broader_than(sub) {
            return Err(ConfigError::ScopeNotStrictlyNarrower {
                agent: sub.name.clone(),
            });
        }
    }

    if let Some(uncovered) = allowlist
        .iter()
        .find(|action| !sub_agents.iter().any(|s| s.permits_action(**action)))
    {
        return Err(ConfigError::UncoveredActionType {
            action_type: uncovered.to_string(),
        });
    }

    tracing::debug!(sub_agents = sub_agents.len(), "delegation scopes validated");
    Ok(())
}
