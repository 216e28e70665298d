// handle.rs - Shared, atomically replaceable policy snapshot.
//
// Missions take an `Arc<PolicyConfig>` snapshot at their start and evaluate
// against it to the end, so a reload never shows a half-updated policy to an
// in-flight mission. A replacement is fully validated before the swap; a
// rejected one leaves the active snapshot untouched.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{NexusConfig, NexusFile, PolicyConfig};
use crate::error::ConfigError;
use crate::scope::{validate_delegation, AuthorityScope};

#[derive(Debug)]
pub struct PolicyHandle {
    current: RwLock<Arc<PolicyConfig>>,
    commander_extensions: BTreeSet<String>,
    sub_agents: Vec<AuthorityScope>,
}

impl PolicyHandle {
    /// Wrap a policy whose delegation invariants already hold against
    /// `sub_agents`.
    pub fn new(
        policy: PolicyConfig,
        commander_extensions: BTreeSet<String>,
        sub_agents: Vec<AuthorityScope>,
    ) -> Self {
        Self {
            current: RwLock::new(Arc::new(policy)),
            commander_extensions,
            sub_agents,
        }
    }

    pub fn from_config(config: &NexusConfig) -> Self {
        Self::new(
            config.policy.clone(),
            config.commander_extensions.clone(),
            config.sub_agents.iter().map(|s| s.scope.clone()).collect(),
        )
    }

    /// The active policy. Cheap: one read lock and an `Arc` clone.
    pub fn snapshot(&self) -> Arc<PolicyConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The Commander's scope under the active policy.
    pub fn commander_scope(&self) -> AuthorityScope {
        AuthorityScope::commander(&self.snapshot(), self.commander_extensions.clone())
    }

    /// Validate `policy` against the configured Sub-agents, then swap it in.
    pub fn replace(&self, policy: PolicyConfig) -> Result<(), ConfigError> {
        let commander = AuthorityScope::commander(&policy, self.commander_extensions.clone());
        validate_delegation(&commander, &self.sub_agents, policy.allowed_action_types())?;

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(policy);
        drop(guard);

        tracing::info!("policy snapshot replaced");
        Ok(())
    }

    /// Re-read the policy section of a config file and swap it in.
    ///
    /// Commander and Sub-agent sections of the file are ignored: scopes are
    /// fixed for the life of the process.
    pub fn reload_from(&self, path: &Path) -> Result<(), ConfigError> {
        let file = NexusFile::read(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let policy = file.policy.compile(base_dir)?;
        self.replace(policy).inspect_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "policy reload rejected");
        })
    }
}
