// sub_agent.rs - A narrow-authority executor.
//
// A Sub-agent sees only the Delegation. Before anything is written it runs
// its own checks against its own scope, in this order:
//
// 1. No NUL byte in the filename
// 2. Extension in its allowed set (case-insensitive)
// 3. Containment under its own root (the shared algorithm, re-run here)
//
// Whether the Commander approved the mission plays no part.

use std::path::Path;
use std::sync::Arc;

use nx_connector_fs::{DispatchRecord, DispatchSink, ExecutionFailure, FsDispatchSink};
use nx_intent::ActionType;
use nx_policy::{AuthorityScope, SubAgentConfig, ValidatedPath};

use crate::delegation::Delegation;
use crate::error::{AuthorityExceeded, DelegationError};

pub struct SubAgent {
    scope: AuthorityScope,
    sink: Arc<dyn DispatchSink>,
}

impl std::fmt::Debug for SubAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubAgent")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl SubAgent {
    pub fn new(scope: AuthorityScope, sink: Arc<dyn DispatchSink>) -> Self {
        Self { scope, sink }
    }

    /// A Sub-agent writing through [`FsDispatchSink`].
    pub fn from_config(config: &SubAgentConfig) -> Self {
        let sink = FsDispatchSink::new().with_overwrite(config.overwrite);
        Self::new(config.scope.clone(), Arc::new(sink))
    }

    pub fn name(&self) -> &str {
        self.scope.name()
    }

    pub fn scope(&self) -> &AuthorityScope {
        &self.scope
    }

    pub fn handles(&self, action_type: ActionType) -> bool {
        self.scope.permits_action(action_type)
    }

    /// Run this agent's own checks on a delegation.
    pub fn authorize(&self, delegation: Delegation) -> Result<Authorized<'_>, AuthorityExceeded> {
        let filename = delegation.filename();

        if filename.contains('\0') {
            return Err(AuthorityExceeded::NullByte {
                agent: self.name().to_string(),
                filename: filename.escape_default().to_string(),
            });
        }

        check_extension(&self.scope, filename)?;

        let path = self
            .scope
            .resolve(filename)
            .map_err(|error| AuthorityExceeded::OutsideRoot {
                agent: self.name().to_string(),
                error,
            })?;

        tracing::debug!(
            agent = self.name(),
            path = %path.as_path().display(),
            "delegation authorized"
        );
        Ok(Authorized {
            agent: self,
            path,
            delegation,
        })
    }

    /// Authorize and execute in one call. This is the entry point for a
    /// delegation arriving without a Commander.
    pub fn handle(&self, delegation: Delegation) -> Result<DispatchRecord, DelegationError> {
        let authorized = self.authorize(delegation).inspect_err(|e| {
            tracing::warn!(
                agent = self.name(),
                rule = e.rule_id(),
                error = %e,
                "delegation refused"
            );
        })?;
        Ok(authorized.execute()?)
    }
}

/// Refuse `filename` unless its extension is in `scope`. Case-insensitive;
/// a name with no extension is refused.
pub(crate) fn check_extension(
    scope: &AuthorityScope,
    filename: &str,
) -> Result<(), AuthorityExceeded> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if extension
        .as_deref()
        .is_some_and(|ext| scope.permits_extension(ext))
    {
        return Ok(());
    }
    Err(AuthorityExceeded::ExtensionNotAllowed {
        agent: scope.name().to_string(),
        filename: filename.to_string(),
        extension,
        allowed: scope.allowed_extensions().iter().cloned().collect(),
    })
}

/// A delegation that passed a Sub-agent's checks. Only [`SubAgent::authorize`]
/// creates one, so execution cannot be reached without them.
#[derive(Debug)]
pub struct Authorized<'a> {
    agent: &'a SubAgent,
    path: ValidatedPath,
    delegation: Delegation,
}

impl Authorized<'_> {
    pub fn path(&self) -> &ValidatedPath {
        &self.path
    }

    pub fn execute(self) -> Result<DispatchRecord, ExecutionFailure> {
        self.agent
            .sink
            .write(&self.path, self.delegation.into_payload())
    }
}
