pub mod audit;
pub mod delegate;
pub mod mission;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use nx_audit::{AuditLog, MissionOutcome};
use nx_mission::Commander;
use nx_policy::NexusConfig;

/// Load the config file. Any problem here is fatal.
pub fn load_config(path: &Path) -> anyhow::Result<NexusConfig> {
    NexusConfig::load(path)
        .with_context(|| format!("refusing to start with config {}", path.display()))
}

/// A Commander writing mission records to the configured audit log.
pub fn commander(config: &NexusConfig) -> anyhow::Result<Commander> {
    let audit = AuditLog::open(&config.audit_log)
        .with_context(|| format!("opening audit log {}", config.audit_log.display()))?;
    Ok(Commander::from_config(config, Arc::new(audit))?)
}

/// 0 executed or allowed, 1 denied, 2 failed.
pub fn exit_code(outcome: MissionOutcome) -> ExitCode {
    match outcome {
        MissionOutcome::Executed | MissionOutcome::Allowed => ExitCode::SUCCESS,
        MissionOutcome::DeniedByPolicy | MissionOutcome::DeniedByAuthority => ExitCode::from(1),
        MissionOutcome::Failed => ExitCode::from(2),
    }
}
