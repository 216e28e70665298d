// delegate.rs - Hand a delegation straight to a Sub-agent, no Commander.
//
// The Sub-agent's own checks are all that stand between the payload and the
// filesystem here, which is the point of the command.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use nx_mission::{Delegation, DelegationError, SubAgent};
use nx_policy::NexusConfig;
use serde_json::Value;

pub fn execute(
    config: &NexusConfig,
    agent: &str,
    filename: &str,
    payload_path: &Path,
) -> anyhow::Result<ExitCode> {
    let Some(agent_config) = config.sub_agents.iter().find(|a| a.scope.name() == agent) else {
        bail!("no sub-agent named '{agent}' in config");
    };
    let sub_agent = SubAgent::from_config(agent_config);

    let raw = fs::read_to_string(payload_path)
        .with_context(|| format!("reading payload {}", payload_path.display()))?;
    let payload = match serde_json::from_str::<Value>(&raw)? {
        Value::Object(map) => map,
        _ => bail!("payload in {} must be a JSON object", payload_path.display()),
    };

    match sub_agent.handle(Delegation::new(filename, payload)) {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(DelegationError::Authority(refusal)) => {
            println!("DENIED_BY_AUTHORITY ({}): {refusal}", refusal.rule_id());
            Ok(ExitCode::from(1))
        }
        Err(DelegationError::Execution(failure)) => {
            println!("FAILED: {failure}");
            Ok(ExitCode::from(2))
        }
    }
}
