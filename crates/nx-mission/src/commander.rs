// commander.rs - The broad-authority role that drives a mission end to end.
//
// run_mission():
//   1. Snapshot the policy and run the Shield
//   2. On deny: stop, nothing is delegated
//   3. Check the target's extension against the Commander's own scope
//   4. Route to the first Sub-agent that handles the action type
//   5. Hand it a Delegation (payload + filename relative to the Sub-agent's
//      root, which must contain the Shield-approved path)
//   6. The Sub-agent authorizes on its own terms; the path it resolves must be
//      the one the Shield approved, then it executes
//   7. Emit exactly one audit record for whichever terminal state was reached
//
// Steps 3, 5 and 6 all end in DENIED_BY_AUTHORITY. A refusal from the
// Commander's own scope names agent "commander" in its authority error.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use nx_audit::{AuditSink, MissionOutcome, MissionRecord};
use nx_intent::{parse_candidate, CandidateIntent, Intent};
use nx_policy::{
    evaluate_with_trace, validate_delegation, AuthorityScope, ConfigError, ContainmentError,
    NexusConfig, PolicyConfig, PolicyHandle, ValidatedPath,
};

use crate::delegation::Delegation;
use crate::error::{AuthorityExceeded, MissionError};
use crate::report::MissionReport;
use crate::state::{Mission, MissionState};
use crate::sub_agent::{check_extension, SubAgent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Execute,
    CheckOnly,
}

pub struct Commander {
    policy: PolicyHandle,
    sub_agents: Vec<SubAgent>,
    audit: Arc<dyn AuditSink>,
}

impl Commander {
    /// Build a Commander, refusing any Sub-agent set that breaks the
    /// delegation invariants.
    pub fn new(
        policy: PolicyConfig,
        commander_extensions: BTreeSet<String>,
        sub_agents: Vec<SubAgent>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        let scopes: Vec<AuthorityScope> = sub_agents.iter().map(|a| a.scope().clone()).collect();
        let commander = AuthorityScope::commander(&policy, commander_extensions.clone());
        validate_delegation(&commander, &scopes, policy.allowed_action_types())?;

        Ok(Self {
            policy: PolicyHandle::new(policy, commander_extensions, scopes),
            sub_agents,
            audit,
        })
    }

    /// Build from a loaded config, with filesystem Sub-agents.
    pub fn from_config(
        config: &NexusConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        let sub_agents = config.sub_agents.iter().map(SubAgent::from_config).collect();
        Self::new(
            config.policy.clone(),
            config.commander_extensions.clone(),
            sub_agents,
            audit,
        )
    }

    pub fn policy(&self) -> &PolicyHandle {
        &self.policy
    }

    pub fn scope(&self) -> AuthorityScope {
        self.policy.commander_scope()
    }

    pub fn sub_agents(&self) -> &[SubAgent] {
        &self.sub_agents
    }

    pub fn sub_agent(&self, name: &str) -> Option<&SubAgent> {
        self.sub_agents.iter().find(|a| a.name() == name)
    }

    /// Swap in the policy section of `path`. In-flight missions keep the
    /// snapshot they started with.
    pub fn reload_policy(&self, path: &Path) -> Result<(), ConfigError> {
        self.policy.reload_from(path)
    }

    /// Run a full mission: policy, delegation, authority, execution.
    pub fn run_mission(&self, intent: &Intent) -> Result<MissionReport, MissionError> {
        self.drive(intent, Mode::Execute)
    }

    /// Run only the policy phase. Ends in `ALLOWED` or `DENIED_BY_POLICY`.
    pub fn check(&self, intent: &Intent) -> Result<MissionReport, MissionError> {
        self.drive(intent, Mode::CheckOnly)
    }

    /// Parse an untrusted candidate and run it. A malformed candidate never
    /// becomes a mission.
    pub fn run_candidate(
        &self,
        candidate: CandidateIntent,
    ) -> Result<MissionReport, MissionError> {
        let intent = parse_candidate(candidate).inspect_err(|e| {
            tracing::warn!(error = %e, "candidate rejected before the pipeline");
        })?;
        self.run_mission(&intent)
    }

    fn route(&self, intent: &Intent) -> Option<&SubAgent> {
        self.sub_agents
            .iter()
            .find(|agent| agent.handles(intent.action_type()))
    }

    fn drive(&self, intent: &Intent, mode: Mode) -> Result<MissionReport, MissionError> {
        let mut mission = Mission::new(intent.action_type());
        let span = tracing::info_span!(
            "mission",
            mission_id = %mission.mission_id(),
            action_type = %intent.action_type()
        );
        let _guard = span.enter();

        let policy = self.policy.snapshot();
        let trace = evaluate_with_trace(intent, &policy);
        let mut report = MissionReport::new(&mission, trace);
        if intent.requested_action() != intent.action_type().as_str() {
            report.requested_action = Some(intent.requested_action().to_string());
        }

        if let Some(rule) = report.decision.rule_violated() {
            mission.transition(MissionState::DeniedByPolicy { rule })?;
            return Ok(self.finish(mission, report));
        }
        mission.transition(MissionState::PolicyAllowed)?;

        if mode == Mode::CheckOnly {
            mission.transition(MissionState::Allowed)?;
            return Ok(self.finish(mission, report));
        }

        // The Commander's own scope: the Shield covers root and action type,
        // the file extension is checked here.
        let commander = self.policy.commander_scope();
        if let Err(refusal) = check_extension(&commander, intent.target_path()) {
            report.authority_error = Some(refusal);
            mission.transition(MissionState::DeniedByAuthority)?;
            return Ok(self.finish(mission, report));
        }

        let Some(agent) = self.route(intent) else {
            let reason = format!("no sub-agent handles {}", intent.action_type());
            report.failure = Some(reason.clone());
            mission.transition(MissionState::Failed { reason })?;
            return Ok(self.finish(mission, report));
        };
        report.agent = Some(agent.name().to_string());
        mission.transition(MissionState::Delegated {
            agent: agent.name().to_string(),
        })?;

        let approved = report.decision.resolved_path().cloned();
        let filename = match &approved {
            Some(path) => match delegated_filename(agent, path, intent) {
                Ok(filename) => filename,
                Err(refusal) => {
                    report.authority_error = Some(refusal);
                    mission.transition(MissionState::DeniedByAuthority)?;
                    return Ok(self.finish(mission, report));
                }
            },
            None => intent.target_path().to_string(),
        };
        let delegation = Delegation::new(filename, intent.payload().clone());

        let authorized = match agent.authorize(delegation) {
            Ok(authorized) => authorized,
            Err(refusal) => {
                report.authority_error = Some(refusal);
                mission.transition(MissionState::DeniedByAuthority)?;
                return Ok(self.finish(mission, report));
            }
        };

        // Only the file the Shield evaluated may be written.
        if let Some(approved) = approved.filter(|p| p.as_path() != authorized.path().as_path()) {
            report.authority_error = Some(AuthorityExceeded::PathMismatch {
                agent: agent.name().to_string(),
                approved: approved.as_path().to_path_buf(),
                resolved: authorized.path().as_path().to_path_buf(),
            });
            mission.transition(MissionState::DeniedByAuthority)?;
            return Ok(self.finish(mission, report));
        }
        mission.transition(MissionState::AuthorityAllowed)?;

        match authorized.execute() {
            Ok(record) => {
                report.dispatch = Some(record);
                mission.transition(MissionState::Executed)?;
            }
            Err(failure) => {
                let reason = failure.to_string();
                report.failure = Some(reason.clone());
                mission.transition(MissionState::Failed { reason })?;
            }
        }
        Ok(self.finish(mission, report))
    }

    /// Record the terminal state exactly once and seal the report.
    fn finish(&self, mission: Mission, mut report: MissionReport) -> MissionReport {
        let outcome = mission
            .state()
            .outcome()
            .unwrap_or(MissionOutcome::Failed);
        let record = self.audit_record(&mission, &report, outcome);

        report.outcome = outcome;
        report.audit_recorded = match self.audit.record(record) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "mission record could not be written");
                false
            }
        };
        report.states = mission.into_history();

        match outcome {
            MissionOutcome::Executed | MissionOutcome::Allowed => {
                tracing::info!(outcome = %outcome, "mission finished")
            }
            _ => tracing::warn!(
                outcome = %outcome,
                rule = report.rule_violated().unwrap_or("-"),
                reason = %report.reason(),
                "mission finished"
            ),
        }
        report
    }

    fn audit_record(
        &self,
        mission: &Mission,
        report: &MissionReport,
        outcome: MissionOutcome,
    ) -> MissionRecord {
        let mut record = MissionRecord::new(mission.mission_id(), mission.action_type(), outcome);
        if let Some(requested) = &report.requested_action {
            record = record.with_requested_action(requested.clone());
        }
        if let Some(rule) = report.rule_violated() {
            record = record.with_rule(rule);
        }
        let resolved = match &report.dispatch {
            Some(dispatch) => Some(dispatch.resolved_path.clone()),
            None => report
                .decision
                .resolved_path()
                .map(|p| p.as_path().to_path_buf()),
        };
        if let Some(path) = resolved {
            record = record.with_resolved_path(path);
        }
        if let Some(agent) = &report.agent {
            record = record.with_agent(agent.clone());
        }
        if outcome != MissionOutcome::Executed && outcome != MissionOutcome::Allowed {
            record = record.with_reason(report.reason());
        }
        record
    }
}

/// The Shield-approved path, expressed relative to the Sub-agent's own root.
///
/// A Sub-agent whose root is nested below the policy root can only take
/// paths inside that subdirectory. Anything else is refused here rather than
/// re-resolved somewhere the Shield never looked.
fn delegated_filename(
    agent: &SubAgent,
    approved: &ValidatedPath,
    intent: &Intent,
) -> Result<String, AuthorityExceeded> {
    let root = agent.scope().root_directory();
    match approved.as_path().strip_prefix(root) {
        Ok(relative) => Ok(relative.to_string_lossy().into_owned()),
        Err(_) => Err(AuthorityExceeded::OutsideRoot {
            agent: agent.name().to_string(),
            error: ContainmentError::Escapes {
                candidate: intent.target_path().to_string(),
                resolved: approved.as_path().to_path_buf(),
                root: root.to_path_buf(),
            },
        }),
    }
}

impl std::fmt::Debug for Commander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commander")
            .field("policy", &self.policy)
            .field("sub_agents", &self.sub_agents)
            .finish_non_exhaustive()
    }
}
