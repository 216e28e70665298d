// report.rs - What the caller gets back from a mission.

use nx_audit::MissionOutcome;
use nx_connector_fs::DispatchRecord;
use nx_intent::ActionType;
use nx_policy::{EvaluationStep, EvaluationTrace, PolicyDecision};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AuthorityExceeded;
use crate::state::{Mission, MissionState};

/// The full account of one mission. Each terminal state leaves a distinct
/// `outcome`, and the fields that explain it are filled in.
#[derive(Debug, Serialize)]
pub struct MissionReport {
    pub mission_id: Uuid,
    pub action_type: ActionType,
    /// The unrecognised action name when `action_type` is `UNKNOWN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_action: Option<String>,
    pub outcome: MissionOutcome,
    /// Every state the mission passed through, `proposed` first.
    pub states: Vec<MissionState>,
    pub decision: PolicyDecision,
    pub steps: Vec<EvaluationStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_error: Option<AuthorityExceeded>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchRecord>,
    /// False when the audit sink refused the mission record.
    pub audit_recorded: bool,
}

impl MissionReport {
    pub(crate) fn new(mission: &Mission, trace: EvaluationTrace) -> Self {
        Self {
            mission_id: mission.mission_id(),
            action_type: mission.action_type(),
            requested_action: None,
            outcome: MissionOutcome::Failed,
            states: Vec::new(),
            decision: trace.decision,
            steps: trace.steps,
            agent: None,
            authority_error: None,
            failure: None,
            dispatch: None,
            audit_recorded: false,
        }
    }

    /// `ACTION_TYPE`, `MEDICAL_BLOCK`, `DIR_SCOPE` or `AUTHORITY_EXCEEDED`.
    pub fn rule_violated(&self) -> Option<&'static str> {
        if let Some(rule) = self.decision.rule_violated() {
            return Some(rule.as_str());
        }
        self.authority_error
            .as_ref()
            .map(|_| AuthorityExceeded::RULE)
    }

    /// A one-line explanation of the outcome.
    pub fn reason(&self) -> String {
        if let Some(failure) = &self.failure {
            return failure.clone();
        }
        if let Some(refusal) = &self.authority_error {
            return refusal.to_string();
        }
        self.decision.reason().to_string()
    }
}
