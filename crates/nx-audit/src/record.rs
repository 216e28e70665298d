// record.rs - The mission record: one per mission, written at its terminal state.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use nx_intent::ActionType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a mission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionOutcome {
    /// Passed the policy check in a check-only mission. Nothing was written.
    Allowed,
    DeniedByPolicy,
    DeniedByAuthority,
    /// The dispatch record was written.
    Executed,
    /// Checks passed but execution did not complete.
    Failed,
}

impl MissionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionOutcome::Allowed => "ALLOWED",
            MissionOutcome::DeniedByPolicy => "DENIED_BY_POLICY",
            MissionOutcome::DeniedByAuthority => "DENIED_BY_AUTHORITY",
            MissionOutcome::Executed => "EXECUTED",
            MissionOutcome::Failed => "FAILED",
        }
    }

    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            MissionOutcome::DeniedByPolicy | MissionOutcome::DeniedByAuthority
        )
    }
}

impl fmt::Display for MissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionRecord {
    pub record_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub mission_id: Uuid,
    pub action_type: ActionType,

    /// The raw action name, kept when it was not a recognised action type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_action: Option<String>,

    pub outcome: MissionOutcome,

    /// Rule tag for denials (`MEDICAL_BLOCK`, `AUTHORITY_EXCEEDED`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_violated: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<PathBuf>,

    /// Which Sub-agent handled the mission, if it got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// SHA-256 of the previous line in the log; `None` for the first record.
    #[serde(default)]
    pub previous_hash: Option<String>,
}

impl MissionRecord {
    pub fn new(mission_id: Uuid, action_type: ActionType, outcome: MissionOutcome) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            mission_id,
            action_type,
            requested_action: None,
            outcome,
            rule_violated: None,
            resolved_path: None,
            agent: None,
            reason: None,
            previous_hash: None,
        }
    }

    pub fn with_requested_action(mut self, action: impl Into<String>) -> Self {
        self.requested_action = Some(action.into());
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule_violated = Some(rule.into());
        self
    }

    pub fn with_resolved_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.resolved_path = Some(path.into());
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
