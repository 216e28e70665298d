// state.rs - Mission lifecycle.
//
//   Proposed -> PolicyAllowed | DeniedByPolicy
//   PolicyAllowed -> Delegated | Allowed (check-only) | Failed (no route)
//                  | DeniedByAuthority (outside the Commander's own scope)
//   Delegated -> AuthorityAllowed | DeniedByAuthority
//   AuthorityAllowed -> Executed | Failed
//
// No edge skips a check. Terminal states have no outgoing edges.

use std::fmt;

use nx_audit::MissionOutcome;
use nx_intent::ActionType;
use nx_policy::PolicyRule;
use serde::Serialize;
use uuid::Uuid;

use crate::error::MissionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MissionState {
    Proposed,
    PolicyAllowed,
    DeniedByPolicy { rule: PolicyRule },
    /// Terminal state of a check-only mission that passed the Shield.
    Allowed,
    Delegated { agent: String },
    AuthorityAllowed,
    DeniedByAuthority,
    Executed,
    Failed { reason: String },
}

impl fmt::Display for MissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissionState::Proposed => "proposed",
            MissionState::PolicyAllowed => "policy_allowed",
            MissionState::DeniedByPolicy { .. } => "denied_by_policy",
            MissionState::Allowed => "allowed",
            MissionState::Delegated { .. } => "delegated",
            MissionState::AuthorityAllowed => "authority_allowed",
            MissionState::DeniedByAuthority => "denied_by_authority",
            MissionState::Executed => "executed",
            MissionState::Failed { .. } => "failed",
        })
    }
}

impl MissionState {
    pub fn can_transition_to(&self, next: &MissionState) -> bool {
        use MissionState::*;
        matches!(
            (self, next),
            (Proposed, PolicyAllowed)
                | (Proposed, DeniedByPolicy { .. })
                | (PolicyAllowed, Allowed)
                | (PolicyAllowed, Delegated { .. })
                | (PolicyAllowed, Failed { .. })
                | (PolicyAllowed, DeniedByAuthority)
                | (Delegated { .. }, AuthorityAllowed)
                | (Delegated { .. }, DeniedByAuthority)
                | (AuthorityAllowed, Executed)
                | (AuthorityAllowed, Failed { .. })
        )
    }

    /// The audit outcome for a terminal state, `None` while in flight.
    pub fn outcome(&self) -> Option<MissionOutcome> {
        match self {
            MissionState::Allowed => Some(MissionOutcome::Allowed),
            MissionState::DeniedByPolicy { .. } => Some(MissionOutcome::DeniedByPolicy),
            MissionState::DeniedByAuthority => Some(MissionOutcome::DeniedByAuthority),
            MissionState::Executed => Some(MissionOutcome::Executed),
            MissionState::Failed { .. } => Some(MissionOutcome::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }
}

/// One mission in flight: its id, its action and every state it has passed.
#[derive(Debug, Clone, Serialize)]
pub struct Mission {
    mission_id: Uuid,
    action_type: ActionType,
    history: Vec<MissionState>,
}

impl Mission {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            mission_id: Uuid::new_v4(),
            action_type,
            history: vec![MissionState::Proposed],
        }
    }

    pub fn mission_id(&self) -> Uuid {
        self.mission_id
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn state(&self) -> &MissionState {
        // `history` starts non-empty and only grows.
        self.history.last().unwrap_or(&MissionState::Proposed)
    }

    pub fn history(&self) -> &[MissionState] {
        &self.history
    }

    pub fn transition(&mut self, next: MissionState) -> Result<(), MissionError> {
        if !self.state().can_transition_to(&next) {
            return Err(MissionError::InvalidTransition {
                mission_id: self.mission_id,
                from: self.state().to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(
            mission_id = %self.mission_id,
            from = %self.state(),
            to = %next,
            "mission transition"
        );
        self.history.push(next);
        Ok(())
    }

    pub(crate) fn into_history(self) -> Vec<MissionState> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mission() -> Mission {
        Mission::new(ActionType::WriteDispatchLog)
    }

    #[test]
    fn happy_path_reaches_executed() {
        let mut m = mission();
        m.transition(MissionState::PolicyAllowed).unwrap();
        m.transition(MissionState::Delegated { agent: "logistics".into() })
            .unwrap();
        m.transition(MissionState::AuthorityAllowed).unwrap();
        m.transition(MissionState::Executed).unwrap();
        assert_eq!(m.state().outcome(), Some(MissionOutcome::Executed));
        assert_eq!(m.history().len(), 5);
    }

    #[test]
    fn delegation_cannot_skip_policy_check() {
        let mut m = mission();
        let result = m.transition(MissionState::Delegated { agent: "x".into() });
        assert!(matches!(result, Err(MissionError::InvalidTransition { .. })));
    }

    #[test]
    fn execution_cannot_skip_authority_check() {
        let mut m = mission();
        m.transition(MissionState::PolicyAllowed).unwrap();
        m.transition(MissionState::Delegated { agent: "x".into() })
            .unwrap();
        assert!(m.transition(MissionState::Executed).is_err());
    }

    #[test]
    fn commander_can_refuse_before_delegating() {
        let mut m = mission();
        m.transition(MissionState::PolicyAllowed).unwrap();
        m.transition(MissionState::DeniedByAuthority).unwrap();
        assert_eq!(m.state().outcome(), Some(MissionOutcome::DeniedByAuthority));
        assert!(!MissionState::Proposed.can_transition_to(&MissionState::DeniedByAuthority));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let terminals = [
            MissionState::Allowed,
            MissionState::DeniedByPolicy {
                rule: PolicyRule::DirScope,
            },
            MissionState::DeniedByAuthority,
            MissionState::Executed,
            MissionState::Failed { reason: "x".into() },
        ];
        for state in &terminals {
            assert!(state.is_terminal());
            assert!(!state.can_transition_to(&MissionState::PolicyAllowed));
            assert!(!state.can_transition_to(&MissionState::Failed { reason: "y".into() }));
        }
    }

    #[test]
    fn every_terminal_outcome_is_distinct() {
        let outcomes: std::collections::HashSet<_> = [
            MissionState::Allowed,
            MissionState::DeniedByPolicy {
                rule: PolicyRule::ActionType,
            },
            MissionState::DeniedByAuthority,
            MissionState::Executed,
            MissionState::Failed { reason: String::new() },
        ]
        .iter()
        .filter_map(MissionState::outcome)
        .collect();
        assert_eq!(outcomes.len(), 5);
    }

    #[test]
    fn state_serializes_with_tag() {
        let json = serde_json::to_value(MissionState::DeniedByPolicy {
            rule: PolicyRule::MedicalBlock,
        })
        .unwrap();
        assert_eq!(json["state"], "denied_by_policy");
        assert_eq!(json["rule"], "MEDICAL_BLOCK");
    }
}
