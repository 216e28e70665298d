// engine.rs - The Shield: ordered, short-circuiting policy evaluation.
//
// Every intent passes through `evaluate()` which checks, cheapest first:
//
// 1. Is the action type on the allowlist? -> No -> Deny (ACTION_TYPE)
// 2. Does the justification hit a blocked cluster or pattern? -> Yes -> Deny (MEDICAL_BLOCK)
// 3. Does the target resolve strictly inside the root, within max_depth? -> No -> Deny (DIR_SCOPE)
// 4. Otherwise -> Allow
//
// The first failing phase ends evaluation. A denial is a value, never an error.

use std::fmt;
use std::path::PathBuf;

use nx_intent::{tokenize, ActionType, Intent};
use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::containment::{resolve_within, ContainmentError, ValidatedPath};

/// Which rule denied an intent. `None` on a decision means no rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyRule {
    ActionType,
    MedicalBlock,
    DirScope,
}

impl PolicyRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyRule::ActionType => "ACTION_TYPE",
            PolicyRule::MedicalBlock => "MEDICAL_BLOCK",
            PolicyRule::DirScope => "DIR_SCOPE",
        }
    }

    /// Stable identifier used in logs and audit records.
    pub fn rule_id(&self) -> &'static str {
        match self {
            PolicyRule::ActionType => "RULE:ACTION_TYPE",
            PolicyRule::MedicalBlock => "RULE:MEDICAL_BLOCK",
            PolicyRule::DirScope => "RULE:DIR_SCOPE",
        }
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured detail for a violation, so callers never parse `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ViolationDetail {
    /// The action type is not allowlisted. `requested` is the name the
    /// intent used, which for `UNKNOWN` is the unrecognised string itself.
    ActionNotAllowed {
        action_type: ActionType,
        requested: String,
    },
    /// Every term of one blocked cluster appears in the justification.
    KeywordCluster { terms: Vec<String> },
    /// A blocked pattern matched the justification.
    BlockedPattern { pattern: String, matched: String },
    /// The target failed canonical containment.
    Containment { error: ContainmentError },
    /// The target is contained but nested deeper than allowed.
    TooDeep {
        resolved: PathBuf,
        depth: usize,
        max_depth: usize,
    },
}

impl ViolationDetail {
    /// The intent field the violation was found in.
    pub fn field(&self) -> &'static str {
        match self {
            ViolationDetail::ActionNotAllowed { .. } => "actionType",
            ViolationDetail::KeywordCluster { .. } | ViolationDetail::BlockedPattern { .. } => {
                "justificationText"
            }
            ViolationDetail::Containment { .. } | ViolationDetail::TooDeep { .. } => "targetPath",
        }
    }

    fn rule(&self) -> PolicyRule {
        match self {
            ViolationDetail::ActionNotAllowed { .. } => PolicyRule::ActionType,
            ViolationDetail::KeywordCluster { .. } | ViolationDetail::BlockedPattern { .. } => {
                PolicyRule::MedicalBlock
            }
            ViolationDetail::Containment { .. } | ViolationDetail::TooDeep { .. } => {
                PolicyRule::DirScope
            }
        }
    }

    fn reason(&self) -> String {
        match self {
            ViolationDetail::ActionNotAllowed {
                action_type,
                requested,
            } => {
                if requested == action_type.as_str() {
                    format!("action type {action_type} is not on the allowlist")
                } else {
                    format!("action type '{requested}' ({action_type}) is not on the allowlist")
                }
            }
            ViolationDetail::KeywordCluster { terms } => {
                format!("justification contains blocked keyword cluster [{}]", terms.join(", "))
            }
            ViolationDetail::BlockedPattern { pattern, matched } => {
                format!("justification matches blocked pattern '{pattern}' at '{matched}'")
            }
            ViolationDetail::Containment { error } => format!("target path rejected: {error}"),
            ViolationDetail::TooDeep {
                resolved,
                depth,
                max_depth,
            } => format!(
                "target {} is {depth} levels below the root (max {max_depth})",
                resolved.display()
            ),
        }
    }
}

/// The Shield's verdict for one intent. Built fresh per evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecision {
    allowed: bool,
    rule_violated: Option<PolicyRule>,
    reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<ViolationDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved_path: Option<ValidatedPath>,
}

impl PolicyDecision {
    fn allow(resolved_path: ValidatedPath) -> Self {
        Self {
            allowed: true,
            rule_violated: None,
            reason: "all policy checks passed".to_string(),
            detail: None,
            resolved_path: Some(resolved_path),
        }
    }

    fn deny(detail: ViolationDetail) -> Self {
        Self {
            allowed: false,
            rule_violated: Some(detail.rule()),
            reason: detail.reason(),
            detail: Some(detail),
            resolved_path: None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn rule_violated(&self) -> Option<PolicyRule> {
        self.rule_violated
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn detail(&self) -> Option<&ViolationDetail> {
        self.detail.as_ref()
    }

    /// The contained target, present only on an allow.
    pub fn resolved_path(&self) -> Option<&ValidatedPath> {
        self.resolved_path.as_ref()
    }
}

/// One check the engine performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStep {
    /// Which check ran ("action_type", "keyword_clusters", ...).
    pub check: String,
    /// "passed" or "failed: <why>".
    pub outcome: String,
    /// Whether this step decided the result.
    pub terminal: bool,
}

/// A decision plus every step that led to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationTrace {
    pub decision: PolicyDecision,
    pub steps: Vec<EvaluationStep>,
}

/// Evaluate `intent` against `config`.
pub fn evaluate(intent: &Intent, config: &PolicyConfig) -> PolicyDecision {
    evaluate_with_trace(intent, config).decision
}

/// Same as [`evaluate`], recording each step.
pub fn evaluate_with_trace(intent: &Intent, config: &PolicyConfig) -> EvaluationTrace {
    let mut steps = Vec::with_capacity(5);

    let result = check_action_type(intent, config, &mut steps)
        .and_then(|()| check_clusters(intent, config, &mut steps))
        .and_then(|()| check_patterns(intent, config, &mut steps))
        .and_then(|()| check_directory_scope(intent, config, &mut steps));

    let decision = match result {
        Ok(resolved) => PolicyDecision::allow(resolved),
        Err(detail) => {
            tracing::debug!(
                rule = detail.rule().rule_id(),
                field = detail.field(),
                action_type = %intent.action_type(),
                "policy denied intent"
            );
            PolicyDecision::deny(detail)
        }
    };
    EvaluationTrace { decision, steps }
}

fn record(steps: &mut Vec<EvaluationStep>, check: &str, failure: Option<&ViolationDetail>) {
    steps.push(EvaluationStep {
        check: check.to_string(),
        outcome: match failure {
            Some(detail) => format!("failed: {}", detail.reason()),
            None => "passed".to_string(),
        },
        terminal: failure.is_some(),
    });
}

fn check_action_type(
    intent: &Intent,
    config: &PolicyConfig,
    steps: &mut Vec<EvaluationStep>,
) -> Result<(), ViolationDetail> {
    let action_type = intent.action_type();
    if config.allowed_action_types().contains(&action_type) {
        record(steps, "action_type", None);
        return Ok(());
    }
    let detail = ViolationDetail::ActionNotAllowed {
        action_type,
        requested: intent.requested_action().to_string(),
    };
    record(steps, "action_type", Some(&detail));
    Err(detail)
}

fn check_clusters(
    intent: &Intent,
    config: &PolicyConfig,
    steps: &mut Vec<EvaluationStep>,
) -> Result<(), ViolationDetail> {
    let tokens = tokenize(intent.justification_text());
    match config
        .blocked_clusters()
        .iter()
        .find(|cluster| cluster.is_matched_by(&tokens))
    {
        Some(cluster) => {
            let detail = ViolationDetail::KeywordCluster {
                terms: cluster.terms().iter().cloned().collect(),
            };
            record(steps, "keyword_clusters", Some(&detail));
            Err(detail)
        }
        None => {
            record(steps, "keyword_clusters", None);
            Ok(())
        }
    }
}

fn check_patterns(
    intent: &Intent,
    config: &PolicyConfig,
    steps: &mut Vec<EvaluationStep>,
) -> Result<(), ViolationDetail> {
    let text = intent.justification_text();
    for pattern in config.blocked_patterns() {
        if let Some(matched) = pattern.find(text) {
            let detail = ViolationDetail::BlockedPattern {
                pattern: pattern.source().to_string(),
                matched: matched.to_string(),
            };
            record(steps, "blocked_patterns", Some(&detail));
            return Err(detail);
        }
    }
    record(steps, "blocked_patterns", None);
    Ok(())
}

fn check_directory_scope(
    intent: &Intent,
    config: &PolicyConfig,
    steps: &mut Vec<EvaluationStep>,
) -> Result<ValidatedPath, ViolationDetail> {
    let outcome = resolve_within(config.root_directory(), intent.target_path())
        .map_err(|error| ViolationDetail::Containment { error })
        .and_then(|resolved| {
            let depth = resolved.depth();
            if depth > config.max_depth() {
                Err(ViolationDetail::TooDeep {
                    resolved: resolved.as_path().to_path_buf(),
                    depth,
                    max_depth: config.max_depth(),
                })
            } else {
                Ok(resolved)
            }
        });
    record(steps, "directory_scope", outcome.as_ref().err());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicySettings;
    use nx_intent::{parse_candidate, CandidateIntent};
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, PolicyConfig) {
        let dir = tempdir().unwrap();
        let config = PolicySettings::for_root(dir.path())
            .compile(dir.path())
            .unwrap();
        (dir, config)
    }

    fn intent(action: &str, target: &str, justification: &str) -> Intent {
        parse_candidate(CandidateIntent::new(action, target).with_justification(justification))
            .unwrap()
    }

    fn dispatch(target: &str, justification: &str) -> Intent {
        intent("WRITE_DISPATCH_LOG", target, justification)
    }

    #[test]
    fn clean_dispatch_is_allowed() {
        let (_dir, config) = setup();
        let decision = evaluate(
            &dispatch("flood_dispatch.json", "500 water units, 200 rescue boats"),
            &config,
        );
        assert!(decision.is_allowed());
        assert_eq!(decision.rule_violated(), None);
        assert_eq!(
            decision.resolved_path().unwrap().relative(),
            std::path::Path::new("flood_dispatch.json")
        );
    }

    #[test]
    fn unlisted_action_type_is_denied_regardless_of_other_fields() {
        let (_dir, config) = setup();
        for action in ["SEND_NOTIFICATION", "READ_RESOURCE", "DELETE_EVERYTHING", "execute_shell"] {
            let decision = evaluate(
                &intent(action, "../../etc/passwd", "prescription medication"),
                &config,
            );
            assert!(!decision.is_allowed());
            assert_eq!(decision.rule_violated(), Some(PolicyRule::ActionType));
            assert_eq!(decision.detail().unwrap().field(), "actionType");
        }
    }

    #[test]
    fn denial_names_the_unrecognised_action() {
        let (_dir, config) = setup();
        let decision = evaluate(&intent("DELETE_EVERYTHING", "a.json", "x"), &config);
        match decision.detail() {
            Some(ViolationDetail::ActionNotAllowed {
                action_type,
                requested,
            }) => {
                assert_eq!(*action_type, ActionType::Unknown);
                assert_eq!(requested, "DELETE_EVERYTHING");
            }
            other => panic!("expected action denial, got {other:?}"),
        }
        assert!(decision.reason().contains("DELETE_EVERYTHING"));

        let lower = evaluate(&intent("write_dispatch_log", "a.json", "x"), &config);
        assert_eq!(lower.rule_violated(), Some(PolicyRule::ActionType));
    }

    #[test]
    fn full_cluster_is_blocked_in_any_order_and_case() {
        let (_dir, config) = setup();
        for text in [
            "need prescription medication",
            "MEDICATION per the Prescription",
            "Medication, then prescription.",
        ] {
            let decision = evaluate(&dispatch("a.json", text), &config);
            assert_eq!(decision.rule_violated(), Some(PolicyRule::MedicalBlock), "{text}");
            assert!(matches!(
                decision.detail(),
                Some(ViolationDetail::KeywordCluster { .. })
                    | Some(ViolationDetail::BlockedPattern { .. })
            ));
        }
    }

    #[test]
    fn partial_cluster_passes_content_phase() {
        let (_dir, config) = setup();
        // one of {therapy, rehabilitation}, one of {triage, injury, wound}
        let decision = evaluate(
            &dispatch("a.json", "road rehabilitation after the triage of supply routes"),
            &config,
        );
        assert!(decision.is_allowed(), "{}", decision.reason());
    }

    #[test]
    fn cluster_terms_match_whole_tokens_only() {
        let (_dir, config) = setup();
        // "therapy" and "rehabilitation" only as parts of longer words
        let decision = evaluate(
            &dispatch("a.json", "physiotherapys and rehabilitations centre logistics"),
            &config,
        );
        assert!(decision.is_allowed(), "{}", decision.reason());
    }

    #[test]
    fn blocked_pattern_catches_phrasing_variants() {
        let (_dir, config) = setup();
        let decision = evaluate(
            &dispatch("a.json", "team treated every victim on site"),
            &config,
        );
        assert_eq!(decision.rule_violated(), Some(PolicyRule::MedicalBlock));
        match decision.detail() {
            Some(ViolationDetail::BlockedPattern { matched, .. }) => {
                assert_eq!(matched, "treated every victim")
            }
            other => panic!("expected pattern detail, got {other:?}"),
        }
    }

    #[test]
    fn traversal_is_denied_with_dir_scope() {
        let (_dir, config) = setup();
        let decision = evaluate(&dispatch("../../etc/passwd", "supplies"), &config);
        assert_eq!(decision.rule_violated(), Some(PolicyRule::DirScope));
        assert_eq!(decision.detail().unwrap().field(), "targetPath");
        assert!(decision.resolved_path().is_none());
    }

    #[test]
    fn nested_target_exceeds_default_depth() {
        let (_dir, config) = setup();
        let decision = evaluate(&dispatch("zone/log.json", "supplies"), &config);
        assert!(matches!(
            decision.detail(),
            Some(ViolationDetail::TooDeep { depth: 2, max_depth: 1, .. })
        ));
    }

    #[test]
    fn deeper_targets_pass_when_configured() {
        let dir = tempdir().unwrap();
        let config = PolicySettings {
            max_depth: 3,
            ..PolicySettings::for_root(dir.path())
        }
        .compile(dir.path())
        .unwrap();
        assert!(evaluate(&dispatch("zone/7/log.json", "supplies"), &config).is_allowed());
    }

    #[test]
    fn action_type_is_checked_before_content_and_scope() {
        let (_dir, config) = setup();
        let trace = evaluate_with_trace(
            &intent("SEND_NOTIFICATION", "../x", "prescription medication"),
            &config,
        );
        assert_eq!(trace.steps.len(), 1);
        assert!(trace.steps[0].terminal);
    }

    #[test]
    fn trace_of_allowed_intent_lists_every_phase() {
        let (_dir, config) = setup();
        let trace = evaluate_with_trace(&dispatch("a.json", "boats"), &config);
        let checks: Vec<&str> = trace.steps.iter().map(|s| s.check.as_str()).collect();
        assert_eq!(
            checks,
            vec!["action_type", "keyword_clusters", "blocked_patterns", "directory_scope"]
        );
        assert!(trace.steps.iter().all(|s| !s.terminal && s.outcome == "passed"));
    }

    #[test]
    fn rule_ids_are_stable() {
        assert_eq!(PolicyRule::ActionType.rule_id(), "RULE:ACTION_TYPE");
        assert_eq!(PolicyRule::MedicalBlock.rule_id(), "RULE:MEDICAL_BLOCK");
        assert_eq!(PolicyRule::DirScope.rule_id(), "RULE:DIR_SCOPE");
        assert_eq!(
            serde_json::to_string(&PolicyRule::MedicalBlock).unwrap(),
            "\"MEDICAL_BLOCK\""
        );
    }

    #[test]
    fn decision_serializes_with_camel_case_fields() {
        let (_dir, config) = setup();
        let decision = evaluate(&dispatch("../../etc/passwd", "x"), &config);
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["ruleViolated"], "DIR_SCOPE");
        assert_eq!(json["detail"]["violation"], "containment");
    }
}
