// vertical_slice.rs - End-to-end missions through the whole pipeline.
//
// Each test builds a real config on disk, a Commander with the filesystem
// Sub-agent, and an audit sink, then checks:
//   - the terminal outcome and the rule that caused it
//   - what is (or is not) on disk under the dispatch root
//   - that exactly one audit record exists per mission

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use nx_audit::{AuditError, AuditLog, AuditSink, MemorySink, MissionOutcome, MissionRecord};
use nx_connector_fs::DispatchRecord;
use nx_intent::{
    extract_candidate, parse_candidate, sanitize_report, ActionType, CandidateIntent, Intent,
};
use nx_mission::{AuthorityExceeded, Commander, Delegation, DelegationError, MissionState};
use nx_policy::{NexusConfig, PolicyRule};
use serde_json::json;
use tempfile::{tempdir, TempDir};

const CONFIG: &str = r#"
root_directory = "outgoing_dispatch"
create_root = true

[[sub_agents]]
name = "logistics"
allowed_extensions = ["json"]
"#;

struct Fixture {
    dir: TempDir,
    config: NexusConfig,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(CONFIG)
    }

    fn with_config(config: &str) -> Self {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nexus.toml");
        fs::write(&path, config).unwrap();
        let config = NexusConfig::load(&path).unwrap();
        Self { dir, config }
    }

    fn root(&self) -> &Path {
        self.config.policy.root_directory()
    }

    fn dispatch_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn commander(&self, audit: Arc<dyn AuditSink>) -> Commander {
        Commander::from_config(&self.config, audit).unwrap()
    }
}

fn dispatch(target: &str, justification: &str) -> Intent {
    parse_candidate(
        CandidateIntent::new("WRITE_DISPATCH_LOG", target)
            .with_category("flood")
            .with_payload(json!({ "water_units": 500, "rescue_boats": 200 }))
            .with_justification(justification),
    )
    .unwrap()
}

struct BrokenSink;

impl AuditSink for BrokenSink {
    fn record(&self, _record: MissionRecord) -> Result<(), AuditError> {
        Err(AuditError::Unavailable {
            reason: "disk full".into(),
        })
    }
}

#[test]
fn scenario_a_logistics_dispatch_is_executed() {
    let fx = Fixture::new();
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());

    let report = commander
        .run_mission(&dispatch(
            "flood_dispatch.json",
            "500 water units, 200 rescue boats",
        ))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::Executed);
    assert_eq!(report.agent.as_deref(), Some("logistics"));
    assert_eq!(fx.dispatch_files(), vec!["flood_dispatch.json"]);

    let written: DispatchRecord =
        serde_json::from_str(&fs::read_to_string(fx.root().join("flood_dispatch.json")).unwrap())
            .unwrap();
    assert_eq!(written.payload["rescue_boats"], 200);
    assert!(written.payload_matches_digest());

    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, MissionOutcome::Executed);
    assert_eq!(records[0].mission_id, report.mission_id);
    assert_eq!(
        records[0].resolved_path.as_deref(),
        Some(fx.root().join("flood_dispatch.json").as_path())
    );
    assert_eq!(
        report.states.last(),
        Some(&MissionState::Executed),
        "states: {:?}",
        report.states
    );
}

#[test]
fn scenario_b_medical_content_is_denied_before_delegation() {
    let fx = Fixture::new();
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());

    let report = commander
        .run_mission(&dispatch(
            "medical.json",
            "Victims need a prescription for pain medication",
        ))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::DeniedByPolicy);
    assert_eq!(report.decision.rule_violated(), Some(PolicyRule::MedicalBlock));
    assert!(report.agent.is_none(), "nothing should be delegated");
    assert!(fx.dispatch_files().is_empty());

    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].rule_violated.as_deref(), Some("MEDICAL_BLOCK"));
}

#[test]
fn scenario_c_direct_delegation_of_shell_script_is_refused() {
    let fx = Fixture::new();
    let commander = fx.commander(Arc::new(MemorySink::new()));
    let agent = commander.sub_agent("logistics").unwrap();

    let payload = match json!({ "cmd": "rm -rf /" }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };
    let err = agent
        .handle(Delegation::new("deploy.sh", payload))
        .unwrap_err();

    assert!(matches!(
        err,
        DelegationError::Authority(AuthorityExceeded::ExtensionNotAllowed { .. })
    ));
    assert!(fx.dispatch_files().is_empty());
}

#[test]
fn scenario_c_through_commander_ends_denied_by_authority() {
    // The commander may write .txt, its sub-agent may not.
    let fx = Fixture::new();
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());

    let report = commander
        .run_mission(&dispatch("notes.txt", "road cleared"))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::DeniedByAuthority);
    assert_eq!(report.rule_violated(), Some("AUTHORITY_EXCEEDED"));
    assert!(report.decision.is_allowed());
    assert!(fx.dispatch_files().is_empty());
    assert_eq!(audit.records()[0].outcome, MissionOutcome::DeniedByAuthority);
}

#[test]
fn scenario_d_traversal_is_denied_by_dir_scope() {
    let fx = Fixture::new();
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());

    let report = commander
        .run_mission(&dispatch("../../etc/passwd", "supplies"))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::DeniedByPolicy);
    assert_eq!(report.decision.rule_violated(), Some(PolicyRule::DirScope));
    assert_eq!(audit.records()[0].rule_violated.as_deref(), Some("DIR_SCOPE"));
}

#[test]
fn commander_refuses_extension_outside_its_own_scope() {
    let fx = Fixture::new();
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());

    let report = commander
        .run_mission(&dispatch("deploy.sh", "road cleared"))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::DeniedByAuthority);
    assert!(report.decision.is_allowed());
    assert!(report.agent.is_none(), "nothing should be delegated");
    match &report.authority_error {
        Some(AuthorityExceeded::ExtensionNotAllowed { agent, .. }) => assert_eq!(agent, "commander"),
        other => panic!("expected commander extension refusal, got {other:?}"),
    }
    assert!(fx.dispatch_files().is_empty());
    assert_eq!(audit.records().len(), 1);
}

const NESTED_CONFIG: &str = r#"
root_directory = "out"
create_root = true
max_depth = 2

[[sub_agents]]
name = "logistics"
root_directory = "out/logs"
allowed_extensions = ["json"]
"#;

#[test]
fn nested_sub_agent_never_writes_where_the_shield_did_not_look() {
    let fx = Fixture::with_config(NESTED_CONFIG);
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());

    // Approved as out/a.json, which the Sub-agent's root does not contain.
    let report = commander
        .run_mission(&dispatch("a.json", "boats"))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::DeniedByAuthority);
    assert!(matches!(
        report.authority_error,
        Some(AuthorityExceeded::OutsideRoot { .. })
    ));
    assert!(!fx.root().join("a.json").exists());
    assert!(!fx.root().join("logs").join("a.json").exists());
    assert_eq!(audit.records()[0].outcome, MissionOutcome::DeniedByAuthority);
}

#[test]
fn nested_sub_agent_writes_exactly_the_approved_path() {
    let fx = Fixture::with_config(NESTED_CONFIG);
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());

    let report = commander
        .run_mission(&dispatch("logs/a.json", "boats"))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::Executed);
    let approved = report.decision.resolved_path().unwrap().as_path().to_path_buf();
    assert_eq!(approved, fx.root().join("logs").join("a.json"));
    assert_eq!(report.dispatch.as_ref().unwrap().resolved_path, approved);
    assert!(approved.is_file());
    assert_eq!(audit.records()[0].resolved_path.as_deref(), Some(approved.as_path()));
}

#[test]
fn unlisted_action_is_denied_by_action_type() {
    let fx = Fixture::new();
    let commander = fx.commander(Arc::new(MemorySink::new()));
    let intent = parse_candidate(
        CandidateIntent::new("SEND_NOTIFICATION", "alert.json").with_justification("x"),
    )
    .unwrap();

    let report = commander.run_mission(&intent).unwrap();
    assert_eq!(report.decision.rule_violated(), Some(PolicyRule::ActionType));
}

#[test]
fn unrecognised_action_keeps_its_name_in_the_audit_record() {
    let fx = Fixture::new();
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());
    let intent = parse_candidate(
        CandidateIntent::new("DELETE_EVERYTHING", "a.json").with_justification("x"),
    )
    .unwrap();

    let report = commander.run_mission(&intent).unwrap();

    assert_eq!(report.outcome, MissionOutcome::DeniedByPolicy);
    assert_eq!(report.requested_action.as_deref(), Some("DELETE_EVERYTHING"));
    let record = &audit.records()[0];
    assert_eq!(record.action_type, ActionType::Unknown);
    assert_eq!(record.requested_action.as_deref(), Some("DELETE_EVERYTHING"));
    assert!(record.reason.as_deref().unwrap().contains("DELETE_EVERYTHING"));
}

#[test]
fn existing_target_fails_without_overwrite() {
    let fx = Fixture::new();
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());
    fs::write(fx.root().join("flood_dispatch.json"), "earlier").unwrap();

    let report = commander
        .run_mission(&dispatch("flood_dispatch.json", "boats"))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::Failed);
    assert!(report.failure.as_deref().unwrap().contains("already exists"));
    assert_eq!(
        fs::read_to_string(fx.root().join("flood_dispatch.json")).unwrap(),
        "earlier"
    );
    assert_eq!(audit.records()[0].outcome, MissionOutcome::Failed);
}

#[test]
fn check_only_mission_writes_nothing_and_records_allowed() {
    let fx = Fixture::new();
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());

    let report = commander
        .check(&dispatch("flood_dispatch.json", "boats"))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::Allowed);
    assert_eq!(report.steps.len(), 4);
    assert!(fx.dispatch_files().is_empty());
    assert_eq!(audit.records()[0].outcome, MissionOutcome::Allowed);
}

#[test]
fn broken_audit_sink_does_not_hide_the_outcome() {
    let fx = Fixture::new();
    let commander = fx.commander(Arc::new(BrokenSink));

    let report = commander
        .run_mission(&dispatch("flood_dispatch.json", "boats"))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::Executed);
    assert!(!report.audit_recorded);
}

#[test]
fn malformed_candidate_never_becomes_a_mission() {
    let fx = Fixture::new();
    let audit = Arc::new(MemorySink::new());
    let commander = fx.commander(audit.clone());

    let candidate = CandidateIntent::new("WRITE_DISPATCH_LOG", "a.json")
        .with_payload(json!("not an object"))
        .with_justification("boats");
    assert!(commander.run_candidate(candidate).is_err());
    assert!(audit.is_empty());
}

#[test]
fn free_text_report_runs_through_sanitizer_and_extractor() {
    let fx = Fixture::new();
    let commander = fx.commander(Arc::new(MemorySink::new()));

    let report_text =
        sanitize_report("<b>Flooding</b> in sector 4: 500 water units needed").unwrap();
    let report = commander
        .run_candidate(extract_candidate(&report_text, "sector4.json"))
        .unwrap();

    assert_eq!(report.outcome, MissionOutcome::Executed);
    let dispatch = report.dispatch.unwrap();
    assert_eq!(dispatch.payload["disaster_category"], "flood");
}

#[test]
fn concurrent_missions_each_leave_one_record() {
    let fx = Fixture::new();
    let log_path = fx.dir.path().join("audit.jsonl");
    let commander = fx.commander(Arc::new(AuditLog::open(&log_path).unwrap()));

    std::thread::scope(|scope| {
        for i in 0..12 {
            let commander = &commander;
            scope.spawn(move || {
                // Every third mission races for the same name.
                let target = if i % 3 == 0 {
                    "shared.json".to_string()
                } else {
                    format!("dispatch_{i}.json")
                };
                commander
                    .run_mission(&dispatch(&target, "boats and water"))
                    .unwrap()
            });
        }
    });

    let records = AuditLog::read_all(&log_path).unwrap();
    assert_eq!(records.len(), 12);
    assert_eq!(AuditLog::verify_chain(&log_path).unwrap(), 12);

    let ids: HashSet<_> = records.iter().map(|r| r.mission_id).collect();
    assert_eq!(ids.len(), 12);

    let executed = records
        .iter()
        .filter(|r| r.outcome == MissionOutcome::Executed)
        .count();
    let failed = records
        .iter()
        .filter(|r| r.outcome == MissionOutcome::Failed)
        .count();
    // 8 unique names plus one winner of the four-way race on shared.json.
    assert_eq!(executed, 9);
    assert_eq!(failed, 3);
    assert_eq!(fx.dispatch_files().len(), 9);
}

#[test]
fn reload_applies_to_new_missions_only() {
    let fx = Fixture::new();
    let commander = fx.commander(Arc::new(MemorySink::new()));
    let before = commander.policy().snapshot();

    let path = fx.dir.path().join("nexus.toml");
    fs::write(
        &path,
        "root_directory = \"outgoing_dispatch\"\nblocked_keyword_clusters = [[\"boats\"]]\n",
    )
    .unwrap();
    commander.reload_policy(&path).unwrap();

    assert_eq!(before.blocked_clusters().len(), 11);
    let report = commander
        .run_mission(&dispatch("later.json", "boats"))
        .unwrap();
    assert_eq!(report.outcome, MissionOutcome::DeniedByPolicy);
}
