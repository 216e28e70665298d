// mission.rs - run, check and brief: missions through the Commander.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use nx_intent::{extract_candidate, parse_candidate, sanitize_report, CandidateIntent, Intent};
use nx_mission::MissionReport;
use nx_policy::NexusConfig;

use super::{commander, exit_code};

fn read_intent(path: &Path) -> anyhow::Result<Intent> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading intent file {}", path.display()))?;
    let candidate: CandidateIntent = serde_json::from_str(&raw)
        .with_context(|| format!("intent file {} is not a candidate intent", path.display()))?;
    parse_candidate(candidate).with_context(|| format!("rejected intent in {}", path.display()))
}

fn print_report(report: &MissionReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    if !report.audit_recorded {
        eprintln!("warning: mission record was not written to the audit log");
    }
    Ok(())
}

/// `nx run --intent <file>`
pub fn run(config: &NexusConfig, intent_path: &Path) -> anyhow::Result<ExitCode> {
    let intent = read_intent(intent_path)?;
    let report = commander(config)?.run_mission(&intent)?;
    print_report(&report)?;
    Ok(exit_code(report.outcome))
}

/// `nx check --intent <file>`: policy phase only, with the step trace.
pub fn check(config: &NexusConfig, intent_path: &Path) -> anyhow::Result<ExitCode> {
    let intent = read_intent(intent_path)?;
    let report = commander(config)?.check(&intent)?;

    for step in &report.steps {
        let marker = if step.terminal { "x" } else { "ok" };
        println!("[{marker:>2}] {:<18} {}", step.check, step.outcome);
    }
    println!();
    println!("outcome: {}", report.outcome);
    if let Some(rule) = report.rule_violated() {
        println!("rule:    {rule}");
    }
    println!("reason:  {}", report.reason());
    Ok(exit_code(report.outcome))
}

/// `nx brief <text> [--target <name>]`: sanitize and extract a free-text report.
pub fn brief(config: &NexusConfig, text: &str, target: Option<&str>) -> anyhow::Result<ExitCode> {
    let report_text = sanitize_report(text).context("report refused by sanitizer")?;
    let target = match target {
        Some(name) => name.to_string(),
        None => {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("dispatch_{}.json", &id[..8])
        }
    };
    let candidate = extract_candidate(&report_text, &target);
    let report = commander(config)?.run_candidate(candidate)?;
    print_report(&report)?;
    Ok(exit_code(report.outcome))
}
