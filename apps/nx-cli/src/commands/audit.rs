// audit.rs - Audit subcommands: verify, tail.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Subcommand;
use nx_audit::{AuditError, AuditLog};
use nx_policy::NexusConfig;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the audit log hash chain.
    Verify {
        /// Path to the audit log (defaults to `audit_log` from the config).
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Show the most recent mission records.
    Tail {
        #[arg(long)]
        log: Option<PathBuf>,
        /// Number of records to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
}

pub fn execute(cmd: &AuditCommands, config: &NexusConfig) -> anyhow::Result<ExitCode> {
    match cmd {
        AuditCommands::Verify { log } => {
            let path = log.clone().unwrap_or_else(|| config.audit_log.clone());
            if !path.exists() {
                println!("No audit log at {}", path.display());
                return Ok(ExitCode::SUCCESS);
            }

            match AuditLog::verify_chain(&path) {
                Ok(count) => {
                    println!("Audit log verified: {count} record(s), hash chain intact.");
                    Ok(ExitCode::SUCCESS)
                }
                Err(AuditError::IntegrityViolation {
                    line,
                    expected,
                    actual,
                }) => {
                    println!("INTEGRITY VIOLATION at line {line}:");
                    println!("  expected previous_hash: {expected}");
                    println!("  actual previous_hash:   {actual}");
                    Ok(ExitCode::from(1))
                }
                Err(e) => Err(e.into()),
            }
        }

        AuditCommands::Tail { log, n } => {
            let path = log.clone().unwrap_or_else(|| config.audit_log.clone());
            if !path.exists() {
                println!("No audit log at {}", path.display());
                return Ok(ExitCode::SUCCESS);
            }

            let records = AuditLog::read_all(&path)?;
            let recent = &records[records.len().saturating_sub(*n)..];
            if recent.is_empty() {
                println!("No mission records.");
                return Ok(ExitCode::SUCCESS);
            }

            println!(
                "{:<20} {:<10} {:<20} {:<20} PATH",
                "TIMESTAMP", "MISSION", "OUTCOME", "RULE"
            );
            println!("{}", "-".repeat(96));
            for record in recent {
                let mission = record.mission_id.simple().to_string();
                println!(
                    "{:<20} {:<10} {:<20} {:<20} {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    &mission[..8],
                    record.outcome.as_str(),
                    record.rule_violated.as_deref().unwrap_or("-"),
                    record
                        .resolved_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
