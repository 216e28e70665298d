//! # nx-cli
//!
//! Command-line interface for Nexus, a shielded disaster-dispatch pipeline.
//!
//! - `nx run --intent <file>`: run a mission end to end
//! - `nx check --intent <file>`: policy phase only, with the step trace
//! - `nx brief <text>`: turn a free-text field report into a mission
//! - `nx delegate --agent <name> --file <name> --payload <file>`: hand a
//!   delegation straight to a Sub-agent
//! - `nx audit verify/tail`: inspect the mission audit log
//!
//! Exit codes: 0 executed or allowed, 1 denied, 2 failed or error.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Nexus CLI: shielded dispatch missions.
#[derive(Parser)]
#[command(name = "nx", version, about)]
struct Cli {
    /// Config file (TOML or YAML).
    #[arg(long, global = true, default_value = "nexus.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a mission from an intent file.
    Run {
        #[arg(long)]
        intent: PathBuf,
    },
    /// Evaluate an intent against the policy without executing it.
    Check {
        #[arg(long)]
        intent: PathBuf,
    },
    /// Sanitize a free-text report, extract an intent, and run it.
    Brief {
        /// The field report.
        text: String,
        /// Dispatch file name (defaults to dispatch_<id>.json).
        #[arg(long)]
        target: Option<String>,
    },
    /// Send a delegation directly to a named Sub-agent.
    Delegate {
        #[arg(long)]
        agent: String,
        /// File name, relative to the Sub-agent's root.
        #[arg(long)]
        file: String,
        /// JSON file holding the payload object.
        #[arg(long)]
        payload: PathBuf,
    },
    /// Inspect the audit log.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    // stdout carries reports; logs go to stderr.
    let filter = EnvFilter::from_default_env()
        .add_directive("nx_mission=info".parse()?)
        .add_directive("nx_policy=info".parse()?)
        .add_directive("nx_audit=info".parse()?)
        .add_directive("nx=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    init_tracing(cli.log_json)?;
    let config = commands::load_config(&cli.config)?;

    match &cli.command {
        Commands::Run { intent } => commands::mission::run(&config, intent),
        Commands::Check { intent } => commands::mission::check(&config, intent),
        Commands::Brief { text, target } => {
            commands::mission::brief(&config, text, target.as_deref())
        }
        Commands::Delegate {
            agent,
            file,
            payload,
        } => commands::delegate::execute(&config, agent, file, payload),
        Commands::Audit { command } => commands::audit::execute(command, &config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
