//! Gantry — declarative CI workflow runner.
//!
//! ## Commands
//!
//! - `run`: execute a workflow file for a trigger event
//! - `check`: validate a workflow file without running it

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::Level;

use gantry_ci::{
    RunGate, RunReport, Scheduler, Trigger, TriggerEvent, Workflow, DEFAULT_MAX_PARALLEL,
};

#[derive(Parser)]
#[command(name = "gantry")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Declarative CI workflow runner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to the workflow file
        #[arg(default_value = ".gantry/ci.yml")]
        workflow: PathBuf,

        /// Trigger event kind
        #[arg(long, value_enum, default_value_t = EventArg::Push)]
        event: EventArg,

        /// Repository reference carried by the trigger
        #[arg(long, default_value = ".")]
        repo: String,

        /// Revision the trigger points at
        #[arg(long)]
        revision: Option<String>,

        /// Override the concurrency cap
        #[arg(long)]
        max_parallel: Option<usize>,
    },

    /// Validate a workflow file without running it
    Check {
        /// Path to the workflow file
        #[arg(default_value = ".gantry/ci.yml")]
        workflow: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EventArg {
    Push,
    PullRequest,
}

impl std::fmt::Display for EventArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventArg::Push => write!(f, "push"),
            EventArg::PullRequest => write!(f, "pull-request"),
        }
    }
}

impl From<EventArg> for TriggerEvent {
    fn from(event: EventArg) -> Self {
        match event {
            EventArg::Push => TriggerEvent::Push,
            EventArg::PullRequest => TriggerEvent::PullRequest,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    gantry_ci::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            workflow,
            event,
            repo,
            revision,
            max_parallel,
        } => cmd_run(&workflow, event.into(), &repo, revision, max_parallel, cli.json).await,
        Commands::Check { workflow } => cmd_check(&workflow),
    }
}

async fn cmd_run(
    path: &Path,
    event: TriggerEvent,
    repo: &str,
    revision: Option<String>,
    max_parallel: Option<usize>,
    json: bool,
) -> Result<()> {
    let workflow = Workflow::from_path(path)
        .with_context(|| format!("Failed to load workflow from {}", path.display()))?;

    // CLI override beats the workflow-level key; scheduler default last.
    let cap = max_parallel
        .or(workflow.max_parallel)
        .unwrap_or(DEFAULT_MAX_PARALLEL);
    let scheduler = Scheduler::new(cap);

    let mut trigger = match event {
        TriggerEvent::Push => Trigger::push(repo),
        TriggerEvent::PullRequest => Trigger::pull_request(repo),
    };
    if let Some(rev) = revision {
        trigger = trigger.with_revision(rev);
    }

    let declared = workflow.stage_names();
    let result = scheduler
        .run(&workflow, &trigger)
        .await
        .context("Workflow execution failed")?;

    if json {
        println!("{}", RunReport::render_json(&result)?);
    } else {
        print!("{}", RunReport::render_text(&result));
    }

    let verdict = RunGate::evaluate(&declared, &result);
    if !verdict.passed {
        for violation in &verdict.violations {
            eprintln!("violation: {violation}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let workflow = Workflow::from_path(path)
        .with_context(|| format!("Failed to load workflow from {}", path.display()))?;

    println!(
        "ok: {} ({} stage(s), digest {})",
        workflow.name,
        workflow.stages.len(),
        &workflow.stages_digest()[..12]
    );
    Ok(())
}
