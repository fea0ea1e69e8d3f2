//! Step and stage execution.

use crate::action::ActionRegistry;
use crate::env::RunEnv;
use crate::workflow::{StageSpec, StepSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Captured result of a single step execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Step label (explicit name, action reference, or positional).
    pub label: String,

    /// Exit code (0 = success, -1 = could not execute).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl StepOutcome {
    /// Whether this step passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Outcome for a step that never produced a process exit: spawn
    /// failure, unresolvable action, timeout. Reported exactly like any
    /// other nonzero exit.
    fn broken(label: String, error: impl std::fmt::Display, duration_ms: u64) -> Self {
        StepOutcome {
            label,
            exit_code: -1,
            stdout: String::new(),
            stderr: error.to_string(),
            duration_ms,
        }
    }
}

/// Result of a stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name.
    pub stage_name: String,

    /// Outcomes of the steps that ran, in declared order. Shorter than
    /// the declared step list when an early step failed.
    pub steps: Vec<StepOutcome>,

    /// Whether every step passed.
    pub success: bool,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl StageResult {
    /// Whether this stage passed.
    pub fn passed(&self) -> bool {
        self.success
    }

    /// Exit code of the first failing step, 0 when all passed.
    pub fn exit_code(&self) -> i32 {
        self.steps
            .iter()
            .map(|s| s.exit_code)
            .find(|code| *code != 0)
            .unwrap_or(0)
    }

    pub fn first_failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| !s.passed())
    }

    /// Ordered labels of the steps that ran.
    pub fn step_labels(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.label.as_str()).collect()
    }
}

/// Executes a stage's steps in order against a run environment.
pub struct StageRunner;

impl StageRunner {
    /// Execute `stage`, stopping at the first step that exits nonzero.
    ///
    /// A step's declared `env` writes and `add_path` appends are applied
    /// to `env` once the step exits 0, making them visible to every later
    /// step and stage of the same run.
    pub async fn execute_stage(
        stage: &StageSpec,
        env: &mut RunEnv,
        actions: &ActionRegistry,
    ) -> StageResult {
        let start = Instant::now();
        let mut steps = Vec::new();
        let mut success = true;

        for (index, step) in stage.steps.iter().enumerate() {
            let outcome = Self::execute_step(step, index, stage.timeout_secs, env, actions).await;
            debug!(
                stage = %stage.name,
                step = %outcome.label,
                exit_code = outcome.exit_code,
                "step finished"
            );

            if outcome.passed() {
                for (key, value) in &step.env {
                    env.set_var(key.clone(), value.clone());
                }
                for dir in &step.add_path {
                    env.append_path(dir.clone());
                }
                steps.push(outcome);
            } else {
                success = false;
                steps.push(outcome);
                break;
            }
        }

        StageResult {
            stage_name: stage.name.clone(),
            steps,
            success,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn execute_step(
        step: &StepSpec,
        index: usize,
        timeout_secs: u64,
        env: &mut RunEnv,
        actions: &ActionRegistry,
    ) -> StepOutcome {
        let label = step.label(index);
        let start = Instant::now();

        if let Some(block) = &step.run {
            let argv = vec!["sh".to_string(), "-c".to_string(), block.clone()];
            let vars = step_vars(env, step);
            Self::run_command(&label, &argv, &vars, timeout_secs).await
        } else if let Some(uses) = &step.uses {
            // Resolution may mutate the run environment (path appends,
            // package registration) before any command executes.
            let commands = match actions.resolve(uses, &step.with, env) {
                Ok(commands) => commands,
                Err(e) => {
                    return StepOutcome::broken(label, e, start.elapsed().as_millis() as u64)
                }
            };

            let vars = step_vars(env, step);
            let mut stdout = String::new();
            let mut stderr = String::new();
            let mut exit_code = 0;

            for argv in &commands {
                let outcome = Self::run_command(&label, argv, &vars, timeout_secs).await;
                stdout.push_str(&outcome.stdout);
                stderr.push_str(&outcome.stderr);
                exit_code = outcome.exit_code;
                if exit_code != 0 {
                    break;
                }
            }

            StepOutcome {
                label,
                exit_code,
                stdout,
                stderr,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        } else {
            // Unreachable for validated workflows.
            StepOutcome::broken(
                label,
                "step declares neither `run` nor `uses`",
                start.elapsed().as_millis() as u64,
            )
        }
    }

    async fn run_command(
        label: &str,
        argv: &[String],
        vars: &BTreeMap<String, String>,
        timeout_secs: u64,
    ) -> StepOutcome {
        let start = Instant::now();

        if argv.is_empty() {
            return StepOutcome::broken(label.to_string(), "empty command", 0);
        }

        let child = match Command::new(&argv[0])
            .args(&argv[1..])
            .envs(vars)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return StepOutcome::broken(
                    label.to_string(),
                    format!("failed to spawn '{}': {}", argv[0], e),
                    start.elapsed().as_millis() as u64,
                )
            }
        };

        let output = if timeout_secs > 0 {
            match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
                .await
            {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return StepOutcome::broken(
                        label.to_string(),
                        e,
                        start.elapsed().as_millis() as u64,
                    )
                }
                Err(_) => {
                    return StepOutcome::broken(
                        label.to_string(),
                        format!("step timed out after {timeout_secs} seconds"),
                        start.elapsed().as_millis() as u64,
                    )
                }
            }
        } else {
            match child.wait_with_output().await {
                Ok(output) => output,
                Err(e) => {
                    return StepOutcome::broken(
                        label.to_string(),
                        e,
                        start.elapsed().as_millis() as u64,
                    )
                }
            }
        };

        StepOutcome {
            label: label.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Process variables for a single step: the run environment's view plus
/// the step's own declared writes, which must be visible to the step
/// itself before they are persisted.
fn step_vars(env: &RunEnv, step: &StepSpec) -> BTreeMap<String, String> {
    let mut vars = env.process_vars();
    for (key, value) in &step.env {
        vars.insert(key.clone(), value.clone());
    }
    vars
}
