//! Fail-fast orchestration of a run's stages.

use crate::action::ActionRegistry;
use crate::env::RunEnv;
use crate::error::Result;
use crate::run::{Run, RunResult, RunStatus};
use crate::runner::StageRunner;
use crate::trigger::Trigger;
use crate::workflow::Workflow;
use chrono::Utc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// The pipeline runner: executes a run's stages in declared order against
/// a fresh environment.
pub struct Pipeline;

impl Pipeline {
    /// Execute `workflow` for `trigger`.
    ///
    /// Allocates a fresh [`RunEnv`], then iterates stages in order. The
    /// first step exiting nonzero aborts the entire run: no later step or
    /// stage executes, and `failed_stage` names the abort point. Abort is
    /// plain control flow over result values, never an `Err` — step
    /// failures are data, `Err` is reserved for invalid input.
    ///
    /// External side effects of provisioning steps are not rolled back on
    /// failure; the environment is simply dropped.
    #[instrument(skip_all, fields(workflow = %workflow.name, event = %trigger.event))]
    pub async fn execute(
        workflow: &Workflow,
        trigger: &Trigger,
        actions: &ActionRegistry,
    ) -> Result<RunResult> {
        workflow.validate()?;

        let wall = Instant::now();
        let mut run = Run::new(trigger.clone(), workflow.stages_digest());
        run.start()?;
        let started_at = run.started_at.unwrap_or_else(Utc::now);

        info!(
            run_id = %run.id,
            stages = workflow.stages.len(),
            "starting run"
        );

        let mut env = RunEnv::new();
        let mut stage_results = Vec::new();
        let mut failed_stage = None;

        for stage in &workflow.stages {
            info!(run_id = %run.id, stage = %stage.name, "executing stage");
            let result = StageRunner::execute_stage(stage, &mut env, actions).await;

            if result.passed() {
                stage_results.push(result);
            } else {
                warn!(
                    run_id = %run.id,
                    stage = %stage.name,
                    exit_code = result.exit_code(),
                    "stage failed, aborting run"
                );
                failed_stage = Some(stage.name.clone());
                stage_results.push(result);
                break;
            }
        }

        let status = if failed_stage.is_none() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        run.finish(status)?;
        let finished_at = run.finished_at.unwrap_or_else(Utc::now);
        let duration_ms = wall.elapsed().as_millis() as u64;

        info!(run_id = %run.id, status = %status, duration_ms, "run finished");

        Ok(RunResult {
            run_id: run.id,
            status,
            failed_stage,
            stages: stage_results,
            stages_digest: run.stages_digest,
            duration_ms,
            started_at,
            finished_at,
        })
    }
}
