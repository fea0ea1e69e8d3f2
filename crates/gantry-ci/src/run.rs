//! Run identity, lifecycle, and results.

use crate::error::{CiError, Result};
use crate::runner::StageResult;
use crate::trigger::Trigger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a run.
///
/// `Pending -> Running -> Succeeded | Failed`. The terminal states absorb:
/// no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One end-to-end execution of a workflow for a single trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique run ID.
    pub id: String,

    /// The trigger that created this run.
    pub trigger: Trigger,

    /// Digest of the workflow's ordered stage names.
    pub stages_digest: String,

    /// Current status.
    pub status: RunStatus,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// New pending run for a trigger.
    pub fn new(trigger: Trigger, stages_digest: String) -> Self {
        Run {
            id: Uuid::new_v4().to_string(),
            trigger,
            stages_digest,
            status: RunStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Transition to running (slot acquired).
    pub fn start(&mut self) -> Result<()> {
        if self.status != RunStatus::Pending {
            return Err(CiError::InvalidStatusTransition {
                current: self.status.to_string(),
                requested: RunStatus::Running.to_string(),
            });
        }
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Transition to a terminal status.
    pub fn finish(&mut self, status: RunStatus) -> Result<()> {
        if self.status != RunStatus::Running || !status.is_terminal() {
            return Err(CiError::InvalidStatusTransition {
                current: self.status.to_string(),
                requested: status.to_string(),
            });
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}

/// Result of a complete run, surfaced to whatever invoked it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Run ID.
    pub run_id: String,

    /// Terminal status.
    pub status: RunStatus,

    /// Name of the first failing stage, when `status` is `Failed`.
    pub failed_stage: Option<String>,

    /// Results of the stages that executed, in declared order. Shorter
    /// than the declared stage list when the run aborted early.
    pub stages: Vec<StageResult>,

    /// Digest of the workflow's ordered stage names.
    pub stages_digest: String,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Number of stages that passed.
    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.passed()).count()
    }

    /// Number of stages that failed.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.passed()).count()
    }

    /// Ordered names of the stages that executed.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.stage_name.as_str()).collect()
    }
}
