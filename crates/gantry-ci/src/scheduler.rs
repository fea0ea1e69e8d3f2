//! Bounded admission of concurrent runs.
//!
//! Each run executes its stages sequentially; across runs, up to
//! `max_parallel` may be running at once. Excess runs stay pending in
//! submission order until a slot frees. `tokio`'s semaphore hands permits
//! out FIFO, which is exactly the arrival-order admission contract.

use crate::action::ActionRegistry;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::run::RunResult;
use crate::trigger::Trigger;
use crate::workflow::Workflow;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default cap on simultaneously executing runs.
pub const DEFAULT_MAX_PARALLEL: usize = 10;

/// Admits runs into a bounded pool.
#[derive(Clone)]
pub struct Scheduler {
    permits: Arc<Semaphore>,
    actions: Arc<ActionRegistry>,
    max_parallel: usize,
}

impl Scheduler {
    /// Scheduler with the builtin action registry.
    pub fn new(max_parallel: usize) -> Self {
        Self::with_actions(max_parallel, ActionRegistry::default())
    }

    /// Scheduler with a caller-supplied action registry (tests inject
    /// fakes here).
    pub fn with_actions(max_parallel: usize, actions: ActionRegistry) -> Self {
        // A cap of zero would leave every run pending forever.
        let max_parallel = max_parallel.max(1);
        Scheduler {
            permits: Arc::new(Semaphore::new(max_parallel)),
            actions: Arc::new(actions),
            max_parallel,
        }
    }

    /// Scheduler sized for a workflow's `max_parallel` override.
    pub fn for_workflow(workflow: &Workflow) -> Self {
        Self::new(workflow.max_parallel.unwrap_or(DEFAULT_MAX_PARALLEL))
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Submit a run. Returns immediately; the run stays pending until a
    /// slot frees, then executes to a terminal state. No priority, no
    /// preemption, no admission timeout.
    pub fn submit(&self, workflow: Workflow, trigger: Trigger) -> JoinHandle<Result<RunResult>> {
        let permits = Arc::clone(&self.permits);
        let actions = Arc::clone(&self.actions);
        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            debug!(workflow = %workflow.name, event = %trigger.event, "slot acquired");
            Pipeline::execute(&workflow, &trigger, &actions).await
        })
    }

    /// Submit a run and wait for its terminal result.
    pub async fn run(&self, workflow: &Workflow, trigger: &Trigger) -> Result<RunResult> {
        let _permit = self.permits.acquire().await.ok();
        Pipeline::execute(workflow, trigger, &self.actions).await
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARALLEL)
    }
}
