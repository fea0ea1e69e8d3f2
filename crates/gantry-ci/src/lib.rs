//! Gantry CI — declarative pipeline execution
//!
//! Provides a CI pipeline runner that:
//! - Reads a declarative workflow (ordered stages of shell and action steps)
//! - Executes each run against a fresh, run-scoped environment
//! - Aborts at the first failing step (fail-fast)
//! - Bounds how many runs execute concurrently (FIFO admission)

pub mod action;
pub mod env;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod report;
pub mod run;
pub mod runner;
pub mod scheduler;
pub mod telemetry;
pub mod trigger;
pub mod workflow;

// Re-export key types
pub use action::{ActionCommands, ActionRegistry};
pub use env::RunEnv;
pub use error::{CiError, Result};
pub use gate::{GateVerdict, RunGate};
pub use pipeline::Pipeline;
pub use report::RunReport;
pub use run::{Run, RunResult, RunStatus};
pub use runner::{StageResult, StageRunner, StepOutcome};
pub use scheduler::{Scheduler, DEFAULT_MAX_PARALLEL};
pub use trigger::{Trigger, TriggerEvent};
pub use workflow::{StageSpec, StepSpec, Workflow};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
