//! Post-run gate evaluation for pass/fail criteria.

use crate::run::{RunResult, RunStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Gate evaluation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// Violations that caused failure (empty if passed).
    pub violations: Vec<String>,

    /// Summary message.
    pub message: String,
}

/// Gate rules over a finished run.
pub struct RunGate;

impl RunGate {
    /// Evaluate whether a run satisfies the gate.
    ///
    /// Gate rule: every declared stage must have executed and passed. A
    /// fail-fast abort therefore surfaces two kinds of violation — the
    /// failing stage itself, and every declared stage the abort prevented
    /// from running.
    pub fn evaluate(declared_stages: &[String], result: &RunResult) -> GateVerdict {
        let mut violations = Vec::new();

        for stage in &result.stages {
            if !stage.passed() {
                let detail = match stage.first_failed_step() {
                    Some(step) => {
                        format!("step '{}' exited with code {}", step.label, step.exit_code)
                    }
                    None => "no step outcome recorded".to_string(),
                };
                violations.push(format!("Stage '{}' failed: {}", stage.stage_name, detail));
            }
        }

        let executed: HashSet<&str> = result.stage_names().into_iter().collect();
        for name in declared_stages {
            if !executed.contains(name.as_str()) {
                violations.push(format!(
                    "Stage '{}' never executed (aborted by an earlier failure)",
                    name
                ));
            }
        }

        if result.status == RunStatus::Failed && violations.is_empty() {
            violations.push("Run reported failure without a failing stage".to_string());
        }

        let passed = violations.is_empty();
        let message = if passed {
            format!("All {} stage(s) passed", result.stages.len())
        } else {
            format!("{} violation(s)", violations.len())
        };

        GateVerdict {
            passed,
            violations,
            message,
        }
    }
}
