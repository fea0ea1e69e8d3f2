//! Run result rendering.
//!
//! This is the boundary to whatever invoked the run (a CI dashboard, a
//! status API, a terminal). The failing stage's captured output is
//! surfaced verbatim.

use crate::error::Result;
use crate::run::RunResult;
use std::fmt::Write;

pub struct RunReport;

impl RunReport {
    /// Human-readable summary: one line per executed stage, then the
    /// failing stage's captured output.
    pub fn render_text(result: &RunResult) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "run {} — {}", result.run_id, result.status);

        for stage in &result.stages {
            let mark = if stage.passed() { " ok " } else { "FAIL" };
            let _ = writeln!(
                out,
                "  [{mark}] {} ({} step(s), {} ms)",
                stage.stage_name,
                stage.steps.len(),
                stage.duration_ms
            );
        }

        if let Some(name) = &result.failed_stage {
            if let Some(stage) = result.stages.iter().find(|s| &s.stage_name == name) {
                if let Some(step) = stage.first_failed_step() {
                    let _ = writeln!(
                        out,
                        "\nstage '{}' step '{}' exited with code {}",
                        name, step.label, step.exit_code
                    );
                    if !step.stdout.is_empty() {
                        let _ = writeln!(out, "--- stdout ---\n{}", step.stdout);
                    }
                    if !step.stderr.is_empty() {
                        let _ = writeln!(out, "--- stderr ---\n{}", step.stderr);
                    }
                }
            }
        }

        out
    }

    /// JSON rendering for machine consumers.
    pub fn render_json(result: &RunResult) -> Result<String> {
        Ok(serde_json::to_string_pretty(result)?)
    }
}
