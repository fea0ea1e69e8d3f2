//! Workflow specification and identity.
//!
//! The declarative file format this crate reads: an ordered list of named
//! stages, each an ordered list of steps. A step is either an inline shell
//! block (`run:`) or a pinned reusable-action reference (`uses:`).

use crate::error::{CiError, Result};
use crate::trigger::TriggerEvent;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// A parsed workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    /// Workflow name, `ci` when omitted.
    #[serde(default = "default_workflow_name")]
    pub name: String,

    /// Events this workflow responds to.
    #[serde(default, rename = "on")]
    pub on: Vec<TriggerEvent>,

    /// Cap on simultaneously executing runs. Absent means no
    /// workflow-level override of the scheduler default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Ordered stages. Must be non-empty.
    pub stages: Vec<StageSpec>,
}

fn default_workflow_name() -> String {
    "ci".to_string()
}

/// A named, ordered group of steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageSpec {
    pub name: String,

    /// Steps execute strictly in declared order.
    #[serde(default)]
    pub steps: Vec<StepSpec>,

    /// Per-step process timeout in seconds. 0 disables the timeout.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl StageSpec {
    pub fn new(name: impl Into<String>, steps: Vec<StepSpec>) -> Self {
        StageSpec {
            name: name.into(),
            steps,
            timeout_secs: 0,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// The smallest unit of execution within a stage.
///
/// Exactly one of `run` / `uses` must be set; [`Workflow::validate`]
/// rejects anything else. Declared `env` writes and `add_path` appends
/// persist in the run environment once the step exits 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Inline shell block, executed via `sh -c`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    /// Reusable action reference, `name@version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,

    /// Parameter mapping for a `uses:` action.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,

    /// Environment-variable writes persisted for the rest of the run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Directories appended to the run's search path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_path: Vec<PathBuf>,
}

impl StepSpec {
    /// Inline shell step.
    pub fn shell(command: impl Into<String>) -> Self {
        StepSpec {
            run: Some(command.into()),
            ..Default::default()
        }
    }

    /// Reusable action step.
    pub fn action(uses: impl Into<String>) -> Self {
        StepSpec {
            uses: Some(uses.into()),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.add_path.push(dir.into());
        self
    }

    /// Display label: explicit name, the action reference, or a positional
    /// fallback.
    pub fn label(&self, index: usize) -> String {
        if let Some(name) = &self.name {
            name.clone()
        } else if let Some(uses) = &self.uses {
            uses.clone()
        } else {
            format!("step-{}", index + 1)
        }
    }
}

impl Workflow {
    pub fn new(name: impl Into<String>, stages: Vec<StageSpec>) -> Self {
        Workflow {
            name: name.into(),
            on: vec![TriggerEvent::Push, TriggerEvent::PullRequest],
            max_parallel: None,
            stages,
        }
    }

    /// Parse and validate a workflow from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let workflow: Workflow = serde_yml::from_str(text)?;
        workflow.validate()?;
        Ok(workflow)
    }

    /// Load and validate a workflow file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Structural validation: non-empty stages, non-empty steps, unique
    /// stage names, exactly one of `run` / `uses` per step.
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(CiError::InvalidWorkflow(
                "workflow declares no stages".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(CiError::InvalidWorkflow(format!(
                    "duplicate stage name '{}'",
                    stage.name
                )));
            }
            if stage.steps.is_empty() {
                return Err(CiError::InvalidWorkflow(format!(
                    "stage '{}' declares no steps",
                    stage.name
                )));
            }
            for (idx, step) in stage.steps.iter().enumerate() {
                match (&step.run, &step.uses) {
                    (Some(_), Some(_)) => {
                        return Err(CiError::InvalidWorkflow(format!(
                            "stage '{}' step {} declares both `run` and `uses`",
                            stage.name,
                            idx + 1
                        )))
                    }
                    (None, None) => {
                        return Err(CiError::InvalidWorkflow(format!(
                            "stage '{}' step {} declares neither `run` nor `uses`",
                            stage.name,
                            idx + 1
                        )))
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Ordered stage names.
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }

    /// SHA-256 digest of ordered stage names (deterministic).
    ///
    /// Gives structurally identical workflows the same identity, which is
    /// what backs the re-run idempotence contract.
    pub fn stages_digest(&self) -> String {
        compute_stages_digest(&self.stage_names())
    }
}

/// Compute deterministic digest of ordered stage names.
fn compute_stages_digest(stages: &[String]) -> String {
    let mut hasher = Sha256::new();
    for stage in stages {
        hasher.update(stage.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: ci
on: [push, pull_request]
max_parallel: 10
stages:
  - name: setup
    steps:
      - uses: checkout@v4
      - run: conda env update -f environment.yml
        env: { CONDA_ALWAYS_YES: "true" }
        add_path: [/opt/conda/bin]
  - name: install
    steps:
      - run: pip install -e .
  - name: test
    steps:
      - run: python -m pytest
"#;

    #[test]
    fn test_parse_sample_workflow() {
        let workflow = Workflow::from_yaml_str(SAMPLE).expect("parse failed");
        assert_eq!(workflow.name, "ci");
        assert_eq!(workflow.max_parallel, Some(10));
        assert_eq!(workflow.stage_names(), vec!["setup", "install", "test"]);

        let setup = &workflow.stages[0];
        assert_eq!(setup.steps.len(), 2);
        assert_eq!(setup.steps[0].uses.as_deref(), Some("checkout@v4"));
        assert_eq!(
            setup.steps[1].env.get("CONDA_ALWAYS_YES").map(String::as_str),
            Some("true")
        );
        assert_eq!(setup.steps[1].add_path, vec![PathBuf::from("/opt/conda/bin")]);
    }

    #[test]
    fn test_omitted_max_parallel_is_none() {
        let workflow =
            Workflow::from_yaml_str("stages:\n  - name: only\n    steps:\n      - run: \"true\"\n")
                .expect("parse failed");
        assert!(workflow.max_parallel.is_none());
        assert_eq!(workflow.name, "ci");
    }

    #[test]
    fn test_validate_rejects_empty_stages() {
        let workflow = Workflow::new("empty", vec![]);
        assert!(matches!(
            workflow.validate(),
            Err(CiError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_steps() {
        let workflow = Workflow::new("ci", vec![StageSpec::new("setup", vec![])]);
        assert!(matches!(
            workflow.validate(),
            Err(CiError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_stage_names() {
        let workflow = Workflow::new(
            "ci",
            vec![
                StageSpec::new("setup", vec![StepSpec::shell("true")]),
                StageSpec::new("setup", vec![StepSpec::shell("true")]),
            ],
        );
        assert!(matches!(
            workflow.validate(),
            Err(CiError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn test_validate_rejects_ambiguous_step() {
        let mut step = StepSpec::shell("true");
        step.uses = Some("checkout@v4".to_string());
        let workflow = Workflow::new("ci", vec![StageSpec::new("setup", vec![step])]);
        assert!(matches!(
            workflow.validate(),
            Err(CiError::InvalidWorkflow(_))
        ));

        let workflow = Workflow::new("ci", vec![StageSpec::new("setup", vec![StepSpec::default()])]);
        assert!(matches!(
            workflow.validate(),
            Err(CiError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn test_stages_digest_deterministic() {
        let a = Workflow::from_yaml_str(SAMPLE).unwrap();
        let b = Workflow::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(a.stages_digest(), b.stages_digest());
    }

    #[test]
    fn test_stages_digest_order_sensitive() {
        let digest1 = compute_stages_digest(&["setup".to_string(), "test".to_string()]);
        let digest2 = compute_stages_digest(&["test".to_string(), "setup".to_string()]);
        assert_ne!(digest1, digest2);
    }

    #[test]
    fn test_step_label() {
        assert_eq!(StepSpec::shell("true").label(0), "step-1");
        assert_eq!(StepSpec::action("checkout@v4").label(3), "checkout@v4");
        assert_eq!(StepSpec::shell("true").named("lint").label(0), "lint");
    }
}
