//! Reusable-action resolution.
//!
//! A `uses:` step names a pinned external action. Actions themselves are
//! external collaborators; what this crate owns is the expansion of a
//! reference into concrete commands and run-environment mutations. The
//! registry is an injection seam: production code uses the builtins,
//! tests register fakes so no step ever touches the network.

use crate::env::RunEnv;
use crate::error::{CiError, Result};
use std::collections::{BTreeMap, HashMap};

/// Commands an action expands to, argv-style.
pub type ActionCommands = Vec<Vec<String>>;

/// Expands a `with:` parameter map into commands, optionally mutating the
/// run environment (path appends, package registration).
pub type ActionHandler =
    Box<dyn Fn(&BTreeMap<String, String>, &mut RunEnv) -> Result<ActionCommands> + Send + Sync>;

/// Registry of known actions, keyed by pinned reference (`name@version`).
pub struct ActionRegistry {
    handlers: HashMap<String, ActionHandler>,
}

impl ActionRegistry {
    /// Empty registry. Every `uses:` step will fail to resolve.
    pub fn empty() -> Self {
        ActionRegistry {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the builtin actions.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        // Source checkout. `repository` clones into the working directory,
        // `ref` checks out a specific revision.
        registry.register("checkout@v4", |with, _env| {
            let mut commands = Vec::new();
            if let Some(repo) = with.get("repository") {
                commands.push(argv(&["git", "clone", "--depth", "1", repo.as_str(), "."]));
            }
            if let Some(rev) = with.get("ref") {
                commands.push(argv(&["git", "checkout", rev.as_str()]));
            }
            if commands.is_empty() {
                commands.push(argv(&["git", "status", "--short"]));
            }
            Ok(commands)
        });

        // Conda-based environment provisioning. Registers the package
        // manager and puts its bin directory on the run's search path.
        registry.register("setup-conda@v3", |with, env| {
            let prefix = with
                .get("prefix")
                .map(String::as_str)
                .unwrap_or("/opt/conda");
            env.append_path(format!("{prefix}/bin"));
            env.register_package("conda");

            let mut commands = vec![argv(&["conda", "--version"])];
            if let Some(file) = with.get("environment-file") {
                commands.push(argv(&["conda", "env", "update", "-f", file.as_str()]));
            }
            Ok(commands)
        });

        registry
    }

    /// Register a handler for a pinned action reference.
    pub fn register<F>(&mut self, uses: impl Into<String>, handler: F)
    where
        F: Fn(&BTreeMap<String, String>, &mut RunEnv) -> Result<ActionCommands>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(uses.into(), Box::new(handler));
    }

    pub fn contains(&self, uses: &str) -> bool {
        self.handlers.contains_key(uses)
    }

    /// Resolve a `uses:` reference into commands for the current run.
    ///
    /// An unknown reference is an error; the stage runner folds it into a
    /// failing step outcome rather than propagating it.
    pub fn resolve(
        &self,
        uses: &str,
        with: &BTreeMap<String, String>,
        env: &mut RunEnv,
    ) -> Result<ActionCommands> {
        let handler = self
            .handlers
            .get(uses)
            .ok_or_else(|| CiError::UnknownAction(uses.to_string()))?;
        handler(with, env)
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}
