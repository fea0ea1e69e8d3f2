//! Run-scoped environment state.
//!
//! A [`RunEnv`] is an explicit value owned by its run: a search-path list,
//! an installed-package set, and a variable map. It starts empty, is
//! mutated only by steps, and is dropped when the run reaches a terminal
//! state. Concurrent runs never share one.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Mutable environment scoped to a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEnv {
    search_path: Vec<PathBuf>,
    installed: BTreeSet<String>,
    vars: BTreeMap<String, String>,
}

impl RunEnv {
    /// Fresh, empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directory to the search path. Duplicates are ignored.
    pub fn append_path(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.search_path.contains(&dir) {
            self.search_path.push(dir);
        }
    }

    /// Record a package as installed for the remainder of the run.
    pub fn register_package(&mut self, name: impl Into<String>) {
        self.installed.insert(name.into());
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.installed.contains(name)
    }

    /// Set a variable, persisting for the remainder of the run.
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    pub fn installed_packages(&self) -> impl Iterator<Item = &str> {
        self.installed.iter().map(String::as_str)
    }

    /// Variables to inject into a spawned step process.
    ///
    /// Run-level search-path entries take precedence over the inherited
    /// `PATH`, so tools provisioned by earlier stages resolve first. An
    /// explicit `PATH` variable set by a step wins outright.
    pub fn process_vars(&self) -> BTreeMap<String, String> {
        let mut vars = self.vars.clone();
        if !self.search_path.is_empty() && !vars.contains_key("PATH") {
            let inherited = std::env::var_os("PATH").unwrap_or_default();
            let entries: Vec<std::path::PathBuf> = self
                .search_path
                .iter()
                .cloned()
                .chain(std::env::split_paths(&inherited))
                .collect();
            let joined = std::env::join_paths(entries).unwrap_or(inherited);
            vars.insert("PATH".to_string(), joined.to_string_lossy().into_owned());
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let env = RunEnv::new();
        assert!(env.search_path().is_empty());
        assert!(env.process_vars().is_empty());
        assert_eq!(env.installed_packages().count(), 0);
    }

    #[test]
    fn test_append_path_ignores_duplicates() {
        let mut env = RunEnv::new();
        env.append_path("/opt/conda/bin");
        env.append_path("/opt/conda/bin");
        env.append_path("/usr/local/bin");
        assert_eq!(env.search_path().len(), 2);
    }

    #[test]
    fn test_process_vars_prepend_search_path() {
        let mut env = RunEnv::new();
        env.append_path("/opt/conda/bin");
        let vars = env.process_vars();
        let path = vars.get("PATH").expect("PATH should be set");
        assert!(path.starts_with("/opt/conda/bin"));
    }

    #[test]
    fn test_explicit_path_var_wins() {
        let mut env = RunEnv::new();
        env.append_path("/opt/conda/bin");
        env.set_var("PATH", "/only/this");
        assert_eq!(env.process_vars().get("PATH").map(String::as_str), Some("/only/this"));
    }

    #[test]
    fn test_vars_and_packages() {
        let mut env = RunEnv::new();
        env.set_var("CONDA_ALWAYS_YES", "true");
        env.register_package("pytest");
        assert_eq!(env.var("CONDA_ALWAYS_YES"), Some("true"));
        assert!(env.has_package("pytest"));
        assert!(!env.has_package("torch"));
    }
}
