//! Trigger events produced by the version-control host.

use serde::{Deserialize, Serialize};

/// Kind of event that initiates a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    Push,
    PullRequest,
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerEvent::Push => write!(f, "push"),
            TriggerEvent::PullRequest => write!(f, "pull_request"),
        }
    }
}

/// An external event that initiates exactly one run.
///
/// Triggers are created by the version-control host and treated as
/// immutable. Two triggers for the same revision still produce two
/// independent runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Event kind.
    pub event: TriggerEvent,

    /// Repository reference (URL or local path).
    pub repo: String,

    /// Revision the trigger points at, when the host supplies one.
    pub revision: Option<String>,
}

impl Trigger {
    pub fn push(repo: impl Into<String>) -> Self {
        Trigger {
            event: TriggerEvent::Push,
            repo: repo.into(),
            revision: None,
        }
    }

    pub fn pull_request(repo: impl Into<String>) -> Self {
        Trigger {
            event: TriggerEvent::PullRequest,
            repo: repo.into(),
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}
