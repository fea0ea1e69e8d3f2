//! Error types for pipeline operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiError {
    #[error("Workflow parse error: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Invalid run status transition: {current} -> {requested}")]
    InvalidStatusTransition { current: String, requested: String },

    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, CiError>;
