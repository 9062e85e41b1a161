//! Error types for policy module.

use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur while building or running an audit.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Invalid rule: {rule} - {message}")]
    InvalidRule { rule: String, message: String },

    #[error("Invalid include pattern: {0}")]
    InvalidPattern(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
