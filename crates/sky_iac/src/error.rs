//! Error types for IaC module.

use thiserror::Error;

use crate::graph::NodeId;

/// Result type alias for IaC operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors that can occur during IaC operations.
#[derive(Error, Debug)]
pub enum IacError {
    /// Missing or malformed input supplied by the caller.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource name collision: nodes '{first}' and '{second}' both derive the name '{name}'")]
    NameCollision {
        name: String,
        first: NodeId,
        second: NodeId,
    },

    #[error("Node id already exists: {0}")]
    DuplicateNodeId(NodeId),

    #[error("Node id was deleted and cannot be reused: {0}")]
    NodeIdRetired(NodeId),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Terraform not available: {0}")]
    ToolUnavailable(String),

    #[error("terraform {stage} failed with exit code {exit_code}: {summary}")]
    ExternalTool {
        stage: String,
        exit_code: i32,
        summary: String,
        stdout: String,
        stderr: String,
    },

    #[error("State output could not be parsed: {0}")]
    StateParse(String),

    #[error("Runner error: {0}")]
    Runner(#[from] sky_runner::RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
