//! Tool runner trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{RunConfig, ToolCommand};
use crate::error::RunnerResult;

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit code reported by the tool (-1 when killed by a signal)
    pub exit_code: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Execution start time
    pub started_at: DateTime<Utc>,
    /// Execution end time
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Last non-empty line of stderr, falling back to stdout.
    pub fn last_error_line(&self) -> Option<&str> {
        fn last_line(text: &str) -> Option<&str> {
            text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
        }
        last_line(&self.stderr).or_else(|| last_line(&self.stdout))
    }
}

/// Executes external tools.
///
/// A non-zero exit code is not an error at this level: the result carries the
/// code and the caller decides what it means. `Err` is reserved for failures to
/// run the tool at all (missing binary, timeout, IO).
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Check if the given program can be executed.
    async fn is_available(&self, program: &str) -> RunnerResult<bool>;

    /// Get version information for the given program.
    async fn version(&self, program: &str) -> RunnerResult<String>;

    /// Run a tool invocation to completion.
    async fn run(&self, command: &ToolCommand, run_config: &RunConfig) -> RunnerResult<ExecutionResult>;
}
