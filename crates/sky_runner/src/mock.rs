//! Mock tool runner for testing.
//!
//! Provides a configurable mock implementation of the ToolRunner trait
//! for use in unit tests without requiring the real tool on the host.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::config::{RunConfig, ToolCommand};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{ExecutionResult, ToolRunner};

/// Predefined mock response for a tool execution.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 100,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 100,
        }
    }

    /// A run that exits with the given code and prints to stdout.
    pub fn exit(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 100,
        }
    }

    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }
}

/// Failure returned for every run instead of a response.
#[derive(Debug, Clone)]
enum SimulatedFailure {
    ToolMissing(String),
    Timeout(u64),
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    pub program: Option<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub workdir: Option<PathBuf>,
    /// Files present in the working directory when the call was made
    pub workdir_files: Vec<String>,
}

impl CapturedCall {
    fn method(method: &str, program: &str) -> Self {
        Self {
            method: method.to_string(),
            program: Some(program.to_string()),
            args: Vec::new(),
            env: BTreeMap::new(),
            workdir: None,
            workdir_files: Vec::new(),
        }
    }

    /// First argument of the invocation (the tool subcommand).
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Mock tool runner for testing.
///
/// Responses are consumed in order; once the queue is empty every further
/// run succeeds with empty output.
#[derive(Clone)]
pub struct MockRunner {
    /// Whether the tool should report as available.
    available: Arc<RwLock<bool>>,
    /// Version string to return.
    version: Arc<RwLock<String>>,
    /// Queued responses for run calls.
    responses: Arc<RwLock<VecDeque<MockResponse>>>,
    /// Captured calls for verification.
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    /// Simulated failure to return for every run.
    simulate_failure: Arc<RwLock<Option<SimulatedFailure>>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self {
            available: Arc::new(RwLock::new(true)),
            version: Arc::new(RwLock::new("Terraform v1.6.0".to_string())),
            responses: Arc::new(RwLock::new(VecDeque::new())),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            simulate_failure: Arc::new(RwLock::new(None)),
        }
    }

    /// Set whether the tool is available.
    pub fn set_available(self, available: bool) -> Self {
        *self.available.write() = available;
        self
    }

    /// Set the version string.
    pub fn set_version(self, version: impl Into<String>) -> Self {
        *self.version.write() = version.into();
        self
    }

    /// Queue a response for the next run call.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push_back(response);
        self
    }

    /// Replace the queued responses.
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        *self.responses.write() = responses.into();
        self
    }

    /// Make every run fail as if the tool could not be executed.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(SimulatedFailure::ToolMissing(message.into()));
        self
    }

    /// Make every run fail as if it exceeded the given timeout.
    pub fn simulate_timeout(self, seconds: u64) -> Self {
        *self.simulate_failure.write() = Some(SimulatedFailure::Timeout(seconds));
        self
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Check if a specific method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls.read().iter().any(|c| c.method == method)
    }

    /// Get run calls whose first argument is the given subcommand.
    pub fn get_subcommand_calls(&self, subcommand: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == "run" && c.subcommand() == Some(subcommand))
            .cloned()
            .collect()
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    fn next_response(&self) -> MockResponse {
        self.responses
            .write()
            .pop_front()
            .unwrap_or_else(|| MockResponse::success(""))
    }

    fn check_failure(&self) -> RunnerResult<()> {
        match self.simulate_failure.read().clone() {
            Some(SimulatedFailure::ToolMissing(msg)) => Err(RunnerError::ToolNotAvailable(msg)),
            Some(SimulatedFailure::Timeout(seconds)) => Err(RunnerError::Timeout(seconds)),
            None => Ok(()),
        }
    }
}

fn list_files(dir: &std::path::Path) -> Vec<String> {
    let mut files: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

#[async_trait]
impl ToolRunner for MockRunner {
    async fn is_available(&self, program: &str) -> RunnerResult<bool> {
        self.record_call(CapturedCall::method("is_available", program));
        Ok(*self.available.read())
    }

    async fn version(&self, program: &str) -> RunnerResult<String> {
        self.record_call(CapturedCall::method("version", program));
        self.check_failure()?;
        Ok(self.version.read().clone())
    }

    async fn run(&self, command: &ToolCommand, _run_config: &RunConfig) -> RunnerResult<ExecutionResult> {
        self.record_call(CapturedCall {
            method: "run".to_string(),
            program: Some(command.program.clone()),
            args: command.args.clone(),
            env: command.env.clone(),
            workdir: Some(command.workdir.clone()),
            workdir_files: list_files(&command.workdir),
        });

        self.check_failure()?;

        let response = self.next_response();
        let started_at = Utc::now();
        let finished_at = started_at + chrono::Duration::milliseconds(response.duration_ms as i64);

        Ok(ExecutionResult {
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at,
            finished_at,
            duration_ms: response.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runner_basic() {
        let runner = MockRunner::new().add_response(MockResponse::success("test output"));
        let command = ToolCommand::new("terraform", "/tmp").arg("version");

        let result = runner.run(&command, &RunConfig::default()).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "test output");
    }

    #[tokio::test]
    async fn test_mock_runner_captures_calls() {
        let runner = MockRunner::new();
        let command = ToolCommand::new("terraform", "/tmp")
            .args(["plan", "-no-color"])
            .env("TF_INPUT", "0");

        let _ = runner.run(&command, &RunConfig::default()).await;

        let calls = runner.get_subcommand_calls("plan");
        assert_eq!(calls.len(), 1);

        let call = &calls[0];
        assert_eq!(call.program.as_deref(), Some("terraform"));
        assert_eq!(call.args, vec!["plan".to_string(), "-no-color".to_string()]);
        assert_eq!(call.env.get("TF_INPUT"), Some(&"0".to_string()));
        assert_eq!(call.workdir, Some(PathBuf::from("/tmp")));
    }

    #[tokio::test]
    async fn test_mock_runner_failure_simulation() {
        let runner = MockRunner::new().simulate_failure("terraform missing");
        let command = ToolCommand::new("terraform", "/tmp");

        let result = runner.run(&command, &RunConfig::default()).await;
        assert!(matches!(result, Err(RunnerError::ToolNotAvailable(_))));
    }

    #[tokio::test]
    async fn test_mock_runner_timeout_simulation() {
        let runner = MockRunner::new().simulate_timeout(30);
        let command = ToolCommand::new("terraform", "/tmp").arg("plan");

        let result = runner.run(&command, &RunConfig::default()).await;
        assert!(matches!(result, Err(RunnerError::Timeout(30))));
        assert_eq!(runner.get_subcommand_calls("plan").len(), 1);
    }

    #[tokio::test]
    async fn test_mock_runner_sequential_responses() {
        let runner = MockRunner::new().with_responses(vec![
            MockResponse::success("first"),
            MockResponse::exit(2, "second"),
        ]);
        let command = ToolCommand::new("terraform", "/tmp");

        let r1 = runner.run(&command, &RunConfig::default()).await.unwrap();
        assert_eq!(r1.stdout, "first");

        let r2 = runner.run(&command, &RunConfig::default()).await.unwrap();
        assert_eq!(r2.exit_code, 2);
        assert_eq!(r2.stdout, "second");

        let r3 = runner.run(&command, &RunConfig::default()).await.unwrap();
        assert!(r3.success());
        assert_eq!(runner.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_runner_availability() {
        let available = MockRunner::new().set_available(true);
        assert!(available.is_available("terraform").await.unwrap());

        let unavailable = MockRunner::new().set_available(false);
        assert!(!unavailable.is_available("terraform").await.unwrap());
        assert!(unavailable.was_called("is_available"));
    }
}
