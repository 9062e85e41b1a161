//! Host-process tool runner.
//!
//! Tools are spawned directly with `tokio::process`. Children are created with
//! `kill_on_drop`, so abandoning a run (timeout or a dropped future) never
//! leaves a tool process behind.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::{RunConfig, ToolCommand};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{ExecutionResult, ToolRunner};

/// Log output from a tool execution.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: chrono::DateTime<Utc>,
    pub stream: LogStream,
    pub message: String,
}

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Log handler callback type.
pub type LogHandler = Arc<dyn Fn(LogLine) + Send + Sync>;

/// Runs tools as processes on the current host.
#[derive(Default, Clone)]
pub struct LocalRunner {
    log_handler: Option<LogHandler>,
}

impl LocalRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a log handler for streaming output lines.
    pub fn with_log_handler(mut self, handler: LogHandler) -> Self {
        self.log_handler = Some(handler);
        self
    }
}

#[async_trait]
impl ToolRunner for LocalRunner {
    async fn is_available(&self, program: &str) -> RunnerResult<bool> {
        let status = Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        Ok(status.map(|s| s.success()).unwrap_or(false))
    }

    async fn version(&self, program: &str) -> RunnerResult<String> {
        let output = Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(program, e))?;

        if !output.status.success() {
            return Err(RunnerError::ExecutionFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    async fn run(&self, command: &ToolCommand, run_config: &RunConfig) -> RunnerResult<ExecutionResult> {
        if !command.workdir.is_dir() {
            return Err(RunnerError::InvalidWorkdir(
                command.workdir.display().to_string(),
            ));
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&command.workdir)
            .envs(&command.env);

        info!("Running {} in {:?}", command.display(), command.workdir);
        execute(cmd, &command.program, &command.display(), run_config, self.log_handler.clone()).await
    }
}

/// Map a spawn failure to a runner error.
pub(crate) fn spawn_error(program: &str, e: std::io::Error) -> RunnerError {
    if e.kind() == ErrorKind::NotFound {
        RunnerError::ToolNotAvailable(format!("'{}' was not found on PATH", program))
    } else {
        RunnerError::ExecutionFailed(format!("Failed to spawn {}: {}", program, e))
    }
}

/// Spawn a prepared command, capture both streams and wait for it to exit.
pub(crate) async fn execute(
    mut cmd: Command,
    program: &str,
    display_name: &str,
    run_config: &RunConfig,
    log_handler: Option<LogHandler>,
) -> RunnerResult<ExecutionResult> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Executing: {}", display_name);

    let started_at = Utc::now();
    let mut child = cmd.spawn().map_err(|e| spawn_error(program, e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RunnerError::ExecutionFailed("stdout was not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RunnerError::ExecutionFailed("stderr was not captured".to_string()))?;

    let forward = run_config.stream_logs;
    let wait = async {
        let (out, err, status) = tokio::join!(
            collect_lines(stdout, LogStream::Stdout, forward, log_handler.clone()),
            collect_lines(stderr, LogStream::Stderr, forward, log_handler.clone()),
            child.wait(),
        );
        Ok::<_, RunnerError>((status?, out?, err?))
    };

    let (status, stdout, stderr) = if run_config.timeout_seconds > 0 {
        let limit = Duration::from_secs(run_config.timeout_seconds);
        let outcome = tokio::time::timeout(limit, wait).await;
        match outcome {
            Ok(result) => result?,
            Err(_) => {
                let _ = child.start_kill();
                error!("{} timed out after {}s", display_name, run_config.timeout_seconds);
                return Err(RunnerError::Timeout(run_config.timeout_seconds));
            }
        }
    } else {
        wait.await?
    };

    let finished_at = Utc::now();
    let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
    let exit_code = status.code().unwrap_or(-1);

    if exit_code == 0 {
        info!("{} completed successfully in {}ms", program, duration_ms);
    } else {
        info!("{} exited with code {} after {}ms", program, exit_code, duration_ms);
    }

    Ok(ExecutionResult {
        exit_code,
        stdout,
        stderr,
        started_at,
        finished_at,
        duration_ms,
    })
}

async fn collect_lines<R>(
    reader: R,
    stream: LogStream,
    forward: bool,
    handler: Option<LogHandler>,
) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut output = String::new();

    while let Some(line) = lines.next_line().await? {
        if forward {
            debug!("[{}] {}", stream, line);
            if let Some(handler) = &handler {
                handler(LogLine {
                    timestamp: Utc::now(),
                    stream,
                    message: line.clone(),
                });
            }
        }
        output.push_str(&line);
        output.push('\n');
    }

    Ok(output)
}
