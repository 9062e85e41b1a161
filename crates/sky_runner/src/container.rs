//! Container-backed tool runner supporting Docker and Podman.
//!
//! The tool runs inside an image with the invocation's working directory
//! bind-mounted, so the host only needs a container runtime.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::{RunConfig, ToolCommand, ToolImage};
use crate::error::{RunnerError, RunnerResult};
use crate::local::{execute, spawn_error, LogHandler};
use crate::runner::{ExecutionResult, ToolRunner};

/// Container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Get the CLI command name.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Runs tools inside a container image.
pub struct ContainerRunner {
    runtime: ContainerRuntime,
    image: ToolImage,
    log_handler: Option<LogHandler>,
}

impl ContainerRunner {
    /// Create a runner with automatic runtime detection.
    pub async fn detect(image: ToolImage, preferred: Option<ContainerRuntime>) -> RunnerResult<Self> {
        let runtime = Self::detect_runtime(preferred).await?;
        info!("Using container runtime: {}", runtime);
        Ok(Self::with_runtime(runtime, image))
    }

    /// Create a runner with a specific runtime.
    pub fn with_runtime(runtime: ContainerRuntime, image: ToolImage) -> Self {
        Self {
            runtime,
            image,
            log_handler: None,
        }
    }

    /// Set a log handler for streaming output lines.
    pub fn with_log_handler(mut self, handler: LogHandler) -> Self {
        self.log_handler = Some(handler);
        self
    }

    /// Get the current runtime.
    pub fn runtime(&self) -> ContainerRuntime {
        self.runtime
    }

    /// Detect an available container runtime.
    pub async fn detect_runtime(preferred: Option<ContainerRuntime>) -> RunnerResult<ContainerRuntime> {
        if let Some(preferred) = preferred {
            if Self::is_runtime_available(preferred).await {
                return Ok(preferred);
            }
            warn!(
                "Preferred runtime {} not available, trying alternatives",
                preferred
            );
        }

        for runtime in [ContainerRuntime::Docker, ContainerRuntime::Podman] {
            if Self::is_runtime_available(runtime).await {
                return Ok(runtime);
            }
        }

        Err(RunnerError::RuntimeNotAvailable(
            "Neither Docker nor Podman is available".to_string(),
        ))
    }

    async fn is_runtime_available(runtime: ContainerRuntime) -> bool {
        Command::new(runtime.command())
            .arg("version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Build the runtime arguments for one tool invocation.
    ///
    /// Environment variables are passed by name only (`-e KEY`); their values
    /// travel through the runtime process environment so they never show up
    /// in a process listing.
    fn build_run_args(&self, command: &ToolCommand) -> Vec<String> {
        let mount = &self.image.mount_target;
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:{}", command.workdir.to_string_lossy(), mount),
            "-w".to_string(),
            mount.clone(),
        ];

        if let Some(user) = workdir_owner(command) {
            args.push("-u".to_string());
            args.push(user);
        }

        for key in command.env.keys() {
            args.push("-e".to_string());
            args.push(key.clone());
        }

        args.push("--entrypoint".to_string());
        args.push(command.program.clone());
        args.push(self.image.full_image());
        args.extend(command.args.iter().cloned());
        args
    }
}

/// Run as the owner of the mounted directory so generated files stay removable.
#[cfg(unix)]
fn workdir_owner(command: &ToolCommand) -> Option<String> {
    use std::os::unix::fs::MetadataExt;

    std::fs::metadata(&command.workdir)
        .ok()
        .map(|meta| format!("{}:{}", meta.uid(), meta.gid()))
}

#[cfg(not(unix))]
fn workdir_owner(_command: &ToolCommand) -> Option<String> {
    None
}

#[async_trait]
impl ToolRunner for ContainerRunner {
    async fn is_available(&self, _program: &str) -> RunnerResult<bool> {
        Ok(Self::is_runtime_available(self.runtime).await)
    }

    async fn version(&self, program: &str) -> RunnerResult<String> {
        let output = Command::new(self.runtime.command())
            .args(["run", "--rm", "--entrypoint", program])
            .arg(self.image.full_image())
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(self.runtime.command(), e))?;

        if !output.status.success() {
            return Err(RunnerError::ExecutionFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(format!(
            "{} ({})",
            stdout.lines().next().unwrap_or_default().trim(),
            self.image.full_image()
        ))
    }

    async fn run(&self, command: &ToolCommand, run_config: &RunConfig) -> RunnerResult<ExecutionResult> {
        if !command.workdir.is_dir() {
            return Err(RunnerError::InvalidWorkdir(
                command.workdir.display().to_string(),
            ));
        }

        let args = self.build_run_args(command);
        let display = format!("{} {}", self.runtime, args.join(" "));

        let mut cmd = Command::new(self.runtime.command());
        cmd.args(&args).envs(&command.env);

        info!("Running {} in container {}", command.display(), self.image.full_image());
        execute(cmd, self.runtime.command(), &display, run_config, self.log_handler.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_build_run_args() {
        let dir = tempdir().unwrap();
        let runner = ContainerRunner::with_runtime(ContainerRuntime::Docker, ToolImage::terraform());
        let command = ToolCommand::new("terraform", dir.path())
            .args(["plan", "-detailed-exitcode"])
            .env("TF_IN_AUTOMATION", "1");

        let args = runner.build_run_args(&command);

        assert_eq!(args[0], "run");
        assert!(args.contains(&"--rm".to_string()));
        assert!(args.contains(&format!("{}:/workspace", dir.path().to_string_lossy())));
        assert!(args.contains(&"TF_IN_AUTOMATION".to_string()));
        assert!(!args.iter().any(|a| a.contains("TF_IN_AUTOMATION=1")));

        let image_pos = args.iter().position(|a| a == "hashicorp/terraform:1.6").unwrap();
        assert_eq!(args[image_pos - 1], "terraform");
        assert_eq!(&args[image_pos + 1..], ["plan", "-detailed-exitcode"]);
    }

    #[test]
    fn test_runtime_command() {
        assert_eq!(ContainerRuntime::Docker.command(), "docker");
        assert_eq!(ContainerRuntime::Podman.to_string(), "podman");
    }
}
