//! Terraform invocation and plan orchestration.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sky_runner::{ExecutionResult, RunConfig, RunnerError, ToolCommand, ToolRunner};

use crate::config::TerraformSettings;
use crate::error::{IacError, IacResult};

/// Name of the saved plan file written by `plan -out`.
pub const PLAN_FILE: &str = "tfplan";

/// Terraform runner that executes commands through a [`ToolRunner`].
pub struct TerraformRunner {
    runner: Arc<dyn ToolRunner>,
    binary: String,
    run_config: RunConfig,
}

impl TerraformRunner {
    /// Create a new Terraform runner.
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            runner,
            binary: "terraform".to_string(),
            run_config: RunConfig::default(),
        }
    }

    pub fn from_settings(runner: Arc<dyn ToolRunner>, settings: &TerraformSettings) -> Self {
        Self::new(runner)
            .with_binary(&settings.binary)
            .with_run_config(RunConfig::default().timeout(settings.timeout_seconds))
    }

    /// Set the Terraform binary name or path.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }

    /// Whether the Terraform binary can be executed.
    pub async fn is_available(&self) -> bool {
        self.runner.is_available(&self.binary).await.unwrap_or(false)
    }

    /// Terraform version string.
    pub async fn version(&self) -> IacResult<String> {
        self.runner.version(&self.binary).await.map_err(tool_error)
    }

    /// Run terraform init.
    pub async fn init(&self, working_dir: &Path) -> IacResult<ExecutionResult> {
        info!("Running terraform init in {:?}", working_dir);
        self.run_command(working_dir, &["init", "-input=false", "-no-color"]).await
    }

    /// Run terraform plan with `-detailed-exitcode`, optionally saving the plan.
    pub async fn plan(&self, working_dir: &Path, out_file: Option<&str>) -> IacResult<ExecutionResult> {
        info!("Running terraform plan in {:?}", working_dir);
        let mut args = vec![
            "plan".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
            "-detailed-exitcode".to_string(),
        ];
        if let Some(out) = out_file {
            args.push(format!("-out={}", out));
        }
        let args = args.iter().map(String::as_str).collect::<Vec<_>>();
        self.run_command(working_dir, &args).await
    }

    /// Run terraform state pull.
    pub async fn state_pull(&self, working_dir: &Path) -> IacResult<ExecutionResult> {
        info!("Running terraform state pull in {:?}", working_dir);
        self.run_command(working_dir, &["state", "pull"]).await
    }

    /// Run arbitrary terraform command.
    async fn run_command(&self, working_dir: &Path, args: &[&str]) -> IacResult<ExecutionResult> {
        let command = ToolCommand::new(&self.binary, working_dir)
            .args(args.iter().copied())
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_INPUT", "0")
            .env("CHECKPOINT_DISABLE", "1");

        debug!("Executing {}", command.display());

        let result = self
            .runner
            .run(&command, &self.run_config)
            .await
            .map_err(tool_error)?;

        debug!(
            "terraform {} exited with {} after {}ms",
            args.first().copied().unwrap_or_default(),
            result.exit_code,
            result.duration_ms
        );
        Ok(result)
    }
}

fn tool_error(error: RunnerError) -> IacError {
    match error {
        RunnerError::ToolNotAvailable(m) | RunnerError::RuntimeNotAvailable(m) => IacError::ToolUnavailable(m),
        other => IacError::Runner(other),
    }
}

/// Classification of a plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOutcome {
    NoChange,
    ChangesPending,
    Error,
}

impl PlanOutcome {
    /// Classify a `-detailed-exitcode` plan exit code.
    pub fn from_exit_code(exit_code: i32) -> Self {
        match exit_code {
            0 => PlanOutcome::NoChange,
            2 => PlanOutcome::ChangesPending,
            _ => PlanOutcome::Error,
        }
    }
}

/// Step of the plan pipeline a report ended at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStage {
    Init,
    Plan,
}

impl std::fmt::Display for PlanStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStage::Init => write!(f, "init"),
            PlanStage::Plan => write!(f, "plan"),
        }
    }
}

/// Exit code and output of one orchestrated plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub outcome: PlanOutcome,
    /// Last step that ran
    pub stage: PlanStage,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl PlanReport {
    fn from_result(stage: PlanStage, outcome: PlanOutcome, result: ExecutionResult) -> Self {
        Self {
            outcome,
            stage,
            exit_code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
            duration_ms: result.duration_ms,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.outcome == PlanOutcome::ChangesPending
    }

    /// The failure as an error, if the run failed.
    pub fn to_error(&self) -> Option<IacError> {
        if self.outcome != PlanOutcome::Error {
            return None;
        }
        Some(external_tool_error(
            &self.stage.to_string(),
            self.exit_code,
            &self.stdout,
            &self.stderr,
        ))
    }
}

/// Build an [`IacError::ExternalTool`] from captured output.
pub fn external_tool_error(stage: &str, exit_code: i32, stdout: &str, stderr: &str) -> IacError {
    let summary = last_line(stderr)
        .or_else(|| last_line(stdout))
        .unwrap_or("no output")
        .to_string();
    IacError::ExternalTool {
        stage: stage.to_string(),
        exit_code,
        summary,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rev().find(|l| !l.is_empty())
}

/// Runs `init` then `plan -detailed-exitcode` in a workspace.
///
/// The exit code alone decides the outcome. No retries: a failed invocation
/// is reported to the caller.
pub struct PlanOrchestrator {
    terraform: TerraformRunner,
}

impl PlanOrchestrator {
    pub fn new(terraform: TerraformRunner) -> Self {
        Self { terraform }
    }

    pub fn terraform(&self) -> &TerraformRunner {
        &self.terraform
    }

    /// Initialize and plan. A failed init ends the run before plan.
    pub async fn plan(&self, workspace: &Path) -> IacResult<PlanReport> {
        self.plan_with_output(workspace, None).await
    }

    /// Like [`plan`](Self::plan), saving the plan to `out_file` in the workspace.
    pub async fn plan_with_output(&self, workspace: &Path, out_file: Option<&str>) -> IacResult<PlanReport> {
        let init = self.terraform.init(workspace).await?;
        if !init.success() {
            warn!("terraform init failed with exit code {}", init.exit_code);
            return Ok(PlanReport::from_result(PlanStage::Init, PlanOutcome::Error, init));
        }

        self.run_plan(workspace, out_file).await
    }

    /// Plan in an already initialized workspace.
    pub async fn run_plan(&self, workspace: &Path, out_file: Option<&str>) -> IacResult<PlanReport> {
        let plan = self.terraform.plan(workspace, out_file).await?;
        let outcome = PlanOutcome::from_exit_code(plan.exit_code);
        match outcome {
            PlanOutcome::Error => warn!("terraform plan failed with exit code {}", plan.exit_code),
            _ => info!("terraform plan finished: {:?}", outcome),
        }

        Ok(PlanReport::from_result(PlanStage::Plan, outcome, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sky_runner::{MockResponse, MockRunner};
    use tempfile::tempdir;

    fn orchestrator(mock: &MockRunner) -> PlanOrchestrator {
        PlanOrchestrator::new(TerraformRunner::new(Arc::new(mock.clone())))
    }

    #[test]
    fn test_exit_code_classification() {
        assert_eq!(PlanOutcome::from_exit_code(0), PlanOutcome::NoChange);
        assert_eq!(PlanOutcome::from_exit_code(2), PlanOutcome::ChangesPending);
        assert_eq!(PlanOutcome::from_exit_code(1), PlanOutcome::Error);
        assert_eq!(PlanOutcome::from_exit_code(-1), PlanOutcome::Error);
        assert_eq!(PlanOutcome::from_exit_code(137), PlanOutcome::Error);
    }

    #[tokio::test]
    async fn test_plan_no_changes() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new().with_responses(vec![
            MockResponse::success("Terraform has been successfully initialized!"),
            MockResponse::success("No changes. Your infrastructure matches the configuration."),
        ]);

        let report = orchestrator(&mock).plan(dir.path()).await.unwrap();

        assert_eq!(report.outcome, PlanOutcome::NoChange);
        assert_eq!(report.stage, PlanStage::Plan);
        assert!(!report.has_changes());
        assert!(report.to_error().is_none());
    }

    #[tokio::test]
    async fn test_plan_changes_pending() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new().with_responses(vec![
            MockResponse::success(""),
            MockResponse::exit(2, "~ aws_instance.web"),
        ]);

        let report = orchestrator(&mock).plan(dir.path()).await.unwrap();

        assert_eq!(report.outcome, PlanOutcome::ChangesPending);
        assert_eq!(report.exit_code, 2);
        assert_eq!(report.stdout, "~ aws_instance.web");
    }

    #[tokio::test]
    async fn test_init_failure_skips_plan() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new().add_response(MockResponse::failure(1, "Error: Failed to query provider"));

        let report = orchestrator(&mock).plan(dir.path()).await.unwrap();

        assert_eq!(report.outcome, PlanOutcome::Error);
        assert_eq!(report.stage, PlanStage::Init);
        assert_eq!(mock.get_subcommand_calls("init").len(), 1);
        assert!(mock.get_subcommand_calls("plan").is_empty());

        match report.to_error() {
            Some(IacError::ExternalTool { stage, exit_code, summary, .. }) => {
                assert_eq!(stage, "init");
                assert_eq!(exit_code, 1);
                assert_eq!(summary, "Error: Failed to query provider");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plan_arguments_and_environment() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new();

        orchestrator(&mock)
            .plan_with_output(dir.path(), Some(PLAN_FILE))
            .await
            .unwrap();

        let inits = mock.get_subcommand_calls("init");
        let init = &inits[0];
        assert_eq!(init.args, vec!["init", "-input=false", "-no-color"]);
        assert_eq!(init.env.get("TF_IN_AUTOMATION").map(String::as_str), Some("1"));

        let plans = mock.get_subcommand_calls("plan");
        let plan = &plans[0];
        assert!(plan.args.contains(&"-detailed-exitcode".to_string()));
        assert!(plan.args.contains(&"-out=tfplan".to_string()));
        assert_eq!(plan.workdir.as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_missing_tool_is_tool_unavailable() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new().simulate_failure("terraform: command not found");

        let err = orchestrator(&mock).plan(dir.path()).await.unwrap_err();
        assert!(matches!(err, IacError::ToolUnavailable(_)));
    }

    #[tokio::test]
    async fn test_custom_binary() {
        let dir = tempdir().unwrap();
        let mock = MockRunner::new();
        let runner = TerraformRunner::new(Arc::new(mock.clone())).with_binary("/opt/tf/terraform");

        runner.init(dir.path()).await.unwrap();
        assert_eq!(mock.get_calls()[0].program.as_deref(), Some("/opt/tf/terraform"));
    }
}
