//! Drift detection and state comparison.
//!
//! [`DriftService::detect_drift`] and [`DriftService::compare_state`] are the
//! engine's outer boundary: they never return an error. Every failure becomes
//! a result with `success = false` and a message.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use sky_runner::ToolRunner;

use crate::config::EngineConfig;
use crate::credentials::Credentials;
use crate::error::{IacError, IacResult};
use crate::plan_parser::{PlanOutputParser, PlanSummary, ResourceChange, TerraformPlanParser};
use crate::terraform::{external_tool_error, PlanOrchestrator, PlanOutcome, PlanReport, TerraformRunner, PLAN_FILE};
use crate::workspace::WorkspaceManager;

/// One drift detection pass, before translation into a [`DriftResult`].
#[derive(Debug, Clone)]
pub struct DriftRun {
    /// Workspace the run used; removed by the time the run is returned
    pub workspace_path: PathBuf,
    pub outcome: PlanOutcome,
    pub has_changes: bool,
    pub resources: Vec<ResourceChange>,
    pub summary: Option<PlanSummary>,
    pub raw_output: String,
    pub report: PlanReport,
    pub timestamp: DateTime<Utc>,
}

/// Result of [`DriftService::detect_drift`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftResult {
    pub success: bool,
    pub has_drift: bool,
    pub message: String,
    pub drifted_resources: Vec<ResourceChange>,
    pub raw_plan_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PlanOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PlanSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DriftResult {
    fn from_run(run: DriftRun) -> Self {
        if let Some(err) = run.report.to_error() {
            let mut result = Self::failure(&err);
            result.outcome = Some(run.outcome);
            result.raw_plan_output = run.raw_output;
            result.drifted_resources = run.resources;
            return result;
        }

        let message = if run.has_changes {
            format!("Drift detected in infrastructure: {} resource change(s)", run.resources.len())
        } else {
            "No drift detected".to_string()
        };

        Self {
            success: true,
            has_drift: run.has_changes,
            message,
            drifted_resources: run.resources,
            raw_plan_output: run.raw_output,
            outcome: Some(run.outcome),
            summary: run.summary,
            error: None,
            stderr: None,
            timestamp: run.timestamp,
        }
    }

    fn failure(err: &IacError) -> Self {
        let (stdout, stderr) = captured_output(err);
        Self {
            success: false,
            has_drift: false,
            message: err.to_string(),
            drifted_resources: Vec::new(),
            raw_plan_output: stdout,
            outcome: Some(PlanOutcome::Error),
            summary: None,
            error: Some(err.to_string()),
            stderr,
            timestamp: Utc::now(),
        }
    }
}

/// One resource recorded in pulled state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResource {
    pub mode: String,
    pub resource_type: String,
    pub name: String,
    pub module: Option<String>,
    pub provider: String,
    pub instance_count: usize,
}

impl StateResource {
    /// Terraform address of the resource.
    pub fn address(&self) -> String {
        let base = match self.mode.as_str() {
            "data" => format!("data.{}.{}", self.resource_type, self.name),
            _ => format!("{}.{}", self.resource_type, self.name),
        };
        match &self.module {
            Some(module) => format!("{}.{}", module, base),
            None => base,
        }
    }
}

#[derive(Deserialize)]
struct RawStateResource {
    #[serde(default)]
    mode: String,
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    provider: String,
    #[serde(default)]
    instances: Vec<IgnoredAny>,
}

/// Resources listed in a state document. Malformed entries are skipped.
pub fn state_resources(state: &Value) -> Vec<StateResource> {
    state
        .get("resources")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| RawStateResource::deserialize(item).ok())
                .map(|raw| StateResource {
                    mode: raw.mode,
                    resource_type: raw.resource_type,
                    name: raw.name,
                    module: raw.module,
                    provider: raw.provider,
                    instance_count: raw.instances.len(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse `terraform state pull` output. Empty output is an empty state.
pub fn parse_state(output: &str) -> IacResult<Value> {
    if output.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(output).map_err(|e| IacError::StateParse(e.to_string()))
}

/// Result of [`DriftService::compare_state`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub success: bool,
    pub message: String,
    pub current_state: Value,
    pub state_resources: Vec<StateResource>,
    pub has_changes: bool,
    pub changes: Vec<ResourceChange>,
    pub plan_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PlanSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ComparisonResult {
    fn failure(err: &IacError) -> Self {
        let (stdout, _) = captured_output(err);
        Self {
            success: false,
            message: err.to_string(),
            current_state: Value::Object(serde_json::Map::new()),
            state_resources: Vec::new(),
            has_changes: false,
            changes: Vec::new(),
            plan_output: stdout,
            summary: None,
            error: Some(err.to_string()),
            timestamp: Utc::now(),
        }
    }
}

fn captured_output(err: &IacError) -> (String, Option<String>) {
    match err {
        IacError::ExternalTool { stdout, stderr, .. } => (stdout.clone(), Some(stderr.clone())),
        _ => (String::new(), None),
    }
}

/// Drift detection service.
pub struct DriftService {
    workspaces: WorkspaceManager,
    orchestrator: PlanOrchestrator,
    parser: Arc<dyn PlanOutputParser>,
}

impl DriftService {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self::from_config(runner, &EngineConfig::default())
    }

    pub fn from_config(runner: Arc<dyn ToolRunner>, config: &EngineConfig) -> Self {
        Self {
            workspaces: WorkspaceManager::from_settings(&config.workspace),
            orchestrator: PlanOrchestrator::new(TerraformRunner::from_settings(runner, &config.terraform)),
            parser: Arc::new(TerraformPlanParser::new()),
        }
    }

    pub fn with_workspace_manager(mut self, workspaces: WorkspaceManager) -> Self {
        self.workspaces = workspaces;
        self
    }

    /// Swap the plan-output parser.
    pub fn with_parser(mut self, parser: Arc<dyn PlanOutputParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Check deployed infrastructure against a configuration.
    pub async fn detect_drift(&self, configuration: &str, credentials: &Credentials) -> DriftResult {
        match self.run_drift(configuration, credentials).await {
            Ok(run) => {
                info!("Drift check finished: {:?}", run.outcome);
                DriftResult::from_run(run)
            }
            Err(e) => {
                error!("Drift detection failed: {}", e);
                DriftResult::failure(&e)
            }
        }
    }

    /// The drift pipeline: workspace, init, plan, parse, teardown.
    pub async fn run_drift(&self, configuration: &str, credentials: &Credentials) -> IacResult<DriftRun> {
        self.workspaces
            .scoped("drift")
            .with_workspace(configuration, credentials, |path| async move {
                let report = self.orchestrator.plan(&path).await?;
                let raw_output = report.stdout.clone();
                let resources = self.parser.parse(&raw_output);
                let summary = self.parser.summary(&raw_output);

                Ok(DriftRun {
                    workspace_path: path,
                    outcome: report.outcome,
                    has_changes: report.has_changes(),
                    resources,
                    summary,
                    raw_output,
                    report,
                    timestamp: Utc::now(),
                })
            })
            .await
    }

    /// Pull the current state and plan against it.
    pub async fn compare_state(&self, configuration: &str, credentials: &Credentials) -> ComparisonResult {
        match self.run_comparison(configuration, credentials).await {
            Ok(result) => result,
            Err(e) => {
                error!("State comparison failed: {}", e);
                ComparisonResult::failure(&e)
            }
        }
    }

    async fn run_comparison(&self, configuration: &str, credentials: &Credentials) -> IacResult<ComparisonResult> {
        self.workspaces
            .scoped("compare")
            .with_workspace(configuration, credentials, |path| async move {
                let terraform = self.orchestrator.terraform();

                let init = terraform.init(&path).await?;
                if !init.success() {
                    return Err(external_tool_error("init", init.exit_code, &init.stdout, &init.stderr));
                }

                let pulled = terraform.state_pull(&path).await?;
                if !pulled.success() {
                    return Err(external_tool_error(
                        "state pull",
                        pulled.exit_code,
                        &pulled.stdout,
                        &pulled.stderr,
                    ));
                }
                let current_state = parse_state(&pulled.stdout)?;
                let resources = state_resources(&current_state);

                let report = self.orchestrator.run_plan(&path, Some(PLAN_FILE)).await?;
                if let Some(err) = report.to_error() {
                    return Err(err);
                }

                let changes = self.parser.parse(&report.stdout);
                let message = format!(
                    "State holds {} resource(s); plan reports {} change(s)",
                    resources.len(),
                    changes.len()
                );
                info!("{}", message);

                Ok(ComparisonResult {
                    success: true,
                    message,
                    current_state,
                    state_resources: resources,
                    has_changes: report.has_changes(),
                    changes,
                    summary: self.parser.summary(&report.stdout),
                    plan_output: report.stdout,
                    error: None,
                    timestamp: Utc::now(),
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_state_empty_output() {
        assert_eq!(parse_state("").unwrap(), json!({}));
        assert_eq!(parse_state("  \n").unwrap(), json!({}));
    }

    #[test]
    fn test_parse_state_invalid_json() {
        let err = parse_state("{not json").unwrap_err();
        assert!(matches!(err, IacError::StateParse(_)));
    }

    #[test]
    fn test_state_resources() {
        let state = json!({
            "version": 4,
            "resources": [
                {
                    "mode": "managed",
                    "type": "aws_instance",
                    "name": "web",
                    "provider": "provider[\"registry.terraform.io/hashicorp/aws\"]",
                    "instances": [{"attributes": {"id": "i-123"}}]
                },
                {
                    "mode": "data",
                    "type": "aws_ami",
                    "name": "ubuntu",
                    "module": "module.app",
                    "instances": []
                },
                {"broken": true}
            ]
        });

        let resources = state_resources(&state);
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].address(), "aws_instance.web");
        assert_eq!(resources[0].instance_count, 1);
        assert_eq!(resources[1].address(), "module.app.data.aws_ami.ubuntu");
        assert!(state_resources(&json!({})).is_empty());
    }

    #[test]
    fn test_failure_carries_tool_output() {
        let err = external_tool_error("plan", 1, "partial output", "Error: boom");
        let result = DriftResult::failure(&err);

        assert!(!result.success);
        assert!(!result.has_drift);
        assert!(result.message.contains("Error: boom"));
        assert_eq!(result.raw_plan_output, "partial output");
        assert_eq!(result.stderr.as_deref(), Some("Error: boom"));
    }

    #[test]
    fn test_drift_result_serializes_camel_case() {
        let err = IacError::Validation("Missing credential field(s): region".to_string());
        let json = serde_json::to_value(DriftResult::failure(&err)).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["hasDrift"], false);
        assert!(json["driftedResources"].as_array().unwrap().is_empty());
        assert!(json.get("rawPlanOutput").is_some());
        assert!(json.get("stderr").is_none());
    }
}
