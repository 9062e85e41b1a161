//! Integration tests for the tool execution layer.
//!
//! These tests drive runners through the `ToolRunner` trait object the way
//! higher-level crates use them.

use std::sync::Arc;

use sky_runner::{
    ContainerRunner, ContainerRuntime, LocalRunner, MockResponse, MockRunner, RunConfig,
    RunnerError, ToolCommand, ToolImage, ToolRunner,
};
use tempfile::tempdir;

/// Mock runner behaves the same behind a trait object.
#[tokio::test]
async fn test_mock_runner_as_trait_object() {
    let mock = MockRunner::new().with_responses(vec![
        MockResponse::success("Terraform has been successfully initialized!"),
        MockResponse::exit(2, "Plan: 1 to add, 0 to change, 0 to destroy."),
    ]);
    let runner: Arc<dyn ToolRunner> = Arc::new(mock.clone());
    let dir = tempdir().unwrap();

    let init = runner
        .run(&ToolCommand::new("terraform", dir.path()).arg("init"), &RunConfig::default())
        .await
        .unwrap();
    let plan = runner
        .run(&ToolCommand::new("terraform", dir.path()).arg("plan"), &RunConfig::default())
        .await
        .unwrap();

    assert!(init.success());
    assert_eq!(plan.exit_code, 2);
    assert_eq!(mock.get_subcommand_calls("init").len(), 1);
    assert_eq!(mock.get_subcommand_calls("plan").len(), 1);
}

/// Mock runner records which files existed in the working directory.
#[tokio::test]
async fn test_mock_runner_records_workdir_files() {
    let mock = MockRunner::new();
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("main.tf"), "").unwrap();
    std::fs::write(dir.path().join("provider.tf"), "").unwrap();

    mock.run(&ToolCommand::new("terraform", dir.path()).arg("init"), &RunConfig::default())
        .await
        .unwrap();

    let calls = mock.get_calls();
    assert_eq!(calls[0].workdir_files, vec!["main.tf".to_string(), "provider.tf".to_string()]);
}

/// Simulated failures surface as tool-not-available errors.
#[tokio::test]
async fn test_mock_runner_simulated_missing_tool() {
    let runner: Arc<dyn ToolRunner> = Arc::new(MockRunner::new().simulate_failure("terraform missing"));
    let dir = tempdir().unwrap();

    let err = runner
        .run(&ToolCommand::new("terraform", dir.path()), &RunConfig::default())
        .await
        .unwrap_err();

    match err {
        RunnerError::ToolNotAvailable(msg) => assert!(msg.contains("terraform")),
        other => panic!("unexpected error: {other}"),
    }
}

/// Host runner reports non-zero exit codes as results, not errors.
#[cfg(unix)]
#[tokio::test]
async fn test_local_runner_exit_codes_are_results() {
    let runner: Arc<dyn ToolRunner> = Arc::new(LocalRunner::new());
    let dir = tempdir().unwrap();

    for code in [0, 1, 2] {
        let command = ToolCommand::new("sh", dir.path())
            .arg("-c")
            .arg(format!("exit {}", code));
        let result = runner.run(&command, &RunConfig::default()).await.unwrap();
        assert_eq!(result.exit_code, code);
    }
}

/// Container runner construction does not touch the runtime.
#[test]
fn test_container_runner_with_runtime() {
    let runner = ContainerRunner::with_runtime(ContainerRuntime::Podman, ToolImage::terraform());
    assert_eq!(runner.runtime(), ContainerRuntime::Podman);
}
