//! Drift command - Plan a configuration against deployed infrastructure.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use sky_iac::{DriftResult, DriftService};

use super::engine::{build_runner, read_configuration, CredentialArgs, EngineArgs};
use super::OutputFormat;
use crate::ExitCodes;

#[derive(Args)]
pub struct DriftArgs {
    /// Terraform file, or a graph document to compile first
    input: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(flatten)]
    engine: EngineArgs,
}

pub async fn execute(args: DriftArgs) -> Result<u8> {
    info!("Checking drift for: {:?}", args.input);

    let config = args.engine.load_config()?;
    let configuration = read_configuration(&args.input, &config)?;
    let credentials = args.credentials.credentials();
    credentials.validate()?;

    let runner = build_runner(&config).await?;
    let service = DriftService::from_config(runner, &config);
    let result = service.detect_drift(&configuration, &credentials).await;

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_text(&result);
    }

    Ok(exit_code(&result))
}

fn exit_code(result: &DriftResult) -> u8 {
    if !result.success {
        ExitCodes::IAC_ERROR
    } else if result.has_drift {
        ExitCodes::DRIFT_DETECTED
    } else {
        ExitCodes::SUCCESS
    }
}

fn print_text(result: &DriftResult) {
    println!("{}", result.message);

    if !result.drifted_resources.is_empty() {
        println!();
        for change in &result.drifted_resources {
            println!("  {:<8} {}", change.action, change.address);
        }
    }

    if let Some(summary) = &result.summary {
        println!();
        println!(
            "Plan: {} to import, {} to add, {} to change, {} to destroy",
            summary.to_import, summary.to_add, summary.to_change, summary.to_destroy
        );
    }

    if let Some(stderr) = result.stderr.as_deref().filter(|s| !s.trim().is_empty()) {
        eprintln!();
        eprintln!("{}", stderr.trim_end());
    }
}
