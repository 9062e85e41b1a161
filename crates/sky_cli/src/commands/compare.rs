//! Compare command - Pull current state and plan a configuration against it.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use sky_iac::{ComparisonResult, DriftService};

use super::engine::{build_runner, read_configuration, CredentialArgs, EngineArgs};
use super::OutputFormat;
use crate::ExitCodes;

#[derive(Args)]
pub struct CompareArgs {
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

pub async fn execute(args: CompareArgs) -> Result<u8> {
    info!("Comparing state for: {:?}", args.input);

    let config = args.engine.load_config()?;
    let configuration = read_configuration(&args.input, &config)?;
    let credentials = args.credentials.credentials();
    credentials.validate()?;

    let runner = build_runner(&config).await?;
    let service = DriftService::from_config(runner, &config);
    let result = service.compare_state(&configuration, &credentials).await;

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_text(&result);
    }

    if !result.success {
        Ok(ExitCodes::IAC_ERROR)
    } else if result.has_changes {
        Ok(ExitCodes::DRIFT_DETECTED)
    } else {
        Ok(ExitCodes::SUCCESS)
    }
}

fn print_text(result: &ComparisonResult) {
    println!("{}", result.message);
    if !result.success {
        return;
    }

    println!();
    println!("State ({} resource(s)):", result.state_resources.len());
    for resource in &result.state_resources {
        println!("  {} [{} instance(s)]", resource.address(), resource.instance_count);
    }

    println!();
    println!("Pending changes ({}):", result.changes.len());
    for change in &result.changes {
        println!("  {:<8} {}", change.action, change.address);
    }
}
