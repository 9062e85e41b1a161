//! skyloom CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Audit or validation failure
//! - 5: IaC error (Terraform unavailable or failed)
//! - 6: Drift detected

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, LogFormat};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const IAC_ERROR: u8 = 5;
    pub const DRIFT_DETECTED: u8 = 6;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format);

    let result = match cli.command {
        Commands::Catalog(args) => commands::catalog::execute(args).await,
        Commands::Compile(args) => commands::compile::execute(args).await,
        Commands::Audit(args) => commands::audit::execute(args).await,
        Commands::Drift(args) => commands::drift::execute(args).await,
        Commands::Compare(args) => commands::compare::execute(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("sky={},warn", level)));

    // stdout carries command output; logs go to stderr.
    let _ = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init(),
    };
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<sky_iac::IacError>() {
        return match err {
            sky_iac::IacError::Validation(_) | sky_iac::IacError::NameCollision { .. } => {
                ExitCodes::VALIDATION_FAILURE
            }
            sky_iac::IacError::Io(_) | sky_iac::IacError::Yaml(_) | sky_iac::IacError::Json(_) => {
                ExitCodes::INVALID_ARGS
            }
            _ => ExitCodes::IAC_ERROR,
        };
    }

    let msg = e.to_string().to_lowercase();

    if msg.contains("validation") || msg.contains("audit") {
        ExitCodes::VALIDATION_FAILURE
    } else if msg.contains("terraform") || msg.contains("runtime") {
        ExitCodes::IAC_ERROR
    } else if msg.contains("argument") || msg.contains("option") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
