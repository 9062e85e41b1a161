//! CLI command definitions.
//!
//! This module defines the command structure for the skyloom CLI.
//! Each subcommand maps to one engine operation.

use clap::{Parser, Subcommand, ValueEnum};

pub mod audit;
pub mod catalog;
pub mod compare;
pub mod compile;
pub mod drift;
pub mod engine;

/// skyloom - design-time cloud graphs to Terraform, with drift detection
#[derive(Parser)]
#[command(name = "sky")]
#[command(version, about = "skyloom - compile resource graphs to Terraform and detect drift")]
#[command(long_about = r#"
skyloom compiles a graph of cloud resources into Terraform configuration,
audits the result for common security risks, and checks deployed
infrastructure for drift against it.

COMMANDS:
  catalog   → List supported resource kinds and their defaults
  compile   → Compile a graph document to Terraform
  audit     → Audit Terraform files for security risks
  drift     → Run init + plan and report drifted resources
  compare   → Pull current state and plan against it

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Audit or validation failure
  5 - IaC error
  6 - Drift detected
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Output format for command results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List supported resource kinds
    Catalog(catalog::CatalogArgs),

    /// Compile a graph document to Terraform configuration
    Compile(compile::CompileArgs),

    /// Audit Terraform configuration for security risks
    Audit(audit::AuditArgs),

    /// Detect drift between a configuration and deployed infrastructure
    Drift(drift::DriftArgs),

    /// Compare current state with a configuration
    Compare(compare::CompareArgs),
}
