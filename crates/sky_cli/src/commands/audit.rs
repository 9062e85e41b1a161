//! Audit command - Scan Terraform configuration for security risks.
//!
//! Findings are advisory by default; `--fail-on` turns findings at or above a
//! severity into a failing exit code for CI.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use sky_policy::{AuditReport, Auditor, FileAudit, RuleSet, Severity};

use super::OutputFormat;
use crate::ExitCodes;

#[derive(Args)]
pub struct AuditArgs {
    /// Terraform file or directory to audit
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Additional rules (YAML rule set) merged into the standard set
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Glob patterns selecting files when auditing a directory
    #[arg(long, default_values_t = vec!["*.tf".to_string(), "**/*.tf".to_string()])]
    include: Vec<String>,

    /// Fail when a finding at or above this severity is present
    #[arg(long, value_enum)]
    fail_on: Option<FailOn>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FailOn {
    High,
    Medium,
    Low,
}

impl FailOn {
    fn severity(self) -> Severity {
        match self {
            FailOn::High => Severity::High,
            FailOn::Medium => Severity::Medium,
            FailOn::Low => Severity::Low,
        }
    }
}

pub async fn execute(args: AuditArgs) -> Result<u8> {
    info!("Auditing: {:?}", args.path);

    if !args.path.exists() {
        anyhow::bail!("Path not found: {:?}", args.path);
    }

    let mut rules = RuleSet::standard();
    if let Some(path) = &args.rules {
        let custom = RuleSet::from_file(path).with_context(|| format!("Failed to load rules from {:?}", path))?;
        info!("Loaded {} custom rule(s) from {:?}", custom.rules.len(), path);
        rules.extend(custom);
    }
    let auditor = Auditor::new(&rules)?;

    let audits = if args.path.is_dir() {
        auditor.audit_directory(&args.path, &args.include)?
    } else {
        let content = fs::read_to_string(&args.path).with_context(|| format!("Failed to read {:?}", args.path))?;
        vec![FileAudit {
            path: args.path.clone(),
            report: auditor.audit(&content),
        }]
    };

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&audits)?);
    } else {
        print_text(&audits);
    }

    let failed = args
        .fail_on
        .map(|threshold| audits.iter().any(|a| exceeds(&a.report, threshold.severity())))
        .unwrap_or(false);

    if failed {
        Ok(ExitCodes::VALIDATION_FAILURE)
    } else {
        Ok(ExitCodes::SUCCESS)
    }
}

/// Severity orders most severe first, so "at or above" is `<=`.
fn exceeds(report: &AuditReport, threshold: Severity) -> bool {
    report.findings.iter().any(|f| f.severity <= threshold)
}

fn print_text(audits: &[FileAudit]) {
    if audits.is_empty() {
        println!("No matching files found");
        return;
    }

    for audit in audits {
        println!("== {}", audit.path.display());
        println!("{}", audit.report.report());
    }

    let total: usize = audits.iter().map(|a| a.report.summary.total_issues).sum();
    println!("Audited {} file(s), {} issue(s)", audits.len(), total);
}
