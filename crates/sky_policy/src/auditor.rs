//! Security auditor for generated configuration text.
//!
//! The auditor answers "is this risk present", not "how many times": every
//! category contributes at most one finding per scan. When several rules share
//! a category, the first matching rule in rule-set order reports it.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{PolicyError, PolicyResult};
use crate::rules::{CompiledRule, RuleSet, Severity};

/// One detected risk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFinding {
    pub severity: Severity,
    pub category: String,
    pub rule_id: String,
    pub message: String,
    pub recommendation: String,
    /// Line of the first occurrence in the scanned text
    pub line: Option<usize>,
}

/// Finding counts per severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub total_issues: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
}

impl AuditSummary {
    fn from_findings(findings: &[AuditFinding]) -> Self {
        let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
        Self {
            total_issues: findings.len(),
            high_risk: count(Severity::High),
            medium_risk: count(Severity::Medium),
            low_risk: count(Severity::Low),
        }
    }
}

/// Result of auditing one configuration text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub has_issues: bool,
    pub findings: Vec<AuditFinding>,
    pub summary: AuditSummary,
}

impl AuditReport {
    fn new(findings: Vec<AuditFinding>) -> Self {
        Self {
            has_issues: !findings.is_empty(),
            summary: AuditSummary::from_findings(&findings),
            findings,
        }
    }

    /// Findings of the given severity.
    pub fn with_severity(&self, severity: Severity) -> Vec<&AuditFinding> {
        self.findings.iter().filter(|f| f.severity == severity).collect()
    }

    /// Generate a human-readable report.
    pub fn report(&self) -> String {
        let mut report = String::new();

        if !self.has_issues {
            report.push_str("✅ No security issues found\n");
            return report;
        }

        report.push_str(&format!(
            "❌ {} issue(s): {} high, {} medium, {} low\n\n",
            self.summary.total_issues,
            self.summary.high_risk,
            self.summary.medium_risk,
            self.summary.low_risk
        ));

        for finding in &self.findings {
            let location = finding
                .line
                .map(|l| format!(" (line {})", l))
                .unwrap_or_default();
            report.push_str(&format!(
                "  [{}] {}{}: {}\n      → {}\n",
                finding.severity, finding.category, location, finding.message, finding.recommendation
            ));
        }

        report
    }
}

/// Audit result for one file of a directory scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAudit {
    pub path: PathBuf,
    pub report: AuditReport,
}

/// Pattern-based security auditor.
#[derive(Debug, Clone)]
pub struct Auditor {
    rules: Vec<CompiledRule>,
}

impl Auditor {
    /// Build an auditor from a rule set.
    pub fn new(rules: &RuleSet) -> PolicyResult<Self> {
        Ok(Self {
            rules: rules.compile()?,
        })
    }

    /// Build an auditor with the standard rule set.
    pub fn standard() -> PolicyResult<Self> {
        Self::new(&RuleSet::standard())
    }

    /// Number of active rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Audit configuration text.
    pub fn audit(&self, text: &str) -> AuditReport {
        let mut seen = HashSet::new();
        let mut findings = Vec::new();

        for compiled in &self.rules {
            let rule = compiled.rule();
            if seen.contains(rule.category.as_str()) {
                continue;
            }

            if let Some(line) = compiled.first_match_line(text) {
                debug!("Rule {} matched at line {}", rule.id, line);
                seen.insert(rule.category.as_str());
                findings.push(AuditFinding {
                    severity: rule.severity,
                    category: rule.category.clone(),
                    rule_id: rule.id.clone(),
                    message: rule.message.clone(),
                    recommendation: rule.recommendation.clone(),
                    line: Some(line),
                });
            }
        }

        AuditReport::new(findings)
    }

    /// Audit every file under `root` whose relative path matches one of the
    /// include patterns. Terraform's `.terraform` cache directories are skipped.
    pub fn audit_directory(&self, root: &Path, include: &[String]) -> PolicyResult<Vec<FileAudit>> {
        let patterns = include
            .iter()
            .map(|p| glob::Pattern::new(p).map_err(|e| PolicyError::InvalidPattern(format!("{}: {}", p, e))))
            .collect::<PolicyResult<Vec<_>>>()?;

        let mut audits = Vec::new();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".terraform")
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
        {
            let file_path = entry.path();
            let relative = file_path.strip_prefix(root).unwrap_or(file_path);

            let matches_path = patterns.is_empty() || patterns.iter().any(|p| p.matches_path(relative));
            if !matches_path {
                continue;
            }

            match fs::read_to_string(file_path) {
                Ok(content) => audits.push(FileAudit {
                    path: relative.to_path_buf(),
                    report: self.audit(&content),
                }),
                Err(e) => warn!("Skipping {:?}: {}", file_path, e),
            }
        }

        info!("Audited {} file(s) under {:?}", audits.len(), root);
        Ok(audits)
    }
}
