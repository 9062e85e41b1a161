//! Audit rules and rule sets.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PolicyError, PolicyResult};

/// Well-known finding categories used by the standard rule set.
pub mod categories {
    pub const NETWORK_EXPOSURE: &str = "network-exposure";
    pub const HARDCODED_SECRETS: &str = "hardcoded-secrets";
    pub const PUBLIC_ACCESS: &str = "public-access";
    pub const ENCRYPTION: &str = "encryption";
    pub const IAM_PRIVILEGES: &str = "iam-privileges";
    pub const DATA_PROTECTION: &str = "data-protection";
}

/// Finding severity levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
        }
    }
}

/// A pattern-based audit rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRule {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    /// Regular expression searched for anywhere in the configuration text
    pub pattern: String,
    pub message: String,
    pub recommendation: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AuditRule {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            severity,
            pattern: pattern.into(),
            message: String::new(),
            recommendation: String::new(),
            enabled: true,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Compile the rule's pattern.
    pub fn compile(&self) -> PolicyResult<CompiledRule> {
        let regex = Regex::new(&self.pattern).map_err(|e| PolicyError::InvalidRule {
            rule: self.id.clone(),
            message: format!("Invalid regex: {}", e),
        })?;

        Ok(CompiledRule {
            rule: self.clone(),
            regex,
        })
    }
}

/// A rule with its pattern compiled, ready to evaluate.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: AuditRule,
    regex: Regex,
}

impl CompiledRule {
    pub fn rule(&self) -> &AuditRule {
        &self.rule
    }

    /// 1-based line of the first match, if the pattern occurs in the text.
    pub fn first_match_line(&self, text: &str) -> Option<usize> {
        let found = self.regex.find(text)?;
        Some(text[..found.start()].matches('\n').count() + 1)
    }
}

/// A named set of audit rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<AuditRule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Create the standard rule set.
    pub fn standard() -> Self {
        let mut rules = Self::new("Standard Rules");

        rules.add(
            AuditRule::new(
                "open-ingress",
                categories::NETWORK_EXPOSURE,
                Severity::High,
                r"0\.0\.0\.0/0|::/0",
            )
            .with_message(
                "High-risk security issue detected: Open security group rule (0.0.0.0/0) allows access from anywhere on the internet",
            )
            .with_recommendation(
                "Restrict CIDR blocks to specific IP ranges or use security group references instead of 0.0.0.0/0",
            ),
        );

        rules.add(
            AuditRule::new(
                "hardcoded-password",
                categories::HARDCODED_SECRETS,
                Severity::High,
                r#"(?i)\b(password|master_password|secret_key)\s*=\s*"[^"]+""#,
            )
            .with_message("A password or secret is written into the configuration as a literal value")
            .with_recommendation(
                "Use a sensitive variable, a secrets manager reference, or provider-managed passwords instead of literals",
            ),
        );

        rules.add(
            AuditRule::new(
                "aws-access-key",
                categories::HARDCODED_SECRETS,
                Severity::High,
                r"AKIA[0-9A-Z]{16}",
            )
            .with_message("An AWS access key id appears in the configuration")
            .with_recommendation("Remove the key, rotate it, and supply credentials through the environment"),
        );

        rules.add(
            AuditRule::new(
                "wildcard-iam-action",
                categories::IAM_PRIVILEGES,
                Severity::High,
                r#""Action"\s*:\s*"\*"|actions\s*=\s*\[\s*"\*"\s*\]"#,
            )
            .with_message("An IAM policy grants every action")
            .with_recommendation("Grant only the specific actions the workload needs"),
        );

        rules.add(
            AuditRule::new(
                "publicly-accessible-database",
                categories::PUBLIC_ACCESS,
                Severity::Medium,
                r"publicly_accessible\s*=\s*true",
            )
            .with_message("A database instance is reachable from outside its network")
            .with_recommendation("Set publicly_accessible = false and reach the database through private subnets"),
        );

        rules.add(
            AuditRule::new(
                "public-bucket-acl",
                categories::PUBLIC_ACCESS,
                Severity::Medium,
                r#"acl\s*=\s*"public-read(-write)?""#,
            )
            .with_message("A bucket ACL grants public read access")
            .with_recommendation("Use a private ACL and serve public content through a CDN with origin access"),
        );

        rules.add(
            AuditRule::new(
                "unencrypted-storage",
                categories::ENCRYPTION,
                Severity::Medium,
                r"\b(storage_encrypted|encrypted)\s*=\s*false",
            )
            .with_message("Storage encryption is explicitly disabled")
            .with_recommendation("Enable encryption at rest for every storage resource"),
        );

        rules.add(
            AuditRule::new(
                "skip-final-snapshot",
                categories::DATA_PROTECTION,
                Severity::Low,
                r"skip_final_snapshot\s*=\s*true",
            )
            .with_message("The database is deleted without a final snapshot")
            .with_recommendation("Set skip_final_snapshot = false for databases holding data you need to keep"),
        );

        rules.add(
            AuditRule::new(
                "versioning-suspended",
                categories::DATA_PROTECTION,
                Severity::Low,
                r#"status\s*=\s*"Suspended""#,
            )
            .with_message("Bucket versioning is suspended")
            .with_recommendation("Enable versioning so overwritten or deleted objects can be recovered"),
        );

        rules
    }

    /// Add a rule to the set.
    pub fn add(&mut self, rule: AuditRule) {
        self.rules.push(rule);
    }

    /// Extend this set with every rule of another set.
    pub fn extend(&mut self, other: RuleSet) {
        self.rules.extend(other.rules);
    }

    /// Compile every enabled rule.
    pub fn compile(&self) -> PolicyResult<Vec<CompiledRule>> {
        let compiled = self
            .rules
            .iter()
            .filter(|r| r.enabled)
            .map(AuditRule::compile)
            .collect::<PolicyResult<Vec<_>>>()?;

        debug!("Compiled {} rules from '{}'", compiled.len(), self.name);
        Ok(compiled)
    }

    /// Load a rule set from a YAML file.
    pub fn from_file(path: &Path) -> PolicyResult<Self> {
        let content = fs::read_to_string(path)?;
        let rules: RuleSet = serde_yaml::from_str(&content)?;
        Ok(rules)
    }

    /// Save the rule set to a YAML file.
    pub fn to_file(&self, path: &Path) -> PolicyResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_standard_rules_compile() {
        let rules = RuleSet::standard();
        let compiled = rules.compile().unwrap();
        assert_eq!(compiled.len(), rules.rules.len());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let rule = AuditRule::new("broken", "custom", Severity::Low, "([unclosed");
        let err = rule.compile().unwrap_err();
        assert!(matches!(err, PolicyError::InvalidRule { ref rule, .. } if rule == "broken"));
    }

    #[test]
    fn test_first_match_line() {
        let rule = RuleSet::standard().rules.remove(0).compile().unwrap();
        let text = "resource \"aws_security_group\" \"web\" {\n  ingress {\n    cidr_blocks = [\"0.0.0.0/0\"]\n  }\n}\n";
        assert_eq!(rule.first_match_line(text), Some(3));
        assert_eq!(rule.first_match_line("cidr_blocks = [\"10.0.0.0/8\"]"), None);
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let mut rules = RuleSet::new("custom");
        rules.add(AuditRule::new("a", "custom", Severity::Low, "foo"));
        rules.add(AuditRule::new("b", "custom", Severity::Low, "bar").disabled());

        let compiled = rules.compile().unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].rule().id, "a");
    }

    #[test]
    fn test_rule_set_yaml_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.yaml");
        let mut rules = RuleSet::new("team rules");
        rules.add(
            AuditRule::new("no-t2", "cost", Severity::Low, r#"instance_type\s*=\s*"t2\."#)
                .with_message("Previous-generation instance type"),
        );

        rules.to_file(&path).unwrap();
        let loaded = RuleSet::from_file(&path).unwrap();

        assert_eq!(loaded.name, "team rules");
        assert_eq!(loaded.rules[0].severity, Severity::Low);
        assert!(loaded.rules[0].enabled);
    }
}
