//! # sky_policy
//!
//! Static security auditing for skyloom.
//!
//! This crate provides:
//! - **Audit Rules**: Independent regex predicates with severity, category and remediation
//! - **Rule Sets**: A standard set plus custom sets loaded from YAML
//! - **Auditor**: Scans configuration text (or a directory of `.tf` files) and
//!   reports at most one finding per category
//!
//! ## Example
//!
//! ```rust
//! use sky_policy::{Auditor, Severity};
//!
//! let auditor = Auditor::standard()?;
//! let report = auditor.audit(r#"cidr_blocks = ["0.0.0.0/0"]"#);
//!
//! assert!(report.has_issues);
//! assert_eq!(report.findings[0].severity, Severity::High);
//! # Ok::<(), sky_policy::PolicyError>(())
//! ```

pub mod auditor;
pub mod error;
pub mod rules;

pub use auditor::{AuditFinding, AuditReport, AuditSummary, Auditor, FileAudit};
pub use error::{PolicyError, PolicyResult};
pub use rules::{categories, AuditRule, CompiledRule, RuleSet, Severity};
