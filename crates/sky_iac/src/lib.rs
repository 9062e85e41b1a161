//! # sky_iac
//!
//! Infrastructure-as-code engine for skyloom.
//!
//! This crate turns a graph of design-time resources into Terraform
//! configuration and checks deployed infrastructure for drift against it.
//!
//! ## Features
//!
//! - Resource catalog with kind-specific defaults and value constraints
//! - Deterministic graph-to-Terraform compiler
//! - Ephemeral, credential-carrying workspaces with guaranteed cleanup
//! - `init` + `plan -detailed-exitcode` orchestration through any [`sky_runner::ToolRunner`]
//! - Tolerant plan-output parser
//! - Drift detection and state comparison that report failures as results
//!
//! ## Example
//!
//! ```rust
//! use sky_iac::{GraphCompiler, ResourceGraph, ResourceNode};
//!
//! let mut graph = ResourceGraph::new();
//! graph.add_node(ResourceNode::new("net", "vpc", "Main Network"))?;
//! graph.add_node(ResourceNode::new("app", "subnet", "App Subnet").with_parent("net"))?;
//!
//! let compiled = GraphCompiler::default().compile_graph(&graph)?;
//! assert!(compiled.text().contains("= aws_vpc.main_network.id"));
//! # Ok::<(), sky_iac::IacError>(())
//! ```

pub mod catalog;
pub mod compiler;
pub mod config;
pub mod credentials;
pub mod drift;
pub mod error;
pub mod graph;
pub mod hcl;
pub mod plan_parser;
pub mod terraform;
pub mod workspace;

pub use catalog::{AttributeSpec, Catalog, CatalogEntry, Constraint, DefaultValue, NameRule, ResourceKind, ValuePattern};
pub use compiler::{BlockKind, CompiledConfiguration, CompilerOptions, ConfigBlock, GraphCompiler};
pub use config::{ContainerSettings, EngineConfig, TerraformSettings, WorkspaceSettings};
pub use credentials::Credentials;
pub use drift::{ComparisonResult, DriftResult, DriftRun, DriftService, StateResource};
pub use error::{IacError, IacResult};
pub use graph::{ConnectionKind, Edge, GraphDocument, NodeId, ResourceGraph, ResourceNode};
pub use plan_parser::{ChangeAction, PlanOutputParser, PlanSummary, ResourceChange, TerraformPlanParser};
pub use terraform::{PlanOrchestrator, PlanOutcome, PlanReport, PlanStage, TerraformRunner};
pub use workspace::WorkspaceManager;
