//! # sky_runner
//!
//! External tool execution for skyloom.
//!
//! This crate runs command-line tools such as `terraform` either directly on
//! the host or inside a Docker/Podman container, capturing exit code, stdout
//! and stderr for the caller to interpret.
//!
//! # Features
//!
//! - **Host Runner**: `tokio::process` execution with timeout and kill-on-drop
//! - **Container Runner**: Docker/Podman CLI wrapper with runtime detection
//! - **Log Streaming**: Optional per-line callback while the tool runs
//! - **Mock Runner**: For testing without the real tool installed
//!
//! # Example
//!
//! ```rust,no_run
//! use sky_runner::{LocalRunner, RunConfig, ToolCommand, ToolRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = LocalRunner::new();
//!
//!     let command = ToolCommand::new("terraform", "./infra")
//!         .args(["plan", "-input=false", "-detailed-exitcode"]);
//!
//!     let result = runner.run(&command, &RunConfig::default()).await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod local;
pub mod mock;
pub mod runner;

pub use config::{RunConfig, ToolCommand, ToolImage};
pub use container::{ContainerRunner, ContainerRuntime};
pub use error::{RunnerError, RunnerResult};
pub use local::{LocalRunner, LogHandler, LogLine, LogStream};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use runner::{ExecutionResult, ToolRunner};
