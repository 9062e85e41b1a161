//! Options shared by commands that load configuration or run Terraform.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info};

use sky_iac::{Credentials, EngineConfig, GraphCompiler, ResourceGraph};
use sky_runner::{ContainerRunner, ContainerRuntime, LocalRunner, ToolImage, ToolRunner};

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Engine configuration file (TOML or YAML)
    #[arg(long = "config", env = "SKYLOOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Terraform binary name or path
    #[arg(long, env = "SKYLOOM_TERRAFORM")]
    pub terraform: Option<String>,

    /// Run Terraform in a container instead of on the host
    #[arg(long)]
    pub container: bool,

    /// Container runtime to prefer (docker or podman)
    #[arg(long, requires = "container")]
    pub runtime: Option<String>,
}

impl EngineArgs {
    /// Load the configuration file (if any) and apply flag overrides.
    pub fn load_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))?,
            None => EngineConfig::default(),
        };

        if let Some(binary) = &self.terraform {
            config.terraform.binary = binary.clone();
        }
        if self.container {
            let container = config.terraform.container.get_or_insert_with(Default::default);
            if let Some(runtime) = &self.runtime {
                container.runtime = Some(runtime.clone());
            }
        }

        Ok(config)
    }
}

/// AWS credentials, from flags or the standard environment variables.
#[derive(Args, Debug, Clone)]
pub struct CredentialArgs {
    /// AWS access key id
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    /// AWS secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,
}

impl CredentialArgs {
    /// Missing values are left empty; the engine reports them by name.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.access_key_id.clone().unwrap_or_default(),
            self.secret_access_key.clone().unwrap_or_default(),
            self.region.clone().unwrap_or_default(),
        )
    }
}

fn parse_runtime(name: &str) -> Result<ContainerRuntime> {
    match name.to_lowercase().as_str() {
        "docker" => Ok(ContainerRuntime::Docker),
        "podman" => Ok(ContainerRuntime::Podman),
        other => anyhow::bail!("Unknown container runtime option: {}", other),
    }
}

/// Build the runner Terraform executes through.
pub async fn build_runner(config: &EngineConfig) -> Result<Arc<dyn ToolRunner>> {
    match &config.terraform.container {
        Some(container) => {
            let preferred = container.runtime.as_deref().map(parse_runtime).transpose()?;
            let image = ToolImage::new(&container.image, &container.tag);
            let runner = ContainerRunner::detect(image, preferred)
                .await
                .context("Container runtime not available")?;
            Ok(Arc::new(runner))
        }
        None => Ok(Arc::new(LocalRunner::new())),
    }
}

/// Read the configuration to plan against.
///
/// Graph documents (`.json`, `.yaml`, `.yml`) are compiled first; any other
/// file is taken as Terraform text.
pub fn read_configuration(path: &Path, config: &EngineConfig) -> Result<String> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {:?}", path);
    }

    if is_graph_document(path) {
        info!("Compiling graph document {:?}", path);
        let graph = ResourceGraph::from_file(path)?;
        let compiled = GraphCompiler::default()
            .with_options(config.compiler.clone())
            .compile_graph(&graph)?;
        return Ok(compiled.text());
    }

    debug!("Reading Terraform configuration {:?}", path);
    fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

fn is_graph_document(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("yaml") | Some("yml")
    )
}
