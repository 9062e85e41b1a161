//! Engine configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compiler::CompilerOptions;
use crate::error::IacResult;

/// How Terraform is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformSettings {
    /// Binary name or path
    pub binary: String,
    /// Per-invocation timeout in seconds (0 = none)
    pub timeout_seconds: u64,
    /// Run Terraform in a container instead of on the host
    pub container: Option<ContainerSettings>,
}

impl Default for TerraformSettings {
    fn default() -> Self {
        Self {
            binary: "terraform".to_string(),
            timeout_seconds: 600,
            container: None,
        }
    }
}

/// Container execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// `docker` or `podman`; detected when absent
    pub runtime: Option<String>,
    pub image: String,
    pub tag: String,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            runtime: None,
            image: "hashicorp/terraform".to_string(),
            tag: "1.6".to_string(),
        }
    }
}

/// Where workspaces are created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub prefix: String,
    /// Parent directory; the system temp directory when absent
    pub root: Option<PathBuf>,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            prefix: "terraform-".to_string(),
            root: None,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub terraform: TerraformSettings,
    pub workspace: WorkspaceSettings,
    pub compiler: CompilerOptions,
}

impl EngineConfig {
    /// Load configuration: `.toml` files as TOML, anything else as YAML.
    pub fn from_file(path: &Path) -> IacResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        debug!("Loaded engine configuration from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.terraform.binary, "terraform");
        assert_eq!(config.terraform.timeout_seconds, 600);
        assert!(config.terraform.container.is_none());
        assert_eq!(config.workspace.prefix, "terraform-");
        assert_eq!(config.compiler.provider_version, "~> 5.0");
    }

    #[test]
    fn test_load_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("skyloom.toml");
        fs::write(
            &path,
            r#"
[terraform]
binary = "/usr/local/bin/terraform"

[terraform.container]
runtime = "podman"

[compiler]
environment = "staging"
"#,
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.terraform.binary, "/usr/local/bin/terraform");
        assert_eq!(config.terraform.timeout_seconds, 600);
        let container = config.terraform.container.unwrap();
        assert_eq!(container.runtime.as_deref(), Some("podman"));
        assert_eq!(container.image, "hashicorp/terraform");
        assert_eq!(config.compiler.environment, "staging");
        assert_eq!(config.compiler.managed_by, "skyloom");
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("skyloom.yaml");
        fs::write(&path, "workspace:\n  prefix: drift-\ncompiler:\n  default_region: eu-west-1\n").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.workspace.prefix, "drift-");
        assert_eq!(config.compiler.default_region, "eu-west-1");
        assert_eq!(config.terraform, TerraformSettings::default());
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "terraform = [").unwrap();
        assert!(EngineConfig::from_file(&path).is_err());
    }
}
