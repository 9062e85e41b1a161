//! Catalog command - List supported resource kinds.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Value};

use sky_iac::catalog::AttributeRole;
use sky_iac::{Catalog, CatalogEntry, DefaultValue, ResourceKind};

use super::OutputFormat;
use crate::ExitCodes;

#[derive(Args)]
pub struct CatalogArgs {
    /// Show only this kind (aliases accepted)
    kind: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

pub async fn execute(args: CatalogArgs) -> Result<u8> {
    let catalog = Catalog::aws();

    let entries: Vec<&CatalogEntry> = match &args.kind {
        Some(kind) => {
            let kind = ResourceKind::parse(kind);
            let entry = catalog
                .lookup(&kind)
                .with_context(|| format!("Unsupported resource kind argument: {}", kind))?;
            vec![entry]
        }
        None => catalog.entries().iter().collect(),
    };

    if args.format == OutputFormat::Json {
        let listing: Vec<Value> = entries.iter().map(|e| entry_json(e)).collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(ExitCodes::SUCCESS);
    }

    for entry in entries {
        println!("{} ({}) → {}", entry.kind.display_name(), entry.kind, entry.terraform_type);
        if let Some(containment) = &entry.containment {
            println!("  contained in: {} via {}", containment.parent, containment.attribute);
        }
        for attribute in &entry.attributes {
            let marker = if attribute.role == AttributeRole::Directive { " (directive)" } else { "" };
            println!("  {:<28} {}{}", attribute.name, describe_default(&attribute.default), marker);
        }
        println!();
    }

    Ok(ExitCodes::SUCCESS)
}

fn describe_default(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Value(v) => v.to_string(),
        DefaultValue::Name(rule) => rule.to_string(),
        DefaultValue::None => "(no default)".to_string(),
    }
}

fn entry_json(entry: &CatalogEntry) -> Value {
    let attributes: Vec<Value> = entry
        .attributes
        .iter()
        .map(|a| {
            json!({
                "name": a.name,
                "default": describe_default(&a.default),
                "directive": a.role == AttributeRole::Directive,
            })
        })
        .collect();

    json!({
        "kind": entry.kind.as_str(),
        "displayName": entry.kind.display_name(),
        "terraformType": entry.terraform_type,
        "containedIn": entry.containment.as_ref().map(|c| c.parent.as_str()),
        "taggable": entry.taggable,
        "attributes": attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_json() {
        let catalog = Catalog::aws();
        let subnet = catalog.lookup(&"subnet".into()).unwrap();
        let value = entry_json(subnet);

        assert_eq!(value["terraformType"], "aws_subnet");
        assert_eq!(value["containedIn"], "vpc");
        assert!(value["attributes"]
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a["name"] == "cidr_block" && a["default"] == "\"10.0.1.0/24\""));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_error() {
        let args = CatalogArgs {
            kind: Some("mainframe".to_string()),
            format: OutputFormat::Text,
        };
        assert!(execute(args).await.is_err());
    }
}
