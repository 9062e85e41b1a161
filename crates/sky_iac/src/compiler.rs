//! Graph-to-Terraform compiler.
//!
//! Turns resource nodes into a Terraform configuration. Output is a pure
//! function of the nodes, edges, catalog and options: compiling the same graph
//! twice yields byte-identical text.
//!
//! Block order is fixed:
//! 1. the provider/requirements preamble
//! 2. virtual network nodes, in graph order
//! 3. remaining nodes without a parent, in graph order
//! 4. remaining nodes with a parent, in graph order

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::{AttributeRole, Catalog, CatalogEntry, ResourceKind};
use crate::error::{IacError, IacResult};
use crate::graph::{Edge, NodeId, ResourceGraph, ResourceNode};
use crate::hcl;

/// Options shaping the generated preamble and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub provider_source: String,
    pub provider_version: String,
    pub default_region: String,
    /// Value of the `ManagedBy` tag
    pub managed_by: String,
    /// Value of the `Environment` tag
    pub environment: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            provider_source: "hashicorp/aws".to_string(),
            provider_version: "~> 5.0".to_string(),
            default_region: "us-east-1".to_string(),
            managed_by: "skyloom".to_string(),
            environment: "dev".to_string(),
        }
    }
}

impl CompilerOptions {
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }
}

/// Kind of a generated block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Preamble,
    Resource,
    Companion,
    Placeholder,
}

/// One block of generated configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigBlock {
    pub kind: BlockKind,
    /// Node the block was generated from
    pub node_id: Option<NodeId>,
    /// Terraform address (`<type>.<name>`) of a resource block
    pub address: Option<String>,
    pub text: String,
}

/// Result of one compile call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledConfiguration {
    blocks: Vec<ConfigBlock>,
}

impl CompiledConfiguration {
    pub fn blocks(&self) -> &[ConfigBlock] {
        &self.blocks
    }

    /// Full configuration text, blocks separated by a blank line.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Addresses of all generated resource blocks, in output order.
    pub fn addresses(&self) -> Vec<&str> {
        self.blocks.iter().filter_map(|b| b.address.as_deref()).collect()
    }

    /// Number of blocks generated for supported nodes.
    pub fn resource_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.kind == BlockKind::Resource).count()
    }

    /// Nodes that produced placeholder blocks.
    pub fn placeholders(&self) -> Vec<&NodeId> {
        self.blocks
            .iter()
            .filter(|b| b.kind == BlockKind::Placeholder)
            .filter_map(|b| b.node_id.as_ref())
            .collect()
    }
}

impl std::fmt::Display for CompiledConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Graph compiler.
#[derive(Debug, Clone, Default)]
pub struct GraphCompiler {
    catalog: Catalog,
    options: CompilerOptions,
}

impl GraphCompiler {
    pub fn new(catalog: Catalog, options: CompilerOptions) -> Self {
        Self { catalog, options }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile a graph.
    pub fn compile_graph(&self, graph: &ResourceGraph) -> IacResult<CompiledConfiguration> {
        self.compile(graph.nodes(), graph.edges())
    }

    /// Compile nodes and edges into a configuration.
    pub fn compile(&self, nodes: &[ResourceNode], edges: &[Edge]) -> IacResult<CompiledConfiguration> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = nodes.iter().find(|n| !seen.insert(&n.id)) {
            return Err(IacError::Validation(format!("Duplicate node id: {}", duplicate.id)));
        }

        let names = self.assign_names(nodes)?;
        let by_id: HashMap<&NodeId, &ResourceNode> = nodes.iter().map(|n| (&n.id, n)).collect();

        let mut blocks = vec![self.preamble()];
        for node in emission_order(nodes) {
            match self.catalog.lookup(&node.kind) {
                Some(entry) => {
                    let context = NodeContext {
                        node,
                        entry,
                        names: &names,
                        by_id: &by_id,
                        edges,
                    };
                    blocks.extend(self.resource_blocks(&context));
                }
                None => {
                    warn!("Node {} has unsupported kind '{}', emitting placeholder", node.id, node.kind);
                    blocks.push(placeholder_block(node)?);
                }
            }
        }

        let compiled = CompiledConfiguration { blocks };
        info!(
            "Compiled {} node(s) into {} resource block(s)",
            nodes.len(),
            compiled.resource_count()
        );
        Ok(compiled)
    }

    /// Derive a local name for every supported node, unique across the
    /// whole configuration.
    fn assign_names(&self, nodes: &[ResourceNode]) -> IacResult<HashMap<NodeId, String>> {
        let mut owners: HashMap<String, &NodeId> = HashMap::new();
        let mut names = HashMap::new();

        for node in nodes {
            if !node.kind.is_supported() {
                continue;
            }
            let name = hcl::identifier(&hcl::local_name(&node.label), node.id.as_str());
            if let Some(first) = owners.get(&name) {
                return Err(IacError::NameCollision {
                    name,
                    first: (*first).clone(),
                    second: node.id.clone(),
                });
            }
            owners.insert(name.clone(), &node.id);
            names.insert(node.id.clone(), name);
        }

        Ok(names)
    }

    fn preamble(&self) -> ConfigBlock {
        let o = &self.options;
        let text = format!(
            r#"# Generated by skyloom. Do not edit by hand.

terraform {{
  required_providers {{
    aws = {{
      source  = {source}
      version = {version}
    }}
  }}
}}

provider "aws" {{
  region = var.aws_region
}}

variable "aws_region" {{
  description = "AWS region to deploy into"
  type        = string
  default     = {region}
}}
"#,
            source = hcl::quote(&o.provider_source),
            version = hcl::quote(&o.provider_version),
            region = hcl::quote(&o.default_region),
        );

        ConfigBlock {
            kind: BlockKind::Preamble,
            node_id: None,
            address: None,
            text,
        }
    }

    fn resource_blocks(&self, ctx: &NodeContext<'_>) -> Vec<ConfigBlock> {
        let node = ctx.node;
        let entry = ctx.entry;
        let name = ctx.name_of(&node.id).unwrap_or_default().to_string();

        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut nested: Vec<String> = Vec::new();
        let mut directives: BTreeMap<&str, Value> = BTreeMap::new();

        for spec in &entry.attributes {
            let value = node.config.get(spec.name).cloned().or_else(|| spec.default.resolve(&name));
            let Some(value) = value else {
                continue;
            };
            if !spec.constraint.check(&value) {
                warn!(
                    "Value {} for {}.{} does not look valid for {}",
                    value, entry.terraform_type, name, spec.name
                );
            }
            match spec.role {
                AttributeRole::Argument => attributes.push((spec.name.to_string(), hcl::render_value(&value, 1))),
                AttributeRole::Directive => {
                    directives.insert(spec.name, value);
                }
            }
        }

        if let Some(reference) = ctx.containment_reference() {
            attributes.push(reference);
        }

        for (key, value) in &node.config {
            if key == "tags" || entry.attribute_spec(key).is_some() {
                continue;
            }
            if entry.containment.as_ref().is_some_and(|c| c.attribute == key) {
                continue;
            }
            if hcl::is_block_value(value) {
                nested.push(hcl::render_nested_block(key, value, 1));
            } else {
                attributes.push((key.clone(), hcl::render_value(value, 1)));
            }
        }

        if let Some(reference) = user_containment(node, entry) {
            attributes.push(reference);
        }

        if entry.kind == ResourceKind::KeyValueTable && !node.config.contains_key("attribute") {
            let hash_key = node.config.get("hash_key").and_then(Value::as_str).unwrap_or("id");
            nested.push(hcl::render_nested_block(
                "attribute",
                &serde_json::json!({ "name": hash_key, "type": "S" }),
                1,
            ));
        }

        let mut text = String::new();
        text.push_str(&format!("# {}: {}\n", entry.kind.display_name(), node.label.replace('\n', " ")));
        for edge in ctx.outgoing_edges() {
            let target = ctx.name_of(&edge.target).unwrap_or(edge.target.as_str());
            text.push_str(&format!("# connects to {} ({})\n", target, edge.connection_kind));
        }
        text.push_str(&format!("resource \"{}\" \"{}\" {{\n", entry.terraform_type, name));
        text.push_str(&hcl::render_attributes(&attributes, 1));
        for block in &nested {
            separate(&mut text);
            text.push_str(block);
        }
        if entry.taggable {
            separate(&mut text);
            text.push_str(&hcl::render_attributes(
                &[("tags".to_string(), hcl::render_value(&self.tags(node), 1))],
                1,
            ));
        }
        text.push_str("}\n");

        debug!("Generated {}.{} for node {}", entry.terraform_type, name, node.id);

        let mut blocks = vec![ConfigBlock {
            kind: BlockKind::Resource,
            node_id: Some(node.id.clone()),
            address: Some(format!("{}.{}", entry.terraform_type, name)),
            text,
        }];

        if entry.kind == ResourceKind::Bucket {
            if let Some(enabled) = directives.get("versioning").and_then(Value::as_bool) {
                blocks.push(bucket_versioning_block(&node.id, &name, enabled));
            }
        }

        blocks
    }

    fn tags(&self, node: &ResourceNode) -> Value {
        let mut tags = serde_json::Map::new();
        tags.insert("Name".to_string(), Value::String(node.label.clone()));
        tags.insert("ManagedBy".to_string(), Value::String(self.options.managed_by.clone()));
        tags.insert("Environment".to_string(), Value::String(self.options.environment.clone()));
        if let Some(Value::Object(user_tags)) = node.config.get("tags") {
            for (key, value) in user_tags {
                tags.insert(key.clone(), value.clone());
            }
        }
        Value::Object(tags)
    }
}

/// Everything needed to render one node.
struct NodeContext<'a> {
    node: &'a ResourceNode,
    entry: &'a CatalogEntry,
    names: &'a HashMap<NodeId, String>,
    by_id: &'a HashMap<&'a NodeId, &'a ResourceNode>,
    edges: &'a [Edge],
}

impl<'a> NodeContext<'a> {
    fn name_of(&self, id: &NodeId) -> Option<&'a str> {
        self.names.get(id).map(String::as_str)
    }

    fn outgoing_edges(&self) -> impl Iterator<Item = &'a Edge> + '_ {
        self.edges.iter().filter(|e| e.source == self.node.id)
    }

    /// Reference attribute derived from the node's parent, unless the user set it.
    fn containment_reference(&self) -> Option<(String, String)> {
        let containment = self.entry.containment.as_ref()?;
        if self.node.config.contains_key(containment.attribute) {
            return None;
        }
        let parent = self.by_id.get(self.node.parent.as_ref()?)?;
        if parent.kind != containment.parent {
            debug!(
                "Parent {} of node {} is not a {}, no {} reference",
                parent.id, self.node.id, containment.parent, containment.attribute
            );
            return None;
        }
        let parent_name = self.name_of(&parent.id)?;
        let parent_type = match containment.parent {
            ResourceKind::Vpc => "aws_vpc",
            ResourceKind::Subnet => "aws_subnet",
            _ => return None,
        };
        Some((
            containment.attribute.to_string(),
            format!("{}.{}.id", parent_type, parent_name),
        ))
    }
}

/// Blank line between sections of a block body, but not right after its opening brace.
fn separate(text: &mut String) {
    if !text.ends_with("{\n") {
        text.push('\n');
    }
}

/// A user-supplied containment attribute, rendered as given.
fn user_containment(node: &ResourceNode, entry: &CatalogEntry) -> Option<(String, String)> {
    let containment = entry.containment.as_ref()?;
    let value = node.config.get(containment.attribute)?;
    Some((containment.attribute.to_string(), hcl::render_value(value, 1)))
}

fn bucket_versioning_block(node_id: &NodeId, bucket_name: &str, enabled: bool) -> ConfigBlock {
    let name = format!("{}_versioning", bucket_name);
    let status = if enabled { "Enabled" } else { "Suspended" };
    let text = format!(
        "resource \"aws_s3_bucket_versioning\" \"{name}\" {{\n  bucket = aws_s3_bucket.{bucket}.id\n\n  versioning_configuration {{\n    status = \"{status}\"\n  }}\n}}\n",
        name = name,
        bucket = bucket_name,
        status = status,
    );

    ConfigBlock {
        kind: BlockKind::Companion,
        node_id: Some(node_id.clone()),
        address: Some(format!("aws_s3_bucket_versioning.{}", name)),
        text,
    }
}

/// Commented-out dump of a node the catalog cannot translate.
fn placeholder_block(node: &ResourceNode) -> IacResult<ConfigBlock> {
    let mut text = format!(
        "# UNSUPPORTED RESOURCE KIND {}\n# node: {}\n# label: {}\n",
        hcl::quote(node.kind.as_str()),
        node.id,
        node.label.replace('\n', " ")
    );
    let dump = serde_json::to_string_pretty(&node.config)?;
    for line in dump.lines() {
        text.push_str(&format!("# {}\n", line));
    }

    Ok(ConfigBlock {
        kind: BlockKind::Placeholder,
        node_id: Some(node.id.clone()),
        address: None,
        text,
    })
}

/// Virtual networks first, then parentless nodes, then parented nodes.
fn emission_order(nodes: &[ResourceNode]) -> impl Iterator<Item = &ResourceNode> {
    let networks = nodes.iter().filter(|n| n.kind == ResourceKind::Vpc);
    let rest = move || nodes.iter().filter(|n| n.kind != ResourceKind::Vpc);
    networks
        .chain(rest().filter(|n| n.parent.is_none()))
        .chain(rest().filter(|n| n.parent.is_some()))
}
