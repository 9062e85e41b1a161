//! Resource graph model.
//!
//! Nodes are design-time resources; edges are advisory relations annotated
//! with a connection kind derived once, when the edge is created.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::catalog::ResourceKind;
use crate::error::{IacError, IacResult};

/// Opaque node identifier, supplied by the caller or generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One design-time resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: NodeId,
    pub kind: ResourceKind,
    pub label: String,
    /// Network container this node sits in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    /// User configuration, merged over catalog defaults
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

impl ResourceNode {
    pub fn new(id: impl Into<NodeId>, kind: impl Into<ResourceKind>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: label.into(),
            parent: None,
            config: BTreeMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Classification of an edge by its endpoint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Private,
    Public,
    Database,
}

impl ConnectionKind {
    /// Derive the connection kind from the two endpoint kinds.
    pub fn derive(source: &ResourceKind, target: &ResourceKind) -> Self {
        let either = |k: ResourceKind| source == &k || target == &k;
        if either(ResourceKind::Database) {
            ConnectionKind::Database
        } else if either(ResourceKind::InternetGateway) || either(ResourceKind::LoadBalancer) {
            ConnectionKind::Public
        } else {
            ConnectionKind::Private
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Private => "private",
            ConnectionKind::Public => "public",
            ConnectionKind::Database => "database",
        }
    }
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directed relation between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub connection_kind: ConnectionKind,
}

/// Edge as stored in a graph document; the connection kind may be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_kind: Option<ConnectionKind>,
}

/// Serialized graph: `{nodes, edges}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<ResourceNode>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// An editable resource graph.
///
/// Node ids are never reused: ids of removed nodes are retired for the
/// lifetime of the graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument")]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    edges: Vec<Edge>,
    #[serde(skip)]
    retired: HashSet<NodeId>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &NodeId) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn require(&self, id: &NodeId) -> IacResult<&ResourceNode> {
        self.node(id).ok_or_else(|| IacError::UnknownNode(id.clone()))
    }

    /// Add a node. Duplicate and retired ids are rejected.
    pub fn add_node(&mut self, node: ResourceNode) -> IacResult<()> {
        if self.retired.contains(&node.id) {
            return Err(IacError::NodeIdRetired(node.id));
        }
        if self.node(&node.id).is_some() {
            return Err(IacError::DuplicateNodeId(node.id));
        }
        debug!("Adding node {} ({})", node.id, node.kind);
        self.nodes.push(node);
        Ok(())
    }

    /// Remove a node, its edges and every parent reference to it.
    pub fn remove_node(&mut self, id: &NodeId) -> IacResult<ResourceNode> {
        let index = self
            .nodes
            .iter()
            .position(|n| &n.id == id)
            .ok_or_else(|| IacError::UnknownNode(id.clone()))?;
        let removed = self.nodes.remove(index);

        self.edges.retain(|e| &e.source != id && &e.target != id);
        for node in &mut self.nodes {
            if node.parent.as_ref() == Some(id) {
                node.parent = None;
            }
        }
        self.retired.insert(id.clone());

        debug!("Removed node {}", id);
        Ok(removed)
    }

    /// Connect two nodes, deriving the connection kind from their current kinds.
    pub fn connect(&mut self, source: &NodeId, target: &NodeId) -> IacResult<&Edge> {
        let kind = ConnectionKind::derive(&self.require(source)?.kind, &self.require(target)?.kind);
        self.edges.push(Edge {
            source: source.clone(),
            target: target.clone(),
            connection_kind: kind,
        });
        Ok(&self.edges[self.edges.len() - 1])
    }

    /// Set or clear a node's network container.
    pub fn set_parent(&mut self, id: &NodeId, parent: Option<NodeId>) -> IacResult<()> {
        if let Some(parent_id) = &parent {
            self.require(parent_id)?;
            if parent_id == id {
                return Err(IacError::Validation(format!("Node {} cannot contain itself", id)));
            }
        }
        let node = self
            .nodes
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| IacError::UnknownNode(id.clone()))?;
        node.parent = parent;
        Ok(())
    }

    /// Build a graph from a document, deriving missing connection kinds.
    pub fn from_document(document: GraphDocument) -> IacResult<Self> {
        let mut graph = Self::new();
        for node in document.nodes {
            graph.add_node(node)?;
        }
        for spec in document.edges {
            let derived = ConnectionKind::derive(
                &graph.require(&spec.source)?.kind,
                &graph.require(&spec.target)?.kind,
            );
            graph.edges.push(Edge {
                source: spec.source,
                target: spec.target,
                connection_kind: spec.connection_kind.unwrap_or(derived),
            });
        }
        Ok(graph)
    }

    /// Convert to a serializable document.
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.clone(),
            edges: self
                .edges
                .iter()
                .map(|e| EdgeSpec {
                    source: e.source.clone(),
                    target: e.target.clone(),
                    connection_kind: Some(e.connection_kind),
                })
                .collect(),
        }
    }

    pub fn from_json(content: &str) -> IacResult<Self> {
        Self::from_document(serde_json::from_str(content)?)
    }

    pub fn from_yaml(content: &str) -> IacResult<Self> {
        Self::from_document(serde_yaml::from_str(content)?)
    }

    /// Load a graph file: `.json` as JSON, anything else as YAML.
    pub fn from_file(path: &Path) -> IacResult<Self> {
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }
}

impl TryFrom<GraphDocument> for ResourceGraph {
    type Error = IacError;

    fn try_from(document: GraphDocument) -> Result<Self, Self::Error> {
        Self::from_document(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph.add_node(ResourceNode::new("vpc", "vpc", "Main")).unwrap();
        graph
            .add_node(ResourceNode::new("web", "ec2", "Web").with_parent("vpc"))
            .unwrap();
        graph.add_node(ResourceNode::new("db", "rds", "Orders")).unwrap();
        graph
    }

    #[test]
    fn test_connection_kind_derivation() {
        use ResourceKind::*;
        assert_eq!(ConnectionKind::derive(&Instance, &Database), ConnectionKind::Database);
        assert_eq!(ConnectionKind::derive(&LoadBalancer, &Instance), ConnectionKind::Public);
        assert_eq!(ConnectionKind::derive(&InternetGateway, &Database), ConnectionKind::Database);
        assert_eq!(ConnectionKind::derive(&Function, &Queue), ConnectionKind::Private);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut graph = sample_graph();
        let err = graph.add_node(ResourceNode::new("web", "s3", "Other")).unwrap_err();
        assert!(matches!(err, IacError::DuplicateNodeId(id) if id.as_str() == "web"));
    }

    #[test]
    fn test_removed_id_is_retired() {
        let mut graph = sample_graph();
        graph.remove_node(&NodeId::from("db")).unwrap();

        let err = graph.add_node(ResourceNode::new("db", "rds", "Again")).unwrap_err();
        assert!(matches!(err, IacError::NodeIdRetired(_)));
    }

    #[test]
    fn test_remove_clears_edges_and_parents() {
        let mut graph = sample_graph();
        graph.connect(&"web".into(), &"db".into()).unwrap();
        graph.connect(&"vpc".into(), &"db".into()).unwrap();

        graph.remove_node(&NodeId::from("vpc")).unwrap();

        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.node(&"web".into()).unwrap().parent, None);
    }

    #[test]
    fn test_connection_kind_not_rederived() {
        let mut graph = sample_graph();
        let kind = graph.connect(&"web".into(), &"db".into()).unwrap().connection_kind;
        assert_eq!(kind, ConnectionKind::Database);

        graph.nodes[2].kind = ResourceKind::Queue;
        assert_eq!(graph.edges()[0].connection_kind, ConnectionKind::Database);
    }

    #[test]
    fn test_connect_unknown_node() {
        let mut graph = sample_graph();
        let err = graph.connect(&"web".into(), &"missing".into()).unwrap_err();
        assert!(matches!(err, IacError::UnknownNode(_)));
    }

    #[test]
    fn test_set_parent() {
        let mut graph = sample_graph();
        graph.set_parent(&"db".into(), Some("vpc".into())).unwrap();
        assert_eq!(graph.node(&"db".into()).unwrap().parent, Some(NodeId::from("vpc")));

        assert!(graph.set_parent(&"db".into(), Some("db".into())).is_err());
        graph.set_parent(&"db".into(), None).unwrap();
        assert_eq!(graph.node(&"db".into()).unwrap().parent, None);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_document_derives_missing_connection_kind() {
        let doc = json!({
            "nodes": [
                {"id": "n1", "kind": "ec2", "label": "Web", "config": {"instance_type": "t3.large"}},
                {"id": "n2", "kind": "alb", "label": "Front"}
            ],
            "edges": [
                {"source": "n2", "target": "n1"},
                {"source": "n1", "target": "n2", "connectionKind": "private"}
            ]
        });
        let graph = ResourceGraph::from_json(&doc.to_string()).unwrap();

        assert_eq!(graph.nodes()[0].kind, ResourceKind::Instance);
        assert_eq!(graph.nodes()[0].config["instance_type"], json!("t3.large"));
        assert_eq!(graph.edges()[0].connection_kind, ConnectionKind::Public);
        assert_eq!(graph.edges()[1].connection_kind, ConnectionKind::Private);
    }

    #[test]
    fn test_yaml_document_roundtrip() {
        let yaml = r#"
nodes:
  - id: net
    kind: vpc
    label: Core Network
  - id: app
    kind: subnet
    label: App Subnet
    parent: net
edges: []
"#;
        let graph = ResourceGraph::from_yaml(yaml).unwrap();
        let serialized = serde_yaml::to_string(&graph).unwrap();
        let reloaded: ResourceGraph = serde_yaml::from_str(&serialized).unwrap();

        assert_eq!(reloaded.nodes(), graph.nodes());
        assert_eq!(reloaded.node(&"app".into()).unwrap().parent, Some(NodeId::from("net")));
    }
}
