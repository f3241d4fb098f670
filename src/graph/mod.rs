//! Graph snapshot records as supplied by the data-fetch layer, and the dense
//! arena the simulation works on.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod build;

pub use build::{SimEdge, SimNode};
pub(crate) use build::GraphArena;

/// Stable node identifier. Snapshots may use either strings or integers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Text(String),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Entity category. The set is open: unknown tags are kept verbatim and
/// styled with the fallback colour.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Person,
    Org,
    Gpe,
    Product,
    Event,
    Time,
    Money,
    Other(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Person => "PERSON",
            Self::Org => "ORG",
            Self::Gpe => "GPE",
            Self::Product => "PRODUCT",
            Self::Event => "EVENT",
            Self::Time => "TIME",
            Self::Money => "MONEY",
            Self::Other(tag) => tag,
        }
    }
}

impl Default for NodeType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "PERSON" => Self::Person,
            "ORG" => Self::Org,
            "GPE" => Self::Gpe,
            "PRODUCT" => Self::Product,
            "EVENT" => Self::Event,
            "TIME" => Self::Time,
            "MONEY" => Self::Money,
            _ => Self::Other(tag.to_owned()),
        }
    }
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<NodeType> for String {
    fn from(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub size: Option<f32>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl NodeRecord {
    pub fn new(id: impl Into<NodeId>, label: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type,
            size: None,
            confidence: None,
            properties: Map::new(),
        }
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl EdgeRecord {
    pub fn new(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            width: None,
            confidence: None,
            properties: Map::new(),
        }
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }
}

/// A complete graph as delivered by the data-fetch collaborator. Loading one
/// replaces everything the engine held before.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<NodeRecord>, edges: Vec<EdgeRecord>) -> Self {
        Self { nodes, edges }
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn stats(&self) -> GraphStats {
        let mut node_types = BTreeMap::new();
        for node in &self.nodes {
            *node_types
                .entry(node.node_type.as_str().to_owned())
                .or_insert(0) += 1;
        }

        let mut relations = BTreeMap::new();
        for edge in &self.edges {
            *relations.entry(edge.relation.clone()).or_insert(0) += 1;
        }

        GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            node_types,
            relations,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub node_types: BTreeMap<String, usize>,
    pub relations: BTreeMap<String, usize>,
}
