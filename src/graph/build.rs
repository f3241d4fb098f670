use std::collections::HashMap;

use emath::Vec2;
use serde_json::{Map, Value};

use crate::error::{LayoutError, LayoutResult};
use crate::layout::seed_position;

use super::{GraphSnapshot, NodeId, NodeRecord, NodeType};

const DEFAULT_EDGE_WIDTH: f32 = 1.0;

/// A node as owned by the simulation. Identity, label, size and confidence
/// are fixed at load time; only the kinematic fields change while ticking.
#[derive(Clone, Debug)]
pub struct SimNode {
    pub id: NodeId,
    pub label: String,
    pub node_type: NodeType,
    pub size: f32,
    pub confidence: f32,
    pub properties: Map<String, Value>,
    pub position: Vec2,
    pub velocity: Vec2,
    pub fx: Option<f32>,
    pub fy: Option<f32>,
}

impl SimNode {
    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() || self.fy.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct SimEdge {
    pub source: usize,
    pub target: usize,
    pub relation: String,
    pub width: f32,
    pub confidence: f32,
    pub properties: Map<String, Value>,
}

pub(crate) struct GraphArena {
    pub(crate) nodes: Vec<SimNode>,
    pub(crate) edges: Vec<SimEdge>,
    pub(crate) index_by_id: HashMap<NodeId, usize>,
    pub(crate) degree: Vec<usize>,
}

impl GraphArena {
    /// Validates and normalizes a snapshot. Nothing here touches engine
    /// state, so a failure leaves the previous graph in place.
    pub(crate) fn build(
        snapshot: GraphSnapshot,
        previous: Option<&GraphArena>,
        center: Vec2,
    ) -> LayoutResult<Self> {
        let GraphSnapshot { nodes, edges } = snapshot;

        let mut index_by_id = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            if index_by_id.insert(node.id.clone(), index).is_some() {
                return Err(LayoutError::invalid_graph(format!(
                    "duplicate node id \"{}\"",
                    node.id
                )));
            }
        }

        let mut sim_edges = Vec::with_capacity(edges.len());
        let mut degree = vec![0usize; nodes.len()];
        for (edge_index, edge) in edges.into_iter().enumerate() {
            let Some(&source) = index_by_id.get(&edge.source) else {
                return Err(LayoutError::invalid_graph(format!(
                    "edge {edge_index} references unknown source \"{}\"",
                    edge.source
                )));
            };
            let Some(&target) = index_by_id.get(&edge.target) else {
                return Err(LayoutError::invalid_graph(format!(
                    "edge {edge_index} references unknown target \"{}\"",
                    edge.target
                )));
            };

            degree[source] += 1;
            degree[target] += 1;
            sim_edges.push(SimEdge {
                source,
                target,
                relation: edge.relation,
                width: edge
                    .width
                    .filter(|width| width.is_finite() && *width > 0.0)
                    .unwrap_or(DEFAULT_EDGE_WIDTH),
                confidence: normalize_confidence(edge.confidence),
                properties: edge.properties,
            });
        }

        let sim_nodes = nodes
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let previous_position = previous
                    .and_then(|arena| arena.position_of(&record.id));
                make_sim_node(record, index, previous_position, center)
            })
            .collect();

        Ok(Self {
            nodes: sim_nodes,
            edges: sim_edges,
            index_by_id,
            degree,
        })
    }

    pub(crate) fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    fn position_of(&self, id: &NodeId) -> Option<Vec2> {
        self.index_of(id).map(|index| self.nodes[index].position)
    }
}

fn normalize_confidence(confidence: Option<f32>) -> f32 {
    confidence
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}

/// Radius used when the snapshot carries no usable size.
pub(crate) fn size_from_confidence(confidence: f32) -> f32 {
    (confidence * 20.0).clamp(10.0, 30.0)
}

fn make_sim_node(
    record: NodeRecord,
    index: usize,
    previous_position: Option<Vec2>,
    center: Vec2,
) -> SimNode {
    let confidence = normalize_confidence(record.confidence);
    let size = record
        .size
        .filter(|size| size.is_finite() && *size > 0.0)
        .unwrap_or_else(|| size_from_confidence(confidence));
    let label = if record.label.is_empty() {
        record.id.to_string()
    } else {
        record.label
    };

    SimNode {
        position: previous_position.unwrap_or_else(|| seed_position(index, center)),
        id: record.id,
        label,
        node_type: record.node_type,
        size,
        confidence,
        properties: record.properties,
        velocity: Vec2::ZERO,
        fx: None,
        fy: None,
    }
}
