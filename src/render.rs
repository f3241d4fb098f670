//! Read-only per-frame projection for renderers, plus the styling helpers a
//! renderer needs to draw it the same way everywhere.

use serde::Serialize;

use crate::filter::{Emphasis, classify_nodes, edge_emphasis};
use crate::graph::{NodeId, NodeType};
use crate::interaction::{InteractionController, ViewTransform};
use crate::simulation::{SimulationEngine, SimulationPhase};

const LABEL_MAX_CHARS: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeFrame {
    pub id: NodeId,
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub color: &'static str,
    pub emphasis: Emphasis,
    pub pinned: bool,
    pub selected: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeFrame {
    pub source: NodeId,
    pub target: NodeId,
    pub source_x: f32,
    pub source_y: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub relation_label: String,
    pub width: f32,
    pub stroke_width: f32,
    pub emphasis: Emphasis,
}

/// Positions are in graph space. Apply `transform` to reach the screen.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Frame {
    pub nodes: Vec<NodeFrame>,
    pub edges: Vec<EdgeFrame>,
    pub transform: ViewTransform,
    pub alpha: f32,
    pub phase: SimulationPhase,
}

pub fn type_color(node_type: &NodeType) -> &'static str {
    match node_type {
        NodeType::Person => "#ff7875",
        NodeType::Org => "#73d13d",
        NodeType::Gpe => "#40a9ff",
        NodeType::Product => "#b37feb",
        NodeType::Event => "#ffbb96",
        NodeType::Time => "#87e8de",
        NodeType::Money => "#ffd666",
        NodeType::Other(_) => "#1890ff",
    }
}

/// Shortens long labels to ten characters followed by `...`.
pub fn truncate_label(label: &str) -> String {
    if label.chars().count() <= LABEL_MAX_CHARS {
        return label.to_owned();
    }
    let mut short: String = label.chars().take(LABEL_MAX_CHARS).collect();
    short.push_str("...");
    short
}

/// `0.905` becomes `"90.5%"`.
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.1}%", confidence * 100.0)
}

pub fn stroke_width(width: f32) -> f32 {
    width.max(0.0).sqrt()
}

pub fn build_frame(engine: &SimulationEngine, controller: &InteractionController) -> Frame {
    let nodes = engine.nodes();
    let selection = controller.selection();
    let emphasis = classify_nodes(nodes, &selection.filter);

    let node_frames = nodes
        .iter()
        .zip(&emphasis)
        .map(|(node, emphasis)| NodeFrame {
            id: node.id.clone(),
            label: truncate_label(&node.label),
            x: node.position.x,
            y: node.position.y,
            radius: node.size,
            node_type: node.node_type.clone(),
            color: type_color(&node.node_type),
            emphasis: *emphasis,
            pinned: node.is_pinned(),
            selected: selection.selected.as_ref() == Some(&node.id),
        })
        .collect();

    let edge_frames = engine
        .edges()
        .iter()
        .map(|edge| {
            let source = &nodes[edge.source];
            let target = &nodes[edge.target];
            EdgeFrame {
                source: source.id.clone(),
                target: target.id.clone(),
                source_x: source.position.x,
                source_y: source.position.y,
                target_x: target.position.x,
                target_y: target.position.y,
                relation_label: edge.relation.clone(),
                width: edge.width,
                stroke_width: stroke_width(edge.width),
                emphasis: edge_emphasis(emphasis[edge.source], emphasis[edge.target]),
            }
        })
        .collect();

    Frame {
        nodes: node_frames,
        edges: edge_frames,
        transform: controller.transform(),
        alpha: engine.alpha(),
        phase: engine.phase(),
    }
}
