//! Pointer and toolbar input, independent of any windowing toolkit.
//!
//! The concrete UI layer forwards raw pointer events here. The controller
//! turns them into pins and alpha holds on the [`SimulationEngine`] and into
//! changes of its own [`ViewTransform`]. It never touches node identity or
//! the edge list.

mod transform;

use emath::{Pos2, pos2};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{InteractionConfig, LayoutConfig};
use crate::filter::{FilterState, SearchMode, TypeFilter};
use crate::graph::{NodeId, NodeType, SimNode};
use crate::render::format_confidence;
use crate::simulation::SimulationEngine;

pub use transform::ViewTransform;
use transform::viewport_center;

/// Wheel delta to zoom exponent, per delta unit.
const WHEEL_ZOOM_RATE: f32 = 0.002;

/// Domain callbacks. Every method defaults to doing nothing.
pub trait GraphEvents: Send {
    fn on_node_click(&mut self, _node: &NodeDetails) {}
    fn on_node_double_click(&mut self, _node: &NodeDetails) {}
    fn on_selection_cleared(&mut self) {}
    fn on_view_transform_changed(&mut self, _transform: ViewTransform) {}
}

struct NoEvents;

impl GraphEvents for NoEvents {}

/// Full record of one node, handed to callbacks and detail panels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeDetails {
    pub id: NodeId,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub size: f32,
    pub confidence: f32,
    pub properties: Map<String, Value>,
    pub x: f32,
    pub y: f32,
    pub pinned: bool,
}

impl From<&SimNode> for NodeDetails {
    fn from(node: &SimNode) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label.clone(),
            node_type: node.node_type.clone(),
            size: node.size,
            confidence: node.confidence,
            properties: node.properties.clone(),
            x: node.position.x,
            y: node.position.y,
            pinned: node.is_pinned(),
        }
    }
}

/// Tooltip data for the hovered node. Drawing it is the renderer's job.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HoverInfo {
    pub node: NodeDetails,
    pub screen: Pos2,
    pub title: String,
    pub lines: Vec<String>,
}

/// Presentation state. Never read by the physics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionState {
    pub selected: Option<NodeId>,
    pub hovered: Option<NodeId>,
    pub filter: FilterState,
}

enum PressTarget {
    Node(NodeId),
    Background { last: Pos2 },
}

struct Press {
    start: Pos2,
    target: PressTarget,
    moved: bool,
}

pub struct InteractionController {
    config: InteractionConfig,
    width: f32,
    height: f32,
    transform: ViewTransform,
    selection: SelectionState,
    press: Option<Press>,
    events: Box<dyn GraphEvents>,
}

impl InteractionController {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            config: config.interaction,
            width: config.width,
            height: config.height,
            transform: ViewTransform::IDENTITY,
            selection: SelectionState::default(),
            press: None,
            events: Box::new(NoEvents),
        }
    }

    pub fn set_events(&mut self, events: Box<dyn GraphEvents>) {
        self.events = events;
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn is_dragging_node(&self) -> bool {
        matches!(
            self.press,
            Some(Press {
                target: PressTarget::Node(_),
                ..
            })
        )
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.selection.filter.search = search.into();
    }

    pub fn set_search_mode(&mut self, mode: SearchMode) {
        self.selection.filter.search_mode = mode;
    }

    pub fn set_type_filter(&mut self, type_filter: TypeFilter) {
        self.selection.filter.type_filter = type_filter;
    }

    /// Topmost node under a screen point, if any. Nearest centre wins when
    /// circles overlap.
    pub fn hit_test(&self, engine: &SimulationEngine, screen: Pos2) -> Option<NodeId> {
        let world = self.transform.screen_to_world(screen);
        engine
            .nodes()
            .iter()
            .filter_map(|node| {
                let distance = (node.position - world).length();
                if distance <= node.size {
                    Some((node, distance))
                } else {
                    None
                }
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(node, _)| node.id.clone())
    }

    pub fn on_pointer_down(&mut self, engine: &mut SimulationEngine, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        // A press whose release never arrived still holds its pin.
        if let Some(stale) = self.press.take() {
            Self::release_drag(engine, stale);
        }

        let screen = pos2(x, y);
        let target = match self.hit_test(engine, screen) {
            Some(id) => {
                let world = self.transform.screen_to_world(screen);
                engine.pin(&id, world.x, world.y);
                let target = self.config.drag_alpha_target;
                engine.set_alpha_target(Some(target));
                engine.reheat(engine.alpha().max(target));
                debug!(node = %id, "drag started");
                PressTarget::Node(id)
            }
            None => PressTarget::Background { last: screen },
        };

        self.press = Some(Press {
            start: screen,
            target,
            moved: false,
        });
    }

    pub fn on_pointer_move(&mut self, engine: &mut SimulationEngine, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        let screen = pos2(x, y);
        let Some(press) = self.press.as_mut() else {
            self.selection.hovered = self.hit_test(engine, screen);
            return;
        };

        if (screen - press.start).length() > self.config.click_tolerance {
            press.moved = true;
        }

        match &mut press.target {
            PressTarget::Node(id) => {
                let world = self.transform.screen_to_world(screen);
                engine.pin(id, world.x, world.y);
            }
            PressTarget::Background { last } => {
                let delta = screen - *last;
                *last = screen;
                self.transform.pan_by(delta);
                self.events.on_view_transform_changed(self.transform);
            }
        }
    }

    pub fn on_pointer_up(&mut self, engine: &mut SimulationEngine) {
        let Some(press) = self.press.take() else {
            return;
        };

        let moved = press.moved;
        match Self::release_drag(engine, press) {
            Some(id) if !moved => {
                self.select(engine, &id);
            }
            Some(_) => {}
            None => {
                if !moved {
                    self.clear_selection();
                }
            }
        }
    }

    /// Unpins a dragged node and drops the alpha hold. Returns the node id,
    /// or `None` for a background press.
    fn release_drag(engine: &mut SimulationEngine, press: Press) -> Option<NodeId> {
        let PressTarget::Node(id) = press.target else {
            return None;
        };
        engine.unpin(&id);
        engine.set_alpha_target(None);
        debug!(node = %id, "drag ended");
        Some(id)
    }

    pub fn on_double_click(&mut self, engine: &SimulationEngine, x: f32, y: f32) {
        let Some(id) = self.hit_test(engine, pos2(x, y)) else {
            return;
        };
        if let Some(node) = engine.node(&id) {
            self.events.on_node_double_click(&NodeDetails::from(node));
        }
    }

    /// Zooms by `2^(-delta * 0.002)` keeping the world point under `anchor`
    /// in place. Positive deltas zoom out, matching wheel conventions.
    pub fn on_wheel(&mut self, delta: f32, anchor: Pos2) {
        if !delta.is_finite() || delta == 0.0 || !anchor.x.is_finite() || !anchor.y.is_finite()
        {
            return;
        }
        self.zoom_by((-delta * WHEEL_ZOOM_RATE).exp2(), anchor);
    }

    pub fn zoom_in(&mut self) {
        self.zoom_by(self.config.zoom_step, viewport_center(self.width, self.height));
    }

    pub fn zoom_out(&mut self) {
        self.zoom_by(
            1.0 / self.config.zoom_step,
            viewport_center(self.width, self.height),
        );
    }

    /// Identity transform and a full reheat of the layout.
    pub fn reset(&mut self, engine: &mut SimulationEngine) {
        self.transform = ViewTransform::IDENTITY;
        self.events.on_view_transform_changed(self.transform);
        engine.reheat(1.0);
    }

    pub fn select(&mut self, engine: &SimulationEngine, id: &NodeId) -> bool {
        let Some(node) = engine.node(id) else {
            return false;
        };
        self.selection.selected = Some(id.clone());
        self.events.on_node_click(&NodeDetails::from(node));
        true
    }

    pub fn clear_selection(&mut self) {
        if self.selection.selected.take().is_some() {
            self.events.on_selection_cleared();
        }
    }

    pub fn selected_details(&self, engine: &SimulationEngine) -> Option<NodeDetails> {
        let id = self.selection.selected.as_ref()?;
        engine.node(id).map(NodeDetails::from)
    }

    pub fn hover_info(&self, engine: &SimulationEngine) -> Option<HoverInfo> {
        let id = self.selection.hovered.as_ref()?;
        let node = engine.node(id)?;
        Some(HoverInfo {
            screen: self.transform.world_to_screen(node.position),
            title: node.label.clone(),
            lines: vec![
                format!("type: {}", node.node_type),
                format!("confidence: {}", format_confidence(node.confidence)),
            ],
            node: NodeDetails::from(node),
        })
    }

    /// Drops references to nodes that disappeared in a reload.
    pub fn sync_with_graph(&mut self, engine: &mut SimulationEngine) {
        if let Some(selected) = &self.selection.selected
            && !engine.contains(selected)
        {
            self.clear_selection();
        }
        if let Some(hovered) = &self.selection.hovered
            && !engine.contains(hovered)
        {
            self.selection.hovered = None;
        }
        if let Some(Press {
            target: PressTarget::Node(id),
            ..
        }) = &self.press
            && !engine.contains(id)
        {
            self.press = None;
            engine.set_alpha_target(None);
        }
    }

    fn zoom_by(&mut self, factor: f32, anchor: Pos2) {
        let [min_scale, max_scale] = self.config.zoom_scale_range;
        let before = self.transform;
        self.transform.zoom_about(anchor, factor, min_scale, max_scale);
        if self.transform != before {
            self.events.on_view_transform_changed(self.transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use emath::vec2;

    use super::*;
    use crate::graph::{GraphSnapshot, NodeRecord};

    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl GraphEvents for Recorder {
        fn on_node_click(&mut self, node: &NodeDetails) {
            self.log.lock().unwrap().push(format!("click {}", node.id));
        }

        fn on_node_double_click(&mut self, node: &NodeDetails) {
            self.log.lock().unwrap().push(format!("dblclick {}", node.id));
        }

        fn on_selection_cleared(&mut self) {
            self.log.lock().unwrap().push("cleared".to_owned());
        }

        fn on_view_transform_changed(&mut self, transform: ViewTransform) {
            self.log
                .lock()
                .unwrap()
                .push(format!("transform {}", transform.scale));
        }
    }

    fn setup() -> (SimulationEngine, InteractionController, Arc<Mutex<Vec<String>>>) {
        let config = LayoutConfig::default();
        let mut engine = SimulationEngine::new(&config);
        engine
            .load(GraphSnapshot::new(
                vec![
                    NodeRecord::new("a", "Alice", NodeType::Person).with_size(10.0),
                    NodeRecord::new("b", "Bob", NodeType::Person).with_size(10.0),
                ],
                Vec::new(),
            ))
            .unwrap();
        engine.pin(&NodeId::from("a"), 100.0, 100.0);
        engine.pin(&NodeId::from("b"), 300.0, 100.0);

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut controller = InteractionController::new(&config);
        controller.set_events(Box::new(Recorder {
            log: Arc::clone(&log),
        }));
        (engine, controller, log)
    }

    #[test]
    fn hit_test_respects_the_view_transform() {
        let (engine, mut controller, _) = setup();
        assert_eq!(
            controller.hit_test(&engine, pos2(104.0, 98.0)),
            Some(NodeId::from("a"))
        );
        assert_eq!(controller.hit_test(&engine, pos2(200.0, 100.0)), None);

        controller.on_wheel(-500.0, pos2(0.0, 0.0));
        assert!((controller.transform().scale - 2.0).abs() < 1e-4);
        assert_eq!(
            controller.hit_test(&engine, pos2(600.0, 200.0)),
            Some(NodeId::from("b"))
        );
    }

    #[test]
    fn click_selects_and_background_click_clears() {
        let (mut engine, mut controller, log) = setup();
        controller.on_pointer_down(&mut engine, 100.0, 100.0);
        controller.on_pointer_up(&mut engine);
        assert_eq!(controller.selection().selected, Some(NodeId::from("a")));

        controller.on_pointer_down(&mut engine, 300.0, 100.0);
        controller.on_pointer_up(&mut engine);
        assert_eq!(controller.selection().selected, Some(NodeId::from("b")));

        controller.on_pointer_down(&mut engine, 200.0, 400.0);
        controller.on_pointer_up(&mut engine);
        assert_eq!(controller.selection().selected, None);

        assert_eq!(*log.lock().unwrap(), vec!["click a", "click b", "cleared"]);
    }

    #[test]
    fn dragging_pins_follows_and_releases() {
        let (mut engine, mut controller, log) = setup();
        let a = NodeId::from("a");
        engine.unpin(&a);

        controller.on_pointer_down(&mut engine, 100.0, 100.0);
        assert!(controller.is_dragging_node());
        assert_eq!(engine.state().alpha_target, 0.3);
        assert_eq!(engine.node(&a).unwrap().fx, Some(100.0));

        controller.on_pointer_move(&mut engine, 150.0, 180.0);
        let node = engine.node(&a).unwrap();
        assert_eq!((node.fx, node.fy), (Some(150.0), Some(180.0)));
        for _ in 0..5 {
            engine.tick();
        }
        assert_eq!(engine.node(&a).unwrap().position, vec2(150.0, 180.0));

        controller.on_pointer_up(&mut engine);
        assert!(!engine.node(&a).unwrap().is_pinned());
        assert_eq!(engine.state().alpha_target, 0.0);
        assert_eq!(controller.selection().selected, None);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn drag_maps_through_the_inverse_transform() {
        let (mut engine, mut controller, _) = setup();
        controller.zoom_in();
        let screen = controller
            .transform()
            .world_to_screen(vec2(100.0, 100.0));
        controller.on_pointer_down(&mut engine, screen.x, screen.y);
        controller.on_pointer_move(&mut engine, screen.x + 30.0, screen.y);

        let node = engine.node(&NodeId::from("a")).unwrap();
        assert!((node.fx.unwrap() - 120.0).abs() < 1e-3);
        assert!((node.fy.unwrap() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn non_finite_pointer_input_is_ignored() {
        let (mut engine, mut controller, _) = setup();
        let a = NodeId::from("a");
        engine.unpin(&a);

        controller.on_pointer_down(&mut engine, 100.0, 100.0);
        controller.on_pointer_move(&mut engine, f32::NAN, 120.0);
        assert_eq!(engine.node(&a).unwrap().fx, Some(100.0));
        for _ in 0..5 {
            engine.tick();
        }
        controller.on_pointer_up(&mut engine);

        controller.on_pointer_down(&mut engine, f32::INFINITY, 0.0);
        controller.on_pointer_move(&mut engine, 500.0, f32::NAN);
        controller.on_wheel(100.0, pos2(f32::NAN, 0.0));
        assert!(controller.transform().is_identity());
        assert!(!controller.is_dragging_node());
        assert!(
            engine
                .nodes()
                .iter()
                .all(|node| node.position.x.is_finite() && node.position.y.is_finite())
        );
    }

    #[test]
    fn second_press_releases_the_first_drag() {
        let (mut engine, mut controller, _) = setup();
        let a = NodeId::from("a");
        let b = NodeId::from("b");
        engine.unpin(&a);
        engine.unpin(&b);

        controller.on_pointer_down(&mut engine, 100.0, 100.0);
        controller.on_pointer_down(&mut engine, 300.0, 100.0);
        assert!(!engine.node(&a).unwrap().is_pinned());
        assert!(engine.node(&b).unwrap().is_pinned());

        controller.on_pointer_up(&mut engine);
        assert!(!engine.node(&a).unwrap().is_pinned());
        assert!(!engine.node(&b).unwrap().is_pinned());
        assert_eq!(engine.state().alpha_target, 0.0);
    }

    #[test]
    fn background_drag_pans() {
        let (mut engine, mut controller, log) = setup();
        controller.on_pointer_down(&mut engine, 500.0, 500.0);
        controller.on_pointer_move(&mut engine, 520.0, 490.0);
        controller.on_pointer_move(&mut engine, 540.0, 480.0);
        controller.on_pointer_up(&mut engine);

        assert_eq!(controller.transform().translation, vec2(40.0, -20.0));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn toolbar_zoom_steps_and_reset() {
        let (mut engine, mut controller, _) = setup();
        controller.zoom_in();
        assert!((controller.transform().scale - 1.5).abs() < 1e-6);
        controller.zoom_out();
        controller.zoom_out();
        assert!((controller.transform().scale - 1.0 / 1.5).abs() < 1e-6);

        engine.run_until_settled(10_000);
        controller.reset(&mut engine);
        assert!(controller.transform().is_identity());
        assert_eq!(engine.alpha(), 1.0);
    }

    #[test]
    fn hover_supplies_tooltip_data() {
        let (mut engine, mut controller, _) = setup();
        controller.on_pointer_move(&mut engine, 301.0, 101.0);
        let info = controller.hover_info(&engine).unwrap();
        assert_eq!(info.title, "Bob");
        assert_eq!(info.lines[0], "type: PERSON");
        assert_eq!(info.screen, pos2(300.0, 100.0));

        controller.on_pointer_move(&mut engine, 10.0, 10.0);
        assert!(controller.hover_info(&engine).is_none());
    }

    #[test]
    fn double_click_is_separate_from_click() {
        let (engine, mut controller, log) = setup();
        controller.on_double_click(&engine, 300.0, 100.0);
        assert_eq!(*log.lock().unwrap(), vec!["dblclick b"]);
        assert_eq!(controller.selection().selected, None);
    }

    #[test]
    fn stale_selection_is_dropped_after_reload() {
        let (mut engine, mut controller, log) = setup();
        controller.select(&engine, &NodeId::from("a"));
        engine
            .load(GraphSnapshot::new(
                vec![NodeRecord::new("b", "Bob", NodeType::Person)],
                Vec::new(),
            ))
            .unwrap();
        controller.sync_with_graph(&mut engine);
        assert_eq!(controller.selection().selected, None);
        assert_eq!(log.lock().unwrap().last().unwrap(), "cleared");
    }
}
