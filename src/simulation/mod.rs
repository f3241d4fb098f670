//! The cooling integration loop.
//!
//! [`SimulationEngine`] owns every node and edge. Callers read through
//! [`SimulationEngine::nodes`] and only write through the pin, parameter and
//! alpha controls, so a tick always sees a consistent graph.

mod driver;

use emath::{Vec2, vec2};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::{LayoutConfig, SimulationConfig};
use crate::error::{LayoutError, LayoutResult};
use crate::graph::{GraphArena, GraphSnapshot, NodeId, SimEdge, SimNode};
use crate::physics::{ForceKind, ForceModel, ForceParameter, SpatialIndex};

pub use driver::SimulationDriver;

/// Alpha the layout is raised to when a parameter changes.
const PARAMETER_REHEAT_ALPHA: f32 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationPhase {
    /// No graph loaded.
    Idle,
    Running,
    /// Alpha fell below the threshold, or `stop` was called. State is kept.
    Settled,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SimulationState {
    pub alpha: f32,
    pub alpha_min: f32,
    pub alpha_decay: f32,
    /// Alpha decays toward this instead of zero while set. Held during drags.
    pub alpha_target: f32,
    pub velocity_decay: f32,
    pub phase: SimulationPhase,
}

impl SimulationState {
    fn new(config: SimulationConfig) -> Self {
        Self {
            alpha: 1.0,
            alpha_min: config.alpha_min,
            alpha_decay: config.alpha_decay,
            alpha_target: 0.0,
            velocity_decay: config.velocity_decay,
            phase: SimulationPhase::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == SimulationPhase::Running
    }
}

/// What the tick listener learns about each step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickInfo {
    pub tick: u64,
    pub alpha: f32,
    pub phase: SimulationPhase,
}

pub type TickListener = Box<dyn FnMut(TickInfo, &[SimNode]) + Send>;

pub struct SimulationEngine {
    graph: Option<GraphArena>,
    forces: ForceModel,
    state: SimulationState,
    tick_count: u64,
    listener: Option<TickListener>,
    accelerations: Vec<Vec2>,
    positions: Vec<Vec2>,
}

impl SimulationEngine {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            graph: None,
            forces: ForceModel::new(config.forces, config.enabled),
            state: SimulationState::new(config.simulation),
            tick_count: 0,
            listener: None,
            accelerations: Vec::new(),
            positions: Vec::new(),
        }
    }

    /// Replaces the whole graph. Validation happens before anything is
    /// swapped in, so a rejected snapshot leaves the current graph running.
    pub fn load(&mut self, snapshot: GraphSnapshot) -> LayoutResult<()> {
        let node_count = snapshot.nodes.len();
        let edge_count = snapshot.edges.len();
        let arena = match GraphArena::build(snapshot, self.graph.as_ref(), self.forces.params.center)
        {
            Ok(arena) => arena,
            Err(error) => {
                warn!(%error, "rejected graph snapshot");
                return Err(error);
            }
        };

        self.graph = Some(arena);
        self.state.alpha = 1.0;
        self.state.alpha_target = 0.0;
        self.state.phase = SimulationPhase::Running;
        self.tick_count = 0;
        info!(nodes = node_count, edges = edge_count, "loaded graph snapshot");
        Ok(())
    }

    /// Advances one step. Returns `false` when nothing was simulated because
    /// the engine is idle or settled.
    pub fn tick(&mut self) -> bool {
        if !self.state.is_running() {
            return false;
        }
        let Some(graph) = self.graph.as_mut() else {
            self.state.phase = SimulationPhase::Idle;
            return false;
        };

        let node_count = graph.nodes.len();
        let alpha = self.state.alpha;

        self.positions.clear();
        self.positions
            .extend(graph.nodes.iter().map(|node| node.position));
        let index = SpatialIndex::build(&self.positions);

        self.accelerations.clear();
        self.accelerations.resize(node_count, Vec2::ZERO);
        self.forces.accumulate(
            &graph.nodes,
            &graph.edges,
            &graph.degree,
            &index,
            &self.positions,
            alpha,
            &mut self.accelerations,
        );

        let retained = 1.0 - self.state.velocity_decay;
        for (node, acceleration) in graph.nodes.iter_mut().zip(&self.accelerations) {
            match node.fx {
                Some(fx) => {
                    node.position.x = fx;
                    node.velocity.x = 0.0;
                }
                None => {
                    node.velocity.x = (node.velocity.x + acceleration.x) * retained;
                    node.position.x += node.velocity.x;
                }
            }
            match node.fy {
                Some(fy) => {
                    node.position.y = fy;
                    node.velocity.y = 0.0;
                }
                None => {
                    node.velocity.y = (node.velocity.y + acceleration.y) * retained;
                    node.position.y += node.velocity.y;
                }
            }
        }

        self.forces.relax_collisions(&mut graph.nodes);

        self.state.alpha += (self.state.alpha_target - self.state.alpha) * self.state.alpha_decay;
        self.state.alpha = self.state.alpha.clamp(0.0, 1.0);
        self.tick_count += 1;
        if self.state.alpha < self.state.alpha_min {
            self.state.phase = SimulationPhase::Settled;
            debug!(ticks = self.tick_count, "simulation settled");
        }
        trace!(tick = self.tick_count, alpha = self.state.alpha, "tick");

        if let Some(listener) = self.listener.as_mut() {
            listener(
                TickInfo {
                    tick: self.tick_count,
                    alpha: self.state.alpha,
                    phase: self.state.phase,
                },
                &graph.nodes,
            );
        }
        true
    }

    /// Ticks until settled or until `max_ticks` steps ran. Returns the number
    /// of steps taken.
    pub fn run_until_settled(&mut self, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while ticks < max_ticks && self.tick() {
            ticks += 1;
        }
        ticks
    }

    /// Fixes a node at `(x, y)` until [`unpin`](Self::unpin). Unknown ids and
    /// non-finite coordinates are ignored and return `false`.
    pub fn pin(&mut self, id: &NodeId, x: f32, y: f32) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.fx = Some(x);
        node.fy = Some(y);
        node.position = vec2(x, y);
        node.velocity = Vec2::ZERO;
        true
    }

    pub fn unpin(&mut self, id: &NodeId) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.fx = None;
        node.fy = None;
        true
    }

    pub fn set_force_parameter(&mut self, parameter: ForceParameter, value: f32) -> LayoutResult<()> {
        if !parameter.accepts(value) {
            return Err(LayoutError::InvalidParameter {
                name: parameter.name(),
                value,
            });
        }

        let params = &mut self.forces.params;
        match parameter {
            ForceParameter::LinkDistance => params.link_distance = value,
            ForceParameter::ChargeStrength => params.charge_strength = value,
            ForceParameter::CenterX => params.center.x = value,
            ForceParameter::CenterY => params.center.y = value,
            ForceParameter::CenterStrength => params.center_strength = value,
            ForceParameter::CollisionMargin => params.collision_margin = value,
            ForceParameter::BarnesHutTheta => params.barnes_hut_theta = value,
            ForceParameter::AlphaDecay => self.state.alpha_decay = value,
            ForceParameter::VelocityDecay => self.state.velocity_decay = value,
        }
        debug!(parameter = parameter.name(), value, "force parameter changed");
        self.reheat(self.state.alpha.max(PARAMETER_REHEAT_ALPHA));
        Ok(())
    }

    pub fn set_force_enabled(&mut self, kind: ForceKind, enabled: bool) {
        if self.forces.enabled.get(kind) == enabled {
            return;
        }
        self.forces.enabled.set(kind, enabled);
        debug!(force = kind.label(), enabled, "force toggled");
        self.reheat(self.state.alpha.max(PARAMETER_REHEAT_ALPHA));
    }

    /// Sets alpha directly and resumes ticking.
    pub fn reheat(&mut self, alpha: f32) {
        if self.graph.is_none() {
            return;
        }
        self.state.alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.state.phase = SimulationPhase::Running;
        debug!(alpha = self.state.alpha, "simulation reheated");
    }

    /// Holds alpha near `target` (e.g. while dragging). `None` releases the
    /// hold and lets alpha decay to zero again.
    pub fn set_alpha_target(&mut self, target: Option<f32>) {
        self.state.alpha_target = target
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        if self.state.alpha_target > 0.0 && self.graph.is_some() {
            self.state.phase = SimulationPhase::Running;
        }
    }

    /// Resumes ticking without touching alpha.
    pub fn start(&mut self) {
        if self.graph.is_some() {
            self.state.phase = SimulationPhase::Running;
        }
    }

    /// Pauses ticking. Node state is kept and `start`/`reheat` resume.
    pub fn stop(&mut self) {
        if self.state.phase == SimulationPhase::Running {
            self.state.phase = SimulationPhase::Settled;
        }
    }

    /// Drops the graph and the tick listener.
    pub fn dispose(&mut self) {
        self.graph = None;
        self.listener = None;
        self.state.phase = SimulationPhase::Idle;
        self.accelerations = Vec::new();
        self.positions = Vec::new();
    }

    pub fn set_tick_listener(&mut self, listener: TickListener) {
        self.listener = Some(listener);
    }

    pub fn clear_tick_listener(&mut self) {
        self.listener = None;
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn phase(&self) -> SimulationPhase {
        self.state.phase
    }

    pub fn alpha(&self) -> f32 {
        self.state.alpha
    }

    pub fn ticks(&self) -> u64 {
        self.tick_count
    }

    pub fn forces(&self) -> &ForceModel {
        &self.forces
    }

    pub fn nodes(&self) -> &[SimNode] {
        self.graph
            .as_ref()
            .map(|graph| graph.nodes.as_slice())
            .unwrap_or(&[])
    }

    pub fn edges(&self) -> &[SimEdge] {
        self.graph
            .as_ref()
            .map(|graph| graph.edges.as_slice())
            .unwrap_or(&[])
    }

    pub fn node(&self, id: &NodeId) -> Option<&SimNode> {
        let graph = self.graph.as_ref()?;
        graph.index_of(id).map(|index| &graph.nodes[index])
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    fn node_mut(&mut self, id: &NodeId) -> Option<&mut SimNode> {
        let graph = self.graph.as_mut()?;
        let index = graph.index_of(id)?;
        graph.nodes.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::graph::{EdgeRecord, NodeRecord, NodeType};

    fn triangle() -> GraphSnapshot {
        GraphSnapshot::new(
            vec![
                NodeRecord::new("a", "Alice", NodeType::Person),
                NodeRecord::new("b", "Bob", NodeType::Person),
                NodeRecord::new("c", "Acme", NodeType::Org),
            ],
            vec![
                EdgeRecord::new("a", "b", "knows"),
                EdgeRecord::new("b", "c", "works_for"),
                EdgeRecord::new("c", "a", "employs"),
            ],
        )
    }

    fn engine() -> SimulationEngine {
        SimulationEngine::new(&LayoutConfig::default())
    }

    #[test]
    fn starts_idle_and_ignores_ticks() {
        let mut engine = engine();
        assert_eq!(engine.phase(), SimulationPhase::Idle);
        assert!(!engine.tick());
        engine.reheat(1.0);
        assert_eq!(engine.phase(), SimulationPhase::Idle);
        assert!(engine.nodes().is_empty());
    }

    #[test]
    fn load_starts_running_at_full_alpha() {
        let mut engine = engine();
        engine.load(triangle()).unwrap();
        assert_eq!(engine.phase(), SimulationPhase::Running);
        assert_eq!(engine.alpha(), 1.0);
        assert_eq!(engine.nodes().len(), 3);
        assert_eq!(engine.edges().len(), 3);
    }

    #[test]
    fn alpha_decays_until_settled() {
        let mut engine = engine();
        engine.load(triangle()).unwrap();
        let ticks = engine.run_until_settled(10_000);
        assert!(ticks > 250 && ticks < 350, "settled after {ticks} ticks");
        assert_eq!(engine.phase(), SimulationPhase::Settled);
        assert!(engine.alpha() < engine.state().alpha_min);
        assert!(!engine.tick());
    }

    #[test]
    fn stop_pauses_and_start_resumes() {
        let mut engine = engine();
        engine.load(triangle()).unwrap();
        engine.tick();
        let alpha = engine.alpha();
        engine.stop();
        assert_eq!(engine.phase(), SimulationPhase::Settled);
        assert!(!engine.tick());
        assert_eq!(engine.alpha(), alpha);

        engine.start();
        assert!(engine.tick());
    }

    #[test]
    fn parameter_changes_apply_and_reheat() {
        let mut engine = engine();
        engine.load(triangle()).unwrap();
        engine.run_until_settled(10_000);

        engine
            .set_force_parameter(ForceParameter::LinkDistance, 150.0)
            .unwrap();
        assert_eq!(engine.forces().params.link_distance, 150.0);
        assert_eq!(engine.phase(), SimulationPhase::Running);
        assert!((engine.alpha() - PARAMETER_REHEAT_ALPHA).abs() < 1e-6);

        let error = engine
            .set_force_parameter(ForceParameter::VelocityDecay, 1.2)
            .unwrap_err();
        assert!(matches!(error, LayoutError::InvalidParameter { .. }));
        assert_eq!(engine.state().velocity_decay, 0.4);
    }

    #[test]
    fn alpha_target_holds_alpha_up() {
        let mut engine = engine();
        engine.load(triangle()).unwrap();
        engine.set_alpha_target(Some(0.3));
        for _ in 0..2_000 {
            engine.tick();
        }
        assert_eq!(engine.phase(), SimulationPhase::Running);
        assert!((engine.alpha() - 0.3).abs() < 0.01);

        engine.set_alpha_target(None);
        engine.run_until_settled(10_000);
        assert_eq!(engine.phase(), SimulationPhase::Settled);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut engine = engine();
        engine.load(triangle()).unwrap();
        let ghost = NodeId::from("ghost");
        assert!(!engine.pin(&ghost, 1.0, 1.0));
        assert!(!engine.unpin(&ghost));
        assert!(engine.node(&ghost).is_none());
    }

    #[test]
    fn non_finite_pins_are_rejected() {
        let mut engine = engine();
        engine.load(triangle()).unwrap();
        let a = NodeId::from("a");
        assert!(!engine.pin(&a, f32::NAN, 0.0));
        assert!(!engine.pin(&a, 0.0, f32::INFINITY));
        assert!(!engine.node(&a).unwrap().is_pinned());

        for _ in 0..5 {
            engine.tick();
        }
        assert!(
            engine
                .nodes()
                .iter()
                .all(|node| node.position.x.is_finite() && node.position.y.is_finite())
        );
    }

    #[test]
    fn listener_sees_every_tick() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut engine = engine();
        engine.set_tick_listener(Box::new(move |info, nodes| {
            sink.lock().unwrap().push((info.tick, nodes.len()));
        }));
        engine.load(triangle()).unwrap();
        engine.tick();
        engine.tick();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3)]);
    }

    #[test]
    fn dispose_returns_to_idle() {
        let mut engine = engine();
        engine.load(triangle()).unwrap();
        engine.dispose();
        assert_eq!(engine.phase(), SimulationPhase::Idle);
        assert!(engine.nodes().is_empty());
        assert!(!engine.tick());
    }

    #[test]
    fn disabled_forces_leave_isolated_nodes_still() {
        let mut config = LayoutConfig::default();
        for kind in ForceKind::ALL {
            config.enabled.set(kind, false);
        }
        let mut engine = SimulationEngine::new(&config);
        engine.load(triangle()).unwrap();
        let before = engine
            .nodes()
            .iter()
            .map(|node| node.position)
            .collect::<Vec<_>>();
        engine.run_until_settled(50);
        let after = engine
            .nodes()
            .iter()
            .map(|node| node.position)
            .collect::<Vec<_>>();
        assert_eq!(before, after);
    }
}
