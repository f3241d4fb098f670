mod forces;
mod quadtree;

use std::fmt;
use std::str::FromStr;

use emath::{Vec2, vec2};
use serde::{Deserialize, Serialize};

use crate::graph::{SimEdge, SimNode};
use forces::{accumulate_center, accumulate_links, relax_collision_pairs};
pub use quadtree::SpatialIndex;

/// The four force terms. Each can be switched off without affecting the
/// others.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForceKind {
    Link,
    Charge,
    Center,
    Collision,
}

impl ForceKind {
    pub const ALL: [ForceKind; 4] = [Self::Link, Self::Charge, Self::Center, Self::Collision];

    pub fn label(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Charge => "charge",
            Self::Center => "center",
            Self::Collision => "collision",
        }
    }
}

impl fmt::Display for ForceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ForceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown force \"{value}\""))
    }
}

/// Tunable parameters addressable by name at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForceParameter {
    LinkDistance,
    ChargeStrength,
    CenterX,
    CenterY,
    CenterStrength,
    CollisionMargin,
    BarnesHutTheta,
    AlphaDecay,
    VelocityDecay,
}

impl ForceParameter {
    pub const ALL: [ForceParameter; 9] = [
        Self::LinkDistance,
        Self::ChargeStrength,
        Self::CenterX,
        Self::CenterY,
        Self::CenterStrength,
        Self::CollisionMargin,
        Self::BarnesHutTheta,
        Self::AlphaDecay,
        Self::VelocityDecay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LinkDistance => "linkDistance",
            Self::ChargeStrength => "chargeStrength",
            Self::CenterX => "centerX",
            Self::CenterY => "centerY",
            Self::CenterStrength => "centerStrength",
            Self::CollisionMargin => "collisionMargin",
            Self::BarnesHutTheta => "barnesHutTheta",
            Self::AlphaDecay => "alphaDecay",
            Self::VelocityDecay => "velocityDecay",
        }
    }

    pub(crate) fn accepts(self, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self {
            Self::ChargeStrength | Self::CenterX | Self::CenterY => true,
            Self::LinkDistance | Self::CollisionMargin | Self::BarnesHutTheta => value >= 0.0,
            Self::CenterStrength | Self::AlphaDecay => (0.0..=1.0).contains(&value),
            Self::VelocityDecay => value > 0.0 && value < 1.0,
        }
    }
}

impl fmt::Display for ForceParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ForceParameter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|parameter| parameter.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown force parameter \"{value}\""))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceParams {
    pub link_distance: f32,
    pub charge_strength: f32,
    /// Target of the centering pull. Defaults to the viewport midpoint.
    pub center: Vec2,
    pub center_strength: f32,
    pub collision_margin: f32,
    pub collision_strength: f32,
    pub collision_iterations: usize,
    pub barnes_hut_theta: f32,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            link_distance: 100.0,
            charge_strength: -300.0,
            center: vec2(480.0, 300.0),
            center_strength: 0.1,
            collision_margin: 5.0,
            collision_strength: 1.0,
            collision_iterations: 1,
            barnes_hut_theta: 0.9,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledForces {
    pub link: bool,
    pub charge: bool,
    pub center: bool,
    pub collision: bool,
}

impl Default for EnabledForces {
    fn default() -> Self {
        Self {
            link: true,
            charge: true,
            center: true,
            collision: true,
        }
    }
}

impl EnabledForces {
    pub fn get(&self, kind: ForceKind) -> bool {
        match kind {
            ForceKind::Link => self.link,
            ForceKind::Charge => self.charge,
            ForceKind::Center => self.center,
            ForceKind::Collision => self.collision,
        }
    }

    pub fn set(&mut self, kind: ForceKind, enabled: bool) {
        match kind {
            ForceKind::Link => self.link = enabled,
            ForceKind::Charge => self.charge = enabled,
            ForceKind::Center => self.center = enabled,
            ForceKind::Collision => self.collision = enabled,
        }
    }
}

/// Sums the enabled force terms into per-node accelerations and runs the
/// collision constraint pass.
#[derive(Clone, Debug, Default)]
pub struct ForceModel {
    pub params: ForceParams,
    pub enabled: EnabledForces,
}

impl ForceModel {
    pub fn new(params: ForceParams, enabled: EnabledForces) -> Self {
        Self { params, enabled }
    }

    /// Adds the link, charge and center contributions for this step to
    /// `accelerations`. Pinned nodes still act as charge sources.
    pub(crate) fn accumulate(
        &self,
        nodes: &[SimNode],
        edges: &[SimEdge],
        degree: &[usize],
        index: &SpatialIndex,
        positions: &[Vec2],
        alpha: f32,
        accelerations: &mut [Vec2],
    ) {
        if self.enabled.charge && self.params.charge_strength != 0.0 {
            let strength = self.params.charge_strength * alpha;
            for (node_index, acceleration) in accelerations.iter_mut().enumerate() {
                if nodes[node_index].is_pinned() {
                    continue;
                }
                *acceleration += index.approximate_force_on(
                    node_index,
                    positions,
                    strength,
                    self.params.barnes_hut_theta,
                );
            }
        }

        if self.enabled.link {
            accumulate_links(
                nodes,
                edges,
                degree,
                self.params.link_distance,
                alpha,
                accelerations,
            );
        }

        if self.enabled.center && self.params.center_strength > 0.0 {
            accumulate_center(
                nodes,
                self.params.center,
                self.params.center_strength,
                accelerations,
            );
        }
    }

    /// Pushes overlapping nodes apart. Positions only; velocities are left
    /// alone. Returns the number of pairs corrected.
    pub(crate) fn relax_collisions(&self, nodes: &mut [SimNode]) -> usize {
        if !self.enabled.collision || nodes.len() < 2 {
            return 0;
        }

        let margin = self.params.collision_margin;
        let max_radius = nodes
            .iter()
            .map(|node| node.size + margin)
            .fold(0.0_f32, f32::max);
        let mut resolved = 0;
        for _ in 0..self.params.collision_iterations.max(1) {
            let positions = nodes.iter().map(|node| node.position).collect::<Vec<_>>();
            let index = SpatialIndex::build(&positions);
            let pairs = index.close_pairs(max_radius * 2.0);
            resolved += relax_collision_pairs(nodes, &pairs, margin, self.params.collision_strength);
        }
        resolved
    }
}
