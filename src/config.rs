use std::path::Path;

use anyhow::{Context, Result};
use emath::vec2;
use serde::{Deserialize, Serialize};

use crate::physics::{EnabledForces, ForceParams};

/// Default alpha decay: reaches `alpha_min` from 1 in about 300 ticks.
pub fn default_alpha_decay(alpha_min: f32) -> f32 {
    1.0 - alpha_min.powf(1.0 / 300.0)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub alpha_min: f32,
    pub alpha_decay: f32,
    pub velocity_decay: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            alpha_min,
            alpha_decay: default_alpha_decay(alpha_min),
            velocity_decay: 0.4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    pub zoom_scale_range: [f32; 2],
    pub zoom_step: f32,
    pub drag_alpha_target: f32,
    /// Screen-space movement below which a press/release pair is a click.
    pub click_tolerance: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            zoom_scale_range: [0.1, 10.0],
            zoom_step: 1.5,
            drag_alpha_target: 0.3,
            click_tolerance: 3.0,
        }
    }
}

/// Everything tunable about a layout session. Every field is optional in
/// the JSON form and falls back to the defaults.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    pub forces: ForceParams,
    pub enabled: EnabledForces,
    pub simulation: SimulationConfig,
    pub interaction: InteractionConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::with_viewport(960.0, 600.0)
    }
}

impl LayoutConfig {
    /// Defaults for a viewport of the given size, centred on its midpoint.
    pub fn with_viewport(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            forces: ForceParams {
                center: vec2(width * 0.5, height * 0.5),
                ..ForceParams::default()
            },
            enabled: EnabledForces::default(),
            simulation: SimulationConfig::default(),
            interaction: InteractionConfig::default(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).context("invalid layout config JSON")?;
        Ok(config.normalized())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Clamps out-of-range values back into their domains.
    pub fn normalized(mut self) -> Self {
        let defaults = SimulationConfig::default();
        if !(self.simulation.velocity_decay > 0.0 && self.simulation.velocity_decay < 1.0) {
            self.simulation.velocity_decay = defaults.velocity_decay;
        }
        if !(self.simulation.alpha_min > 0.0 && self.simulation.alpha_min < 1.0) {
            self.simulation.alpha_min = defaults.alpha_min;
        }
        self.simulation.alpha_decay = self.simulation.alpha_decay.clamp(0.0, 1.0);

        let [min_scale, max_scale] = self.interaction.zoom_scale_range;
        if !(min_scale > 0.0 && min_scale <= max_scale) {
            self.interaction.zoom_scale_range = InteractionConfig::default().zoom_scale_range;
        }
        if !(self.interaction.zoom_step > 1.0) {
            self.interaction.zoom_step = InteractionConfig::default().zoom_step;
        }
        self.interaction.drag_alpha_target = self.interaction.drag_alpha_target.clamp(0.0, 1.0);
        self.forces.barnes_hut_theta = self.forces.barnes_hut_theta.max(0.0);
        self.forces.collision_margin = self.forces.collision_margin.max(0.0);
        self
    }
}
