use std::f32::consts::{PI, TAU};

use emath::{Vec2, vec2};

const INITIAL_RADIUS: f32 = 10.0;

/// Initial placement on a phyllotaxis spiral around `center`. Deterministic
/// and free of coincident points, so the first tick never starts degenerate.
pub(crate) fn seed_position(index: usize, center: Vec2) -> Vec2 {
    let golden_angle = PI * (3.0 - 5.0_f32.sqrt());
    let radius = INITIAL_RADIUS * (0.5 + index as f32).sqrt();
    let angle = index as f32 * golden_angle;
    center + vec2(angle.cos(), angle.sin()) * radius
}

/// Direction from `from` toward `to` used when two bodies sit on top of each
/// other. Swapping the pair flips the sign, so the two are pushed apart.
pub(crate) fn fallback_direction(from: usize, to: usize) -> Vec2 {
    let (low, high) = (from.min(to), from.max(to));
    let angle = ((low as f32) * 0.618_034 + (high as f32) * 0.414_214) * TAU;
    let direction = vec2(angle.cos(), angle.sin());
    if from > to { -direction } else { direction }
}
