use emath::{Pos2, Vec2, pos2};
use serde::Serialize;

/// Scale-then-translate view transform: `screen = world * scale + translation`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ViewTransform {
    pub scale: f32,
    pub translation: Vec2,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        translation: Vec2::ZERO,
    };

    pub fn world_to_screen(&self, world: Vec2) -> Pos2 {
        (world * self.scale + self.translation).to_pos2()
    }

    pub fn screen_to_world(&self, screen: Pos2) -> Vec2 {
        (screen.to_vec2() - self.translation) / self.scale
    }

    /// Rescales by `factor` while keeping the world point under `anchor`
    /// fixed on screen. The resulting scale is clamped to `[min, max]`.
    pub(crate) fn zoom_about(&mut self, anchor: Pos2, factor: f32, min: f32, max: f32) {
        let world_before = self.screen_to_world(anchor);
        self.scale = (self.scale * factor).clamp(min, max);
        self.translation = anchor.to_vec2() - world_before * self.scale;
    }

    pub(crate) fn pan_by(&mut self, delta: Vec2) {
        self.translation += delta;
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

pub(crate) fn viewport_center(width: f32, height: f32) -> Pos2 {
    pos2(width * 0.5, height * 0.5)
}
