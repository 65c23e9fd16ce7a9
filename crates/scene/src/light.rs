//! Scene lighting.

use glam::{Vec3, Vec4};

/// A point light. Only the position reaches the shaders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
}

impl PointLight {
    pub fn new(position: Vec3) -> Self {
        Self { position }
    }

    /// Moves the light to `position`, typically the camera's.
    pub fn place_at(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Position as the `vec4` the uniform block expects (w = 0).
    pub fn shader_position(&self) -> Vec4 {
        self.position.extend(0.0)
    }
}
