//! Free-flying first-person camera.
//!
//! Orientation is yaw/pitch in degrees. Yaw 0 looks down +X and grows
//! towards +Z; pitch is clamped to ±[`PITCH_LIMIT`] so the view never flips
//! over the pole.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use vista_scene::{FpsCamera, MoveInput, Projection};
//!
//! let mut camera = FpsCamera::new(Vec3::ZERO, 0.0, 0.0, Projection::default());
//! camera.process_mouse(0.0, -5000.0, 0.1);
//! assert_eq!(camera.pitch(), 89.0);
//!
//! camera.translate(MoveInput { forward: 1.0, ..Default::default() }, 1.0, 1.0);
//! ```

use glam::{Mat4, Vec3};

/// Pitch limit in degrees.
pub const PITCH_LIMIT: f32 = 89.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y: 103.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    /// Right-handed perspective with Y flipped for Vulkan clip space.
    pub fn matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }
}

/// Movement axes for one update, each in -1..=1.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MoveInput {
    /// Along the view direction.
    pub forward: f32,
    /// Along the camera's right vector.
    pub strafe: f32,
    /// Along world up.
    pub vertical: f32,
}

#[derive(Clone, Debug)]
pub struct FpsCamera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    front: Vec3,
    right: Vec3,
    projection: Projection,
}

impl FpsCamera {
    pub fn new(position: Vec3, yaw: f32, pitch: f32, projection: Projection) -> Self {
        let mut camera = Self {
            position,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            front: Vec3::X,
            right: Vec3::Z,
            projection,
        };
        camera.update_vectors();
        camera
    }

    /// Applies a mouse delta: x right, y down, in pixels.
    ///
    /// Moving the mouse up raises the pitch.
    pub fn process_mouse(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.yaw += dx * sensitivity;
        self.pitch = (self.pitch - dy * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    /// Moves by `speed * dt` along each active axis. Vertical movement uses
    /// world up, not the camera's up.
    pub fn translate(&mut self, input: MoveInput, speed: f32, dt: f32) {
        let step = speed * dt;
        self.position += self.front * input.forward * step;
        self.position += self.right * input.strafe * step;
        self.position.y += input.vertical * step;
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        let front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos());
        self.front = front.normalize();
        self.right = self.front.cross(Vec3::Y).normalize();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.projection.aspect = aspect;
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn front(&self) -> Vec3 {
        self.front
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.right
    }

    #[inline]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    #[inline]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    fn camera() -> FpsCamera {
        FpsCamera::new(Vec3::ZERO, 0.0, 0.0, Projection::default())
    }

    #[test]
    fn test_yaw_zero_looks_down_x() {
        let camera = camera();
        assert!(approx_eq_vec3(camera.front(), Vec3::X));
        assert!(approx_eq_vec3(camera.right(), Vec3::Z));
    }

    #[test]
    fn test_pitch_clamps_at_upper_limit() {
        let mut camera = camera();
        for _ in 0..1000 {
            camera.process_mouse(0.0, -10.0, 0.1);
            assert!(camera.pitch() <= PITCH_LIMIT);
        }
        assert_eq!(camera.pitch(), 89.0);
    }

    #[test]
    fn test_pitch_clamps_at_lower_limit() {
        let mut camera = camera();
        for _ in 0..1000 {
            camera.process_mouse(3.0, 10.0, 0.1);
            assert!(camera.pitch() >= -PITCH_LIMIT);
        }
        assert_eq!(camera.pitch(), -89.0);
    }

    #[test]
    fn test_initial_pitch_clamped() {
        let camera = FpsCamera::new(Vec3::ZERO, 0.0, 120.0, Projection::default());
        assert_eq!(camera.pitch(), 89.0);
    }

    #[test]
    fn test_mouse_up_looks_up() {
        let mut camera = camera();
        camera.process_mouse(0.0, -100.0, 0.1);
        assert!(camera.front().y > 0.0);
    }

    #[test]
    fn test_translate_forward_and_vertical() {
        let mut camera = camera();
        camera.translate(
            MoveInput {
                forward: 1.0,
                vertical: 1.0,
                ..Default::default()
            },
            0.05,
            2.0,
        );
        assert!(approx_eq_vec3(camera.position(), Vec3::new(0.1, 0.1, 0.0)));
    }

    #[test]
    fn test_projection_flips_y() {
        let proj = Projection::default().matrix();
        assert!(proj.y_axis.y < 0.0);
    }

    #[test]
    fn test_set_aspect_rejects_degenerate() {
        let mut camera = camera();
        camera.set_aspect(0.0);
        assert_eq!(camera.projection().aspect, 16.0 / 9.0);
        camera.set_aspect(2.0);
        assert_eq!(camera.projection().aspect, 2.0);
    }
}
