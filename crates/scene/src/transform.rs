//! Node transforms.
//!
//! Scene nodes carry a local translation/rotation/scale. World matrices are
//! built by composing parent and child down the node tree:
//!
//! ```
//! use glam::{Mat4, Vec3};
//! use vista_scene::Transform;
//!
//! let parent = Transform::new().with_position(Vec3::new(1.0, 0.0, 0.0));
//! let child = Transform::new().with_position(Vec3::new(0.0, 1.0, 0.0));
//!
//! let world = parent.local_matrix() * child.local_matrix();
//! assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 1.0, 0.0));
//! ```

use glam::{Mat3, Mat4, Quat, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Decomposes an affine matrix. Shear is lost.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// World matrix of a child given its parent's world matrix.
#[inline]
pub fn compose(parent_world: Mat4, child_local: Mat4) -> Mat4 {
    parent_world * child_local
}

/// Inverse-transpose of the upper 3x3, widened back to a `Mat4`.
///
/// Falls back to identity for singular matrices such as a zero scale.
pub fn normal_matrix(model: Mat4) -> Mat4 {
    const EPSILON: f32 = 1e-6;

    let linear = Mat3::from_mat4(model);
    if linear.determinant().abs() < EPSILON {
        return Mat4::IDENTITY;
    }
    Mat4::from_mat3(linear.inverse().transpose())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.local_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_from_matrix_recovers_trs() {
        let original = Transform::new()
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
            .with_scale(Vec3::splat(2.0));
        let recovered = Transform::from_matrix(original.local_matrix());

        assert!(approx_eq_vec3(recovered.position, original.position));
        assert!(approx_eq_vec3(recovered.scale, original.scale));
        assert!(recovered.rotation.abs_diff_eq(original.rotation, EPSILON));
    }

    #[test]
    fn test_compose_applies_parent_last() {
        let parent = Transform::new()
            .with_scale(Vec3::splat(2.0))
            .local_matrix();
        let child = Transform::new()
            .with_position(Vec3::new(1.0, 0.0, 0.0))
            .local_matrix();

        let world = compose(parent, child);
        assert!(approx_eq_vec3(
            world.transform_point3(Vec3::ZERO),
            Vec3::new(2.0, 0.0, 0.0)
        ));
    }

    #[test]
    fn test_normal_matrix_identity() {
        assert_eq!(normal_matrix(Mat4::IDENTITY), Mat4::IDENTITY);
    }

    #[test]
    fn test_normal_matrix_non_uniform_scale() {
        let model = Transform::new()
            .with_scale(Vec3::new(1.0, 2.0, 1.0))
            .local_matrix();
        let normal = normal_matrix(model);
        assert!(approx_eq_vec3(
            normal.transform_vector3(Vec3::Y),
            Vec3::new(0.0, 0.5, 0.0)
        ));
    }

    #[test]
    fn test_normal_matrix_singular_falls_back() {
        let model = Transform::new().with_scale(Vec3::ZERO).local_matrix();
        assert_eq!(normal_matrix(model), Mat4::IDENTITY);
    }
}
