//! Per-instance transform: position, rotation and scale.
//!
//! # Example
//!
//! ```
//! use ringframe_scene::Transform;
//! use glam::{Quat, Vec3};
//!
//! let t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
//!     .with_rotation(Quat::from_rotation_y(0.5))
//!     .with_scale(Vec3::splat(2.0));
//!
//! let model = t.model_matrix();
//! assert!((model.w_axis.truncate() - t.position).length() < 1e-6);
//! ```

use glam::{Mat4, Quat, Vec3};

/// Position, rotation and scale of one instance.
///
/// The model matrix is `T * R * S`: scale first, then rotate, then translate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Object-to-world matrix.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Largest absolute scale component, used to scale bounding radii.
    pub fn max_scale(&self) -> f32 {
        self.scale.abs().max_element()
    }

    /// Applies the transform to a point.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.model_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_model_matrix_columns_match_scale_and_position() {
        let t = Transform::from_position(Vec3::new(4.0, -2.0, 7.0))
            .with_rotation(Quat::from_euler(glam::EulerRot::XYZ, 0.3, 1.1, -0.7))
            .with_scale(Vec3::new(2.0, 0.5, 3.0));
        let m = t.model_matrix();

        assert!(approx_eq(m.x_axis.truncate().length(), 2.0));
        assert!(approx_eq(m.y_axis.truncate().length(), 0.5));
        assert!(approx_eq(m.z_axis.truncate().length(), 3.0));
        assert!(approx_eq_vec3(m.w_axis.truncate(), t.position));
    }

    #[test]
    fn test_scale_applies_before_rotation() {
        let t = Transform::IDENTITY
            .with_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2))
            .with_scale(Vec3::new(2.0, 1.0, 1.0));
        // X is stretched first, then rotated onto +Y.
        let p = t.model_matrix().transform_point3(Vec3::X);
        assert!(approx_eq_vec3(p, Vec3::new(0.0, 2.0, 0.0)));
        assert!(approx_eq_vec3(t.transform_point(Vec3::X), p));
    }

    #[test]
    fn test_max_scale_uses_magnitude() {
        let t = Transform::IDENTITY.with_scale(Vec3::new(1.0, -4.0, 2.0));
        assert!(approx_eq(t.max_scale(), 4.0));
    }
}
