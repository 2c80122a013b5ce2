//! Bounding spheres.

use glam::{Vec3, Vec4};

use crate::transform::Transform;

/// Sphere enclosing a mesh, in mesh-local or world space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere centered on the average of `points`, just large enough to
    /// contain all of them. `None` for an empty slice.
    pub fn from_points(points: impl IntoIterator<Item = Vec3> + Clone) -> Option<Self> {
        let (sum, count) = points
            .clone()
            .into_iter()
            .fold((Vec3::ZERO, 0u32), |(sum, n), p| (sum + p, n + 1));
        if count == 0 {
            return None;
        }
        let center = sum / count as f32;
        let radius = points
            .into_iter()
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        Some(Self { center, radius })
    }

    /// World-space sphere for an instance placed with `transform`.
    ///
    /// The radius is scaled by the largest scale component, so the result
    /// stays conservative under non-uniform scale.
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            center: transform.transform_point(self.center),
            radius: self.radius * transform.max_scale(),
        }
    }

    /// `(center, radius)` packed as the GPU expects it.
    pub fn to_vec4(&self) -> Vec4 {
        self.center.extend(self.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_from_points_encloses_all() {
        let points = [
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(-1.0, 1.0, -1.0),
        ];
        let sphere = BoundingSphere::from_points(points.iter().copied()).unwrap();
        assert!(approx_eq(sphere.center.length(), 0.0));
        assert!(approx_eq(sphere.radius, 3.0f32.sqrt()));
        for p in points {
            assert!(p.distance(sphere.center) <= sphere.radius + EPSILON);
        }
    }

    #[test]
    fn test_from_points_empty() {
        assert!(BoundingSphere::from_points(std::iter::empty::<Vec3>()).is_none());
    }

    #[test]
    fn test_transformed_moves_and_scales() {
        let local = BoundingSphere::new(Vec3::new(1.0, 0.0, 0.0), 2.0);
        let transform = Transform::from_position(Vec3::new(0.0, 5.0, 0.0))
            .with_rotation(Quat::from_rotation_y(std::f32::consts::PI))
            .with_scale(Vec3::new(1.0, 3.0, 1.0));

        let world = local.transformed(&transform);
        assert!(approx_eq(world.center.x, -1.0));
        assert!(approx_eq(world.center.y, 5.0));
        assert!(approx_eq(world.center.z, 0.0));
        assert!(approx_eq(world.radius, 6.0));
    }

    #[test]
    fn test_to_vec4() {
        let sphere = BoundingSphere::new(Vec3::new(1.0, 2.0, 3.0), 4.0);
        assert_eq!(sphere.to_vec4(), Vec4::new(1.0, 2.0, 3.0, 4.0));
    }
}
