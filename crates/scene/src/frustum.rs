//! View frustum extraction and sphere tests.
//!
//! Planes are pulled out of the view-projection matrix rows (Gribb and
//! Hartmann) for a `[0, 1]` depth range, then normalized so that
//! `dot(plane.xyz, p) + plane.w` is a signed distance.

use glam::{Mat4, Vec3, Vec4};

use crate::bounds::BoundingSphere;

/// Index of each plane in [`Frustum::planes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum FrustumPlane {
    Left = 0,
    Right = 1,
    Bottom = 2,
    Top = 3,
    Near = 4,
    Far = 5,
}

/// Six inward-facing normalized planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);

        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(normalize_plane);
        Self { planes }
    }

    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    pub fn plane(&self, which: FrustumPlane) -> Vec4 {
        self.planes[which as usize]
    }

    /// Visible iff the sphere is not entirely behind any plane. Spheres
    /// touching a plane count as visible.
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        sphere_visible(&self.planes, sphere.center, sphere.radius)
    }
}

/// Plane-versus-sphere test shared with the host culling reference.
#[inline]
pub fn sphere_visible(planes: &[Vec4; 6], center: Vec3, radius: f32) -> bool {
    planes
        .iter()
        .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let len = plane.truncate().length();
    if len > f32::EPSILON { plane / len } else { plane }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    /// Camera at the origin looking down -Z, 90 degree vertical FOV.
    fn test_frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 100.0);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn test_planes_are_normalized() {
        for plane in test_frustum().planes() {
            assert!(approx_eq(plane.truncate().length(), 1.0));
        }
    }

    #[test]
    fn test_near_and_far_distances() {
        let frustum = test_frustum();
        let near = frustum.plane(FrustumPlane::Near);
        let far = frustum.plane(FrustumPlane::Far);

        // A point 10 units ahead is 9 past the near plane and 90 short of far.
        let p = Vec3::new(0.0, 0.0, -10.0);
        assert!(approx_eq(near.truncate().dot(p) + near.w, 9.0));
        assert!(approx_eq(far.truncate().dot(p) + far.w, 90.0));
    }

    #[test]
    fn test_sphere_inside_is_visible() {
        let frustum = test_frustum();
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0)));
    }

    #[test]
    fn test_sphere_behind_camera_is_culled() {
        let frustum = test_frustum();
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0)));
    }

    #[test]
    fn test_sphere_beyond_far_is_culled() {
        let frustum = test_frustum();
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, -200.0), 5.0)));
    }

    #[test]
    fn test_tangent_sphere_is_visible() {
        // Unit box: every plane is one unit from the origin.
        let planes = [
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::new(-1.0, 0.0, 0.0, 1.0),
            Vec4::new(0.0, 1.0, 0.0, 1.0),
            Vec4::new(0.0, -1.0, 0.0, 1.0),
            Vec4::new(0.0, 0.0, 1.0, 1.0),
            Vec4::new(0.0, 0.0, -1.0, 1.0),
        ];
        assert!(sphere_visible(&planes, Vec3::new(3.0, 0.0, 0.0), 2.0));
        assert!(!sphere_visible(&planes, Vec3::new(3.0, 0.0, 0.0), 1.5));
    }

    #[test]
    fn test_sphere_touching_near_plane_from_behind() {
        let frustum = test_frustum();
        // Near plane sits at z = -1; the sphere reaches just past it.
        let touching = BoundingSphere::new(Vec3::new(0.0, 0.0, 1.0), 2.0 + 1e-4);
        assert!(frustum.intersects_sphere(&touching));

        let just_outside = BoundingSphere::new(Vec3::new(0.0, 0.0, 1.0), 1.99);
        assert!(!frustum.intersects_sphere(&just_outside));
    }

    #[test]
    fn test_sphere_left_of_frustum_is_culled() {
        let frustum = test_frustum();
        // At depth 10 the half-width is 10; x = -20 with radius 1 is outside.
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(-20.0, 0.0, -10.0), 1.0)));
        // Straddling the left plane still counts.
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(-10.5, 0.0, -10.0), 1.0)));
    }
}
