//! Perspective camera and an orbit controller.

use glam::{Mat4, Quat, Vec3};

use crate::frustum::Frustum;

/// Perspective camera. The projection maps depth to `[0, 1]` and flips Y
/// for Vulkan clip space.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Quat::IDENTITY,
            fov_y: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 500.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.fov_y = fov_y;
        self.aspect = aspect;
        self.near = near;
        self.far = far;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Culling frustum for the current view.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection_matrix())
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Points the camera at `target`, keeping world up as +Y.
    pub fn look_at(&mut self, target: Vec3) {
        let view = Mat4::look_at_rh(self.position, target, Vec3::Y);
        self.rotation = Quat::from_mat4(&view.inverse());
    }
}

/// Circles a target point at a fixed distance.
#[derive(Clone, Debug)]
pub struct OrbitController {
    pub target: Vec3,
    pub distance: f32,
    /// Radians around +Y.
    pub yaw: f32,
    /// Radians above the horizon, clamped short of the poles.
    pub pitch: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl OrbitController {
    const PITCH_LIMIT: f32 = 1.5;

    pub fn new(target: Vec3, distance: f32) -> Self {
        Self {
            target,
            distance,
            yaw: 0.0,
            pitch: 0.3,
            min_distance: 1.0,
            max_distance: 400.0,
        }
    }

    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw = (self.yaw + delta_yaw).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + delta_pitch).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    /// Positive `amount` moves closer.
    pub fn zoom(&mut self, amount: f32) {
        self.distance = (self.distance * (1.0 - amount * 0.1)).clamp(self.min_distance, self.max_distance);
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target + Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance
    }

    pub fn apply(&self, camera: &mut Camera) {
        camera.position = self.eye();
        camera.look_at(self.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundingSphere;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    #[test]
    fn test_look_at_sets_forward() {
        let mut camera = Camera::new();
        camera.position = Vec3::new(3.0, 0.0, 0.0);
        camera.look_at(Vec3::ZERO);
        assert!(approx_eq_vec3(camera.forward(), Vec3::NEG_X));
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::new();
        let up = camera.view_projection_matrix() * Vec3::new(0.0, 1.0, 0.0).extend(1.0);
        assert!(up.y / up.w < 0.0);
    }

    #[test]
    fn test_orbit_faces_target() {
        let mut orbit = OrbitController::new(Vec3::new(1.0, 2.0, 3.0), 10.0);
        orbit.rotate(0.7, 0.2);
        let mut camera = Camera::new();
        orbit.apply(&mut camera);

        assert!(((camera.position - orbit.target).length() - 10.0).abs() < 1e-4);
        let expected = (orbit.target - camera.position).normalize();
        assert!(approx_eq_vec3(camera.forward(), expected));
    }

    #[test]
    fn test_orbit_clamps() {
        let mut orbit = OrbitController::new(Vec3::ZERO, 5.0);
        orbit.rotate(0.0, 10.0);
        assert_eq!(orbit.pitch, OrbitController::PITCH_LIMIT);
        orbit.zoom(100.0);
        assert_eq!(orbit.distance, orbit.min_distance);
    }

    #[test]
    fn test_frustum_sees_target() {
        let mut orbit = OrbitController::new(Vec3::ZERO, 20.0);
        orbit.rotate(1.0, 0.0);
        let mut camera = Camera::new();
        orbit.apply(&mut camera);

        let frustum = camera.frustum();
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::ZERO, 1.0)));
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(camera.position * 2.0, 1.0)));
    }
}
