//! Orbit camera.

use glam::{Mat4, Vec3};

/// Radians of yaw/pitch per orbit input step.
const ORBIT_SPEED: f32 = 0.01;
/// World units of radius change per zoom input step.
const ZOOM_SPEED: f32 = 0.2;
/// World units of target movement per pan input step.
const PAN_SPEED: f32 = 0.1;

/// Pitch stays just short of the poles to keep the view basis stable.
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
const MIN_RADIUS: f32 = 1.0;
const MAX_RADIUS: f32 = 50.0;

/// A camera that orbits a target point.
///
/// State is yaw, pitch, orbit radius, and the target; the eye position is
/// derived. All angles are radians.
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    yaw: f32,
    pitch: f32,
    radius: f32,
    target: Vec3,
    fov_y: f32,
    near: f32,
    far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            radius: 5.0,
            target: Vec3::ZERO,
            fov_y: 45.0_f32.to_radians(),
            near: 0.1,
            far: 100.0,
        }
    }
}

impl OrbitCamera {
    /// Creates a camera at the default orbit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotates around the target. Pitch is clamped short of the poles.
    pub fn orbit(&mut self, yaw_steps: f32, pitch_steps: f32) {
        self.yaw += yaw_steps * ORBIT_SPEED;
        self.pitch = (self.pitch + pitch_steps * ORBIT_SPEED).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Moves toward or away from the target, clamped to the radius range.
    pub fn zoom(&mut self, steps: f32) {
        self.radius = (self.radius - steps * ZOOM_SPEED).clamp(MIN_RADIUS, MAX_RADIUS);
    }

    /// Moves the target in the camera's right/up plane.
    pub fn pan(&mut self, right_steps: f32, up_steps: f32) {
        let eye = self.position();
        let forward = (self.target - eye).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);

        self.target += right * right_steps * PAN_SPEED + up * up_steps * PAN_SPEED;
    }

    /// Returns the derived eye position.
    pub fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();

        self.target
            + Vec3::new(
                self.radius * cos_pitch * sin_yaw,
                self.radius * sin_pitch,
                self.radius * cos_pitch * cos_yaw,
            )
    }

    /// Returns the orbit target.
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Returns the orbit radius.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Right-handed look-at from the derived position to the target.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Perspective projection with the Vulkan Y-flip applied.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    /// Projection times view, the matrix pushed to shaders each frame.
    pub fn view_projection_matrix(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn default_position_is_behind_target() {
        let camera = OrbitCamera::new();
        assert!(approx(camera.position(), Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn pitch_clamps_short_of_poles() {
        let mut camera = OrbitCamera::new();
        camera.orbit(0.0, 1_000_000.0);
        assert!(camera.pitch <= PITCH_LIMIT);

        camera.orbit(0.0, -2_000_000.0);
        assert!(camera.pitch >= -PITCH_LIMIT);
    }

    #[test]
    fn zoom_clamps_radius_range() {
        let mut camera = OrbitCamera::new();
        camera.zoom(1_000.0);
        assert_eq!(camera.radius(), MIN_RADIUS);

        camera.zoom(-10_000.0);
        assert_eq!(camera.radius(), MAX_RADIUS);
    }

    #[test]
    fn pan_moves_target() {
        let mut camera = OrbitCamera::new();
        let before = camera.target();
        camera.pan(1.0, 0.0);
        assert!(!approx(camera.target(), before));
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let camera = OrbitCamera::new();
        let proj = camera.projection_matrix(16.0 / 9.0);
        assert!(proj.y_axis.y < 0.0);
    }

    #[test]
    fn view_projection_composes_projection_and_view() {
        // Default orbit: radius 5, yaw 0, pitch 0. With an identity model
        // matrix the full MVP is projection * view.
        let camera = OrbitCamera::new();
        let aspect = 16.0 / 9.0;

        let expected = camera.projection_matrix(aspect) * camera.view_matrix() * Mat4::IDENTITY;
        let got = camera.view_projection_matrix(aspect);
        assert!(got.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn view_matrix_moves_world_origin_to_minus_radius() {
        let camera = OrbitCamera::new();
        let view = camera.view_matrix();
        let origin = view.transform_point3(Vec3::ZERO);
        // Target sits radius units down the view -Z axis.
        assert!(approx(origin, Vec3::new(0.0, 0.0, -5.0)));
    }
}
