use crate::config::{OrbitConfig, SurfaceConfig};
use glam::{Mat4, Vec2, Vec3};
use std::f32::consts::{PI, TAU};

const POLAR_EPS: f32 = 1e-6;
const ZOOM_STEP: f32 = 0.95;
const MIN_DISTANCE: f32 = 0.05;
const MAX_DISTANCE: f32 = 1_000.0;

/// Orbit camera around a target point with optional inertia.
///
/// Angles follow the usual spherical convention: `phi` is measured from +Y,
/// `theta` around +Y starting at +Z.
#[derive(Debug, Clone)]
pub struct OrbitController {
    pub target: Vec3,
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
    pub fov_y: f32,
    config: OrbitConfig,
    delta_theta: f32,
    delta_phi: f32,
    pan_offset: Vec3,
    zoom_scale: f32,
}

impl OrbitController {
    pub fn new(surface: &SurfaceConfig, config: OrbitConfig) -> Self {
        let mut camera = Self {
            target: Vec3::ZERO,
            radius: 5.0,
            theta: 0.0,
            phi: PI / 2.0,
            fov_y: surface.fov_deg.to_radians(),
            config,
            delta_theta: 0.0,
            delta_phi: 0.0,
            pan_offset: Vec3::ZERO,
            zoom_scale: 1.0,
        };
        camera.set_position(Vec3::from_array(surface.camera_position));
        camera
    }

    #[cfg(test)]
    pub fn config(&self) -> &OrbitConfig {
        &self.config
    }

    pub fn set_position(&mut self, position: Vec3) {
        let offset = position - self.target;
        self.radius = offset.length().clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.theta = offset.x.atan2(offset.z);
        self.phi = (offset.y / offset.length().max(1e-6)).clamp(-1.0, 1.0).acos();
        self.clamp_phi();
    }

    pub fn position(&self) -> Vec3 {
        let sin_phi = self.phi.sin();
        self.target
            + self.radius
                * Vec3::new(
                    sin_phi * self.theta.sin(),
                    self.phi.cos(),
                    sin_phi * self.theta.cos(),
                )
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y, aspect.max(1e-3), 0.1, 1000.0)
    }

    /// Forward, right and up unit vectors of the camera.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.target - self.position()).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();
        (forward, right, up)
    }

    /// Pointer drag in pixels on a surface `viewport_height` pixels tall.
    pub fn rotate_drag(&mut self, delta_px: Vec2, viewport_height: f32) {
        if !self.config.enable_rotate {
            return;
        }
        let height = viewport_height.max(1.0);
        self.delta_theta -= TAU * delta_px.x / height * self.config.rotate_speed;
        self.delta_phi -= TAU * delta_px.y / height * self.config.rotate_speed;
    }

    pub fn pan_drag(&mut self, delta_px: Vec2, viewport_height: f32) {
        if !self.config.enable_pan {
            return;
        }
        let height = viewport_height.max(1.0);
        let target_distance = self.radius * (self.fov_y * 0.5).tan();
        let (_, right, up) = self.basis();
        self.pan_offset -= right * (2.0 * delta_px.x * target_distance / height);
        self.pan_offset += up * (2.0 * delta_px.y * target_distance / height);
    }

    /// Positive `steps` zoom in.
    pub fn zoom(&mut self, steps: f32) {
        if !self.config.enable_zoom || steps == 0.0 {
            return;
        }
        self.zoom_scale *= ZOOM_STEP.powf(steps);
    }

    /// Pinch gesture; `factor > 1` zooms in.
    pub fn pinch(&mut self, factor: f32) {
        if !self.config.enable_zoom || factor <= 0.0 {
            return;
        }
        self.zoom_scale /= factor;
    }

    /// Applies pending input. Returns whether the camera is still moving.
    pub fn update(&mut self) -> bool {
        let damping = if self.config.enable_damping {
            self.config.damping_factor
        } else {
            1.0
        };

        self.theta = wrap_angle(self.theta + self.delta_theta * damping);
        self.phi += self.delta_phi * damping;
        self.clamp_phi();
        self.radius = (self.radius * self.zoom_scale).clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.target += self.pan_offset * damping;

        self.zoom_scale = 1.0;
        if self.config.enable_damping {
            self.delta_theta *= 1.0 - damping;
            self.delta_phi *= 1.0 - damping;
            self.pan_offset *= 1.0 - damping;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }

        let moving = self.delta_theta.abs() > 1e-5
            || self.delta_phi.abs() > 1e-5
            || self.pan_offset.length_squared() > 1e-10;
        if !moving {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        moving
    }

    /// Moves the camera so `min..max` fills the view, keeping the orbit angles.
    pub fn frame_bounds(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let radius = ((max - min) * 0.5).length();
        let distance = if radius > 0.0 {
            radius / (self.fov_y * 0.5).sin()
        } else {
            5.0
        };
        self.target = center;
        self.radius = distance.clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.pan_offset = Vec3::ZERO;
    }

    fn clamp_phi(&mut self) {
        let min = self.config.min_polar_angle.max(POLAR_EPS);
        let max = self.config.max_polar_angle.min(PI - POLAR_EPS).max(min);
        self.phi = self.phi.clamp(min, max);
    }
}

fn wrap_angle(angle: f32) -> f32 {
    if angle.is_finite() {
        (angle + PI).rem_euclid(TAU) - PI
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::OrbitController;
    use crate::config::{OrbitConfig, SurfaceConfig};
    use glam::{Vec2, Vec3};

    fn camera() -> OrbitController {
        OrbitController::new(&SurfaceConfig::default(), OrbitConfig::default())
    }

    #[test]
    fn starts_at_configured_pose() {
        let camera = camera();
        assert!((camera.position() - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
        assert!((camera.fov_y - 50f32.to_radians()).abs() < 1e-6);
        let (forward, _, up) = camera.basis();
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
        assert!((up - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn polar_angle_stays_clamped_for_any_drag() {
        let mut camera = camera();
        let max = camera.config().max_polar_angle;
        for delta in [-5000.0f32, -300.0, 0.0, 300.0, 5000.0] {
            for _ in 0..50 {
                camera.rotate_drag(Vec2::new(13.0, delta), 720.0);
                camera.update();
                assert!(camera.phi > 0.0);
                assert!(camera.phi <= max + 1e-6);
                assert!(camera.position().is_finite());
            }
        }
    }

    #[test]
    fn damping_keeps_moving_after_release() {
        let mut camera = camera();
        camera.rotate_drag(Vec2::new(100.0, 0.0), 720.0);
        assert!(camera.update());
        let after_first = camera.theta;
        let mut frames = 0;
        while camera.update() {
            frames += 1;
            assert!(frames < 200, "damping never settled");
        }
        assert!(camera.theta.abs() > after_first.abs());
    }

    #[test]
    fn without_damping_input_applies_in_one_update() {
        let config = OrbitConfig {
            enable_damping: false,
            ..OrbitConfig::default()
        };
        let mut camera = OrbitController::new(&SurfaceConfig::default(), config);
        camera.rotate_drag(Vec2::new(100.0, 0.0), 720.0);
        assert!(!camera.update());
        let theta = camera.theta;
        camera.update();
        assert_eq!(camera.theta, theta);
    }

    #[test]
    fn zoom_and_pan_move_camera() {
        let mut camera = camera();
        camera.zoom(3.0);
        camera.update();
        assert!(camera.radius < 5.0);

        let config = OrbitConfig {
            enable_damping: false,
            ..OrbitConfig::default()
        };
        let mut camera = OrbitController::new(&SurfaceConfig::default(), config);
        camera.pan_drag(Vec2::new(50.0, 0.0), 720.0);
        camera.update();
        assert!(camera.target.x < 0.0);
        assert!(camera.target.y.abs() < 1e-5);
    }

    #[test]
    fn disabled_zoom_is_ignored() {
        let config = OrbitConfig {
            enable_zoom: false,
            ..OrbitConfig::default()
        };
        let mut camera = OrbitController::new(&SurfaceConfig::default(), config);
        camera.zoom(10.0);
        camera.pinch(3.0);
        camera.update();
        assert!((camera.radius - 5.0).abs() < 1e-5);
    }

    #[test]
    fn frame_bounds_keeps_orientation() {
        let mut camera = camera();
        camera.theta = 0.7;
        camera.frame_bounds(Vec3::splat(-2.0), Vec3::splat(2.0));
        assert_eq!(camera.target, Vec3::ZERO);
        assert!((camera.theta - 0.7).abs() < 1e-6);
        assert!(camera.radius > 4.0);
    }
}
