//! Damped orbit controls around a target point.
//!
//! Dragging with the left mouse button adds angular velocity, the scroll
//! wheel zooms, and the velocity decays every frame so the view eases to a
//! stop. [`OrbitCamera::apply`] writes position and orientation into a
//! [`Camera`] and leaves its aspect and clip planes alone; those belong to the
//! renderer's resize handling.

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use winit::event::MouseButton;

use crate::camera::Camera;
use crate::input::Input;

const ELEVATION_LIMIT: f32 = FRAC_PI_2 - 0.01;

#[derive(Clone, Debug)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Angle around the Y axis, measured from +Z towards +X.
    pub azimuth: f32,
    pub elevation: f32,
    /// Fraction of angular velocity removed per 1/60 s.
    pub damping: f32,
    pub sensitivity: f32,
    pub zoom_sensitivity: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    velocity: glam::Vec2,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.0,
            azimuth: 0.0,
            elevation: 0.3,
            damping: 0.1,
            sensitivity: 0.005,
            zoom_sensitivity: 0.5,
            min_distance: 0.5,
            max_distance: 100.0,
            velocity: glam::Vec2::ZERO,
        }
    }
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orbit that starts at `position`, looking at `target`.
    pub fn looking_from(position: impl Into<Vec3>, target: impl Into<Vec3>) -> Self {
        let target = target.into();
        let offset = position.into() - target;
        let distance = offset.length().max(f32::EPSILON);
        Self {
            target,
            distance,
            azimuth: offset.x.atan2(offset.z),
            elevation: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            ..Default::default()
        }
    }

    pub fn damping(mut self, damping: f32) -> Self {
        self.damping = damping.clamp(0.0, 1.0);
        self
    }

    /// Zoom range. The bounds may be given in either order.
    pub fn distance_limits(mut self, a: f32, b: f32) -> Self {
        let (min, max) = if a <= b { (a, b) } else { (b, a) };
        self.min_distance = min;
        self.max_distance = max;
        self.distance = self.distance.clamp(min, max);
        self
    }

    pub fn update(&mut self, input: &Input, dt: f32) {
        if input.mouse_down(MouseButton::Left) {
            let delta = input.mouse_delta();
            self.velocity += glam::Vec2::new(-delta.x, delta.y) * self.sensitivity * self.damping;
        }

        let scroll = input.scroll_delta();
        if scroll.y != 0.0 {
            self.distance = (self.distance - scroll.y * self.zoom_sensitivity)
                .clamp(self.min_distance, self.max_distance);
        }

        self.step(dt);
    }

    fn step(&mut self, dt: f32) {
        self.azimuth += self.velocity.x;
        self.elevation = (self.elevation + self.velocity.y).clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
        let keep = (1.0 - self.damping).powf(dt * 60.0);
        self.velocity *= keep;
        if self.velocity.length_squared() < 1e-10 {
            self.velocity = glam::Vec2::ZERO;
        }
    }

    pub fn position(&self) -> Vec3 {
        self.target
            + self.distance
                * Vec3::new(
                    self.elevation.cos() * self.azimuth.sin(),
                    self.elevation.sin(),
                    self.elevation.cos() * self.azimuth.cos(),
                )
    }

    pub fn apply(&self, camera: &mut Camera) {
        let position = self.position();
        camera.position = position;
        camera.forward = (self.target - position).normalize_or(Vec3::NEG_Z);
        camera.up = Vec3::Y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn looking_from_reproduces_the_start_position() {
        let start = Vec3::new(10.0, 1.0, -10.0);
        let orbit = OrbitCamera::looking_from(start, Vec3::ZERO);
        let p = orbit.position();
        assert_relative_eq!(p.x, start.x, epsilon = 1e-4);
        assert_relative_eq!(p.y, start.y, epsilon = 1e-4);
        assert_relative_eq!(p.z, start.z, epsilon = 1e-4);
    }

    #[test]
    fn apply_keeps_aspect_and_clip_planes() {
        let mut camera = Camera::new().with_clip(1.0, 100.0);
        camera.set_viewport(1600, 900);
        OrbitCamera::looking_from([0.0, 0.0, 8.0], Vec3::ZERO).apply(&mut camera);

        assert_relative_eq!(camera.aspect, 16.0 / 9.0);
        assert_eq!((camera.near, camera.far), (1.0, 100.0));
        assert_relative_eq!(camera.forward.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn velocity_decays_to_rest() {
        let mut orbit = OrbitCamera::new();
        orbit.velocity = glam::Vec2::new(0.05, 0.0);
        let start = orbit.azimuth;
        for _ in 0..600 {
            orbit.step(1.0 / 60.0);
        }
        assert_eq!(orbit.velocity, glam::Vec2::ZERO);
        // geometric series: total travel is v / damping
        assert_relative_eq!(orbit.azimuth - start, 0.5, epsilon = 1e-3);
    }

    #[test]
    fn distance_limits_accept_either_order() {
        let orbit =
            OrbitCamera::looking_from([0.0, 0.0, 80.0], Vec3::ZERO).distance_limits(60.0, 4.0);
        assert_eq!((orbit.min_distance, orbit.max_distance), (4.0, 60.0));
        assert_eq!(orbit.distance, 60.0);
    }

    #[test]
    fn elevation_never_flips_over_the_pole() {
        let mut orbit = OrbitCamera::new();
        orbit.velocity = glam::Vec2::new(0.0, 10.0);
        orbit.step(1.0 / 60.0);
        assert!(orbit.elevation <= ELEVATION_LIMIT);
    }
}
