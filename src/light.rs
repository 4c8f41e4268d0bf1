//! Directional light and its per-frame projection into camera space.
//!
//! Both effect stages shade against the light in view space. The projector
//! runs once per frame, before any pass reads the direction, and returns a
//! fresh [`LightDirection`] value; nothing is carried across frames.

use glam::Vec3;

use crate::camera::Camera;

/// A directional light. Its position is read as the direction towards the light.
#[derive(Clone, Copy, Debug)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.25, 3.0, -2.25),
            color: [1.0, 1.0, 1.0],
            intensity: 3.0,
        }
    }
}

impl DirectionalLight {
    /// World-space unit direction towards the light.
    pub fn direction(&self) -> Vec3 {
        self.position.normalize_or(Vec3::Y)
    }
}

/// Camera-space light direction, stored already remapped to [0, 1] per component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightDirection {
    remapped: Vec3,
}

impl LightDirection {
    /// Projects the light into the camera's view space.
    ///
    /// The light position is transformed as a direction (w = 0) by the inverse
    /// of the camera world matrix, normalised, then remapped with `(v + 1) * 0.5`.
    pub fn project(camera: &Camera, light: &DirectionalLight) -> Self {
        let view = camera.world_matrix().inverse();
        let view_dir = view.transform_vector3(light.position).normalize_or(Vec3::Z);
        Self::from_view_space(view_dir)
    }

    /// Wraps an already normalised view-space direction.
    pub fn from_view_space(direction: Vec3) -> Self {
        Self {
            remapped: remap(direction),
        }
    }

    /// Shader-facing value, each component in [0, 1].
    pub fn remapped(&self) -> Vec3 {
        self.remapped
    }

    /// The view-space unit direction.
    pub fn view_space(&self) -> Vec3 {
        unmap(self.remapped)
    }
}

impl Default for LightDirection {
    fn default() -> Self {
        Self::from_view_space(Vec3::Z)
    }
}

/// [-1, 1] to [0, 1].
pub fn remap(v: Vec3) -> Vec3 {
    (v + Vec3::ONE) * 0.5
}

/// [0, 1] to [-1, 1].
pub fn unmap(v: Vec3) -> Vec3 {
    v * 2.0 - Vec3::ONE
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn remap_roundtrip_recovers_unit_vector() {
        for v in [
            Vec3::X,
            Vec3::NEG_Y,
            Vec3::new(0.3, -0.4, 0.5).normalize(),
            Vec3::new(-1.0, 1.0, -1.0).normalize(),
        ] {
            let dir = LightDirection::from_view_space(v);
            assert_vec_eq(dir.view_space(), v);
            assert_vec_eq(dir.view_space().normalize(), v);
        }
    }

    #[test]
    fn remapped_components_stay_in_unit_range() {
        let camera = Camera::new().at([10.0, 1.0, -10.0]).looking_at(Vec3::ZERO);
        let dir = LightDirection::project(&camera, &DirectionalLight::default());
        let r = dir.remapped();
        for c in [r.x, r.y, r.z] {
            assert!((0.0..=1.0).contains(&c));
        }
        assert_relative_eq!(dir.view_space().length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn identity_camera_keeps_world_direction() {
        let camera = Camera {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            ..Camera::default()
        };
        let light = DirectionalLight {
            position: Vec3::new(0.0, 0.0, 4.0),
            ..Default::default()
        };
        let dir = LightDirection::project(&camera, &light);
        assert_vec_eq(dir.view_space(), Vec3::Z);
        assert_vec_eq(dir.remapped(), Vec3::new(0.5, 0.5, 1.0));
    }

    #[test]
    fn half_turn_about_the_light_axis_mirrors_around_center() {
        // Camera orbits the vertical axis; the light sits on that axis's side.
        let light = DirectionalLight {
            position: Vec3::new(1.0, 0.0, 0.0),
            ..Default::default()
        };
        let start = Camera::new().at([0.0, 0.0, 5.0]).looking_at(Vec3::ZERO);
        let before = LightDirection::project(&start, &light);

        let half_turn = Quat::from_rotation_y(std::f32::consts::PI);
        let rotated = Camera {
            position: half_turn * start.position,
            forward: half_turn * start.forward,
            ..start
        };
        let after = LightDirection::project(&rotated, &light);

        // x flips sign in view space, so the remapped value crosses 0.5
        assert!(before.remapped().x > 0.5);
        assert!(after.remapped().x < 0.5);
        assert_relative_eq!(
            before.remapped().x - 0.5,
            0.5 - after.remapped().x,
            epsilon = 1e-5
        );
        // y is untouched by a rotation about Y
        assert_relative_eq!(before.remapped().y, after.remapped().y, epsilon = 1e-5);
    }

    #[test]
    fn direction_sweeps_through_center_monotonically() {
        let light = DirectionalLight {
            position: Vec3::new(0.0, 0.0, 1.0),
            ..Default::default()
        };
        let steps = 16;
        let mut previous = f32::INFINITY;
        let mut crossed = false;
        for i in 0..=steps {
            let angle = std::f32::consts::PI * i as f32 / steps as f32;
            let rot = Quat::from_rotation_y(angle);
            let camera = Camera {
                position: rot * Vec3::new(0.0, 0.0, 5.0),
                forward: rot * Vec3::NEG_Z,
                up: Vec3::Y,
                ..Camera::default()
            };
            let z = LightDirection::project(&camera, &light).remapped().z;
            assert!(z <= previous + 1e-5);
            if previous > 0.5 && z <= 0.5 {
                crossed = true;
            }
            previous = z;
        }
        assert!(crossed);
        assert_relative_eq!(previous, 0.0, epsilon = 1e-5);
    }
}
