//! Per-pixel math shared by the effect shaders and the software chain.
//!
//! Every function here has a WGSL twin in `src/shaders/`; keep them in step.

use glam::{Vec3, Vec4};

/// Maps a derivative magnitude to an edge strength in [0, 1].
///
/// At or below `min` the strength is 0, at or above `max` it is 1, and it
/// rises linearly in between. A degenerate range (`max <= min`) is a hard step
/// at `min`.
pub fn edge_strength(derivative: f32, min: f32, max: f32) -> f32 {
    if derivative <= min {
        return 0.0;
    }
    if derivative >= max {
        return 1.0;
    }
    ((derivative - min) / (max - min)).clamp(0.0, 1.0)
}

/// Converts a [0, 1] depth-buffer value to a positive view-space distance.
pub fn linearize_depth(depth: f32, near: f32, far: f32, perspective: bool) -> f32 {
    if perspective {
        // perspective_rh maps view distance z to depth = far * (z - near) / (z * (far - near))
        near * far / (far - depth * (far - near))
    } else {
        near + depth * (far - near)
    }
}

/// Lambert term used by both stages; negative when facing away from the light.
///
/// The outline stage clamps it at zero, the hatching stage bands the signed
/// value.
pub fn lambert(normal: Vec3, light: Vec3) -> f32 {
    normal.dot(light)
}

/// Which hatching pattern a pixel receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HatchBand {
    /// Two crossing line directions.
    Double,
    /// One line direction.
    Single,
    /// No hatching.
    None,
}

/// Thresholds for [`hatch_band`], in the [-1, 1] range of the Lambert term.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandThresholds {
    pub double_line: f32,
    pub single_line: f32,
    pub light: f32,
}

/// Selects the hatching band for a shading intensity.
///
/// The lit test runs first, then double, then single; the thresholds are used
/// in whatever order they are configured. With `double < single < light` the
/// bands are the intuitive dark/mid/lit split. When misordered, the lit test
/// still wins over the line tests.
pub fn hatch_band(intensity: f32, t: BandThresholds) -> HatchBand {
    if intensity > t.light {
        HatchBand::None
    } else if intensity < t.double_line {
        HatchBand::Double
    } else if intensity < t.single_line {
        HatchBand::Single
    } else {
        HatchBand::None
    }
}

/// Ink coverage (0 or 1) of the periodic line pattern at a UV coordinate.
pub fn hatch_mask(uv: [f32; 2], band: HatchBand, spacing: f32, width: f32) -> f32 {
    let line = |s: f32| if (s * spacing).rem_euclid(1.0) < width { 1.0 } else { 0.0 };
    let first = line(uv[0] + uv[1]);
    match band {
        HatchBand::None => 0.0,
        HatchBand::Single => first,
        HatchBand::Double => first.max(line(uv[0] - uv[1])),
    }
}

/// Linear blend of two colours, alpha included.
pub fn mix(a: Vec4, b: Vec4, t: f32) -> Vec4 {
    a + (b - a) * t
}

/// Piecewise sRGB transfer function for one linear channel.
pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DEFAULTS: BandThresholds = BandThresholds {
        double_line: -0.61,
        single_line: -0.17,
        light: 0.15,
    };

    #[test]
    fn edge_strength_is_clamped_at_the_ends() {
        assert_eq!(edge_strength(-1.0, 0.02, 0.09), 0.0);
        assert_eq!(edge_strength(0.02, 0.02, 0.09), 0.0);
        assert_eq!(edge_strength(0.09, 0.02, 0.09), 1.0);
        assert_eq!(edge_strength(40.0, 5.0, 10.0), 1.0);
    }

    #[test]
    fn edge_strength_is_monotonic_between_thresholds() {
        let mut previous = 0.0;
        for i in 0..=100 {
            let d = 4.0 + i as f32 * 0.08;
            let s = edge_strength(d, 5.0, 10.0);
            assert!((0.0..=1.0).contains(&s));
            assert!(s >= previous);
            previous = s;
        }
        assert_relative_eq!(edge_strength(7.5, 5.0, 10.0), 0.5);
    }

    #[test]
    fn edge_strength_degenerate_range_is_a_step() {
        assert_eq!(edge_strength(0.1, 0.2, 0.2), 0.0);
        assert_eq!(edge_strength(0.3, 0.2, 0.2), 1.0);
        assert_eq!(edge_strength(0.3, 0.5, 0.1), 0.0);
        assert_eq!(edge_strength(0.6, 0.5, 0.1), 1.0);
    }

    #[test]
    fn linearize_depth_hits_clip_planes() {
        assert_relative_eq!(linearize_depth(0.0, 1.0, 100.0, true), 1.0);
        assert_relative_eq!(linearize_depth(1.0, 1.0, 100.0, true), 100.0, epsilon = 1e-3);
        assert_relative_eq!(linearize_depth(0.5, 1.0, 100.0, false), 50.5);
    }

    #[test]
    fn linearize_depth_inverts_perspective_projection() {
        let camera = crate::Camera::new().with_clip(1.0, 100.0);
        let proj = camera.projection_matrix();
        for z in [1.5_f32, 7.0, 14.0, 60.0] {
            let clip = proj * Vec4::new(0.0, 0.0, -z, 1.0);
            let depth = clip.z / clip.w;
            assert_relative_eq!(linearize_depth(depth, 1.0, 100.0, true), z, epsilon = 1e-2);
        }
    }

    #[test]
    fn hatch_bands_partition_the_intensity_range() {
        for i in -100..=100 {
            let intensity = i as f32 / 100.0;
            let band = hatch_band(intensity, DEFAULTS);
            let expected = if intensity > DEFAULTS.light {
                HatchBand::None
            } else if intensity < DEFAULTS.double_line {
                HatchBand::Double
            } else if intensity < DEFAULTS.single_line {
                HatchBand::Single
            } else {
                HatchBand::None
            };
            assert_eq!(band, expected, "intensity {intensity}");
        }
        assert_eq!(hatch_band(-0.9, DEFAULTS), HatchBand::Double);
        assert_eq!(hatch_band(-0.4, DEFAULTS), HatchBand::Single);
        assert_eq!(hatch_band(0.0, DEFAULTS), HatchBand::None);
        assert_eq!(hatch_band(0.8, DEFAULTS), HatchBand::None);
    }

    #[test]
    fn misordered_thresholds_are_used_as_configured() {
        // light below single: the lit test claims everything above -0.5
        let t = BandThresholds {
            double_line: -0.2,
            single_line: 0.4,
            light: -0.5,
        };
        assert_eq!(hatch_band(-0.6, t), HatchBand::Double);
        assert_eq!(hatch_band(-0.3, t), HatchBand::None);
        assert_eq!(hatch_band(0.2, t), HatchBand::None);

        // double above single: single band is unreachable
        let t = BandThresholds {
            double_line: 0.1,
            single_line: -0.3,
            light: 0.5,
        };
        assert_eq!(hatch_band(-0.4, t), HatchBand::Double);
        assert_eq!(hatch_band(0.0, t), HatchBand::Double);
        assert_eq!(hatch_band(0.3, t), HatchBand::None);
    }

    #[test]
    fn lambert_is_signed_cosine() {
        assert_relative_eq!(lambert(Vec3::Z, Vec3::Z), 1.0);
        assert_relative_eq!(lambert(Vec3::Z, Vec3::NEG_Z), -1.0);
        assert_relative_eq!(lambert(Vec3::X, Vec3::Z), 0.0);
        let l = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert_relative_eq!(lambert(Vec3::Y, l), std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
    }

    #[test]
    fn hatch_mask_respects_band() {
        let uv = [0.0, 0.0];
        assert_eq!(hatch_mask(uv, HatchBand::None, 400.0, 0.47), 0.0);
        assert_eq!(hatch_mask(uv, HatchBand::Single, 400.0, 0.47), 1.0);
        assert_eq!(hatch_mask(uv, HatchBand::Double, 400.0, 0.47), 1.0);
    }

    #[test]
    fn double_band_covers_at_least_single_band() {
        for i in 0..50 {
            let uv = [i as f32 * 0.0137, i as f32 * 0.0071];
            let single = hatch_mask(uv, HatchBand::Single, 40.0, 0.3);
            let double = hatch_mask(uv, HatchBand::Double, 40.0, 0.3);
            assert!(double >= single);
        }
    }

    #[test]
    fn zero_line_width_draws_nothing() {
        for i in 0..20 {
            let uv = [i as f32 * 0.05, 0.3];
            assert_eq!(hatch_mask(uv, HatchBand::Double, 400.0, 0.0), 0.0);
        }
    }

    #[test]
    fn srgb_transfer_matches_reference_points() {
        assert_eq!(linear_to_srgb(0.0), 0.0);
        assert_relative_eq!(linear_to_srgb(1.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(linear_to_srgb(0.5), 0.735_356_9, epsilon = 1e-5);
    }
}
