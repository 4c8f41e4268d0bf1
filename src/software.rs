//! CPU rendition of the screen-space stages over `image` buffers.
//!
//! [`SoftwareChain`] runs the same per-pixel math as `outline.wgsl`,
//! `hatching.wgsl` and `gamma.wgsl`, reading from a [`GBuffer`] that holds what
//! the auxiliary renders would have written. It needs no adapter, which makes
//! it the reference for headless checks of the chain's behaviour.

use glam::{Vec3, Vec4};
use image::{ImageBuffer, Luma, Rgba, Rgba32FImage};

use crate::camera::Camera;
use crate::error::RenderError;
use crate::light::LightDirection;
use crate::params::{HatchingParams, OutlineParams, PassParameters};
use crate::shading::{
    edge_strength, hatch_band, hatch_mask, lambert, linear_to_srgb, linearize_depth, mix,
};

/// Single-channel depth-buffer values in [0, 1]; 1 is background.
pub type DepthImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// The auxiliary render outputs.
#[derive(Clone, Debug)]
pub struct GBuffer {
    pub depth: DepthImage,
    /// View-space normals encoded `n * 0.5 + 0.5`; black where nothing was drawn.
    pub normal: Rgba32FImage,
    /// Texture coordinates in `r` and `g`.
    pub uv: Rgba32FImage,
}

impl GBuffer {
    /// An empty frame: far depth, black normals and UVs.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            depth: ImageBuffer::from_pixel(width, height, Luma([1.0])),
            normal: ImageBuffer::from_pixel(width, height, Rgba([0.0, 0.0, 0.0, 1.0])),
            uv: ImageBuffer::from_pixel(width, height, Rgba([0.0, 0.0, 0.0, 1.0])),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.depth.dimensions()
    }

    /// Rasterises a screen-aligned rectangle `[x0, x1) x [y0, y1)` at constant
    /// depth, facing `normal`, with UVs spanning [0, 1] across it.
    pub fn fill_rect(&mut self, rect: [u32; 4], depth: f32, normal: Vec3) {
        let [x0, y0, x1, y1] = rect;
        let (width, height) = self.dimensions();
        let (x1, y1) = (x1.min(width), y1.min(height));
        let n = normal.normalize_or_zero() * 0.5 + Vec3::splat(0.5);
        let span_x = (x1.saturating_sub(x0)).max(1) as f32;
        let span_y = (y1.saturating_sub(y0)).max(1) as f32;

        for y in y0..y1 {
            for x in x0..x1 {
                self.depth.put_pixel(x, y, Luma([depth]));
                self.normal.put_pixel(x, y, Rgba([n.x, n.y, n.z, 1.0]));
                let u = (x - x0) as f32 / span_x;
                let v = (y - y0) as f32 / span_y;
                self.uv.put_pixel(x, y, Rgba([u, v, 0.0, 1.0]));
            }
        }
    }

    fn clamp_px(&self, x: i64, y: i64) -> (u32, u32) {
        let (width, height) = self.dimensions();
        (
            x.clamp(0, width as i64 - 1) as u32,
            y.clamp(0, height as i64 - 1) as u32,
        )
    }

    fn raw_depth(&self, x: i64, y: i64) -> f32 {
        let (x, y) = self.clamp_px(x, y);
        self.depth.get_pixel(x, y).0[0]
    }

    fn normal_at(&self, x: i64, y: i64) -> Vec3 {
        let (x, y) = self.clamp_px(x, y);
        let [r, g, b, _] = self.normal.get_pixel(x, y).0;
        (Vec3::new(r, g, b) * 2.0 - Vec3::ONE).normalize_or_zero()
    }
}

fn load(image: &Rgba32FImage, x: u32, y: u32) -> Vec4 {
    Vec4::from(image.get_pixel(x, y).0)
}

fn store(image: &mut Rgba32FImage, x: u32, y: u32, c: Vec4) {
    image.put_pixel(x, y, Rgba(c.to_array()));
}

/// Outline stage over `color`. `near`/`far` are the camera's clip planes.
/// `g` must match `color` in size.
fn outline(
    color: &Rgba32FImage,
    g: &GBuffer,
    params: &OutlineParams,
    light: LightDirection,
    near: f32,
    far: f32,
) -> Rgba32FImage {
    let (width, height) = color.dimensions();
    let mut out = Rgba32FImage::new(width, height);
    let l = light.view_space().normalize_or_zero();
    let r = ((params.border_width + 0.5).floor() as i64).max(1);
    let offsets = [(r, 0), (-r, 0), (0, r), (0, -r)];
    let view_depth = |x, y| linearize_depth(g.raw_depth(x, y), near, far, params.perspective);
    let diffuse = |n: Vec3| lambert(n, l).max(0.0);
    let blend = params.border_width.clamp(0.0, 1.0);

    for y in 0..height {
        for x in 0..width {
            let (px, py) = (x as i64, y as i64);
            let d0 = view_depth(px, py);
            let n0 = g.normal_at(px, py);
            let i0 = diffuse(n0);

            let mut depth_deriv = 0.0;
            let mut diffuse_deriv = 0.0;
            let mut normal_deriv = 0.0_f32;
            for (dx, dy) in offsets {
                let n = g.normal_at(px + dx, py + dy);
                depth_deriv += (view_depth(px + dx, py + dy) - d0).abs();
                diffuse_deriv += (diffuse(n) - i0).abs();
                normal_deriv = normal_deriv.max(1.0 - n0.dot(n));
            }

            let strength = edge_strength(depth_deriv, params.depth_deriv_min, params.depth_deriv_max)
                .max(edge_strength(
                    diffuse_deriv,
                    params.diffuse_deriv_min,
                    params.diffuse_deriv_max,
                ))
                .max(edge_strength(
                    normal_deriv,
                    params.normal_deriv_min,
                    params.normal_deriv_max,
                ));

            let c = mix(load(color, x, y), Vec4::from(params.color), strength * blend);
            store(&mut out, x, y, c);
        }
    }
    out
}

/// Hatching stage over `color`. `g` must match `color` in size.
fn hatching(
    color: &Rgba32FImage,
    g: &GBuffer,
    params: &HatchingParams,
    light: LightDirection,
) -> Rgba32FImage {
    let (width, height) = color.dimensions();
    let mut out = color.clone();
    let l = light.view_space().normalize_or_zero();
    let thresholds = params.thresholds();

    for y in 0..height {
        for x in 0..width {
            if g.depth.get_pixel(x, y).0[0] >= 1.0 {
                continue;
            }
            let n = g.normal_at(x as i64, y as i64);
            let band = hatch_band(lambert(n, l), thresholds);
            let [u, v, ..] = g.uv.get_pixel(x, y).0;
            let mask = hatch_mask([u, v], band, params.line_spacing, params.line_width);
            if mask > 0.0 {
                store(&mut out, x, y, mix(load(color, x, y), Vec4::from(params.ink), mask));
            }
        }
    }
    out
}

/// sRGB encoding of the colour channels; alpha is left linear.
pub fn gamma(color: &Rgba32FImage) -> Rgba32FImage {
    let mut out = color.clone();
    for px in out.pixels_mut() {
        for c in &mut px.0[..3] {
            *c = linear_to_srgb(*c);
        }
    }
    out
}

/// A screen-space stage of the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Outline,
    Hatching,
    Gamma,
}

impl Stage {
    /// The full chain after the primary render.
    pub const CHAIN: [Stage; 3] = [Stage::Outline, Stage::Hatching, Stage::Gamma];
}

/// The stage chain on the CPU.
#[derive(Clone, Copy, Debug)]
pub struct SoftwareChain {
    pub near: f32,
    pub far: f32,
}

impl SoftwareChain {
    pub fn new(camera: &Camera) -> Self {
        Self {
            near: camera.near,
            far: camera.far,
        }
    }

    /// Runs outline, hatching and gamma over a primary render.
    pub fn run(
        &self,
        primary: &Rgba32FImage,
        g: &GBuffer,
        params: &PassParameters,
        light: LightDirection,
    ) -> Result<Rgba32FImage, RenderError> {
        self.run_stages(primary, g, params, light, &Stage::CHAIN)
    }

    /// Runs an arbitrary stage list. Disabled stages copy their input.
    ///
    /// `primary` and `g` must have the same dimensions, as the GPU targets
    /// always do; otherwise [`RenderError::SizeMismatch`] is returned.
    pub fn run_stages(
        &self,
        primary: &Rgba32FImage,
        g: &GBuffer,
        params: &PassParameters,
        light: LightDirection,
        stages: &[Stage],
    ) -> Result<Rgba32FImage, RenderError> {
        if primary.dimensions() != g.dimensions() {
            return Err(RenderError::SizeMismatch {
                color: primary.dimensions(),
                aux: g.dimensions(),
            });
        }
        Ok(stages.iter().fold(primary.clone(), |color, stage| match stage {
            Stage::Outline if params.outline.enabled => {
                outline(&color, g, &params.outline, light, self.near, self.far)
            }
            Stage::Hatching if params.hatching.enabled => {
                hatching(&color, g, &params.hatching, light)
            }
            Stage::Gamma => gamma(&color),
            _ => color,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 64;
    const H: u32 = 48;
    const BACKGROUND: [f32; 4] = [0.6, 0.65, 0.7, 1.0];

    fn bytes(image: &Rgba32FImage) -> &[u8] {
        bytemuck::cast_slice(image.as_raw())
    }

    /// Two overlapping rectangles facing the camera, standing in for two
    /// meshes, plus the matching primary colour.
    fn two_objects() -> (Rgba32FImage, GBuffer) {
        let mut primary = ImageBuffer::from_pixel(W, H, Rgba(BACKGROUND));
        let mut g = GBuffer::new(W, H);

        let near = [8, 8, 30, 40];
        let far = [24, 4, 56, 30];
        g.fill_rect(far, 0.95, Vec3::new(0.3, 0.0, 1.0));
        g.fill_rect(near, 0.9, Vec3::Z);
        for (rect, c) in [(far, [0.2, 0.5, 0.3, 1.0]), (near, [0.7, 0.3, 0.2, 1.0])] {
            for y in rect[1]..rect[3] {
                for x in rect[0]..rect[2] {
                    primary.put_pixel(x, y, Rgba(c));
                }
            }
        }
        (primary, g)
    }

    fn chain() -> SoftwareChain {
        SoftwareChain::new(&Camera::new().with_clip(1.0, 100.0))
    }

    fn light() -> LightDirection {
        LightDirection::from_view_space(Vec3::new(0.2, 0.9, 0.4).normalize())
    }

    #[test]
    fn disabled_outline_equals_omitted_outline() {
        let (primary, g) = two_objects();
        let mut params = PassParameters::default();
        params.outline.enabled = false;

        let toggled = chain().run(&primary, &g, &params, light()).unwrap();
        let omitted = chain()
            .run_stages(&primary, &g, &params, light(), &[Stage::Hatching, Stage::Gamma])
            .unwrap();
        assert_eq!(bytes(&toggled), bytes(&omitted));
    }

    #[test]
    fn disabled_hatching_equals_omitted_hatching() {
        let (primary, g) = two_objects();
        let mut params = PassParameters::default();
        params.hatching.enabled = false;

        let toggled = chain().run(&primary, &g, &params, light()).unwrap();
        let omitted = chain()
            .run_stages(&primary, &g, &params, light(), &[Stage::Outline, Stage::Gamma])
            .unwrap();
        assert_eq!(bytes(&toggled), bytes(&omitted));
    }

    #[test]
    fn outline_only_scene_has_edges_and_no_hatching() {
        let (primary, g) = two_objects();
        let mut params = PassParameters::default();
        params.hatching.enabled = false;
        let light = light();

        let out = chain().run(&primary, &g, &params, light).unwrap();
        let expected = gamma(&outline(&primary, &g, &params.outline, light, 1.0, 100.0));
        assert_eq!(bytes(&out), bytes(&expected));

        // silhouette of the near rectangle against the background is inked
        assert_eq!(out.get_pixel(8, 20).0[..3], [0.0, 0.0, 0.0]);
        // interiors and open background keep their colour
        assert_eq!(out.get_pixel(16, 30).0, gamma(&primary).get_pixel(16, 30).0);
        assert_eq!(out.get_pixel(2, 45).0, gamma(&primary).get_pixel(2, 45).0);
    }

    #[test]
    fn hatching_draws_lines_only_in_dark_bands() {
        let mut g = GBuffer::new(W, H);
        // left half faces the light, right half faces away
        g.fill_rect([0, 0, W / 2, H], 0.5, Vec3::Z);
        g.fill_rect([W / 2, 0, W, H], 0.5, Vec3::NEG_Z);
        let primary = ImageBuffer::from_pixel(W, H, Rgba([1.0, 1.0, 1.0, 1.0]));
        let params = HatchingParams {
            line_spacing: 8.0,
            ..Default::default()
        };

        let out = hatching(&primary, &g, &params, LightDirection::from_view_space(Vec3::Z));
        let inked = |x0: u32, x1: u32| {
            (0..H)
                .flat_map(|y| (x0..x1).map(move |x| (x, y)))
                .filter(|&(x, y)| out.get_pixel(x, y).0[0] == 0.0)
                .count()
        };
        assert_eq!(inked(0, W / 2), 0);
        let dark = inked(W / 2, W);
        assert!(dark > 0 && dark < (W / 2 * H) as usize);
    }

    #[test]
    fn background_is_never_hatched() {
        let g = GBuffer::new(W, H);
        let primary = ImageBuffer::from_pixel(W, H, Rgba(BACKGROUND));
        let params = HatchingParams {
            light_threshold: 1.0,
            double_line_threshold: 1.0,
            ..Default::default()
        };
        let out = hatching(&primary, &g, &params, light());
        assert_eq!(bytes(&out), bytes(&primary));
    }

    #[test]
    fn mismatched_aux_buffers_are_rejected() {
        let (primary, _) = two_objects();
        let small = GBuffer::new(W / 2, H);
        let err = chain()
            .run(&primary, &small, &PassParameters::default(), light())
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::SizeMismatch {
                color: (W, H),
                aux: (32, H),
            }
        ));
    }

    #[test]
    fn gamma_encodes_colour_but_not_alpha() {
        let image = ImageBuffer::from_pixel(2, 2, Rgba([0.0, 0.5, 1.0, 0.5]));
        let px = gamma(&image).get_pixel(0, 0).0;
        assert_eq!(px[0], 0.0);
        assert!((px[1] - 0.7354).abs() < 1e-3);
        assert!((px[2] - 1.0).abs() < 1e-6);
        assert_eq!(px[3], 0.5);
    }
}
