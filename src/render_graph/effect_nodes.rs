//! The outline, hatching and gamma stages.

use crate::camera::Camera;
use crate::fullscreen::FullscreenPass;
use crate::gpu::GpuContext;
use crate::light::LightDirection;
use crate::params::{HatchingParams, OutlineParams, PassParameters};
use crate::render_graph::{CHAIN_FORMAT, RenderContext, RenderNode};

/// Uniforms for `outline.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OutlineUniforms {
    pub color: [f32; 4],
    /// Remapped view-space light direction in `xyz`.
    pub light: [f32; 4],
    /// Depth derivative min/max, then camera near/far.
    pub depth: [f32; 4],
    /// Diffuse derivative min/max, then normal derivative min/max.
    pub derivs: [f32; 4],
    /// Border width, then the perspective flag as 0 or 1.
    pub misc: [f32; 4],
}

impl OutlineUniforms {
    pub fn new(params: &OutlineParams, light: LightDirection, camera: &Camera) -> Self {
        let l = light.remapped();
        Self {
            color: params.color,
            light: [l.x, l.y, l.z, 0.0],
            depth: [
                params.depth_deriv_min,
                params.depth_deriv_max,
                camera.near,
                camera.far,
            ],
            derivs: [
                params.diffuse_deriv_min,
                params.diffuse_deriv_max,
                params.normal_deriv_min,
                params.normal_deriv_max,
            ],
            misc: [
                params.border_width,
                if params.perspective { 1.0 } else { 0.0 },
                0.0,
                0.0,
            ],
        }
    }
}

/// Uniforms for `hatching.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HatchingUniforms {
    pub ink: [f32; 4],
    pub light: [f32; 4],
    /// Line width, then line spacing.
    pub lines: [f32; 4],
    /// Double-line, single-line and light thresholds.
    pub thresholds: [f32; 4],
}

impl HatchingUniforms {
    pub fn new(params: &HatchingParams, light: LightDirection) -> Self {
        let l = light.remapped();
        Self {
            ink: params.ink,
            light: [l.x, l.y, l.z, 0.0],
            lines: [params.line_width, params.line_spacing, 0.0, 0.0],
            thresholds: [
                params.double_line_threshold,
                params.single_line_threshold,
                params.light_threshold,
                0.0,
            ],
        }
    }
}

/// Edge detection over depth, diffuse and normal discontinuities.
pub struct OutlineNode {
    pass: FullscreenPass,
}

impl OutlineNode {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            pass: FullscreenPass::new(
                gpu,
                "Outline Pass",
                include_str!("../shaders/outline.wgsl"),
                CHAIN_FORMAT,
                std::mem::size_of::<OutlineUniforms>() as u64,
            ),
        }
    }
}

impl RenderNode for OutlineNode {
    fn name(&self) -> &'static str {
        "outline"
    }

    fn enabled(&self, params: &PassParameters) -> bool {
        params.outline.enabled
    }

    fn execute(
        &self,
        ctx: &mut RenderContext,
        target: &wgpu::TextureView,
        input: &wgpu::TextureView,
    ) {
        let uniforms = OutlineUniforms::new(&ctx.params.outline, ctx.light, ctx.camera);
        self.pass
            .render(ctx, target, input, bytemuck::bytes_of(&uniforms));
    }
}

/// UV-space hatch lines in the darker shading bands.
pub struct HatchingNode {
    pass: FullscreenPass,
}

impl HatchingNode {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            pass: FullscreenPass::new(
                gpu,
                "Hatching Pass",
                include_str!("../shaders/hatching.wgsl"),
                CHAIN_FORMAT,
                std::mem::size_of::<HatchingUniforms>() as u64,
            ),
        }
    }
}

impl RenderNode for HatchingNode {
    fn name(&self) -> &'static str {
        "hatching"
    }

    fn enabled(&self, params: &PassParameters) -> bool {
        params.hatching.enabled
    }

    fn execute(
        &self,
        ctx: &mut RenderContext,
        target: &wgpu::TextureView,
        input: &wgpu::TextureView,
    ) {
        let uniforms = HatchingUniforms::new(&ctx.params.hatching, ctx.light);
        self.pass
            .render(ctx, target, input, bytemuck::bytes_of(&uniforms));
    }
}

/// sRGB encoding into the presentation format.
pub struct GammaNode {
    pass: FullscreenPass,
}

impl GammaNode {
    pub fn new(gpu: &GpuContext, format: wgpu::TextureFormat) -> Self {
        Self {
            pass: FullscreenPass::new(
                gpu,
                "Gamma Pass",
                include_str!("../shaders/gamma.wgsl"),
                format,
                16,
            ),
        }
    }
}

impl RenderNode for GammaNode {
    fn name(&self) -> &'static str {
        "gamma"
    }

    fn execute(
        &self,
        ctx: &mut RenderContext,
        target: &wgpu::TextureView,
        input: &wgpu::TextureView,
    ) {
        self.pass.render(ctx, target, input, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn uniform_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<OutlineUniforms>(), 80);
        assert_eq!(std::mem::size_of::<HatchingUniforms>(), 64);
    }

    #[test]
    fn outline_uniforms_carry_camera_planes_and_flags() {
        let camera = Camera::new().with_clip(1.0, 100.0);
        let params = OutlineParams {
            perspective: false,
            ..Default::default()
        };
        let u = OutlineUniforms::new(&params, LightDirection::from_view_space(Vec3::Y), &camera);
        assert_eq!(u.depth, [5.0, 10.0, 1.0, 100.0]);
        assert_eq!(u.misc[0], 3.0);
        assert_eq!(u.misc[1], 0.0);
        assert_eq!(u.light[..3], [0.5, 1.0, 0.5]);
    }

    #[test]
    fn hatching_uniforms_keep_threshold_order_as_configured() {
        let params = HatchingParams {
            double_line_threshold: 0.4,
            single_line_threshold: -0.2,
            ..Default::default()
        };
        let u = HatchingUniforms::new(&params, LightDirection::default());
        assert_eq!(u.thresholds[..3], [0.4, -0.2, 0.15]);
        assert_eq!(u.lines[..2], [0.47, 400.0]);
    }
}
