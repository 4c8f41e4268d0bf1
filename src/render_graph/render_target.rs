//! Render targets, the auxiliary target set, and the per-frame execution context.

use crate::camera::Camera;
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::light::LightDirection;
use crate::params::PassParameters;

/// Format of the depth, normal and UV targets' colour attachments.
pub const AUX_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Format of the sampled depth attachment on the depth target.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Format of the colour buffers the pass chain ping-pongs between.
pub const CHAIN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Depth attachment carried by a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthAttachment {
    None,
    /// Depth testing only; contents are discarded after the pass.
    Buffer,
    /// Depth is stored and bound as a texture by later passes.
    Sampled,
}

/// Everything needed to (re)create a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub depth: DepthAttachment,
}

impl TargetDesc {
    /// Rejects zero or over-limit extents before anything touches the device.
    pub fn validate(&self, max_dimension: u32) -> Result<(), RenderError> {
        if self.width == 0
            || self.height == 0
            || self.width > max_dimension
            || self.height > max_dimension
        {
            return Err(RenderError::InvalidExtent {
                width: self.width,
                height: self.height,
                max: max_dimension,
            });
        }
        if self.depth == DepthAttachment::Sampled && self.sample_count != 1 {
            return Err(RenderError::TargetAllocation {
                label: self.label,
                width: self.width,
                height: self.height,
                reason: "a sampled depth attachment cannot be multisampled".into(),
            });
        }
        Ok(())
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// An off-screen render target: a single-sampled colour texture that later
/// passes sample, an optional multisampled colour buffer that resolves into
/// it, and an optional depth attachment.
pub struct RenderTarget {
    desc: TargetDesc,
    /// Resolved colour texture, bound by later passes.
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    msaa: Option<(wgpu::Texture, wgpu::TextureView)>,
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
}

impl RenderTarget {
    /// Allocates a target, turning device-side failures into
    /// [`RenderError::TargetAllocation`].
    pub fn new(gpu: &GpuContext, desc: TargetDesc) -> Result<Self, RenderError> {
        desc.validate(gpu.max_texture_dimension())?;

        gpu.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let target = Self::create(gpu, desc);

        let validation = pollster::block_on(gpu.device.pop_error_scope());
        let oom = pollster::block_on(gpu.device.pop_error_scope());
        if let Some(err) = validation.or(oom) {
            return Err(RenderError::TargetAllocation {
                label: desc.label,
                width: desc.width,
                height: desc.height,
                reason: err.to_string(),
            });
        }

        log::debug!(
            "allocated '{}' {}x{} {:?} x{}",
            desc.label,
            desc.width,
            desc.height,
            desc.format,
            desc.sample_count
        );
        Ok(target)
    }

    fn create(gpu: &GpuContext, desc: TargetDesc) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: desc.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let msaa = (desc.sample_count > 1).then(|| {
            let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: desc.extent(),
                mip_level_count: 1,
                sample_count: desc.sample_count,
                dimension: wgpu::TextureDimension::D2,
                format: desc.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        });

        let depth = match desc.depth {
            DepthAttachment::None => None,
            DepthAttachment::Buffer | DepthAttachment::Sampled => {
                let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
                if desc.depth == DepthAttachment::Sampled {
                    usage |= wgpu::TextureUsages::TEXTURE_BINDING;
                }
                let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(desc.label),
                    size: desc.extent(),
                    mip_level_count: 1,
                    sample_count: desc.sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format: DEPTH_FORMAT,
                    usage,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                Some((texture, view))
            }
        };

        Self {
            desc,
            texture,
            view,
            msaa,
            depth,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    /// The sampled depth texture, if this target stores one.
    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        match self.desc.depth {
            DepthAttachment::Sampled => self.depth.as_ref().map(|(_, view)| view),
            _ => None,
        }
    }

    /// Colour attachment that clears to `clear`, resolving when multisampled.
    pub fn color_attachment(&self, clear: wgpu::Color) -> wgpu::RenderPassColorAttachment<'_> {
        let (view, resolve_target, store) = match &self.msaa {
            Some((_, msaa_view)) => (msaa_view, Some(&self.view), wgpu::StoreOp::Discard),
            None => (&self.view, None, wgpu::StoreOp::Store),
        };
        wgpu::RenderPassColorAttachment {
            view,
            resolve_target,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear),
                store,
            },
            depth_slice: None,
        }
    }

    /// Depth attachment cleared to the far plane, if any.
    pub fn depth_attachment(&self) -> Option<wgpu::RenderPassDepthStencilAttachment<'_>> {
        let store = match self.desc.depth {
            DepthAttachment::Sampled => wgpu::StoreOp::Store,
            _ => wgpu::StoreOp::Discard,
        };
        self.depth
            .as_ref()
            .map(|(_, view)| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store,
                }),
                stencil_ops: None,
            })
    }
}

/// The depth, normal and UV targets filled by the auxiliary passes.
///
/// The three are always the same size. A resize builds a complete new set
/// before the old one is replaced; see [`Compositor::resize`](crate::Compositor::resize).
pub struct RenderTargetSet {
    pub depth: RenderTarget,
    pub normal: RenderTarget,
    pub uv: RenderTarget,
    samples: u32,
}

impl RenderTargetSet {
    /// Descriptors for a set at the given size.
    ///
    /// The depth target is single-sampled because wgpu cannot resolve a
    /// multisampled depth attachment into a sampleable texture.
    pub fn plan(width: u32, height: u32, samples: u32) -> [TargetDesc; 3] {
        let color = |label, depth| TargetDesc {
            label,
            width,
            height,
            format: AUX_COLOR_FORMAT,
            sample_count: samples,
            depth,
        };
        [
            TargetDesc {
                sample_count: 1,
                ..color("Depth Target", DepthAttachment::Sampled)
            },
            color("Normal Target", DepthAttachment::Buffer),
            color("UV Target", DepthAttachment::Buffer),
        ]
    }

    /// Creates all three targets.
    pub fn allocate(
        gpu: &GpuContext,
        width: u32,
        height: u32,
        samples: u32,
    ) -> Result<Self, RenderError> {
        Self::from_plan(gpu, Self::plan(width, height, samples), samples)
    }

    /// Creates a set from descriptors made by [`plan`](Self::plan). Nothing
    /// is kept if any of the three fails.
    pub fn from_plan(
        gpu: &GpuContext,
        [depth, normal, uv]: [TargetDesc; 3],
        samples: u32,
    ) -> Result<Self, RenderError> {
        Ok(Self {
            depth: RenderTarget::new(gpu, depth)?,
            normal: RenderTarget::new(gpu, normal)?,
            uv: RenderTarget::new(gpu, uv)?,
            samples,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.depth.size()
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Read-only views bound by the effect stages.
    pub fn textures(&self) -> AuxTextures<'_> {
        AuxTextures {
            // plan() always gives the depth target a sampled attachment
            depth: self.depth.depth_view().unwrap_or(&self.depth.view),
            normal: &self.normal.view,
            uv: &self.uv.view,
        }
    }
}

/// The auxiliary outputs, shared read-only across the effect stages.
#[derive(Clone, Copy)]
pub struct AuxTextures<'a> {
    /// `Depth32Float`, bound as `texture_depth_2d`.
    pub depth: &'a wgpu::TextureView,
    pub normal: &'a wgpu::TextureView,
    pub uv: &'a wgpu::TextureView,
}

/// Execution context passed to each render node during graph traversal.
///
/// Built once per frame; the `'a` lifetime keeps nodes from holding on to
/// frame resources.
pub struct RenderContext<'a> {
    pub gpu: &'a GpuContext,
    /// Nodes append their commands to this encoder.
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub camera: &'a Camera,
    /// This frame's light direction, computed before any pass ran.
    pub light: LightDirection,
    pub aux: AuxTextures<'a>,
    pub params: &'a PassParameters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_sizes_every_target_to_the_viewport() {
        for (w, h) in [(1, 1), (640, 480), (1920, 1080), (3001, 17)] {
            let plan = RenderTargetSet::plan(w, h, 2);
            assert!(plan.iter().all(|d| d.width == w && d.height == h));
        }
    }

    #[test]
    fn plan_gives_depth_target_a_sampled_single_sample_attachment() {
        let [depth, normal, uv] = RenderTargetSet::plan(800, 600, 2);
        assert_eq!(depth.depth, DepthAttachment::Sampled);
        assert_eq!(depth.sample_count, 1);
        assert_eq!(normal.sample_count, 2);
        assert_eq!(uv.sample_count, 2);
        assert_eq!(normal.depth, DepthAttachment::Buffer);
        assert!(
            [depth, normal, uv]
                .iter()
                .all(|d| d.format == AUX_COLOR_FORMAT)
        );
        for d in [depth, normal, uv] {
            assert!(d.validate(8192).is_ok());
        }
    }

    #[test]
    fn validate_rejects_zero_and_oversized_extents() {
        let [desc, ..] = RenderTargetSet::plan(0, 600, 1);
        assert!(matches!(
            desc.validate(8192),
            Err(RenderError::InvalidExtent { width: 0, .. })
        ));
        let [desc, ..] = RenderTargetSet::plan(9000, 600, 1);
        assert!(matches!(
            desc.validate(8192),
            Err(RenderError::InvalidExtent { max: 8192, .. })
        ));
    }

    #[test]
    fn validate_rejects_multisampled_sampled_depth() {
        let desc = TargetDesc {
            label: "Broken",
            width: 64,
            height: 64,
            format: AUX_COLOR_FORMAT,
            sample_count: 4,
            depth: DepthAttachment::Sampled,
        };
        let err = desc.validate(8192).unwrap_err();
        assert!(err.is_fatal());
    }
}
