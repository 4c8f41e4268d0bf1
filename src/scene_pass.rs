//! Scene rendering: the primary colour render and the auxiliary depth, normal
//! and UV renders that the effect stages read back as textures.
//!
//! Every render goes through [`ScenePass::render_with`], which takes the
//! material and background overrides as a per-call value. The [`Scene`] is
//! never written to, so nothing has to be restored afterwards.
//!
//! # Bind Groups
//!
//! - **Group 0**: frame uniforms (view-projection, view, light, exposure)
//! - **Group 1**: model uniforms, one 256-byte-aligned slot per object selected
//!   with a dynamic offset
//!
//! All uniforms are uploaded once in [`ScenePass::prepare`], before the
//! encoder records any render pass for the frame.

use std::num::NonZeroU64;

use crate::camera::Camera;
use crate::gpu::GpuContext;
use crate::light::DirectionalLight;
use crate::mesh::Vertex3d;
use crate::render_graph::{AUX_COLOR_FORMAT, CHAIN_FORMAT, DEPTH_FORMAT, RenderTarget};
use crate::scene::{MaterialOverride, RenderOverrides, Scene};

/// Per-frame uniforms shared by every object.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    /// World-space direction towards the light; `w` is the exposure.
    pub light_dir: [f32; 4],
    /// Light colour premultiplied by intensity.
    pub light_color: [f32; 4],
}

/// Per-object uniforms.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// `x` is the material's ambient term.
    pub ambient: [f32; 4],
}

const MODEL_SIZE: u64 = std::mem::size_of::<ModelUniforms>() as u64;
const INITIAL_SLOTS: u64 = 16;

/// Byte stride between model slots for a device's uniform offset alignment.
pub fn model_stride(alignment: u32) -> u64 {
    let alignment = u64::from(alignment.max(1));
    MODEL_SIZE.div_ceil(alignment) * alignment
}

fn color(rgba: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: rgba[0] as f64,
        g: rgba[1] as f64,
        b: rgba[2] as f64,
        a: rgba[3] as f64,
    }
}

/// Renders a [`Scene`] with ordinary or overridden materials.
pub struct ScenePass {
    /// Lit materials into the chain's first target.
    primary_pipeline: wgpu::RenderPipeline,
    /// Lit materials into the depth target; only its depth attachment is read.
    depth_pipeline: wgpu::RenderPipeline,
    normal_pipeline: wgpu::RenderPipeline,
    uv_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_stride: u64,
    model_slots: u64,
    /// Depth buffer for the primary render.
    depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
}

impl ScenePass {
    /// Builds all four pipelines. `aux_samples` must match the sample count of
    /// the normal and UV targets.
    pub fn new(gpu: &GpuContext, aux_samples: u32) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(MODEL_SIZE),
                },
                count: None,
            }],
        });

        let model_stride = model_stride(device.limits().min_uniform_buffer_offset_alignment);
        let (model_buffer, model_bind_group) =
            Self::create_model_slots(gpu, &model_layout, model_stride, INITIAL_SLOTS);

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &model_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |label: &str, entry_point: &str, format: wgpu::TextureFormat, samples: u32| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[Vertex3d::LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry_point),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    // procedural and imported meshes disagree on winding
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: samples,
                    ..Default::default()
                },
                multiview: None,
                cache: None,
            })
        };

        let primary_pipeline = pipeline("Scene Primary Pipeline", "fs_lit", CHAIN_FORMAT, 1);
        let depth_pipeline = pipeline("Scene Depth Pipeline", "fs_lit", AUX_COLOR_FORMAT, 1);
        let normal_pipeline =
            pipeline("Scene Normal Pipeline", "fs_normal", AUX_COLOR_FORMAT, aux_samples);
        let uv_pipeline = pipeline("Scene UV Pipeline", "fs_uv", AUX_COLOR_FORMAT, aux_samples);

        let depth_view = Self::create_depth_view(gpu, gpu.width(), gpu.height());

        Self {
            primary_pipeline,
            depth_pipeline,
            normal_pipeline,
            uv_pipeline,
            frame_buffer,
            frame_bind_group,
            model_layout,
            model_buffer,
            model_bind_group,
            model_stride,
            model_slots: INITIAL_SLOTS,
            depth_view,
            depth_size: (gpu.width(), gpu.height()),
        }
    }

    fn create_model_slots(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        slots: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Model Uniforms"),
            size: stride * slots,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Model Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(MODEL_SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn create_depth_view(gpu: &GpuContext, width: u32, height: u32) -> wgpu::TextureView {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Primary Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Recreates the primary depth buffer if the viewport changed size.
    pub fn ensure_depth_size(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        if self.depth_size != (width, height) {
            self.depth_view = Self::create_depth_view(gpu, width, height);
            self.depth_size = (width, height);
        }
    }

    /// Uploads this frame's camera, light and per-object uniforms.
    ///
    /// Must run before any render call of the frame is recorded; every render
    /// reads the same slots.
    pub fn prepare(
        &mut self,
        gpu: &GpuContext,
        scene: &Scene,
        camera: &Camera,
        light: &DirectionalLight,
        exposure: f32,
    ) {
        let dir = light.direction();
        let frame = FrameUniforms {
            view_proj: camera.view_projection().to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            light_dir: [dir.x, dir.y, dir.z, exposure],
            light_color: [
                light.color[0] * light.intensity,
                light.color[1] * light.intensity,
                light.color[2] * light.intensity,
                1.0,
            ],
        };
        gpu.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));

        let count = scene.drawable().count() as u64;
        if count > self.model_slots {
            let slots = count.next_power_of_two();
            let (buffer, bind_group) =
                Self::create_model_slots(gpu, &self.model_layout, self.model_stride, slots);
            self.model_buffer = buffer;
            self.model_bind_group = bind_group;
            self.model_slots = slots;
            log::debug!("model uniform buffer grown to {slots} slots");
        }
        if count == 0 {
            return;
        }

        let mut bytes = vec![0u8; (self.model_stride * count) as usize];
        for (i, (object, _)) in scene.drawable().enumerate() {
            let uniforms = ModelUniforms {
                model: object.transform.matrix().to_cols_array_2d(),
                normal_matrix: object.transform.normal_matrix().to_cols_array_2d(),
                color: object.material.color,
                ambient: [object.material.ambient, 0.0, 0.0, 0.0],
            };
            let start = i * self.model_stride as usize;
            bytes[start..start + MODEL_SIZE as usize].copy_from_slice(bytemuck::bytes_of(&uniforms));
        }
        gpu.queue.write_buffer(&self.model_buffer, 0, &bytes);
    }

    /// Renders the scene into an auxiliary target under `overrides`.
    ///
    /// The material override picks the shading program and the background
    /// override replaces the clear colour for this call only.
    pub fn render_with(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        target: &RenderTarget,
        overrides: RenderOverrides,
    ) {
        let (label, pipeline) = match overrides.material {
            None => ("Depth Render", &self.depth_pipeline),
            Some(MaterialOverride::Normal) => ("Normal Render", &self.normal_pipeline),
            Some(MaterialOverride::Uv) => ("UV Render", &self.uv_pipeline),
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(
                target.color_attachment(color(overrides.background_for(scene))),
            )],
            depth_stencil_attachment: target.depth_attachment(),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.draw(&mut pass, scene, pipeline);
    }

    /// Fills the depth target's depth attachment using ordinary materials.
    pub fn render_depth(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        target: &RenderTarget,
    ) {
        self.render_with(encoder, scene, target, RenderOverrides::none());
    }

    /// View-space normals over a black background.
    pub fn render_normals(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        target: &RenderTarget,
    ) {
        self.render_with(encoder, scene, target, RenderOverrides::normals());
    }

    /// Texture coordinates over a black background.
    pub fn render_uv(&self, encoder: &mut wgpu::CommandEncoder, scene: &Scene, target: &RenderTarget) {
        self.render_with(encoder, scene, target, RenderOverrides::uvs());
    }

    /// Renders the lit scene over its own background into the chain's first
    /// buffer, using this pass's depth buffer.
    pub fn render_primary(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        target: &wgpu::TextureView,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Primary Render"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color(scene.background)),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.draw(&mut pass, scene, &self.primary_pipeline);
    }

    fn draw(&self, pass: &mut wgpu::RenderPass, scene: &Scene, pipeline: &wgpu::RenderPipeline) {
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);

        for (i, (_, mesh)) in scene.drawable().enumerate() {
            if i as u64 >= self.model_slots {
                // prepare() was not called since objects were added
                log::warn!("scene has more objects than uploaded model slots; skipping the rest");
                break;
            }
            let offset = (i as u64 * self.model_stride) as u32;
            pass.set_bind_group(1, &self.model_bind_group, &[offset]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layouts_match_shader_structs() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 160);
        assert_eq!(MODEL_SIZE, 160);
    }

    #[test]
    fn model_stride_respects_offset_alignment() {
        assert_eq!(model_stride(256), 256);
        assert_eq!(model_stride(64), 192);
        assert_eq!(model_stride(0), 160);
        for alignment in [32, 64, 128, 256] {
            let stride = model_stride(alignment);
            assert_eq!(stride % alignment as u64, 0);
            assert!(stride >= MODEL_SIZE);
        }
    }
}
