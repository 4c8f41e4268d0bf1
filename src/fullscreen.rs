//! Full-screen shader passes over the previous stage's colour and the
//! auxiliary textures.
//!
//! Every pass shares one bind group layout:
//!
//! | Binding | Resource                           |
//! |---------|------------------------------------|
//! | 0       | stage uniforms                     |
//! | 1       | input colour, `texture_2d<f32>`    |
//! | 2       | depth, `texture_depth_2d`          |
//! | 3       | encoded view-space normals         |
//! | 4       | UV coordinates                     |
//!
//! Shaders read texels with `textureLoad`, so no sampler is bound and a copy
//! through [`FullscreenPass::blit`] is exact.

use crate::gpu::GpuContext;
use crate::render_graph::RenderContext;

/// A fragment shader drawn over a full-screen triangle.
pub struct FullscreenPass {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl FullscreenPass {
    /// Compiles `shader_source` (entry points `vs` and `fs`) for a target of
    /// `format`, with a uniform buffer of `uniform_size` bytes.
    pub fn new(
        gpu: &GpuContext,
        label: &'static str,
        shader_source: &str,
        format: wgpu::TextureFormat,
        uniform_size: u64,
    ) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: uniform_size.max(16),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let color_texture = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fullscreen Bind Group Layout"),
            entries: &[
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                color_texture(1),
                // Depth
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                color_texture(3),
                color_texture(4),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            label,
            pipeline,
            uniform_buffer,
            bind_group_layout,
        }
    }

    /// Exact texel copy into a target of `format`.
    pub fn blit(gpu: &GpuContext, format: wgpu::TextureFormat) -> Self {
        Self::new(
            gpu,
            "Blit Pass",
            include_str!("shaders/blit.wgsl"),
            format,
            16,
        )
    }

    fn create_bind_group(
        &self,
        ctx: &RenderContext,
        input: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        ctx.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(ctx.aux.depth),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(ctx.aux.normal),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(ctx.aux.uv),
                },
            ],
        })
    }

    /// Records the pass. `uniforms` is written to the pass's buffer first and
    /// may be empty when the shader has none.
    pub fn render(
        &self,
        ctx: &mut RenderContext,
        target: &wgpu::TextureView,
        input: &wgpu::TextureView,
        uniforms: &[u8],
    ) {
        if !uniforms.is_empty() {
            ctx.gpu
                .queue
                .write_buffer(&self.uniform_buffer, 0, uniforms);
        }

        let bind_group = self.create_bind_group(ctx, input);

        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
