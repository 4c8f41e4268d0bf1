//! Per-frame orchestration of the render graph.
//!
//! Each [`Compositor::render_frame`] runs, in order:
//!
//! 1. queued parameter writes are applied
//! 2. the light direction is projected into the camera's view space
//! 3. frame and model uniforms are uploaded
//! 4. depth, normal and UV renders fill the auxiliary targets
//! 5. the primary render seeds the chain
//! 6. outline, hatching and gamma run, the last one into the surface
//!
//! All of it is recorded into one encoder and submitted once.
//!
//! A viewport change is planned by [`ViewportPlan`] before the GPU is touched,
//! then every new target is allocated before any old one is replaced.

use crate::camera::Camera;
use crate::config::RendererConfig;
use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::light::{DirectionalLight, LightDirection};
use crate::params::{ParamQueue, ParamSender, PassParameters};
use crate::render_graph::{
    AUX_COLOR_FORMAT, DEPTH_FORMAT, GammaNode, HatchingNode, OutlineNode, RenderContext,
    RenderGraph, RenderTargetSet, TargetDesc,
};
use crate::scene::Scene;
use crate::scene_pass::ScenePass;

/// Sizes for every resource a viewport change touches.
///
/// The auxiliary targets, both chain buffers, the primary depth buffer, the
/// surface and the camera aspect all derive from one `width` x `height`, so a
/// plan can never describe a partial resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportPlan {
    pub width: u32,
    pub height: u32,
    pub aux: [TargetDesc; 3],
    pub chain: [TargetDesc; 2],
}

impl ViewportPlan {
    /// Plans a viewport of `width` x `height`.
    ///
    /// Returns `Ok(None)` for a zero-sized viewport (minimised window), which
    /// callers skip. Every descriptor is validated against `max_dimension`
    /// here, before anything is allocated.
    pub fn new(
        width: u32,
        height: u32,
        samples: u32,
        max_dimension: u32,
    ) -> Result<Option<Self>, RenderError> {
        if width == 0 || height == 0 {
            return Ok(None);
        }
        let plan = Self {
            width,
            height,
            aux: RenderTargetSet::plan(width, height, samples),
            chain: RenderGraph::plan(width, height),
        };
        for desc in plan.targets() {
            desc.validate(max_dimension)?;
        }
        Ok(Some(plan))
    }

    /// Auxiliary then chain descriptors.
    pub fn targets(&self) -> impl Iterator<Item = &TargetDesc> {
        self.aux.iter().chain(self.chain.iter())
    }

    /// Camera aspect ratio for this viewport.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

pub struct Compositor {
    targets: RenderTargetSet,
    scene_pass: ScenePass,
    graph: RenderGraph,
    params: PassParameters,
    queue: ParamQueue,
    exposure: f32,
    light: LightDirection,
}

impl Compositor {
    /// Allocates every target at the surface size and builds the chain.
    pub fn new(gpu: &GpuContext, config: &RendererConfig) -> Result<Self, RenderError> {
        // normal and UV targets multisample both their colour and depth buffers
        let samples = gpu.supported_samples(&[AUX_COLOR_FORMAT, DEPTH_FORMAT], config.samples);
        if samples != config.samples {
            log::warn!(
                "{}x multisampling unsupported for auxiliary targets, using {samples}x",
                config.samples
            );
        }

        let (width, height) = (gpu.width(), gpu.height());
        let max = gpu.max_texture_dimension();
        let plan = ViewportPlan::new(width, height, samples, max)?.ok_or(
            RenderError::InvalidExtent {
                width,
                height,
                max,
            },
        )?;
        let targets = RenderTargetSet::from_plan(gpu, plan.aux, samples)?;
        let scene_pass = ScenePass::new(gpu, samples);
        let graph = RenderGraph::builder()
            .node(OutlineNode::new(gpu))
            .node(HatchingNode::new(gpu))
            .node(GammaNode::new(gpu, gpu.config.format))
            .build(gpu, width, height)?;

        log::info!(
            "compositor ready at {width}x{height}, {samples}x aux samples, chain: primary -> {}",
            graph.stages().collect::<Vec<_>>().join(" -> ")
        );

        Ok(Self {
            targets,
            scene_pass,
            graph,
            params: config.params,
            queue: ParamQueue::new(),
            exposure: config.exposure,
            light: LightDirection::default(),
        })
    }

    /// Current stage parameters.
    pub fn params(&self) -> &PassParameters {
        &self.params
    }

    /// Direct access for hosts that edit parameters on the frame thread.
    pub fn params_mut(&mut self) -> &mut PassParameters {
        &mut self.params
    }

    /// A handle for writing parameters from other threads. Writes land at the
    /// start of the next frame.
    pub fn param_sender(&self) -> ParamSender {
        self.queue.sender()
    }

    /// The light direction used by the most recent frame.
    pub fn light_direction(&self) -> LightDirection {
        self.light
    }

    /// Size shared by the auxiliary targets and the chain buffers.
    pub fn target_size(&self) -> (u32, u32) {
        self.targets.size()
    }

    /// Renders and presents one frame.
    ///
    /// Surface acquisition failures come back as [`RenderError::Surface`] for
    /// the frame loop to handle; nothing has been submitted in that case.
    pub fn render_frame(
        &mut self,
        gpu: &GpuContext,
        scene: &Scene,
        camera: &Camera,
        light: &DirectionalLight,
    ) -> Result<(), RenderError> {
        let applied = self.queue.apply_pending(&mut self.params);
        if applied > 0 {
            log::debug!("applied {applied} parameter writes");
        }

        self.light = LightDirection::project(camera, light);
        self.scene_pass
            .prepare(gpu, scene, camera, light, self.exposure);

        let frame = gpu.surface.get_current_texture()?;
        let screen = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.scene_pass
            .render_depth(&mut encoder, scene, &self.targets.depth);
        self.scene_pass
            .render_normals(&mut encoder, scene, &self.targets.normal);
        self.scene_pass
            .render_uv(&mut encoder, scene, &self.targets.uv);
        self.scene_pass
            .render_primary(&mut encoder, scene, self.graph.input_view());

        {
            let mut ctx = RenderContext {
                gpu,
                encoder: &mut encoder,
                camera,
                light: self.light,
                aux: self.targets.textures(),
                params: &self.params,
            };
            self.graph.execute(&mut ctx, &screen);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Handles a viewport change: camera aspect, every render target and the
    /// presentation surface move to `width` x `height` together.
    ///
    /// A zero-sized viewport (minimised window) is ignored. On error nothing
    /// has been replaced: targets, surface and camera all keep the previous
    /// size, and the call can be retried.
    pub fn resize(
        &mut self,
        gpu: &mut GpuContext,
        camera: &mut Camera,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        let samples = self.targets.samples();
        let Some(plan) = ViewportPlan::new(width, height, samples, gpu.max_texture_dimension())?
        else {
            log::debug!("ignoring resize to {width}x{height}");
            return Ok(());
        };

        let targets = RenderTargetSet::from_plan(gpu, plan.aux, samples)?;
        let chain = RenderGraph::allocate_targets(gpu, plan.chain)?;

        self.targets = targets;
        self.graph.replace_targets(chain);
        self.scene_pass
            .ensure_depth_size(gpu, plan.width, plan.height);
        gpu.resize(plan.width, plan.height);
        camera.set_viewport(plan.width, plan.height);

        log::info!("resized render targets to {width}x{height}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn one_plan_sizes_every_target_and_the_camera() {
        for (w, h) in [(1, 1), (640, 480), (1920, 1080), (3001, 17)] {
            let plan = ViewportPlan::new(w, h, 2, 8192).unwrap().unwrap();
            assert_eq!(plan.targets().count(), 5);
            assert!(plan.targets().all(|d| (d.width, d.height) == (w, h)));

            let mut camera = Camera::new();
            camera.set_viewport(plan.width, plan.height);
            assert_relative_eq!(camera.aspect, plan.aspect());
        }
    }

    #[test]
    fn zero_sized_viewport_is_skipped() {
        assert_eq!(ViewportPlan::new(0, 480, 2, 8192).unwrap(), None);
        assert_eq!(ViewportPlan::new(640, 0, 2, 8192).unwrap(), None);
    }

    #[test]
    fn oversized_viewport_fails_before_allocation() {
        let err = ViewportPlan::new(9000, 480, 2, 8192).unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidExtent {
                width: 9000,
                max: 8192,
                ..
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn plan_keeps_aux_sample_count_and_single_sampled_chain() {
        let plan = ViewportPlan::new(800, 600, 4, 8192).unwrap().unwrap();
        let [depth, normal, uv] = plan.aux;
        assert_eq!(depth.sample_count, 1);
        assert_eq!((normal.sample_count, uv.sample_count), (4, 4));
        assert!(plan.chain.iter().all(|d| d.sample_count == 1));
    }
}
