//! Windowed host for the compositor.
//!
//! [`run_with_config`] opens a window, calls the setup closure once to build
//! the scene, then calls the frame closure before every render. A setup error
//! stops the app before the first frame. The frame
//! loop owns the GPU context, forwards resizes to [`Compositor::resize`], and
//! turns surface errors into skipped frames or a clean exit.
//!
//! ```ignore
//! inkpass::run_with_config(AppConfig::default(), |ctx| {
//!     let sphere = ctx.mesh_sphere(48, 24)?;
//!     ctx.scene.add_object(sphere, Transform::new(), Material::default());
//!     Ok(move |frame: &mut Frame| {
//!         frame.params.hatching.enabled = frame.time.sin() > 0.0;
//!     })
//! })?;
//! ```

use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::camera::Camera;
use crate::compositor::Compositor;
use crate::config::AppConfig;
use crate::error::RenderError;
use crate::gpu::{GpuContext, SurfaceErrorAction};
use crate::input::Input;
use crate::light::DirectionalLight;
use crate::logging::{FrameStats, init_logging};
use crate::mesh::{Mesh, MeshData};
use crate::params::{ParamSender, PassParameters};
use crate::scene::{MeshId, Scene};

/// Why the app stopped.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Passed to the setup closure once the GPU is available.
pub struct SetupContext<'a> {
    pub gpu: &'a GpuContext,
    pub scene: &'a mut Scene,
    pub camera: &'a mut Camera,
    pub light: &'a mut DirectionalLight,
    /// Cloneable handle for writing parameters from other threads.
    pub params: ParamSender,
}

impl SetupContext<'_> {
    /// Uploads mesh data and registers it with the scene. Empty or malformed
    /// data is rejected with [`RenderError::InvalidMesh`].
    pub fn add_mesh(&mut self, data: &MeshData) -> Result<MeshId, RenderError> {
        Ok(self.scene.add_mesh(Mesh::new(self.gpu, data)?))
    }

    pub fn mesh_cube(&mut self) -> Result<MeshId, RenderError> {
        self.add_mesh(&MeshData::cube())
    }

    pub fn mesh_sphere(&mut self, segments: u32, rings: u32) -> Result<MeshId, RenderError> {
        self.add_mesh(&MeshData::sphere(segments, rings))
    }
}

/// Passed to the frame closure before each render.
pub struct Frame<'a> {
    pub scene: &'a mut Scene,
    pub camera: &'a mut Camera,
    pub light: &'a mut DirectionalLight,
    /// Stage parameters; changes apply to this frame's render.
    pub params: &'a mut PassParameters,
    pub input: &'a Input,
    /// Seconds since the first frame.
    pub time: f32,
    pub dt: f32,
}

type FrameFn = Box<dyn FnMut(&mut Frame)>;
type SetupFn = Box<dyn FnOnce(&mut SetupContext) -> Result<FrameFn, AppError>>;

/// Runs the app until the window closes or rendering fails.
pub fn run_with_config<S, F>(config: AppConfig, setup: S) -> Result<(), AppError>
where
    S: FnOnce(&mut SetupContext) -> Result<F, AppError> + 'static,
    F: FnMut(&mut Frame) + 'static,
{
    init_logging(config.logging.clone());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = InkpassApp {
        state: AppState::Pending {
            config,
            setup: Some(Box::new(move |ctx: &mut SetupContext| {
                setup(ctx).map(|frame_fn| Box::new(frame_fn) as FrameFn)
            })),
        },
        error: None,
    };

    event_loop.run_app(&mut app)?;
    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct InkpassApp {
    state: AppState,
    /// First fatal error; the loop exits as soon as it is set.
    error: Option<AppError>,
}

enum AppState {
    Pending {
        config: AppConfig,
        setup: Option<SetupFn>,
    },
    Running(Box<Running>),
    Stopped,
}

struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    compositor: Compositor,
    scene: Scene,
    camera: Camera,
    light: DirectionalLight,
    input: Input,
    frame_fn: FrameFn,
    stats: FrameStats,
    start_time: Instant,
    last_frame: Instant,
}

impl InkpassApp {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        log::error!("{err}");
        if self.error.is_none() {
            self.error = Some(err);
        }
        self.state = AppState::Stopped;
        event_loop.exit();
    }

    fn start(
        event_loop: &ActiveEventLoop,
        config: &AppConfig,
        setup: SetupFn,
    ) -> Result<Running, AppError> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let gpu = GpuContext::new(window.clone())?;
        let compositor = Compositor::new(&gpu, &config.renderer)?;

        let mut scene = Scene::new();
        let mut camera = Camera::new();
        camera.set_viewport(gpu.width(), gpu.height());
        let mut light = DirectionalLight::default();

        let frame_fn = setup(&mut SetupContext {
            gpu: &gpu,
            scene: &mut scene,
            camera: &mut camera,
            light: &mut light,
            params: compositor.param_sender(),
        })?;
        // setup may have replaced the camera wholesale
        camera.set_viewport(gpu.width(), gpu.height());
        log::info!(
            "scene: {} objects, {} drawable",
            scene.objects.len(),
            scene.drawable().count()
        );

        Ok(Running {
            window,
            gpu,
            compositor,
            scene,
            camera,
            light,
            input: Input::new(),
            frame_fn,
            stats: FrameStats::default(),
            start_time: Instant::now(),
            last_frame: Instant::now(),
        })
    }
}

impl Running {
    fn redraw(&mut self) -> Result<(), RenderError> {
        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame);
        self.last_frame = now;

        (self.frame_fn)(&mut Frame {
            scene: &mut self.scene,
            camera: &mut self.camera,
            light: &mut self.light,
            params: self.compositor.params_mut(),
            input: &self.input,
            time: self.start_time.elapsed().as_secs_f32(),
            dt: frame_time.as_secs_f32(),
        });

        match self
            .compositor
            .render_frame(&self.gpu, &self.scene, &self.camera, &self.light)
        {
            Ok(()) => {
                self.stats.record(frame_time);
            }
            Err(RenderError::Surface(err)) => match self.gpu.handle_surface_error(&err) {
                SurfaceErrorAction::Fatal => return Err(RenderError::Surface(err)),
                SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                    log::debug!("skipped frame: {err}");
                }
            },
            Err(err) => return Err(err),
        }

        self.input.begin_frame();
        self.window.request_redraw();
        Ok(())
    }
}

impl ApplicationHandler for InkpassApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending { config, setup } = &mut self.state else {
            return;
        };
        let Some(setup) = setup.take() else {
            return;
        };

        match Self::start(event_loop, config, setup) {
            Ok(running) => {
                running.window.request_redraw();
                self.state = AppState::Running(Box::new(running));
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let AppState::Running(app) = &mut self.state else {
            return;
        };

        app.input.handle_event(&event);

        let result = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => {
                app.compositor
                    .resize(&mut app.gpu, &mut app.camera, size.width, size.height)
            }
            WindowEvent::RedrawRequested => app.redraw(),
            _ => Ok(()),
        };

        if let Err(err) = result {
            self.fail(event_loop, err.into());
        }
    }
}
