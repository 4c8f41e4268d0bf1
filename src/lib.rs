//! # Inkpass
//!
//! **Inked outlines and pen hatching on top of a wgpu scene.**
//!
//! A frame renders the scene four times: depth, view-space normals, UVs and
//! the lit primary image. The primary image then runs through a chain of
//! fullscreen stages that read those auxiliary targets:
//!
//! ```text
//! primary -> outline -> hatching -> gamma -> present
//! ```
//!
//! Any stage can be switched off at runtime; a disabled stage copies its input
//! through unchanged. Stage parameters live in [`PassParameters`] and can be
//! written from other threads through a [`ParamSender`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use inkpass::*;
//!
//! fn main() -> Result<(), AppError> {
//!     run_with_config(AppConfig::new(), |ctx| {
//!         let sphere = ctx.mesh_sphere(48, 24)?;
//!         ctx.scene.add_object(sphere, Transform::new(), Material::default());
//!
//!         Ok(move |frame: &mut Frame| {
//!             if frame.input.key_pressed(KeyCode::KeyH) {
//!                 frame.params.hatching.enabled = !frame.params.hatching.enabled;
//!             }
//!         })
//!     })
//! }
//! ```
//!
//! [`software`] runs the same stage math on the CPU over `image` buffers, for
//! tests and offline checks without a GPU.

mod app;
mod camera;
mod compositor;
mod config;
mod error;
mod fullscreen;
mod gpu;
mod input;
mod light;
mod logging;
mod mesh;
mod orbit_camera;
pub mod params;
pub mod render_graph;
mod scene;
mod scene_pass;
pub mod shading;
pub mod software;

pub use app::{AppError, Frame, SetupContext, run_with_config};
pub use camera::Camera;
pub use compositor::{Compositor, ViewportPlan};
pub use config::{AppConfig, RendererConfig};
pub use error::RenderError;
pub use gpu::{GpuContext, SurfaceErrorAction};
pub use input::Input;
pub use light::{DirectionalLight, LightDirection};
pub use logging::{FrameStats, LoggingConfig, init_logging};
pub use mesh::{Mesh, MeshData, Transform, Vertex3d};
pub use orbit_camera::OrbitCamera;
pub use params::{
    HatchingParams, OutlineParams, ParamError, ParamSender, ParamSpec, ParamValue, PassParameters,
};
pub use scene::{Material, MaterialOverride, MeshId, RenderOverrides, Scene, SceneObject};
pub use scene_pass::ScenePass;
pub use software::{GBuffer, SoftwareChain, Stage};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;
