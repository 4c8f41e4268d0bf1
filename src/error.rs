//! Error types for the render pipeline.
//!
//! Errors fall into two groups. Configuration errors (failed target
//! allocation, invalid extents, device setup) invalidate the pass chain until
//! a reallocation succeeds. Per-frame errors (surface acquisition) only cost
//! the current frame. [`RenderError::is_fatal`] tells them apart.

/// Errors raised by the GPU context, render targets and the compositor.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// A render target could not be created at the requested size or format.
    #[error("failed to allocate render target '{label}' at {width}x{height}: {reason}")]
    TargetAllocation {
        label: &'static str,
        width: u32,
        height: u32,
        reason: String,
    },

    /// The requested viewport extent is zero or exceeds the device limit.
    #[error("invalid viewport extent {width}x{height} (device maximum {max})")]
    InvalidExtent { width: u32, height: u32, max: u32 },

    /// A colour image and the auxiliary buffers it is composited with differ
    /// in size.
    #[error("colour image is {color:?} but auxiliary buffers are {aux:?}")]
    SizeMismatch { color: (u32, u32), aux: (u32, u32) },

    /// Mesh data that cannot be drawn (no triangles, or indices out of range).
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// No adapter compatible with the window surface was found.
    #[error("no suitable GPU adapter found: {0}")]
    AdapterNotFound(String),

    /// The adapter refused to create a logical device.
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),

    /// The window surface could not be created.
    #[error("failed to create window surface: {0}")]
    SurfaceCreation(String),

    /// The surface texture for this frame could not be acquired.
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

impl RenderError {
    /// Returns `true` when the error invalidates the current configuration
    /// rather than just the current frame.
    pub fn is_fatal(&self) -> bool {
        match self {
            RenderError::Surface(err) => matches!(err, wgpu::SurfaceError::OutOfMemory),
            _ => true,
        }
    }
}
