//! The stage trait for the pass chain.

use crate::params::PassParameters;
use crate::render_graph::RenderContext;

/// One stage of the pass chain.
///
/// A stage reads the previous stage's colour through `input`, the auxiliary
/// textures through [`RenderContext::aux`], and writes a full frame to
/// `target`.
///
/// # Toggling
///
/// When [`enabled`](Self::enabled) returns `false` the graph copies `input`
/// to `target` unchanged instead of calling [`execute`](Self::execute). The
/// stage keeps its place in the chain, so the ping-pong order does not depend
/// on which stages are switched on.
pub trait RenderNode {
    /// Label used in logs.
    fn name(&self) -> &'static str;

    /// Whether the stage runs this frame. Stages without a toggle always run.
    fn enabled(&self, _params: &PassParameters) -> bool {
        true
    }

    /// Records the stage's commands into `ctx.encoder`.
    fn execute(
        &self,
        ctx: &mut RenderContext,
        target: &wgpu::TextureView,
        input: &wgpu::TextureView,
    );
}
