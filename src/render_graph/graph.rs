//! The pass chain and its builder.

use crate::error::RenderError;
use crate::fullscreen::FullscreenPass;
use crate::gpu::GpuContext;
use crate::render_graph::{
    CHAIN_FORMAT, DepthAttachment, RenderContext, RenderNode, RenderTarget, TargetDesc,
};

/// Where a stage reads from or writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
    /// The presentation surface.
    Screen,
}

/// Input and output slot of every stage, in order.
///
/// The chain is seeded in [`Slot::A`], stages alternate between the two
/// buffers, and the last stage writes to the screen.
///
/// ```text
/// Stage 0: A → B
/// Stage 1: B → A
/// Stage 2: A → Screen
/// ```
pub fn schedule(stages: usize) -> Vec<(Slot, Slot)> {
    let mut input = Slot::A;
    (0..stages)
        .map(|i| {
            let output = if i + 1 == stages {
                Slot::Screen
            } else if input == Slot::A {
                Slot::B
            } else {
                Slot::A
            };
            let step = (input, output);
            input = output;
            step
        })
        .collect()
}

/// Assembles a [`RenderGraph`]. Stages run in insertion order.
pub struct RenderGraphBuilder {
    nodes: Vec<Box<dyn RenderNode>>,
}

impl RenderGraphBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn node<N: RenderNode + 'static>(mut self, node: N) -> Self {
        self.nodes.push(Box::new(node));
        self
    }

    /// Allocates the ping-pong buffers at `width` x `height`.
    pub fn build(
        self,
        gpu: &GpuContext,
        width: u32,
        height: u32,
    ) -> Result<RenderGraph, RenderError> {
        let [target_a, target_b] =
            RenderGraph::allocate_targets(gpu, RenderGraph::plan(width, height))?;
        log::debug!(
            "render graph: {}",
            self.nodes
                .iter()
                .map(|n| n.name())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        Ok(RenderGraph {
            nodes: self.nodes,
            target_a,
            target_b,
            passthrough: FullscreenPass::blit(gpu, CHAIN_FORMAT),
        })
    }
}

impl Default for RenderGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed, ordered chain of screen-space stages.
///
/// The caller renders the chain's input into [`input_view`](Self::input_view)
/// before calling [`execute`](Self::execute). Stage order never changes after
/// [`build`](RenderGraphBuilder::build); a stage whose
/// [`enabled`](RenderNode::enabled) flag is off is replaced for that frame by
/// an exact copy, so the output equals that of a chain without the stage.
///
/// The last stage presents and always runs.
pub struct RenderGraph {
    nodes: Vec<Box<dyn RenderNode>>,
    target_a: RenderTarget,
    target_b: RenderTarget,
    passthrough: FullscreenPass,
}

impl RenderGraph {
    pub fn builder() -> RenderGraphBuilder {
        RenderGraphBuilder::new()
    }

    /// Descriptors for the two ping-pong buffers at the given size.
    pub fn plan(width: u32, height: u32) -> [TargetDesc; 2] {
        let desc = |label| TargetDesc {
            label,
            width,
            height,
            format: CHAIN_FORMAT,
            sample_count: 1,
            depth: DepthAttachment::None,
        };
        [desc("RenderGraph Target A"), desc("RenderGraph Target B")]
    }

    pub(crate) fn allocate_targets(
        gpu: &GpuContext,
        [a, b]: [TargetDesc; 2],
    ) -> Result<[RenderTarget; 2], RenderError> {
        Ok([RenderTarget::new(gpu, a)?, RenderTarget::new(gpu, b)?])
    }

    /// Swaps in a pair allocated by [`allocate_targets`](Self::allocate_targets).
    pub(crate) fn replace_targets(&mut self, [a, b]: [RenderTarget; 2]) {
        self.target_a = a;
        self.target_b = b;
    }

    pub fn size(&self) -> (u32, u32) {
        self.target_a.size()
    }

    /// Stage names in execution order.
    pub fn stages(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.nodes.iter().map(|n| n.name())
    }

    /// The buffer the chain reads first.
    pub fn input_view(&self) -> &wgpu::TextureView {
        &self.target_a.view
    }

    fn view<'s>(&'s self, slot: Slot, screen: &'s wgpu::TextureView) -> &'s wgpu::TextureView {
        match slot {
            Slot::A => &self.target_a.view,
            Slot::B => &self.target_b.view,
            Slot::Screen => screen,
        }
    }

    /// Records every stage into `ctx.encoder`, ending on `screen`.
    pub fn execute(&self, ctx: &mut RenderContext, screen: &wgpu::TextureView) {
        let last = self.nodes.len().saturating_sub(1);
        for (i, (node, (input, output))) in self
            .nodes
            .iter()
            .zip(schedule(self.nodes.len()))
            .enumerate()
        {
            let input = self.view(input, screen);
            let output = self.view(output, screen);
            if i == last || node.enabled(ctx.params) {
                node.execute(ctx, output, input);
            } else {
                self.passthrough.render(ctx, output, input, &[]);
            }
        }
    }
}
