//! The multi-pass render graph.
//!
//! Auxiliary renders fill a [`RenderTargetSet`] first. The chain then runs
//! over two ping-pong colour buffers, reading the auxiliary textures in every
//! stage:
//!
//! ```text
//! primary ──▶ outline ──▶ hatching ──▶ gamma ──▶ screen
//!    │           │            │
//!    ▼           ▼            ▼
//! Target A ◀──▶ Target B            (ping-pong)
//!
//! depth / normal / uv ─── bound read-only in every stage
//! ```

mod effect_nodes;
mod graph;
mod render_node;
mod render_target;

pub use effect_nodes::{GammaNode, HatchingNode, HatchingUniforms, OutlineNode, OutlineUniforms};
pub use graph::{RenderGraph, RenderGraphBuilder, Slot, schedule};
pub use render_node::RenderNode;
pub use render_target::{
    AUX_COLOR_FORMAT, AuxTextures, CHAIN_FORMAT, DEPTH_FORMAT, DepthAttachment, RenderContext,
    RenderTarget, RenderTargetSet, TargetDesc,
};
