//! GPU-driven frame pipeline.
//!
//! Each frame:
//! - Refreshes the current ring slot from the scene's dirty state
//! - Expands instance transforms and culls instances on the GPU
//! - Draws all visible instances with one indirect-count draw into an
//!   offscreen target
//! - Composites that target onto the swapchain through a named postprocess
//!   effect, with an overlay hook on top
//!
//! [`Renderer`] is the entry point; [`FrameScheduler`] drives the per-frame
//! sequence and [`FrameRecorder`] enforces the recording order.

mod error;

pub mod barriers;
pub mod compute;
pub mod gpu_types;
pub mod mesh_arena;
pub mod overlay;
pub mod passes;
pub mod recorder;
pub mod renderer;
pub mod ring;
pub mod scheduler;
pub mod shaders;
pub mod targets;
pub mod upload;

pub use compute::{CullingCompute, HostCullOutput, TransformCompute, cull_on_host};
pub use error::{RenderError, RenderResult};
pub use overlay::{NoOverlay, OverlayHook};
pub use passes::{DEFAULT_EFFECT, GeometryPass, PostprocessPass};
pub use recorder::{FrameRecorder, RecordStage, StageTracker};
pub use renderer::Renderer;
pub use ring::{FrameResources, ResourceRing, RingCapacity, SlotRefresh};
pub use scheduler::{
    FrameCursor, FrameOutcome, FrameProgress, FrameScheduler, FrameStats, RebuildReason,
    SlotRecovery, SwapchainHealth,
};
