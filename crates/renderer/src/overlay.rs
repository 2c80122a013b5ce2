//! Hook for UI drawn on top of the composited frame.

use ash::vk;

use ringframe_rhi::command::CommandBuffer;

/// Called exactly once per frame, inside the postprocess rendering scope,
/// after the composite draw and before the present transition.
///
/// Any `FnMut(&CommandBuffer, vk::Extent2D)` closure is a hook.
pub trait OverlayHook {
    fn record(&mut self, cmd: &CommandBuffer, extent: vk::Extent2D);
}

impl<F> OverlayHook for F
where
    F: FnMut(&CommandBuffer, vk::Extent2D),
{
    fn record(&mut self, cmd: &CommandBuffer, extent: vk::Extent2D) {
        self(cmd, extent)
    }
}

/// Hook that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOverlay;

impl OverlayHook for NoOverlay {
    fn record(&mut self, _cmd: &CommandBuffer, _extent: vk::Extent2D) {}
}
