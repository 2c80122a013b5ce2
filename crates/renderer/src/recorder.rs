//! Ordered recording of one frame's command buffer.
//!
//! ```text
//! Begin -> ClearTransients -> [TransformDispatch] -> CullingDispatch
//!   -> OffscreenPass -> OffscreenToShaderRead -> PostprocessPass
//!   -> SwapchainPresentTransition -> End
//! ```
//!
//! [`StageTracker`] enforces the order; [`FrameRecorder`] records each step
//! through it, so a step called out of order records nothing and returns
//! [`RenderError::InvalidStage`].

use ash::vk;
use tracing::{Span, error, trace};

use ringframe_rhi::command::CommandBuffer;

use crate::barriers::ImageTransition;
use crate::compute::{CullingCompute, TransformCompute};
use crate::error::{RenderError, RenderResult};
use crate::gpu_types::{CullCounters, DrawCommand};
use crate::mesh_arena::MeshArena;
use crate::overlay::OverlayHook;
use crate::passes::{GeometryPass, PostprocessPass};
use crate::ring::FrameResources;
use crate::targets::FrameTargets;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordStage {
    /// Nothing recorded yet.
    Idle,
    Begin,
    ClearTransients,
    TransformDispatch,
    CullingDispatch,
    OffscreenPass,
    OffscreenToShaderRead,
    PostprocessPass,
    SwapchainPresentTransition,
    End,
}

impl RecordStage {
    fn may_follow(self, previous: RecordStage) -> bool {
        use RecordStage::*;
        matches!(
            (previous, self),
            (Idle | End, Begin)
                | (Begin, ClearTransients)
                | (ClearTransients, TransformDispatch | CullingDispatch)
                | (TransformDispatch, CullingDispatch)
                | (CullingDispatch, OffscreenPass)
                | (OffscreenPass, OffscreenToShaderRead)
                | (OffscreenToShaderRead, PostprocessPass)
                | (PostprocessPass, SwapchainPresentTransition)
                | (SwapchainPresentTransition, End)
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StageTracker {
    current: RecordStage,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self {
            current: RecordStage::Idle,
        }
    }
}

impl StageTracker {
    pub fn current(&self) -> RecordStage {
        self.current
    }

    /// Moves to `to`, or fails leaving the current stage unchanged.
    pub fn advance(&mut self, to: RecordStage) -> RenderResult<()> {
        if !to.may_follow(self.current) {
            return Err(RenderError::InvalidStage {
                from: self.current,
                to,
            });
        }
        self.current = to;
        Ok(())
    }
}

/// Records one frame into a command buffer.
pub struct FrameRecorder<'a> {
    cmd: &'a CommandBuffer,
    tracker: StageTracker,
    span: Span,
}

impl<'a> FrameRecorder<'a> {
    /// Resets `cmd` and begins recording.
    pub fn begin(cmd: &'a CommandBuffer, frame_number: u64) -> RenderResult<Self> {
        let mut recorder = Self {
            cmd,
            tracker: StageTracker::default(),
            span: tracing::debug_span!("frame_recorder", frame = frame_number),
        };
        recorder.step(RecordStage::Begin)?;

        let _enter = recorder.span.enter();
        let begun = cmd.reset().and_then(|()| cmd.begin());
        if let Err(e) = begun {
            error!("Failed to begin command buffer: {}", e);
            return Err(e.into());
        }
        drop(_enter);
        Ok(recorder)
    }

    pub fn stage(&self) -> RecordStage {
        self.tracker.current()
    }

    fn step(&mut self, to: RecordStage) -> RenderResult<()> {
        let _enter = self.span.enter();
        match self.tracker.advance(to) {
            Ok(()) => {
                trace!("{:?}", to);
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }

    /// Zeroes the counters and every draw command's `instance_count`.
    pub fn clear_transients(&mut self, frame: &FrameResources, group_count: u32) -> RenderResult<()> {
        self.step(RecordStage::ClearTransients)?;

        self.cmd
            .fill_buffer(frame.counters().handle(), 0, CullCounters::SIZE, 0);
        // One fill per command: only `instance_count` is per-frame, the other
        // fields are written by the ring refresh only when the layout changes.
        for group in 0..group_count as vk::DeviceSize {
            let offset = group * DrawCommand::STRIDE as vk::DeviceSize + DrawCommand::INSTANCE_COUNT_OFFSET;
            self.cmd
                .fill_buffer(frame.draw_commands().handle(), offset, size_of::<u32>() as vk::DeviceSize, 0);
        }
        Ok(())
    }

    pub fn transform_dispatch(
        &mut self,
        compute: &TransformCompute,
        frame: &FrameResources,
        instance_count: u32,
    ) -> RenderResult<()> {
        self.step(RecordStage::TransformDispatch)?;
        compute.record(self.cmd, frame, instance_count);
        Ok(())
    }

    pub fn culling_dispatch(
        &mut self,
        compute: &CullingCompute,
        frame: &FrameResources,
        instance_count: u32,
    ) -> RenderResult<()> {
        self.step(RecordStage::CullingDispatch)?;
        compute.record(self.cmd, frame, instance_count);
        Ok(())
    }

    pub fn offscreen_pass(
        &mut self,
        pass: &GeometryPass,
        frame: &FrameResources,
        targets: &FrameTargets,
        arena: Option<&MeshArena>,
        max_draws: u32,
    ) -> RenderResult<()> {
        self.step(RecordStage::OffscreenPass)?;
        pass.record(self.cmd, frame, targets, arena, max_draws);
        Ok(())
    }

    pub fn offscreen_to_shader_read(&mut self, targets: &FrameTargets) -> RenderResult<()> {
        self.step(RecordStage::OffscreenToShaderRead)?;
        self.cmd.image_barriers(&[ImageTransition::ColorAttachmentToShaderRead
            .barrier(targets.color.handle(), targets.color.aspect())]);
        Ok(())
    }

    /// Transitions the swapchain image to a color attachment and composites
    /// into it, overlay included.
    pub fn postprocess_pass(
        &mut self,
        pass: &PostprocessPass,
        slot: usize,
        swapchain_image: (vk::Image, vk::ImageView),
        extent: vk::Extent2D,
        overlay: &mut dyn OverlayHook,
    ) -> RenderResult<()> {
        self.step(RecordStage::PostprocessPass)?;
        let (image, view) = swapchain_image;
        self.cmd.image_barriers(&[
            ImageTransition::UndefinedToColorAttachment.barrier(image, vk::ImageAspectFlags::COLOR)
        ]);
        pass.record(self.cmd, slot, view, extent, overlay);
        Ok(())
    }

    pub fn present_transition(&mut self, swapchain_image: vk::Image) -> RenderResult<()> {
        self.step(RecordStage::SwapchainPresentTransition)?;
        self.cmd.image_barriers(&[ImageTransition::ColorAttachmentToPresent
            .barrier(swapchain_image, vk::ImageAspectFlags::COLOR)]);
        Ok(())
    }

    pub fn end(mut self) -> RenderResult<()> {
        self.step(RecordStage::End)?;
        let _enter = self.span.enter();
        self.cmd.end().map_err(|e| {
            error!("Failed to end command buffer: {}", e);
            e.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::RecordStage::*;

    const FULL_FRAME: [RecordStage; 9] = [
        Begin,
        ClearTransients,
        TransformDispatch,
        CullingDispatch,
        OffscreenPass,
        OffscreenToShaderRead,
        PostprocessPass,
        SwapchainPresentTransition,
        End,
    ];

    fn run(stages: &[RecordStage]) -> RenderResult<StageTracker> {
        let mut tracker = StageTracker::default();
        for &stage in stages {
            tracker.advance(stage)?;
        }
        Ok(tracker)
    }

    #[test]
    fn test_full_frame_is_legal() {
        assert_eq!(run(&FULL_FRAME).unwrap().current(), End);
    }

    #[test]
    fn test_transform_dispatch_is_optional() {
        let without: Vec<_> = FULL_FRAME
            .iter()
            .copied()
            .filter(|&s| s != TransformDispatch)
            .collect();
        assert_eq!(run(&without).unwrap().current(), End);
    }

    #[test]
    fn test_consecutive_frames() {
        let mut frames = FULL_FRAME.to_vec();
        frames.extend_from_slice(&FULL_FRAME);
        assert!(run(&frames).is_ok());
    }

    #[test]
    fn test_skipping_culling_is_rejected() {
        let err = run(&[Begin, ClearTransients, OffscreenPass]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidStage {
                from: ClearTransients,
                to: OffscreenPass
            }
        ));
    }

    #[test]
    fn test_failed_advance_keeps_stage() {
        let mut tracker = run(&[Begin, ClearTransients, CullingDispatch]).unwrap();
        assert!(tracker.advance(TransformDispatch).is_err());
        assert_eq!(tracker.current(), CullingDispatch);
        assert!(tracker.advance(OffscreenPass).is_ok());
    }

    #[test]
    fn test_must_begin_first() {
        assert!(run(&[ClearTransients]).is_err());
        assert!(run(&[Begin, Begin]).is_err());
        assert!(run(&[Begin, ClearTransients, CullingDispatch, End]).is_err());
    }
}
