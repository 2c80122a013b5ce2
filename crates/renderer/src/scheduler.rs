//! Per-frame orchestration: fences, acquire, refresh, record, submit, present.
//!
//! # Synchronization Flow
//!
//! ```text
//! 1. Wait on the slot's in-flight fence (previous use of this ring slot)
//! 2. Acquire a swapchain image (signals the slot's acquire semaphore)
//! 3. Wait on the fence of the slot that last rendered into that image
//! 4. Refresh the slot's buffers from the scene's dirty state
//! 5. Record, reset the slot fence, submit:
//!    - wait on the acquire semaphore at color attachment output
//!    - signal the image's render-finished semaphore and the slot fence
//! 6. Present (waits on render-finished)
//! 7. Advance the frame cursor
//! ```
//!
//! Out-of-date or suboptimal swapchains and window resizes rebuild every
//! swapchain-sized resource behind a device-idle wait.
//!
//! A failure between steps 2 and 5 loses the frame. The slot gets a fresh
//! acquire semaphore (and a signaled fence if it was reset), the image goes
//! back to its previous owner, and the next frame rebuilds the swapchain to
//! release the image that was never presented.

use std::sync::Arc;

use ash::vk;
use tracing::{Span, debug, info, warn};

use ringframe_core::PipelineConfig;
use ringframe_rhi::RhiError;
use ringframe_rhi::command::{CommandBuffer, CommandPool};
use ringframe_rhi::device::Device;
use ringframe_rhi::instance::Instance;
use ringframe_rhi::swapchain::{AcquireOutcome, PresentOutcome, Swapchain};
use ringframe_rhi::sync::{Fence, Semaphore};
use ringframe_scene::{Camera, SceneState};

use crate::compute::{CullingCompute, TransformCompute};
use crate::error::RenderResult;
use crate::gpu_types::CullCounters;
use crate::mesh_arena::MeshArena;
use crate::overlay::OverlayHook;
use crate::passes::{GeometryPass, PostprocessPass};
use crate::recorder::FrameRecorder;
use crate::ring::{ResourceRing, RingCapacity, SlotRefresh};
use crate::targets::OffscreenTargets;
use crate::upload;

// ============================================================================
// Bookkeeping
// ============================================================================

/// Monotonic frame number and the ring slot it maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCursor {
    frame_number: u64,
    ring_size: usize,
}

impl FrameCursor {
    pub fn new(ring_size: usize) -> Self {
        Self {
            frame_number: 0,
            ring_size: ring_size.max(1),
        }
    }

    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    #[inline]
    pub fn slot(&self) -> usize {
        (self.frame_number % self.ring_size as u64) as usize
    }

    pub fn advance(&mut self) {
        self.frame_number += 1;
    }
}

/// Latest surface size reported by the window, and whether the swapchain
/// still has to catch up with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainHealth {
    extent: vk::Extent2D,
    pending: Option<RebuildReason>,
}

impl SwapchainHealth {
    pub fn new(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            pending: None,
        }
    }

    /// Records a new window size. Zero-sized (minimized) or unchanged sizes
    /// are ignored; returns whether a rebuild is now pending.
    pub fn request_resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return self.is_rebuild_pending();
        }
        let extent = vk::Extent2D { width, height };
        if extent != self.extent {
            self.extent = extent;
            self.pending = Some(RebuildReason::Resized);
        }
        self.is_rebuild_pending()
    }

    /// Asks for a rebuild at the current size. An already pending resize
    /// keeps its reason.
    pub fn request_rebuild(&mut self, reason: RebuildReason) {
        self.pending.get_or_insert(reason);
    }

    pub fn is_rebuild_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Clears the pending rebuild, returning the size to rebuild at and why.
    pub fn take_pending(&mut self) -> Option<(vk::Extent2D, RebuildReason)> {
        self.pending.take().map(|reason| (self.extent, reason))
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildReason {
    OutOfDate,
    Suboptimal,
    Resized,
    /// A frame failed after acquiring an image it never presented.
    FrameLost,
}

/// How far one frame got between acquiring an image and submitting.
///
/// When the frame fails in between, [`recovery`](Self::recovery) says what
/// has to be replaced so the ring slot and the image can be used again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameProgress {
    /// Acquired image and the slot that owned it before this frame.
    acquired: Option<(u32, Option<usize>)>,
    fence_reset: bool,
    submitted: bool,
}

impl FrameProgress {
    pub fn acquired(&mut self, image_index: u32, previous_owner: Option<usize>) {
        self.acquired = Some((image_index, previous_owner));
    }

    pub fn fence_reset(&mut self) {
        self.fence_reset = true;
    }

    pub fn submitted(&mut self) {
        self.submitted = true;
    }

    pub fn recovery(&self) -> SlotRecovery {
        if self.submitted {
            return SlotRecovery::default();
        }
        SlotRecovery {
            fresh_acquire_semaphore: self.acquired.is_some(),
            restore_image_owner: self.acquired,
            signaled_fence: self.fence_reset,
            rebuild_swapchain: self.acquired.is_some(),
        }
    }
}

/// Repairs for a ring slot whose frame failed before submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotRecovery {
    /// The acquire semaphore has a signal pending that nothing will wait on.
    pub fresh_acquire_semaphore: bool,
    /// `(image, owner)`: hand the image back to the slot that rendered it last.
    pub restore_image_owner: Option<(u32, Option<usize>)>,
    /// The fence was reset with no submission to signal it again.
    pub signaled_fence: bool,
    /// The acquired image is still held by the application.
    pub rebuild_swapchain: bool,
}

impl SlotRecovery {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }

    pub fn restore_owners(&self, images_in_flight: &mut [Option<usize>]) {
        if let Some((image, owner)) = self.restore_image_owner
            && let Some(entry) = images_in_flight.get_mut(image as usize)
        {
            *entry = owner;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented; the swapchain may have been
    /// rebuilt afterwards.
    Presented { rebuild: Option<RebuildReason> },
    /// Nothing was submitted; the swapchain was rebuilt instead.
    Skipped(RebuildReason),
}

impl FrameOutcome {
    pub fn presented(&self) -> bool {
        matches!(self, FrameOutcome::Presented { .. })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame_number: u64,
    /// Culling result of the previous submission that used this slot.
    pub visible_instances: u32,
    pub draw_count: u32,
    pub rebuilt: bool,
}

// ============================================================================
// Scheduler
// ============================================================================

struct SlotSync {
    command_buffer: CommandBuffer,
    in_flight: Fence,
    image_available: Semaphore,
    /// Set once the slot has been submitted, so its counters hold a result.
    submitted: bool,
}

impl SlotSync {
    fn new(device: &Arc<Device>, pool: &CommandPool) -> RenderResult<Self> {
        Ok(Self {
            command_buffer: CommandBuffer::new(device.clone(), pool)?,
            // Signaled so the first wait returns immediately.
            in_flight: Fence::new(device.clone(), true)?,
            image_available: Semaphore::new(device.clone())?,
            submitted: false,
        })
    }
}

pub struct FrameScheduler {
    postprocess: PostprocessPass,
    geometry: GeometryPass,
    culling: CullingCompute,
    transform: TransformCompute,
    arena: Option<MeshArena>,
    targets: OffscreenTargets,
    ring: ResourceRing,
    slots: Vec<SlotSync>,
    render_finished: Vec<Semaphore>,
    /// Slot that last rendered into each swapchain image.
    images_in_flight: Vec<Option<usize>>,
    swapchain: Swapchain,
    // Owns the slots' command buffers; dropped after them.
    _command_pool: CommandPool,
    health: SwapchainHealth,
    cursor: FrameCursor,
    fence_timeout_ns: u64,
    stats: FrameStats,
    device: Arc<Device>,
    span: Span,
}

impl FrameScheduler {
    /// Creates the swapchain and every per-frame resource.
    ///
    /// `config` must already have been validated.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        extent: vk::Extent2D,
        config: &PipelineConfig,
        scene: &SceneState,
    ) -> RenderResult<Self> {
        let span = tracing::info_span!("frame_scheduler");
        let _enter = span.enter();

        let limits = device.limits();
        if limits.max_draw_indirect_count < config.max_draw_groups {
            warn!(
                "Device supports {} indirect draws, fewer than the {} draw groups configured",
                limits.max_draw_indirect_count, config.max_draw_groups
            );
        }

        let swapchain = Swapchain::new(instance, device.clone(), surface, extent)?;
        let graphics_family = device.queue_families().graphics_family.ok_or_else(|| {
            RhiError::InvalidHandle("Device has no graphics queue family".to_string())
        })?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let capacity = RingCapacity::new(config.initial_instance_capacity, 1)
            .grown_to(&RingCapacity::required_by(scene));
        let ring = ResourceRing::new(device.clone(), config.frames_in_flight, capacity)?;

        let shader_dir = config.shader_dir.as_path();
        let transform = TransformCompute::new(device.clone(), shader_dir, config.workgroup_size)?;
        let culling = CullingCompute::new(device.clone(), shader_dir, config.workgroup_size)?;
        let geometry = GeometryPass::new(device.clone(), shader_dir)?;
        let postprocess =
            PostprocessPass::new(device.clone(), shader_dir, swapchain.format(), ring.len())?;

        let targets = OffscreenTargets::new(device.clone(), ring.len(), swapchain.extent())?;
        postprocess.bind_targets(&targets);

        let slots = (0..ring.len())
            .map(|_| SlotSync::new(&device, &command_pool))
            .collect::<RenderResult<Vec<_>>>()?;
        let render_finished = Self::create_image_semaphores(&device, swapchain.image_count())?;
        let images_in_flight = vec![None; swapchain.image_count()];

        let arena = MeshArena::upload(device.clone(), scene)?;

        info!(
            "Frame scheduler ready: {} slots, {} swapchain images, {}x{}",
            ring.len(),
            swapchain.image_count(),
            swapchain.extent().width,
            swapchain.extent().height
        );
        let health = SwapchainHealth::new(swapchain.extent());
        let cursor = FrameCursor::new(ring.len());
        drop(_enter);

        Ok(Self {
            postprocess,
            geometry,
            culling,
            transform,
            arena,
            targets,
            ring,
            slots,
            render_finished,
            images_in_flight,
            swapchain,
            _command_pool: command_pool,
            health,
            cursor,
            fence_timeout_ns: config.fence_timeout_ns(),
            stats: FrameStats::default(),
            device,
            span,
        })
    }

    fn create_image_semaphores(device: &Arc<Device>, count: usize) -> RenderResult<Vec<Semaphore>> {
        (0..count)
            .map(|_| Semaphore::new(device.clone()).map_err(Into::into))
            .collect()
    }

    /// Queues a rebuild at the new window size; takes effect at the start of
    /// the next [`render_frame`](Self::render_frame).
    pub fn request_resize(&mut self, width: u32, height: u32) {
        if self.health.request_resize(width, height) {
            let _enter = self.span.enter();
            debug!("Resize to {}x{} pending", width, height);
        }
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn frame_number(&self) -> u64 {
        self.cursor.frame_number()
    }

    pub fn postprocess(&self) -> &PostprocessPass {
        &self.postprocess
    }

    pub fn postprocess_mut(&mut self) -> &mut PostprocessPass {
        &mut self.postprocess
    }

    /// Renders and presents one frame.
    ///
    /// A pending resize or an out-of-date swapchain rebuilds and returns
    /// [`FrameOutcome::Skipped`] without submitting. The frame cursor
    /// advances either way.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the frame; [`RenderError::is_device_fatal`]
    /// tells whether the device is gone.
    ///
    /// [`RenderError::is_device_fatal`]: crate::RenderError::is_device_fatal
    pub fn render_frame(
        &mut self,
        scene: &mut SceneState,
        camera: &Camera,
        overlay: &mut dyn OverlayHook,
    ) -> RenderResult<FrameOutcome> {
        let span = self.span.clone();
        let _enter = span.enter();

        if let Some((extent, reason)) = self.health.take_pending() {
            debug!("{:?} rebuild pending, rebuilding before acquire", reason);
            return self.skip_frame(extent, reason);
        }

        self.postprocess.reload_changed()?;
        self.sync_scene(scene)?;

        let slot = self.cursor.slot();
        self.slots[slot].in_flight.wait(self.fence_timeout_ns)?;
        let counters = self.read_counters(slot)?;

        let mut progress = FrameProgress::default();
        let acquired = match self.acquire_and_submit(slot, scene, camera, overlay, &mut progress) {
            Ok(acquired) => acquired,
            Err(e) => {
                self.abandon_frame(slot, progress.recovery());
                self.cursor.advance();
                return Err(e);
            }
        };
        let Some((image_index, mut rebuild)) = acquired else {
            debug!("Swapchain out of date at acquire");
            return self.skip_frame(self.health.extent(), RebuildReason::OutOfDate);
        };

        let presented = self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.render_finished[image_index as usize].handle(),
        );
        match presented {
            Ok(PresentOutcome::Presented) => {}
            Ok(PresentOutcome::Suboptimal) => rebuild = Some(RebuildReason::Suboptimal),
            Ok(PresentOutcome::OutOfDate) => rebuild = Some(RebuildReason::OutOfDate),
            Err(e) => {
                self.cursor.advance();
                return Err(e.into());
            }
        }
        if let Some((_, reason)) = self.health.take_pending() {
            rebuild = Some(reason);
        }

        self.stats = FrameStats {
            frame_number: self.cursor.frame_number(),
            visible_instances: counters.visible_instances,
            draw_count: counters.draw_count,
            rebuilt: rebuild.is_some(),
        };

        if let Some(reason) = rebuild {
            debug!("Rebuilding after present: {:?}", reason);
            self.rebuild(self.health.extent())?;
        }

        self.cursor.advance();
        Ok(FrameOutcome::Presented { rebuild })
    }

    /// Acquires an image, refreshes and records the slot, and submits.
    /// Returns `None` when the swapchain was out of date at acquire.
    fn acquire_and_submit(
        &mut self,
        slot: usize,
        scene: &mut SceneState,
        camera: &Camera,
        overlay: &mut dyn OverlayHook,
        progress: &mut FrameProgress,
    ) -> RenderResult<Option<(u32, Option<RebuildReason>)>> {
        let acquire_semaphore = self.slots[slot].image_available.handle();
        let (image_index, rebuild) = match self.swapchain.acquire_next_image(acquire_semaphore)? {
            AcquireOutcome::Ready { index, suboptimal } => {
                (index, suboptimal.then_some(RebuildReason::Suboptimal))
            }
            AcquireOutcome::OutOfDate => return Ok(None),
        };

        let previous = self.images_in_flight[image_index as usize].replace(slot);
        progress.acquired(image_index, previous);
        if let Some(previous) = previous
            && previous != slot
        {
            self.slots[previous].in_flight.wait(self.fence_timeout_ns)?;
        }

        let uniforms = upload::frame_uniforms(
            camera,
            scene.total_instance_count(),
            scene.total_model_count(),
        );
        let refresh = self.ring.refresh_slot(slot, scene, &uniforms)?;

        self.record(
            slot,
            image_index,
            &refresh,
            scene.total_instance_count(),
            scene.total_model_count(),
            overlay,
        )?;
        self.submit(slot, image_index, progress)?;
        Ok(Some((image_index, rebuild)))
    }

    /// Puts the slot back into a usable state after its frame failed
    /// between acquire and submit. The frame itself is dropped.
    fn abandon_frame(&mut self, slot: usize, recovery: SlotRecovery) {
        if recovery.is_noop() {
            return;
        }
        warn!("Frame {} lost, recovering slot {}", self.cursor.frame_number(), slot);

        recovery.restore_owners(&mut self.images_in_flight);
        if recovery.fresh_acquire_semaphore {
            match Semaphore::new(self.device.clone()) {
                Ok(semaphore) => self.slots[slot].image_available = semaphore,
                Err(e) => warn!("Failed to replace acquire semaphore: {}", e),
            }
        }
        if recovery.signaled_fence {
            match Fence::new(self.device.clone(), true) {
                Ok(fence) => self.slots[slot].in_flight = fence,
                Err(e) => warn!("Failed to replace in-flight fence: {}", e),
            }
        }
        if recovery.rebuild_swapchain {
            self.health.request_rebuild(RebuildReason::FrameLost);
        }
    }

    fn skip_frame(&mut self, extent: vk::Extent2D, reason: RebuildReason) -> RenderResult<FrameOutcome> {
        self.rebuild(extent)?;
        self.stats = FrameStats {
            frame_number: self.cursor.frame_number(),
            rebuilt: true,
            ..FrameStats::default()
        };
        self.cursor.advance();
        Ok(FrameOutcome::Skipped(reason))
    }

    /// Re-uploads geometry when meshes were added and grows the ring when
    /// the scene outgrew it.
    fn sync_scene(&mut self, scene: &mut SceneState) -> RenderResult<()> {
        let stale = match &self.arena {
            Some(arena) => arena.is_stale(scene),
            None => !scene.meshes().is_empty(),
        };
        if stale {
            self.device.wait_idle()?;
            self.arena = MeshArena::upload(self.device.clone(), scene)?;
        }

        if self.ring.ensure_capacity(RingCapacity::required_by(scene))? {
            scene.mark_all_dirty();
            for sync in &mut self.slots {
                sync.submitted = false;
            }
        }
        Ok(())
    }

    fn read_counters(&self, slot: usize) -> RenderResult<CullCounters> {
        if !self.slots[slot].submitted {
            return Ok(CullCounters::default());
        }
        Ok(self.ring.acquire(slot).read_counters()?)
    }

    fn record(
        &self,
        slot: usize,
        image_index: u32,
        refresh: &SlotRefresh,
        instance_count: u32,
        group_count: u32,
        overlay: &mut dyn OverlayHook,
    ) -> RenderResult<()> {
        let frame = self.ring.acquire(slot);
        let targets = self.targets.slot(slot);
        let swapchain_image = self.swapchain.image(image_index).ok_or_else(|| {
            RhiError::InvalidHandle(format!("Swapchain image {} out of range", image_index))
        })?;

        let mut recorder =
            FrameRecorder::begin(&self.slots[slot].command_buffer, self.cursor.frame_number())?;
        recorder.clear_transients(frame, group_count)?;
        if refresh.transforms {
            recorder.transform_dispatch(&self.transform, frame, instance_count)?;
        }
        recorder.culling_dispatch(&self.culling, frame, instance_count)?;
        recorder.offscreen_pass(&self.geometry, frame, targets, self.arena.as_ref(), group_count)?;
        recorder.offscreen_to_shader_read(targets)?;
        recorder.postprocess_pass(
            &self.postprocess,
            slot,
            swapchain_image,
            self.swapchain.extent(),
            overlay,
        )?;
        recorder.present_transition(swapchain_image.0)?;
        recorder.end()
    }

    fn submit(&mut self, slot: usize, image_index: u32, progress: &mut FrameProgress) -> RenderResult<()> {
        let sync = &mut self.slots[slot];

        let wait_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(sync.image_available.handle())
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let signal_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(self.render_finished[image_index as usize].handle())
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let command_infos =
            [vk::CommandBufferSubmitInfo::default().command_buffer(sync.command_buffer.handle())];
        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_infos)
            .signal_semaphore_infos(&signal_infos);

        // The fence stays signaled unless a submission is pending.
        sync.in_flight.reset()?;
        progress.fence_reset();
        // SAFETY: the command buffer is fully recorded and the slot fence was
        // waited on before recording.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], sync.in_flight.handle())?;
        }
        sync.submitted = true;
        progress.submitted();
        Ok(())
    }

    /// Recreates every swapchain-sized resource at `extent`.
    fn rebuild(&mut self, extent: vk::Extent2D) -> RenderResult<()> {
        self.device.wait_idle()?;

        self.swapchain.recreate(extent)?;
        let extent = self.swapchain.extent();

        self.targets = OffscreenTargets::new(self.device.clone(), self.ring.len(), extent)?;
        self.postprocess.bind_targets(&self.targets);

        self.render_finished =
            Self::create_image_semaphores(&self.device, self.swapchain.image_count())?;
        for sync in &mut self.slots {
            sync.image_available = Semaphore::new(self.device.clone())?;
        }
        self.images_in_flight = vec![None; self.swapchain.image_count()];
        self.health = SwapchainHealth::new(extent);

        info!(
            "Rebuilt swapchain resources at {}x{} ({} images)",
            extent.width,
            extent.height,
            self.swapchain.image_count()
        );
        Ok(())
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        let _enter = self.span.enter();
        if let Err(e) = self.device.wait_idle() {
            warn!("Failed to wait for device idle during scheduler drop: {}", e);
        }
        debug!("Frame scheduler destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_wraps_slots() {
        let mut cursor = FrameCursor::new(3);
        let slots: Vec<usize> = (0..7)
            .map(|_| {
                let slot = cursor.slot();
                cursor.advance();
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(cursor.frame_number(), 7);
    }

    #[test]
    fn test_zero_resize_is_ignored() {
        let mut health = SwapchainHealth::new(vk::Extent2D { width: 800, height: 600 });
        assert!(!health.request_resize(0, 600));
        assert!(!health.request_resize(800, 0));
        assert_eq!(health.take_pending(), None);
    }

    #[test]
    fn test_same_size_resize_is_ignored() {
        let mut health = SwapchainHealth::new(vk::Extent2D { width: 800, height: 600 });
        assert!(!health.request_resize(800, 600));
        assert!(!health.is_rebuild_pending());
    }

    #[test]
    fn test_latest_resize_wins() {
        let mut health = SwapchainHealth::new(vk::Extent2D { width: 800, height: 600 });
        assert!(health.request_resize(1024, 768));
        assert!(health.request_resize(1280, 720));
        assert_eq!(
            health.take_pending(),
            Some((vk::Extent2D { width: 1280, height: 720 }, RebuildReason::Resized))
        );
        assert_eq!(health.take_pending(), None);
        assert_eq!(health.extent(), vk::Extent2D { width: 1280, height: 720 });
    }

    #[test]
    fn test_lost_frame_rebuild_keeps_pending_resize() {
        let mut health = SwapchainHealth::new(vk::Extent2D { width: 800, height: 600 });
        health.request_rebuild(RebuildReason::FrameLost);
        assert_eq!(
            health.take_pending(),
            Some((vk::Extent2D { width: 800, height: 600 }, RebuildReason::FrameLost))
        );

        health.request_resize(640, 480);
        health.request_rebuild(RebuildReason::FrameLost);
        assert_eq!(
            health.take_pending(),
            Some((vk::Extent2D { width: 640, height: 480 }, RebuildReason::Resized))
        );
    }

    #[test]
    fn test_failure_before_acquire_needs_no_recovery() {
        assert!(FrameProgress::default().recovery().is_noop());
    }

    #[test]
    fn test_failure_after_acquire_releases_image_and_semaphore() {
        let mut progress = FrameProgress::default();
        progress.acquired(2, Some(1));
        let recovery = progress.recovery();

        assert!(recovery.fresh_acquire_semaphore);
        assert!(recovery.rebuild_swapchain);
        assert!(!recovery.signaled_fence);

        // Slot 0 claimed image 2 before failing; slot 1 may still be rendering it.
        let mut images_in_flight = vec![None, Some(0), Some(0)];
        recovery.restore_owners(&mut images_in_flight);
        assert_eq!(images_in_flight, vec![None, Some(0), Some(1)]);
    }

    #[test]
    fn test_failed_submit_leaves_slot_reusable() {
        let mut progress = FrameProgress::default();
        progress.acquired(0, None);
        progress.fence_reset();
        let recovery = progress.recovery();

        // Without a signaled fence the next wait on this slot never returns.
        assert!(recovery.signaled_fence);
        assert!(recovery.fresh_acquire_semaphore);

        let mut images_in_flight = vec![Some(3)];
        recovery.restore_owners(&mut images_in_flight);
        assert_eq!(images_in_flight, vec![None]);
    }

    #[test]
    fn test_submitted_frame_needs_no_recovery() {
        let mut progress = FrameProgress::default();
        progress.acquired(1, None);
        progress.fence_reset();
        progress.submitted();
        assert!(progress.recovery().is_noop());
    }

    #[test]
    fn test_outcome_presented() {
        assert!(FrameOutcome::Presented { rebuild: None }.presented());
        assert!(!FrameOutcome::Skipped(RebuildReason::Resized).presented());
    }
}
