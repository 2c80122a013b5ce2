//! Per-frame GPU buffers, one copy per frame in flight.
//!
//! The ring owns N slots. Slot `i` is only written by the CPU after the
//! scheduler has waited on slot `i`'s in-flight fence, so the copies can stay
//! persistently mapped with no further synchronization.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ringframe_rhi::device::Device;
//! use ringframe_renderer::ring::{ResourceRing, RingCapacity};
//!
//! # fn example(device: Arc<Device>) -> ringframe_renderer::RenderResult<()> {
//! let ring = ResourceRing::new(device, 4, RingCapacity::new(1024, 64))?;
//! let frame = ring.acquire(5); // slot 1
//! assert_eq!(frame.slot(), 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{Span, debug, info};

use ringframe_rhi::RhiResult;
use ringframe_rhi::buffer::{Buffer, BufferUsage};
use ringframe_rhi::device::Device;
use ringframe_scene::{DirtyKind, SceneState};

use crate::error::RenderResult;
use crate::gpu_types::{CullCounters, CullRecord, DrawCommand, FrameUniforms, InstanceRecord};
use crate::upload;

/// Number of records every slot has room for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingCapacity {
    pub instances: u32,
    pub draw_groups: u32,
}

impl RingCapacity {
    /// Zero counts are raised to one so every buffer has a valid size.
    pub fn new(instances: u32, draw_groups: u32) -> Self {
        Self {
            instances: instances.max(1),
            draw_groups: draw_groups.max(1),
        }
    }

    /// What `scene` needs right now.
    pub fn required_by(scene: &SceneState) -> Self {
        Self::new(scene.total_instance_count(), scene.total_model_count())
    }

    pub fn covers(&self, required: &RingCapacity) -> bool {
        self.instances >= required.instances && self.draw_groups >= required.draw_groups
    }

    /// Grows each dimension that falls short to the next power of two.
    pub fn grown_to(&self, required: &RingCapacity) -> Self {
        let grow = |have: u32, need: u32| {
            if have >= need {
                have
            } else {
                need.checked_next_power_of_two().unwrap_or(u32::MAX)
            }
        };
        Self {
            instances: grow(self.instances, required.instances),
            draw_groups: grow(self.draw_groups, required.draw_groups),
        }
    }
}

/// Which datasets were rewritten for a slot this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotRefresh {
    pub transforms: bool,
    pub culling_data: bool,
    pub draw_commands: bool,
    pub texture_indices: bool,
}

impl SlotRefresh {
    /// Consumes the scene's dirty flags for `slot`.
    pub fn plan(scene: &mut SceneState, slot: usize) -> Self {
        Self {
            transforms: scene.consume_dirty_for_slot(DirtyKind::Transforms, slot),
            culling_data: scene.consume_dirty_for_slot(DirtyKind::CullingData, slot),
            draw_commands: scene.consume_dirty_for_slot(DirtyKind::DrawCommands, slot),
            texture_indices: scene.consume_dirty_for_slot(DirtyKind::TextureIndices, slot),
        }
    }

    pub fn any(&self) -> bool {
        self.transforms || self.culling_data || self.draw_commands || self.texture_indices
    }
}

/// Every per-frame buffer of one ring slot.
pub struct FrameResources {
    slot: usize,
    capacity: RingCapacity,
    uniforms: Buffer,
    instances: Buffer,
    matrices: Buffer,
    cull_records: Buffer,
    visible_indices: Buffer,
    draw_commands: Buffer,
    counters: Buffer,
    texture_indices: Buffer,
}

impl FrameResources {
    fn new(device: &Arc<Device>, slot: usize, capacity: RingCapacity) -> RhiResult<Self> {
        let instances = capacity.instances as vk::DeviceSize;
        let groups = capacity.draw_groups as vk::DeviceSize;
        let sized = |usage, record: usize, count: vk::DeviceSize| {
            Buffer::new(device.clone(), usage, record as vk::DeviceSize * count)
        };

        Ok(Self {
            slot,
            capacity,
            uniforms: sized(BufferUsage::Uniform, FrameUniforms::SIZE, 1)?,
            instances: sized(BufferUsage::Storage, size_of::<InstanceRecord>(), instances)?,
            matrices: sized(BufferUsage::Storage, size_of::<glam::Mat4>(), instances)?,
            cull_records: sized(BufferUsage::Storage, size_of::<CullRecord>(), instances)?,
            visible_indices: sized(BufferUsage::Storage, size_of::<u32>(), instances)?,
            draw_commands: sized(BufferUsage::Indirect, size_of::<DrawCommand>(), groups)?,
            counters: sized(BufferUsage::Indirect, size_of::<CullCounters>(), 1)?,
            texture_indices: sized(BufferUsage::Storage, size_of::<u32>(), instances)?,
        })
    }

    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn capacity(&self) -> RingCapacity {
        self.capacity
    }

    pub fn uniforms(&self) -> &Buffer {
        &self.uniforms
    }

    pub fn instances(&self) -> &Buffer {
        &self.instances
    }

    pub fn matrices(&self) -> &Buffer {
        &self.matrices
    }

    pub fn cull_records(&self) -> &Buffer {
        &self.cull_records
    }

    pub fn visible_indices(&self) -> &Buffer {
        &self.visible_indices
    }

    pub fn draw_commands(&self) -> &Buffer {
        &self.draw_commands
    }

    pub fn counters(&self) -> &Buffer {
        &self.counters
    }

    pub fn texture_indices(&self) -> &Buffer {
        &self.texture_indices
    }

    /// Counters left by the last submission that used this slot.
    ///
    /// Only valid once that submission's fence has signaled.
    pub fn read_counters(&self) -> RhiResult<CullCounters> {
        self.counters.read_pod(0)
    }

    fn write(&self, refresh: &SlotRefresh, scene: &SceneState, uniforms: &FrameUniforms) -> RhiResult<()> {
        self.uniforms.write_slice(0, std::slice::from_ref(uniforms))?;

        if refresh.transforms {
            self.instances.write_slice(0, &upload::pack_instances(scene))?;
        }
        if refresh.culling_data {
            self.cull_records.write_slice(0, &upload::pack_cull_records(scene))?;
        }
        if refresh.draw_commands {
            self.draw_commands
                .write_slice(0, &upload::pack_draw_commands(&scene.draw_layout()))?;
        }
        if refresh.texture_indices {
            self.texture_indices
                .write_slice(0, &upload::pack_texture_indices(scene))?;
        }
        Ok(())
    }
}

pub struct ResourceRing {
    device: Arc<Device>,
    slots: Vec<FrameResources>,
    capacity: RingCapacity,
    span: Span,
}

impl ResourceRing {
    /// Allocates `frames_in_flight` slots sized for `capacity`.
    ///
    /// # Errors
    ///
    /// [`RhiError::ResourceExhausted`](ringframe_rhi::RhiError::ResourceExhausted)
    /// when device memory runs out; the ring is unusable in that case.
    pub fn new(
        device: Arc<Device>,
        frames_in_flight: usize,
        capacity: RingCapacity,
    ) -> RenderResult<Self> {
        let span = tracing::info_span!("resource_ring");
        let slots = span.in_scope(|| Self::allocate(&device, frames_in_flight, capacity))?;

        Ok(Self {
            device,
            slots,
            capacity,
            span,
        })
    }

    fn allocate(
        device: &Arc<Device>,
        frames_in_flight: usize,
        capacity: RingCapacity,
    ) -> RhiResult<Vec<FrameResources>> {
        let slots = (0..frames_in_flight)
            .map(|slot| FrameResources::new(device, slot, capacity))
            .collect::<RhiResult<Vec<_>>>()?;
        info!(
            "Allocated {} ring slots: {} instances, {} draw groups",
            frames_in_flight, capacity.instances, capacity.draw_groups
        );
        Ok(slots)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> RingCapacity {
        self.capacity
    }

    /// Buffers of slot `frame_index % N`.
    pub fn acquire(&self, frame_index: usize) -> &FrameResources {
        &self.slots[frame_index % self.slots.len()]
    }

    /// Reallocates every slot if `required` does not fit.
    ///
    /// Returns true when the ring was rebuilt. The new buffers are empty;
    /// the caller must raise every dirty kind.
    pub fn ensure_capacity(&mut self, required: RingCapacity) -> RenderResult<bool> {
        if self.capacity.covers(&required) {
            return Ok(false);
        }
        let _enter = self.span.enter();

        let capacity = self.capacity.grown_to(&required);
        debug!(
            "Growing ring from {:?} to {:?}, waiting for device idle",
            self.capacity, capacity
        );
        self.device.wait_idle()?;

        let count = self.slots.len();
        self.slots.clear();
        self.slots = Self::allocate(&self.device, count, capacity)?;
        self.capacity = capacity;
        Ok(true)
    }

    /// Writes this frame's uniforms and every stale dataset into `slot`.
    ///
    /// The slot's fence must have been waited on.
    pub fn refresh_slot(
        &self,
        slot: usize,
        scene: &mut SceneState,
        uniforms: &FrameUniforms,
    ) -> RenderResult<SlotRefresh> {
        let frame = self.acquire(slot);
        let refresh = SlotRefresh::plan(scene, frame.slot);
        if refresh.any() {
            let _enter = self.span.enter();
            debug!("Slot {} refresh: {:?}", frame.slot, refresh);
        }
        frame.write(&refresh, scene, uniforms)?;
        Ok(refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringframe_scene::{Mesh, Transform};

    #[test]
    fn test_capacity_never_zero() {
        let c = RingCapacity::new(0, 0);
        assert_eq!(c, RingCapacity::new(1, 1));
    }

    #[test]
    fn test_capacity_grows_to_power_of_two() {
        let c = RingCapacity::new(1024, 16);
        let required = RingCapacity::new(1500, 16);
        assert!(!c.covers(&required));
        let grown = c.grown_to(&required);
        assert_eq!(grown, RingCapacity::new(2048, 16));
        assert!(grown.covers(&required));
    }

    #[test]
    fn test_capacity_keeps_dimensions_that_fit() {
        let c = RingCapacity::new(4096, 4);
        assert_eq!(c.grown_to(&RingCapacity::new(10, 5)), RingCapacity::new(4096, 8));
    }

    #[test]
    fn test_plan_consumes_each_slot_once() {
        let mut scene = SceneState::new(3, 4);
        let mesh = scene.add_mesh(Mesh::cube("cube", 1.0).unwrap());
        let group = scene.add_group("g", mesh).unwrap();
        scene.add_instance(group, Transform::IDENTITY).unwrap();

        for slot in 0..3 {
            let refresh = SlotRefresh::plan(&mut scene, slot);
            assert!(refresh.transforms && refresh.culling_data);
            assert!(refresh.draw_commands && refresh.texture_indices);
        }
        assert!(!SlotRefresh::plan(&mut scene, 0).any());
    }
}
