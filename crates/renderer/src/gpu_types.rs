//! Records shared with the shaders.
//!
//! Every structure here is `#[repr(C)]` and `Pod` and must match the GLSL
//! declarations in `shaders/` byte for byte. Storage buffers use std430
//! layout, so arrays of these records have no extra padding.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Per-frame uniforms, read by the culling and geometry stages.
///
/// # Memory Layout
///
/// - Offset 0: view (64 bytes)
/// - Offset 64: projection (64 bytes)
/// - Offset 128: view_projection (64 bytes)
/// - Offset 192: frustum planes (6 x 16 bytes)
/// - Offset 288: camera position (16 bytes)
/// - Offset 304: instance count, draw group count, padding (16 bytes)
/// - Total size: 320 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    /// Normalized planes, `xyz` pointing inward.
    pub frustum_planes: [Vec4; 6],
    pub camera_position: Vec4,
    pub instance_count: u32,
    pub draw_group_count: u32,
    pub _padding: [u32; 2],
}

impl FrameUniforms {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Compact transform the transform stage expands into a matrix.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    /// `w` unused.
    pub position: Vec4,
    /// Quaternion `xyzw`.
    pub rotation: Vec4,
    /// `w` unused.
    pub scale: Vec4,
}

/// World bounding sphere and owning draw group of one instance.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CullRecord {
    /// Center in `xyz`, radius in `w`.
    pub sphere: Vec4,
    pub group: u32,
    pub _padding: [u32; 3],
}

/// `VkDrawIndexedIndirectCommand`, one per model group.
///
/// `instance_count` is zeroed at the start of every frame and counted up by
/// the culling stage.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

impl DrawCommand {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;
    pub const INSTANCE_COUNT_OFFSET: u64 = 4;
}

/// Counters written atomically by the culling stage.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct CullCounters {
    /// Instances that passed the frustum test.
    pub visible_instances: u32,
    /// One past the highest group with a visible instance; the live draw
    /// count for the indirect-count draw.
    pub draw_count: u32,
}

impl CullCounters {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
    pub const DRAW_COUNT_OFFSET: u64 = 4;
}

// ============================================================================
// Push constants
// ============================================================================

/// Push constants of `transform.comp`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct TransformPush {
    pub instances: u64,
    pub matrices: u64,
    pub instance_count: u32,
    pub _padding: u32,
}

/// Push constants of `cull.comp`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct CullPush {
    pub uniforms: u64,
    pub cull_records: u64,
    pub draw_commands: u64,
    pub visible_indices: u64,
    pub counters: u64,
    pub instance_count: u32,
    pub _padding: u32,
}

/// Push constants of `geometry.vert`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GeometryPush {
    pub uniforms: u64,
    pub matrices: u64,
    pub visible_indices: u64,
    pub texture_indices: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_record_sizes() {
        assert_eq!(FrameUniforms::SIZE, 320);
        assert_eq!(size_of::<InstanceRecord>(), 48);
        assert_eq!(size_of::<CullRecord>(), 32);
        assert_eq!(size_of::<DrawCommand>(), 20);
        assert_eq!(size_of::<CullCounters>(), 8);
    }

    #[test]
    fn test_frame_uniform_offsets() {
        assert_eq!(offset_of!(FrameUniforms, frustum_planes), 192);
        assert_eq!(offset_of!(FrameUniforms, camera_position), 288);
        assert_eq!(offset_of!(FrameUniforms, instance_count), 304);
        assert_eq!(offset_of!(FrameUniforms, draw_group_count), 308);
    }

    #[test]
    fn test_fill_offsets_match_fields() {
        assert_eq!(
            offset_of!(DrawCommand, instance_count) as u64,
            DrawCommand::INSTANCE_COUNT_OFFSET
        );
        assert_eq!(
            offset_of!(CullCounters, draw_count) as u64,
            CullCounters::DRAW_COUNT_OFFSET
        );
    }

    #[test]
    fn test_push_constants_fit_minimum_limit() {
        // 128 bytes is the smallest maxPushConstantsSize a device may report.
        assert!(size_of::<TransformPush>() <= 128);
        assert!(size_of::<CullPush>() <= 128);
        assert!(size_of::<GeometryPush>() <= 128);
        assert_eq!(size_of::<CullPush>(), 48);
    }
}
