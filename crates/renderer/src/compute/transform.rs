//! Expansion of compact instance transforms into model matrices.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Quat, Vec4Swizzles};

use ringframe_rhi::RhiResult;
use ringframe_rhi::command::CommandBuffer;
use ringframe_rhi::device::Device;
use ringframe_rhi::pipeline::{Pipeline, PipelineLayout};
use ringframe_rhi::shader::ShaderStage;

use crate::barriers;
use crate::gpu_types::{InstanceRecord, TransformPush};
use crate::ring::FrameResources;
use crate::shaders;

/// Compute stage writing one `T * R * S` matrix per instance into the slot's
/// matrix buffer.
pub struct TransformCompute {
    pipeline: Pipeline,
    layout: PipelineLayout,
    workgroup_size: u32,
}

impl TransformCompute {
    pub fn new(device: Arc<Device>, shader_dir: &Path, workgroup_size: u32) -> RhiResult<Self> {
        let shader = shaders::load(device.clone(), shader_dir, shaders::TRANSFORM_COMP, ShaderStage::Compute)?;
        let layout = PipelineLayout::with_push_constants::<TransformPush>(
            device.clone(),
            &[],
            vk::ShaderStageFlags::COMPUTE,
        )?;
        let pipeline = Pipeline::create_compute_specialized(device, &layout, &shader, &[workgroup_size])?;

        Ok(Self {
            pipeline,
            layout,
            workgroup_size,
        })
    }

    pub fn workgroup_count(&self, instance_count: u32) -> u32 {
        instance_count.div_ceil(self.workgroup_size)
    }

    /// Records the dispatch and the barrier that publishes the matrices to
    /// the graphics stages. Returns false, recording nothing, when there are
    /// no instances.
    pub fn record(&self, cmd: &CommandBuffer, frame: &FrameResources, instance_count: u32) -> bool {
        if instance_count == 0 {
            return false;
        }

        let push = TransformPush {
            instances: frame.instances().device_address(),
            matrices: frame.matrices().device_address(),
            instance_count,
            _padding: 0,
        };

        cmd.bind_pipeline(self.pipeline.bind_point(), self.pipeline.handle());
        cmd.push_constants(self.layout.handle(), vk::ShaderStageFlags::COMPUTE, 0, &push);
        cmd.dispatch(self.workgroup_count(instance_count), 1, 1);
        cmd.buffer_barriers(&[barriers::compute_to_graphics(frame.matrices().handle())]);
        true
    }
}

/// Host version of the shader's matrix expansion.
pub fn expand_on_host(record: &InstanceRecord) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        record.scale.xyz(),
        Quat::from_vec4(record.rotation),
        record.position.xyz(),
    )
}
