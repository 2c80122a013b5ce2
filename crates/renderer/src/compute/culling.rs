//! Frustum culling on the GPU, plus a host reference of the same algorithm.
//!
//! For every instance whose world sphere passes all six planes the shader
//! does, in order:
//!
//! ```text
//! slot = atomicAdd(draw[group].instanceCount, 1)
//! visible[draw[group].firstInstance + slot] = instance
//! atomicAdd(counters.visibleInstances, 1)
//! atomicMax(counters.drawCount, group + 1)
//! ```
//!
//! Within a group the order of visible entries is unspecified on the GPU.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use glam::Vec4Swizzles;

use ringframe_rhi::RhiResult;
use ringframe_rhi::command::CommandBuffer;
use ringframe_rhi::device::Device;
use ringframe_rhi::pipeline::{Pipeline, PipelineLayout};
use ringframe_rhi::shader::ShaderStage;
use ringframe_scene::sphere_visible;

use crate::barriers;
use crate::gpu_types::{CullCounters, CullPush, CullRecord, DrawCommand, FrameUniforms};
use crate::ring::FrameResources;
use crate::shaders;

pub struct CullingCompute {
    pipeline: Pipeline,
    layout: PipelineLayout,
    workgroup_size: u32,
}

impl CullingCompute {
    pub fn new(device: Arc<Device>, shader_dir: &Path, workgroup_size: u32) -> RhiResult<Self> {
        let shader = shaders::load(device.clone(), shader_dir, shaders::CULL_COMP, ShaderStage::Compute)?;
        let layout = PipelineLayout::with_push_constants::<CullPush>(
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

    /// Records the culling dispatch between its two barriers.
    ///
    /// The counters and the draw commands' instance counts must already have
    /// been cleared by fill commands in the same command buffer. With zero
    /// instances only the barriers are recorded, so the draw still sees the
    /// cleared values.
    pub fn record(&self, cmd: &CommandBuffer, frame: &FrameResources, instance_count: u32) {
        cmd.buffer_barriers(&[
            barriers::transfer_to_compute(frame.counters().handle()),
            barriers::transfer_to_compute(frame.draw_commands().handle()),
        ]);

        if instance_count > 0 {
            let push = CullPush {
                uniforms: frame.uniforms().device_address(),
                cull_records: frame.cull_records().device_address(),
                draw_commands: frame.draw_commands().device_address(),
                visible_indices: frame.visible_indices().device_address(),
                counters: frame.counters().device_address(),
                instance_count,
                _padding: 0,
            };
            cmd.bind_pipeline(self.pipeline.bind_point(), self.pipeline.handle());
            cmd.push_constants(self.layout.handle(), vk::ShaderStageFlags::COMPUTE, 0, &push);
            cmd.dispatch(self.workgroup_count(instance_count), 1, 1);
        }

        cmd.buffer_barriers(&[
            barriers::compute_to_indirect(frame.counters().handle()),
            barriers::compute_to_indirect(frame.draw_commands().handle()),
            barriers::compute_to_indirect(frame.visible_indices().handle()),
        ]);
    }
}

/// What one culling pass produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostCullOutput {
    pub counters: CullCounters,
    /// Visible-index buffer contents; unwritten entries stay `u32::MAX`.
    pub visible: Vec<u32>,
}

/// Runs the culling algorithm on the CPU over packed records.
///
/// `draws` must come straight from the frame's clear step, with every
/// `instance_count` at zero; it is updated in place like the GPU buffer.
pub fn cull_on_host(
    uniforms: &FrameUniforms,
    records: &[CullRecord],
    draws: &mut [DrawCommand],
) -> HostCullOutput {
    let mut output = HostCullOutput {
        counters: CullCounters::default(),
        visible: vec![u32::MAX; records.len()],
    };

    for (instance, record) in records.iter().enumerate() {
        if !sphere_visible(&uniforms.frustum_planes, record.sphere.xyz(), record.sphere.w) {
            continue;
        }
        let Some(draw) = draws.get_mut(record.group as usize) else {
            continue;
        };

        let slot = draw.instance_count;
        draw.instance_count += 1;
        if let Some(entry) = output.visible.get_mut((draw.first_instance + slot) as usize) {
            *entry = instance as u32;
        }
        output.counters.visible_instances += 1;
        output.counters.draw_count = output.counters.draw_count.max(record.group + 1);
    }

    output
}

/// The clear step the recorder performs before culling: zero every
/// `instance_count`.
pub fn clear_instance_counts(draws: &mut [DrawCommand]) {
    for draw in draws {
        draw.instance_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use ringframe_scene::{Camera, Mesh, SceneState, Transform};

    use crate::upload;

    fn camera() -> Camera {
        // Default camera sits at z = 5 looking down -Z.
        Camera::new()
    }

    fn draws(groups: &[(u32, u32)]) -> Vec<DrawCommand> {
        groups
            .iter()
            .map(|&(first_instance, _)| DrawCommand {
                index_count: 36,
                first_instance,
                ..Default::default()
            })
            .collect()
    }

    fn record(center: Vec3, radius: f32, group: u32) -> CullRecord {
        CullRecord {
            sphere: center.extend(radius),
            group,
            _padding: [0; 3],
        }
    }

    #[test]
    fn test_visible_and_culled_split() {
        let uniforms = upload::frame_uniforms(&camera(), 3, 1);
        let records = [
            record(Vec3::ZERO, 0.5, 0),
            record(Vec3::new(0.0, 0.0, 50.0), 0.5, 0), // behind the camera
            record(Vec3::new(1.0, 0.0, -2.0), 0.5, 0),
        ];
        let mut commands = draws(&[(0, 3)]);
        let out = cull_on_host(&uniforms, &records, &mut commands);

        assert_eq!(out.counters.visible_instances, 2);
        assert_eq!(out.counters.draw_count, 1);
        assert_eq!(commands[0].instance_count, 2);
        assert_eq!(&out.visible[..2], &[0, 2]);
        assert_eq!(out.visible[2], u32::MAX);
    }

    #[test]
    fn test_draw_count_skips_trailing_empty_groups() {
        let uniforms = upload::frame_uniforms(&camera(), 2, 3);
        let records = [record(Vec3::ZERO, 1.0, 1), record(Vec3::new(0.0, 0.0, 90.0), 1.0, 2)];
        let mut commands = draws(&[(0, 0), (0, 1), (1, 1)]);
        let out = cull_on_host(&uniforms, &records, &mut commands);

        assert_eq!(out.counters.draw_count, 2);
        assert_eq!(commands[0].instance_count, 0);
        assert_eq!(commands[1].instance_count, 1);
        assert_eq!(commands[2].instance_count, 0);
    }

    #[test]
    fn test_culling_twice_is_idempotent() {
        let mut scene = SceneState::new(2, 8);
        let mesh = scene.add_mesh(Mesh::cube("cube", 0.5).unwrap());
        let group = scene.add_group("grid", mesh).unwrap();
        for i in 0..20 {
            let x = (i as f32 - 10.0) * 3.0;
            scene
                .add_instance(group, Transform::from_position(Vec3::new(x, 0.0, -10.0)))
                .unwrap();
        }

        let uniforms = upload::frame_uniforms(&camera(), scene.total_instance_count(), 1);
        let records = upload::pack_cull_records(&scene);
        let mut commands = upload::pack_draw_commands(&scene.draw_layout());

        let first = cull_on_host(&uniforms, &records, &mut commands);
        clear_instance_counts(&mut commands);
        let second = cull_on_host(&uniforms, &records, &mut commands);

        assert_eq!(first, second);
        assert!(first.counters.visible_instances > 0);
        assert!(first.counters.visible_instances < 20);
    }

    #[test]
    fn test_tangent_sphere_passes() {
        let planes = [
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::new(-1.0, 0.0, 0.0, 1.0),
            Vec4::new(0.0, 1.0, 0.0, 1.0),
            Vec4::new(0.0, -1.0, 0.0, 1.0),
            Vec4::new(0.0, 0.0, 1.0, 1.0),
            Vec4::new(0.0, 0.0, -1.0, 1.0),
        ];
        let uniforms = FrameUniforms {
            frustum_planes: planes,
            ..Default::default()
        };
        let records = [record(Vec3::new(0.0, 3.0, 0.0), 2.0, 0)];
        let mut commands = draws(&[(0, 1)]);
        let out = cull_on_host(&uniforms, &records, &mut commands);
        assert_eq!(out.counters.visible_instances, 1);
    }
}
