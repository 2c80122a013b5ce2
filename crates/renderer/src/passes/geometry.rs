//! Offscreen geometry pass driven by the culling stage's indirect commands.

use std::path::Path;
use std::sync::Arc;

use ash::vk;

use ringframe_rhi::RhiResult;
use ringframe_rhi::command::CommandBuffer;
use ringframe_rhi::device::Device;
use ringframe_rhi::pipeline::{CompareOp, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use ringframe_rhi::shader::ShaderStage;
use ringframe_scene::MeshVertex;

use crate::barriers::ImageTransition;
use crate::gpu_types::{CullCounters, DrawCommand, GeometryPush};
use crate::mesh_arena::MeshArena;
use crate::ring::FrameResources;
use crate::shaders;
use crate::targets::{COLOR_FORMAT, DEPTH_FORMAT, FrameTargets};

const CLEAR_COLOR: [f32; 4] = [0.02, 0.02, 0.03, 1.0];

/// Vertex binding 0: one [`MeshVertex`] per vertex.
pub fn vertex_binding() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: size_of::<MeshVertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

pub fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 3] {
    let attribute = |location, format, offset| vk::VertexInputAttributeDescription {
        location,
        binding: 0,
        format,
        offset,
    };
    [
        attribute(0, vk::Format::R32G32B32_SFLOAT, MeshVertex::POSITION_OFFSET),
        attribute(1, vk::Format::R32G32B32_SFLOAT, MeshVertex::NORMAL_OFFSET),
        attribute(2, vk::Format::R32G32_SFLOAT, MeshVertex::UV_OFFSET),
    ]
}

pub struct GeometryPass {
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl GeometryPass {
    pub fn new(device: Arc<Device>, shader_dir: &Path) -> RhiResult<Self> {
        let vert = shaders::load(device.clone(), shader_dir, shaders::GEOMETRY_VERT, ShaderStage::Vertex)?;
        let frag = shaders::load(device.clone(), shader_dir, shaders::GEOMETRY_FRAG, ShaderStage::Fragment)?;

        let layout = PipelineLayout::with_push_constants::<GeometryPush>(
            device.clone(),
            &[],
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        )?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .vertex_binding(vertex_binding())
            .vertex_attributes(&vertex_attributes())
            .cull_mode(CullMode::Back)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth(true, true, CompareOp::Less)
            .color_attachment_format(COLOR_FORMAT)
            .depth_attachment_format(DEPTH_FORMAT)
            .build(device, &layout)?;

        Ok(Self { pipeline, layout })
    }

    /// Clears the slot's targets and draws every live group.
    ///
    /// `max_draws` bounds the count read from the counters buffer and must
    /// not exceed the number of commands written. Without an arena the
    /// targets are only cleared.
    pub fn record(
        &self,
        cmd: &CommandBuffer,
        frame: &FrameResources,
        targets: &FrameTargets,
        arena: Option<&MeshArena>,
        max_draws: u32,
    ) {
        cmd.image_barriers(&[
            ImageTransition::UndefinedToColorAttachment
                .barrier(targets.color.handle(), targets.color.aspect()),
            ImageTransition::UndefinedToDepthAttachment
                .barrier(targets.depth.handle(), targets.depth.aspect()),
        ]);

        let extent = targets.color.extent();
        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(targets.color.view())
            .image_layout(ImageTransition::UndefinedToColorAttachment.new_layout())
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: CLEAR_COLOR },
            })];
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(targets.depth.view())
            .image_layout(ImageTransition::UndefinedToDepthAttachment.new_layout())
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D::default().extent(extent))
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        cmd.begin_rendering(&rendering_info);

        if let Some(arena) = arena.filter(|_| max_draws > 0) {
            let push = GeometryPush {
                uniforms: frame.uniforms().device_address(),
                matrices: frame.matrices().device_address(),
                visible_indices: frame.visible_indices().device_address(),
                texture_indices: frame.texture_indices().device_address(),
            };

            cmd.bind_pipeline(self.pipeline.bind_point(), self.pipeline.handle());
            cmd.set_viewport_and_scissor(extent);
            cmd.push_constants(
                self.layout.handle(),
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                &push,
            );
            cmd.bind_vertex_buffer(arena.vertices().handle(), 0);
            cmd.bind_index_buffer(arena.indices().handle(), 0);
            cmd.draw_indexed_indirect_count(
                frame.draw_commands().handle(),
                0,
                frame.counters().handle(),
                CullCounters::DRAW_COUNT_OFFSET,
                max_draws,
                DrawCommand::STRIDE,
            );
        }

        cmd.end_rendering();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_input_matches_mesh_vertex() {
        assert_eq!(vertex_binding().stride, 32);
        let offsets: Vec<u32> = vertex_attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        assert_eq!(vertex_attributes()[2].format, vk::Format::R32G32_SFLOAT);
    }
}
