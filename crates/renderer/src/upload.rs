//! Packing of scene data into GPU records.
//!
//! All functions walk the scene in its global instance order, so index `i`
//! of every packed array describes the same instance.

use ringframe_scene::{Camera, GroupLayout, MeshVertex, SceneState};

use crate::gpu_types::{CullRecord, DrawCommand, FrameUniforms, InstanceRecord};

pub fn frame_uniforms(camera: &Camera, instance_count: u32, draw_group_count: u32) -> FrameUniforms {
    let view = camera.view_matrix();
    let projection = camera.projection_matrix();
    let view_projection = projection * view;

    FrameUniforms {
        view,
        projection,
        view_projection,
        frustum_planes: *camera.frustum().planes(),
        camera_position: camera.position.extend(1.0),
        instance_count,
        draw_group_count,
        _padding: [0; 2],
    }
}

pub fn pack_instances(scene: &SceneState) -> Vec<InstanceRecord> {
    scene
        .instances()
        .map(|(_, instance)| {
            let t = instance.transform();
            InstanceRecord {
                position: t.position.extend(1.0),
                rotation: t.rotation.into(),
                scale: t.scale.extend(0.0),
            }
        })
        .collect()
}

pub fn pack_cull_records(scene: &SceneState) -> Vec<CullRecord> {
    scene
        .instances()
        .map(|(group, instance)| CullRecord {
            sphere: instance.world_bounds().to_vec4(),
            group: group.index() as u32,
            _padding: [0; 3],
        })
        .collect()
}

pub fn pack_texture_indices(scene: &SceneState) -> Vec<u32> {
    scene
        .instances()
        .map(|(_, instance)| instance.texture_index())
        .collect()
}

/// Draw commands with `instance_count` left at zero for the culling stage.
pub fn pack_draw_commands(layout: &[GroupLayout]) -> Vec<DrawCommand> {
    layout
        .iter()
        .map(|group| DrawCommand {
            index_count: group.index_count,
            instance_count: 0,
            first_index: group.first_index,
            vertex_offset: group.vertex_offset,
            first_instance: group.first_instance,
        })
        .collect()
}

/// Every mesh's vertices and indices, concatenated in mesh-table order.
///
/// Indices stay local to their mesh; draws add `vertex_offset`.
pub fn merge_geometry(scene: &SceneState) -> (Vec<MeshVertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(scene.total_vertex_count() as usize);
    let mut indices = Vec::with_capacity(scene.total_index_count() as usize);
    for mesh in scene.meshes() {
        vertices.extend_from_slice(mesh.vertices());
        indices.extend_from_slice(mesh.indices());
    }
    (vertices, indices)
}
