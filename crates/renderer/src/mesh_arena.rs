//! Every mesh's geometry merged into one vertex and one index buffer.

use std::sync::Arc;

use tracing::info;

use ringframe_rhi::buffer::{Buffer, BufferUsage};
use ringframe_rhi::device::Device;
use ringframe_scene::SceneState;

use crate::error::RenderResult;
use crate::upload;

pub struct MeshArena {
    vertices: Buffer,
    indices: Buffer,
    mesh_count: usize,
}

impl MeshArena {
    /// Uploads the scene's mesh table. Returns `None` when it holds no mesh.
    pub fn upload(device: Arc<Device>, scene: &SceneState) -> RenderResult<Option<Self>> {
        let mesh_count = scene.meshes().len();
        if mesh_count == 0 {
            return Ok(None);
        }

        let (vertices, indices) = upload::merge_geometry(scene);
        let vertex_buffer = Buffer::new_with_data(device.clone(), BufferUsage::Vertex, &vertices)?;
        let index_buffer = Buffer::new_with_data(device, BufferUsage::Index, &indices)?;
        info!(
            "Uploaded {} meshes: {} vertices, {} indices",
            mesh_count,
            vertices.len(),
            indices.len()
        );

        Ok(Some(Self {
            vertices: vertex_buffer,
            indices: index_buffer,
            mesh_count,
        }))
    }

    /// Whether meshes were added since this arena was built.
    pub fn is_stale(&self, scene: &SceneState) -> bool {
        self.mesh_count != scene.meshes().len()
    }

    pub fn vertices(&self) -> &Buffer {
        &self.vertices
    }

    pub fn indices(&self) -> &Buffer {
        &self.indices
    }

    pub fn mesh_count(&self) -> usize {
        self.mesh_count
    }
}
