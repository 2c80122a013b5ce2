//! Mesh data handed over by the asset loader.
//!
//! Meshes are immutable once added to a scene. The renderer packs every
//! mesh into one shared vertex buffer and one shared index buffer, so a
//! draw command only needs offsets into them.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::bounds::BoundingSphere;
use crate::error::{SceneError, SceneResult};

/// Interleaved vertex as stored in the shared vertex buffer.
///
/// # Memory Layout
///
/// - Offset 0: position (12 bytes)
/// - Offset 12: normal (12 bytes)
/// - Offset 24: uv (8 bytes)
/// - Total size: 32 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl MeshVertex {
    pub const POSITION_OFFSET: u32 = 0;
    pub const NORMAL_OFFSET: u32 = 12;
    pub const UV_OFFSET: u32 = 24;

    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Key of a mesh in the scene's mesh table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub(crate) u32);

impl MeshId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Triangle-list mesh with its local bounding sphere.
#[derive(Clone, Debug)]
pub struct Mesh {
    name: String,
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    bounds: BoundingSphere,
    texture: Option<u32>,
}

impl Mesh {
    /// Builds a mesh and computes its bounding sphere.
    ///
    /// Fails on empty geometry, on an index count that is not a multiple of
    /// three, or on indices past the end of the vertex list.
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<MeshVertex>,
        indices: Vec<u32>,
    ) -> SceneResult<Self> {
        let name = name.into();
        let vertex_count = vertices.len();
        if vertices.is_empty()
            || indices.is_empty()
            || !indices.len().is_multiple_of(3)
            || indices.iter().any(|&i| i as usize >= vertex_count)
        {
            return Err(SceneError::EmptyMesh(name));
        }

        let bounds = BoundingSphere::from_points(vertices.iter().map(|v| v.position))
            .ok_or_else(|| SceneError::EmptyMesh(name.clone()))?;

        Ok(Self {
            name,
            vertices,
            indices,
            bounds,
            texture: None,
        })
    }

    /// Default texture slot for instances of this mesh.
    pub fn with_texture(mut self, texture: u32) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn bounds(&self) -> BoundingSphere {
        self.bounds
    }

    pub fn texture(&self) -> Option<u32> {
        self.texture
    }

    /// Axis-aligned cube with flat normals, centered at the origin.
    pub fn cube(name: impl Into<String>, half_extent: f32) -> SceneResult<Self> {
        let h = half_extent;
        // (normal, tangent u, tangent v) per face
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = (normal + u * su + v * sv) * h;
                let uv = Vec2::new((su + 1.0) * 0.5, (1.0 - sv) * 0.5);
                vertices.push(MeshVertex::new(position, normal, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(name, vertices, indices)
    }

    /// Regular octahedron with flat normals and the given circumradius.
    pub fn octahedron(name: impl Into<String>, radius: f32) -> SceneResult<Self> {
        let tips = [Vec3::Y, Vec3::NEG_Y];
        let ring = [Vec3::X, Vec3::Z, Vec3::NEG_X, Vec3::NEG_Z];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(24);
        for tip in tips {
            for i in 0..ring.len() {
                let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
                // Keep counter-clockwise winding seen from outside.
                let tri = if tip.y > 0.0 { [tip, b, a] } else { [tip, a, b] };
                let normal = (tri[1] - tri[0]).cross(tri[2] - tri[0]).normalize();
                let base = vertices.len() as u32;
                for (corner, p) in tri.into_iter().enumerate() {
                    let uv = Vec2::new(corner as f32 * 0.5, if corner == 0 { 0.0 } else { 1.0 });
                    vertices.push(MeshVertex::new(p * radius, normal, uv));
                }
                indices.extend_from_slice(&[base, base + 1, base + 2]);
            }
        }

        Self::new(name, vertices, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 32);
        assert_eq!(std::mem::offset_of!(MeshVertex, normal) as u32, MeshVertex::NORMAL_OFFSET);
        assert_eq!(std::mem::offset_of!(MeshVertex, uv) as u32, MeshVertex::UV_OFFSET);
    }

    #[test]
    fn test_cube_geometry() {
        let cube = Mesh::cube("cube", 0.5).unwrap();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        assert!(approx_eq(cube.bounds().center.length(), 0.0));
        assert!(approx_eq(cube.bounds().radius, 0.75f32.sqrt()));
    }

    #[test]
    fn test_cube_normals_point_outward() {
        let cube = Mesh::cube("cube", 1.0).unwrap();
        for v in cube.vertices() {
            assert!(v.position.dot(v.normal) > 0.0);
        }
    }

    #[test]
    fn test_octahedron_winding_matches_normals() {
        let oct = Mesh::octahedron("oct", 2.0).unwrap();
        assert_eq!(oct.index_count(), 24);
        assert!(approx_eq(oct.bounds().radius, 2.0));
        for tri in oct.indices().chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|k| oct.vertices()[tri[k] as usize].position);
            let centroid = (a + b + c) / 3.0;
            assert!((b - a).cross(c - a).dot(centroid) > 0.0);
        }
    }

    #[test]
    fn test_empty_mesh_rejected() {
        assert_eq!(
            Mesh::new("none", Vec::new(), Vec::new()).unwrap_err(),
            SceneError::EmptyMesh("none".into())
        );
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let verts = vec![MeshVertex::default(); 3];
        assert!(Mesh::new("bad", verts, vec![0, 1, 3]).is_err());
    }

    #[test]
    fn test_texture_slot() {
        let mesh = Mesh::cube("cube", 1.0).unwrap().with_texture(7);
        assert_eq!(mesh.texture(), Some(7));
    }
}
