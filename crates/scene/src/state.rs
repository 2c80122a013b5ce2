//! CPU-side scene model.
//!
//! [`SceneState`] is the single source of truth for what the GPU renders:
//! a mesh table, an ordered list of model groups (one indirect draw each),
//! and for every group an ordered list of instances. Group order and
//! instance order define the global instance numbering that every
//! per-instance GPU buffer follows.
//!
//! The scene has one producer (the loader and physics tick) and one consumer
//! (the renderer, once per frame). It is deliberately not `Sync`-aware.
//!
//! # Example
//!
//! ```
//! use ringframe_scene::{DirtyKind, Mesh, SceneState, Transform};
//! use glam::Vec3;
//!
//! let mut scene = SceneState::new(4, 1024);
//! let cube = scene.add_mesh(Mesh::cube("cube", 0.5)?);
//! let group = scene.add_group("crates", cube)?;
//! scene.add_instance(group, Transform::from_position(Vec3::new(0.0, 0.0, -5.0)))?;
//!
//! assert_eq!(scene.total_instance_count(), 1);
//! assert!(scene.consume_dirty_for_slot(DirtyKind::Transforms, 0));
//! # Ok::<(), ringframe_scene::SceneError>(())
//! ```

use std::collections::HashMap;

use glam::{Quat, Vec3};
use tracing::Span;

use crate::bounds::BoundingSphere;
use crate::dirty::{DirtyFlags, DirtyKind, DirtyState};
use crate::error::{SceneError, SceneResult};
use crate::mesh::{Mesh, MeshId};
use crate::transform::Transform;

/// Position of a group in draw order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u32);

impl GroupId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Group plus position inside the group's instance list.
///
/// Keys are positional: removing an instance shifts the keys of every later
/// instance in the same group down by one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub group: GroupId,
    pub index: usize,
}

/// What the loader reports after changing the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneChange {
    /// Instances moved.
    Transforms,
    /// Instances or groups were added or removed.
    Topology,
    /// Texture assignments changed.
    Textures,
}

impl SceneChange {
    pub fn dirty_kinds(self) -> &'static [DirtyKind] {
        match self {
            SceneChange::Transforms => &[DirtyKind::Transforms, DirtyKind::CullingData],
            SceneChange::Topology => &DirtyKind::ALL,
            SceneChange::Textures => &[DirtyKind::TextureIndices],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Instance {
    transform: Transform,
    texture_index: u32,
    world_bounds: BoundingSphere,
}

impl Instance {
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn texture_index(&self) -> u32 {
        self.texture_index
    }

    /// Local mesh sphere moved into world space by the current transform.
    pub fn world_bounds(&self) -> BoundingSphere {
        self.world_bounds
    }
}

#[derive(Clone, Debug)]
pub struct ModelGroup {
    name: String,
    mesh: MeshId,
    local_bounds: BoundingSphere,
    instances: Vec<Instance>,
}

impl ModelGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> MeshId {
        self.mesh
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance_count(&self) -> u32 {
        self.instances.len() as u32
    }

    fn instance_mut(&mut self, index: usize) -> SceneResult<&mut Instance> {
        let len = self.instances.len();
        self.instances
            .get_mut(index)
            .ok_or_else(|| SceneError::InstanceOutOfRange {
                group: self.name.clone(),
                index,
                len,
            })
    }
}

/// Where one group's geometry and instances live in the shared buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupLayout {
    pub first_index: u32,
    pub index_count: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
    pub instance_count: u32,
}

/// Offsets of one mesh inside the merged vertex and index buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshRange {
    pub first_index: u32,
    pub index_count: u32,
    pub vertex_offset: i32,
    pub vertex_count: u32,
}

pub struct SceneState {
    meshes: Vec<Mesh>,
    mesh_ranges: Vec<MeshRange>,
    groups: Vec<ModelGroup>,
    group_ids: HashMap<String, GroupId>,
    dirty: DirtyFlags,
    max_groups: u32,
    span: Span,
}

impl SceneState {
    /// Empty scene for a ring of `ring_size` slots. All dirty kinds start
    /// raised.
    pub fn new(ring_size: usize, max_groups: u32) -> Self {
        let span = tracing::info_span!("scene");
        span.in_scope(|| {
            tracing::debug!("Scene created: ring_size={}, max_groups={}", ring_size, max_groups);
        });

        Self {
            meshes: Vec::new(),
            mesh_ranges: Vec::new(),
            groups: Vec::new(),
            group_ids: HashMap::new(),
            dirty: DirtyFlags::new(ring_size),
            max_groups,
            span,
        }
    }

    // ========================================================================
    // Meshes and groups
    // ========================================================================

    /// Appends a mesh to the mesh table. Meshes are never removed.
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        let _enter = self.span.enter();

        let range = match self.mesh_ranges.last() {
            Some(prev) => MeshRange {
                first_index: prev.first_index + prev.index_count,
                index_count: mesh.index_count(),
                vertex_offset: prev.vertex_offset + prev.vertex_count as i32,
                vertex_count: mesh.vertex_count(),
            },
            None => MeshRange {
                first_index: 0,
                index_count: mesh.index_count(),
                vertex_offset: 0,
                vertex_count: mesh.vertex_count(),
            },
        };

        let id = MeshId(self.meshes.len() as u32);
        tracing::debug!(
            "Mesh '{}' added as {:?}: {} vertices, {} indices",
            mesh.name(),
            id,
            range.vertex_count,
            range.index_count
        );

        self.meshes.push(mesh);
        self.mesh_ranges.push(range);
        id
    }

    /// Adds an empty group drawing `mesh`. Several groups may share a mesh.
    pub fn add_group(&mut self, name: impl Into<String>, mesh: MeshId) -> SceneResult<GroupId> {
        let _enter = self.span.enter();
        let name = name.into();

        if self.group_ids.contains_key(&name) {
            return Err(SceneError::DuplicateGroup(name));
        }
        if self.groups.len() as u32 >= self.max_groups {
            return Err(SceneError::TooManyGroups(self.max_groups));
        }
        let local_bounds = self.mesh(mesh)?.bounds();

        let id = GroupId(self.groups.len() as u32);
        self.group_ids.insert(name.clone(), id);
        tracing::info!("Model group '{}' added ({:?})", name, id);
        self.groups.push(ModelGroup {
            name,
            mesh,
            local_bounds,
            instances: Vec::new(),
        });

        self.dirty.mark_all();
        Ok(id)
    }

    pub fn mesh(&self, id: MeshId) -> SceneResult<&Mesh> {
        self.meshes.get(id.index()).ok_or(SceneError::UnknownMesh(id.0))
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn mesh_range(&self, id: MeshId) -> SceneResult<MeshRange> {
        self.mesh_ranges
            .get(id.index())
            .copied()
            .ok_or(SceneError::UnknownMesh(id.0))
    }

    /// Vertices across every mesh in the merged buffer.
    pub fn total_vertex_count(&self) -> u32 {
        self.mesh_ranges
            .last()
            .map_or(0, |r| r.vertex_offset as u32 + r.vertex_count)
    }

    /// Indices across every mesh in the merged buffer.
    pub fn total_index_count(&self) -> u32 {
        self.mesh_ranges
            .last()
            .map_or(0, |r| r.first_index + r.index_count)
    }

    pub fn group_id(&self, name: &str) -> SceneResult<GroupId> {
        self.group_ids
            .get(name)
            .copied()
            .ok_or_else(|| SceneError::UnknownGroup(name.to_string()))
    }

    pub fn group(&self, id: GroupId) -> SceneResult<&ModelGroup> {
        self.groups
            .get(id.index())
            .ok_or_else(|| SceneError::UnknownGroup(format!("#{}", id.0)))
    }

    fn group_mut(&mut self, id: GroupId) -> SceneResult<&mut ModelGroup> {
        self.groups
            .get_mut(id.index())
            .ok_or_else(|| SceneError::UnknownGroup(format!("#{}", id.0)))
    }

    /// Groups in draw order.
    pub fn groups(&self) -> &[ModelGroup] {
        &self.groups
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Appends an instance to `group`. Its texture index defaults to the
    /// mesh's texture slot, or 0.
    pub fn add_instance(&mut self, group: GroupId, transform: Transform) -> SceneResult<InstanceKey> {
        let texture_index = {
            let mesh = self.group(group)?.mesh;
            self.mesh(mesh)?.texture().unwrap_or(0)
        };

        let g = self.group_mut(group)?;
        let world_bounds = g.local_bounds.transformed(&transform);
        g.instances.push(Instance {
            transform,
            texture_index,
            world_bounds,
        });
        let key = InstanceKey {
            group,
            index: g.instances.len() - 1,
        };

        self.dirty.mark_all();
        Ok(key)
    }

    /// Removes an instance, keeping the order of the remaining ones.
    pub fn remove_instance(&mut self, key: InstanceKey) -> SceneResult<Instance> {
        let g = self.group_mut(key.group)?;
        g.instance_mut(key.index)?;
        let removed = g.instances.remove(key.index);

        let _enter = self.span.enter();
        tracing::debug!("Removed instance {:?}", key);
        self.dirty.mark_all();
        Ok(removed)
    }

    pub fn instance(&self, key: InstanceKey) -> SceneResult<&Instance> {
        let g = self.group(key.group)?;
        g.instances
            .get(key.index)
            .ok_or_else(|| SceneError::InstanceOutOfRange {
                group: g.name.clone(),
                index: key.index,
                len: g.instances.len(),
            })
    }

    /// Replaces an instance's full transform.
    pub fn set_transform(&mut self, key: InstanceKey, transform: Transform) -> SceneResult<()> {
        let g = self.group_mut(key.group)?;
        let local_bounds = g.local_bounds;
        let instance = g.instance_mut(key.index)?;
        instance.transform = transform;
        instance.world_bounds = local_bounds.transformed(&transform);

        self.dirty.mark(DirtyKind::Transforms);
        self.dirty.mark(DirtyKind::CullingData);
        Ok(())
    }

    /// Physics update keyed by group name and instance index. Scale is kept.
    pub fn set_instance_transform(
        &mut self,
        group_name: &str,
        index: usize,
        position: Vec3,
        rotation: Quat,
    ) -> SceneResult<()> {
        let key = InstanceKey {
            group: self.group_id(group_name)?,
            index,
        };
        let scale = self.instance(key)?.transform.scale;
        self.set_transform(
            key,
            Transform {
                position,
                rotation,
                scale,
            },
        )
    }

    pub fn set_instance_texture(&mut self, key: InstanceKey, texture_index: u32) -> SceneResult<()> {
        let g = self.group_mut(key.group)?;
        g.instance_mut(key.index)?.texture_index = texture_index;
        self.dirty.mark(DirtyKind::TextureIndices);
        Ok(())
    }

    /// Every instance in global order, tagged with its group.
    pub fn instances(&self) -> impl Iterator<Item = (GroupId, &Instance)> + '_ {
        self.groups.iter().enumerate().flat_map(|(g, group)| {
            group
                .instances
                .iter()
                .map(move |instance| (GroupId(g as u32), instance))
        })
    }

    pub fn total_instance_count(&self) -> u32 {
        self.groups.iter().map(ModelGroup::instance_count).sum()
    }

    /// Number of model groups, which is also the number of indirect draws.
    pub fn total_model_count(&self) -> u32 {
        self.groups.len() as u32
    }

    pub fn max_groups(&self) -> u32 {
        self.max_groups
    }

    /// Per-group draw ranges in group order.
    pub fn draw_layout(&self) -> Vec<GroupLayout> {
        let mut first_instance = 0;
        self.groups
            .iter()
            .map(|group| {
                let range = self.mesh_ranges[group.mesh.index()];
                let layout = GroupLayout {
                    first_index: range.first_index,
                    index_count: range.index_count,
                    vertex_offset: range.vertex_offset,
                    first_instance,
                    instance_count: group.instance_count(),
                };
                first_instance += layout.instance_count;
                layout
            })
            .collect()
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    pub fn apply(&mut self, change: SceneChange) {
        let _enter = self.span.enter();
        tracing::trace!("Scene change: {:?}", change);
        for &kind in change.dirty_kinds() {
            self.dirty.mark(kind);
        }
    }

    pub fn mark_dirty(&mut self, kind: DirtyKind) {
        self.dirty.mark(kind);
    }

    /// Raises every kind, e.g. after the GPU copies were reallocated.
    pub fn mark_all_dirty(&mut self) {
        self.dirty.mark_all();
    }

    /// True if `slot` still held stale `kind` data. The caller must rewrite
    /// it now; the kind goes clean after every slot has been serviced.
    pub fn consume_dirty_for_slot(&mut self, kind: DirtyKind, slot: usize) -> bool {
        self.dirty.consume(kind, slot)
    }

    pub fn dirty_state(&self, kind: DirtyKind) -> DirtyState {
        self.dirty.state(kind)
    }

    pub fn ring_size(&self) -> usize {
        self.dirty.ring_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RING: usize = 4;

    fn drain(scene: &mut SceneState) {
        for kind in DirtyKind::ALL {
            for slot in 0..RING {
                scene.consume_dirty_for_slot(kind, slot);
            }
        }
    }

    fn scene_with_groups() -> (SceneState, GroupId, GroupId) {
        let mut scene = SceneState::new(RING, 8);
        let cube = scene.add_mesh(Mesh::cube("cube", 0.5).unwrap());
        let oct = scene.add_mesh(Mesh::octahedron("oct", 1.0).unwrap());
        let a = scene.add_group("a", cube).unwrap();
        let b = scene.add_group("b", oct).unwrap();
        (scene, a, b)
    }

    #[test]
    fn test_duplicate_group_rejected() {
        let (mut scene, _, _) = scene_with_groups();
        let mesh = scene.groups()[0].mesh();
        assert_eq!(
            scene.add_group("a", mesh).unwrap_err(),
            SceneError::DuplicateGroup("a".into())
        );
    }

    #[test]
    fn test_group_budget() {
        let mut scene = SceneState::new(RING, 1);
        let cube = scene.add_mesh(Mesh::cube("cube", 1.0).unwrap());
        scene.add_group("one", cube).unwrap();
        assert_eq!(
            scene.add_group("two", cube).unwrap_err(),
            SceneError::TooManyGroups(1)
        );
    }

    #[test]
    fn test_draw_layout_offsets() {
        let (mut scene, a, b) = scene_with_groups();
        for _ in 0..3 {
            scene.add_instance(a, Transform::IDENTITY).unwrap();
        }
        scene.add_instance(b, Transform::IDENTITY).unwrap();

        let layout = scene.draw_layout();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout[0].first_index, 0);
        assert_eq!(layout[0].index_count, 36);
        assert_eq!(layout[0].vertex_offset, 0);
        assert_eq!(layout[0].first_instance, 0);
        assert_eq!(layout[0].instance_count, 3);

        assert_eq!(layout[1].first_index, 36);
        assert_eq!(layout[1].index_count, 24);
        assert_eq!(layout[1].vertex_offset, 24);
        assert_eq!(layout[1].first_instance, 3);
        assert_eq!(layout[1].instance_count, 1);

        assert_eq!(scene.total_instance_count(), 4);
        assert_eq!(scene.total_model_count(), 2);
        assert_eq!(scene.total_vertex_count(), 48);
        assert_eq!(scene.total_index_count(), 60);
    }

    #[test]
    fn test_instances_iterate_in_group_order() {
        let (mut scene, a, b) = scene_with_groups();
        scene.add_instance(b, Transform::IDENTITY).unwrap();
        scene.add_instance(a, Transform::IDENTITY).unwrap();
        let groups: Vec<_> = scene.instances().map(|(g, _)| g).collect();
        assert_eq!(groups, vec![a, b]);
    }

    #[test]
    fn test_add_instance_raises_all_kinds() {
        let (mut scene, a, _) = scene_with_groups();
        drain(&mut scene);
        scene.add_instance(a, Transform::IDENTITY).unwrap();
        for kind in DirtyKind::ALL {
            assert!(scene.dirty_state(kind).is_dirty());
        }
    }

    #[test]
    fn test_physics_update_keeps_scale_and_moves_bounds() {
        let (mut scene, a, _) = scene_with_groups();
        let key = scene
            .add_instance(a, Transform::IDENTITY.with_scale(Vec3::splat(2.0)))
            .unwrap();
        drain(&mut scene);

        scene
            .set_instance_transform("a", 0, Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY)
            .unwrap();

        let instance = scene.instance(key).unwrap();
        assert_eq!(instance.transform().scale, Vec3::splat(2.0));
        assert_eq!(instance.world_bounds().center, Vec3::new(1.0, 2.0, 3.0));
        assert!((instance.world_bounds().radius - 2.0 * 0.75f32.sqrt()).abs() < 1e-5);

        assert!(scene.dirty_state(DirtyKind::Transforms).is_dirty());
        assert!(scene.dirty_state(DirtyKind::CullingData).is_dirty());
        assert!(!scene.dirty_state(DirtyKind::DrawCommands).is_dirty());
        assert!(!scene.dirty_state(DirtyKind::TextureIndices).is_dirty());
    }

    #[test]
    fn test_physics_update_errors() {
        let (mut scene, _, _) = scene_with_groups();
        assert_eq!(
            scene
                .set_instance_transform("missing", 0, Vec3::ZERO, Quat::IDENTITY)
                .unwrap_err(),
            SceneError::UnknownGroup("missing".into())
        );
        assert!(matches!(
            scene.set_instance_transform("a", 5, Vec3::ZERO, Quat::IDENTITY),
            Err(SceneError::InstanceOutOfRange { index: 5, len: 0, .. })
        ));
    }

    #[test]
    fn test_remove_preserves_order() {
        let (mut scene, a, _) = scene_with_groups();
        for x in 0..4 {
            scene
                .add_instance(a, Transform::from_position(Vec3::new(x as f32, 0.0, 0.0)))
                .unwrap();
        }
        scene.remove_instance(InstanceKey { group: a, index: 1 }).unwrap();

        let xs: Vec<f32> = scene.groups()[0]
            .instances()
            .iter()
            .map(|i| i.transform().position.x)
            .collect();
        assert_eq!(xs, vec![0.0, 2.0, 3.0]);
        assert_eq!(scene.draw_layout()[1].first_instance, 3);
    }

    #[test]
    fn test_texture_defaults_and_updates() {
        let mut scene = SceneState::new(RING, 4);
        let mesh = scene.add_mesh(Mesh::cube("cube", 1.0).unwrap().with_texture(3));
        let g = scene.add_group("textured", mesh).unwrap();
        let key = scene.add_instance(g, Transform::IDENTITY).unwrap();
        assert_eq!(scene.instance(key).unwrap().texture_index(), 3);

        drain(&mut scene);
        scene.set_instance_texture(key, 9).unwrap();
        assert_eq!(scene.instance(key).unwrap().texture_index(), 9);
        assert!(scene.dirty_state(DirtyKind::TextureIndices).is_dirty());
        assert!(!scene.dirty_state(DirtyKind::Transforms).is_dirty());
    }

    #[test]
    fn test_apply_maps_changes_to_kinds() {
        let (mut scene, _, _) = scene_with_groups();
        drain(&mut scene);

        scene.apply(SceneChange::Textures);
        assert!(scene.dirty_state(DirtyKind::TextureIndices).is_dirty());
        assert!(!scene.dirty_state(DirtyKind::DrawCommands).is_dirty());

        scene.apply(SceneChange::Topology);
        for kind in DirtyKind::ALL {
            assert!(scene.dirty_state(kind).is_dirty());
        }
    }

    #[test]
    fn test_consume_clears_after_ring_size_slots() {
        let (mut scene, _, _) = scene_with_groups();
        drain(&mut scene);
        scene.mark_dirty(DirtyKind::Transforms);
        for slot in 0..RING {
            assert!(scene.consume_dirty_for_slot(DirtyKind::Transforms, slot));
        }
        assert!(!scene.consume_dirty_for_slot(DirtyKind::Transforms, 0));
        assert_eq!(scene.dirty_state(DirtyKind::Transforms), DirtyState::Clean);
    }
}
