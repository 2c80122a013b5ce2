//! CPU-side scene model.
//!
//! This crate provides:
//! - Meshes, model groups and instances ([`SceneState`])
//! - Per-slot staleness tracking ([`DirtyFlags`])
//! - Bounding spheres and frustum tests
//! - Camera and orbit controller

mod bounds;
mod camera;
mod dirty;
mod error;
mod frustum;
mod mesh;
mod state;
mod transform;

pub use bounds::BoundingSphere;
pub use camera::{Camera, OrbitController};
pub use dirty::{DirtyFlags, DirtyKind, DirtyState, MAX_TRACKED_SLOTS};
pub use error::{SceneError, SceneResult};
pub use frustum::{Frustum, FrustumPlane, sphere_visible};
pub use mesh::{Mesh, MeshId, MeshVertex};
pub use state::{
    GroupId, GroupLayout, Instance, InstanceKey, MeshRange, ModelGroup, SceneChange, SceneState,
};
pub use transform::Transform;
