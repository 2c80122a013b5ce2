//! Compute stages recorded before the offscreen pass.

pub mod culling;
pub mod transform;

pub use culling::{CullingCompute, HostCullOutput, cull_on_host};
pub use transform::TransformCompute;
