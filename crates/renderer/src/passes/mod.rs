//! Graphics passes of a frame.

pub mod geometry;
pub mod postprocess;

pub use geometry::GeometryPass;
pub use postprocess::{DEFAULT_EFFECT, EffectTable, PostprocessPass};
