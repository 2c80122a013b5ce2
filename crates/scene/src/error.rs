//! Scene error types.

use thiserror::Error;

/// Errors raised by [`SceneState`](crate::SceneState) mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("Model group '{0}' already exists")]
    DuplicateGroup(String),

    #[error("Unknown model group '{0}'")]
    UnknownGroup(String),

    #[error("Unknown mesh id {0}")]
    UnknownMesh(u32),

    #[error("Instance {index} out of range for group '{group}' ({len} instances)")]
    InstanceOutOfRange {
        group: String,
        index: usize,
        len: usize,
    },

    #[error("Scene is limited to {0} draw groups")]
    TooManyGroups(u32),

    #[error("Mesh '{0}' has no vertices or indices")]
    EmptyMesh(String),
}

pub type SceneResult<T> = std::result::Result<T, SceneError>;
