//! Renderer error types.

use thiserror::Error;

use ringframe_rhi::RhiError;
use ringframe_scene::SceneError;

use crate::recorder::RecordStage;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Rhi(#[from] RhiError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Core(#[from] ringframe_core::Error),

    /// A recording step was attempted out of order.
    #[error("Invalid recording transition: {from:?} -> {to:?}")]
    InvalidStage { from: RecordStage, to: RecordStage },

    #[error("Unknown postprocess effect '{0}'")]
    UnknownEffect(String),
}

impl RenderError {
    /// Device loss and similar failures that no rebuild can recover from.
    pub fn is_device_fatal(&self) -> bool {
        matches!(self, RenderError::Rhi(e) if e.is_device_fatal())
    }
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
