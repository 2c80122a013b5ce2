//! Error types shared across the workspace.

use thiserror::Error;

/// Workspace-level error type.
///
/// Crates that talk to Vulkan directly have richer error enums of their own;
/// this one covers configuration, platform and I/O failures and is the
/// common denominator the renderer converts into.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors reported by crates without an `ash` dependency
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid pipeline configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the workspace [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
