//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Shader module loading error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Invalid handle or out-of-range access
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// A required GPU allocation could not be satisfied
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A bounded fence wait expired
    #[error("Fence wait timed out after {0} ns")]
    FenceTimeout(u64),

    /// The logical device was lost
    #[error("Device lost")]
    DeviceLost,
}

impl RhiError {
    /// Returns true for errors after which no further GPU work can succeed.
    pub fn is_device_fatal(&self) -> bool {
        matches!(
            self,
            RhiError::DeviceLost | RhiError::VulkanError(ash::vk::Result::ERROR_DEVICE_LOST)
        )
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
