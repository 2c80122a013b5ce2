//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Safe wrappers over `ash` for the pieces a GPU-driven frame needs:
//! - Instance, physical device selection and logical device creation
//! - Swapchain management
//! - Persistently mapped, device-addressable buffers
//! - Offscreen images and samplers
//! - Command recording, compute and graphics pipelines
//! - Fences and semaphores

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
