//! Synchronization primitives.
//!
//! - [`Semaphore`]: GPU-to-GPU ordering between acquire, submit and present
//! - [`Fence`]: GPU-to-CPU completion, guarding reuse of a ring slot
//!
//! Fence waits take an explicit timeout. `u64::MAX` means "wait forever";
//! any other value turns an expired wait into [`RhiError::FenceTimeout`] so the
//! caller can tell a hung GPU apart from other failures.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ringframe_rhi::device::Device;
//! use ringframe_rhi::sync::{Fence, Semaphore};
//!
//! # fn example(device: Arc<Device>) -> Result<(), ringframe_rhi::RhiError> {
//! let image_available = Semaphore::new(device.clone())?;
//! let in_flight = Fence::new(device.clone(), true)?;
//!
//! in_flight.wait(u64::MAX)?;
//! in_flight.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan semaphore wrapper.
///
/// Created unsignaled. Destroyed on drop; the owner must make sure no queue
/// operation still references it (the scheduler idles the device first).
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `signaled` - Create in the signaled state, so the first wait on a
    ///   fresh ring slot returns immediately
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Nanoseconds; `u64::MAX` waits indefinitely
    ///
    /// # Errors
    ///
    /// - [`RhiError::FenceTimeout`] if a bounded wait expires
    /// - [`RhiError::DeviceLost`] if the device was lost while waiting
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        wait_for_fences(&self.device, &[self.fence], timeout)
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be pending on any queue.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Waits for all `fences`, mapping timeout and device loss to dedicated errors.
pub fn wait_for_fences(device: &Device, fences: &[vk::Fence], timeout: u64) -> RhiResult<()> {
    if fences.is_empty() {
        return Ok(());
    }
    let result = unsafe { device.handle().wait_for_fences(fences, true, timeout) };
    map_wait_result(result, timeout)
}

fn map_wait_result(result: Result<(), vk::Result>, timeout: u64) -> RhiResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) => Err(RhiError::FenceTimeout(timeout)),
        Err(vk::Result::ERROR_DEVICE_LOST) => Err(RhiError::DeviceLost),
        Err(e) => Err(RhiError::VulkanError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_result_mapping() {
        assert!(map_wait_result(Ok(()), u64::MAX).is_ok());
        assert!(matches!(
            map_wait_result(Err(vk::Result::TIMEOUT), 5),
            Err(RhiError::FenceTimeout(5))
        ));
        assert!(matches!(
            map_wait_result(Err(vk::Result::ERROR_DEVICE_LOST), u64::MAX),
            Err(RhiError::DeviceLost)
        ));
        assert!(matches!(
            map_wait_result(Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY), u64::MAX),
            Err(RhiError::VulkanError(_))
        ));
    }

    #[test]
    fn test_device_lost_is_fatal() {
        assert!(RhiError::DeviceLost.is_device_fatal());
        assert!(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST).is_device_fatal());
        assert!(!RhiError::FenceTimeout(1).is_device_fatal());
    }

    #[test]
    fn test_sync_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
    }
}
