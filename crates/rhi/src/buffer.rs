//! GPU buffer management.
//!
//! Every buffer the frame pipeline touches per frame lives in host-visible,
//! persistently mapped memory (`CpuToGpu`) and exposes its device address so
//! shaders can reach it through push constants instead of descriptor sets.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ringframe_rhi::device::Device;
//! use ringframe_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), ringframe_rhi::RhiError> {
//! let indices: [u32; 3] = [0, 1, 2];
//! let index_buffer = Buffer::new_with_data(device, BufferUsage::Index, &indices)?;
//! assert_ne!(index_buffer.device_address(), 0);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Intended use of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex data, read by the geometry pass through its address.
    Vertex,
    /// Index data bound with `vkCmdBindIndexBuffer`.
    Index,
    /// Per-frame uniforms, read through a device address.
    Uniform,
    /// General shader storage written by compute stages.
    Storage,
    /// Indirect draw commands and counters.
    Indirect,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    ///
    /// Everything can be cleared with `vkCmdFillBuffer` and addressed from
    /// shaders.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        let common =
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
        let specific = match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::STORAGE_BUFFER
            }
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => {
                vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::STORAGE_BUFFER
            }
            BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
            BufferUsage::Indirect => {
                vk::BufferUsageFlags::INDIRECT_BUFFER | vk::BufferUsageFlags::STORAGE_BUFFER
            }
        };
        common | specific
    }

    /// Memory location used when none is given explicitly.
    pub fn memory_location(self) -> MemoryLocation {
        // Host-visible for direct writes and readback of compute results.
        MemoryLocation::CpuToGpu
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Storage => "storage",
            BufferUsage::Indirect => "indirect",
        }
    }
}

/// GPU buffer with gpu-allocator managed memory.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
    address: vk::DeviceAddress,
}

impl Buffer {
    /// Creates a buffer of `size` bytes in the usage's default location.
    ///
    /// # Errors
    ///
    /// - [`RhiError::InvalidHandle`] for a zero size
    /// - [`RhiError::ResourceExhausted`] when the allocator is out of memory
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        Self::with_location(device, usage, size, usage.memory_location())
    }

    /// Creates a buffer in an explicit memory location.
    pub fn with_location(
        device: Arc<Device>,
        usage: BufferUsage,
        size: vk::DeviceSize,
        location: MemoryLocation,
    ) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocated = device.lock_allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: usage.name(),
                    requirements,
                    location,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|e| match e {
                    gpu_allocator::AllocationError::OutOfMemory => RhiError::ResourceExhausted(
                        format!("{} buffer of {} bytes", usage.name(), size),
                    ),
                    other => RhiError::AllocatorError(other),
                })
        });
        let allocation = match allocated {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let mut this = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
            address: 0,
        };

        if let Some(allocation) = this.allocation.as_ref() {
            unsafe {
                this.device.handle().bind_buffer_memory(
                    buffer,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        let address_info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
        this.address = unsafe { this.device.handle().get_buffer_device_address(&address_info) };

        debug!("Created {} buffer: {} bytes", usage.name(), size);
        Ok(this)
    }

    /// Creates a buffer sized for `data` and writes it.
    pub fn new_with_data<T: Pod>(
        device: Arc<Device>,
        usage: BufferUsage,
        data: &[T],
    ) -> RhiResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = Self::new(device, usage, bytes.len() as vk::DeviceSize)?;
        buffer.write_data(0, bytes)?;
        Ok(buffer)
    }

    fn mapped_ptr(&self) -> RhiResult<*mut u8> {
        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::InvalidHandle("Buffer allocation is not available".to_string())
        })?;
        allocation
            .mapped_ptr()
            .map(|ptr| ptr.as_ptr().cast::<u8>())
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))
    }

    fn check_range(&self, offset: vk::DeviceSize, len: usize) -> RhiResult<()> {
        let end = offset.checked_add(len as vk::DeviceSize);
        match end {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(RhiError::InvalidHandle(format!(
                "Access exceeds buffer size: offset {} + len {} > buffer {}",
                offset, len, self.size
            ))),
        }
    }

    /// Writes raw bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Fails if the memory is not mapped or the write would run past the end.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.check_range(offset, data.len())?;
        let base = self.mapped_ptr()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), base.add(offset as usize), data.len());
        }
        Ok(())
    }

    /// Writes a slice of plain-old-data records at `offset`.
    pub fn write_slice<T: Pod>(&self, offset: vk::DeviceSize, data: &[T]) -> RhiResult<()> {
        self.write_data(offset, bytemuck::cast_slice(data))
    }

    /// Copies `out.len()` bytes starting at `offset` into `out`.
    ///
    /// Only meaningful after the GPU work writing the range has completed.
    pub fn read_data(&self, offset: vk::DeviceSize, out: &mut [u8]) -> RhiResult<()> {
        if out.is_empty() {
            return Ok(());
        }
        self.check_range(offset, out.len())?;
        let base = self.mapped_ptr()?;
        unsafe {
            std::ptr::copy_nonoverlapping(base.add(offset as usize), out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    /// Reads one record of type `T` at `offset`.
    pub fn read_pod<T: Pod>(&self, offset: vk::DeviceSize) -> RhiResult<T> {
        let mut value = T::zeroed();
        self.read_data(offset, bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// GPU virtual address of the first byte.
    #[inline]
    pub fn device_address(&self) -> vk::DeviceAddress {
        self.address
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.lock_allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        tracing::error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => tracing::error!("Leaking {} buffer memory: {}", self.usage.name(), e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BufferUsage; 5] = [
        BufferUsage::Vertex,
        BufferUsage::Index,
        BufferUsage::Uniform,
        BufferUsage::Storage,
        BufferUsage::Indirect,
    ];

    #[test]
    fn test_every_usage_is_addressable_and_fillable() {
        for usage in ALL {
            let flags = usage.to_vk_usage();
            assert!(flags.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS));
            assert!(flags.contains(vk::BufferUsageFlags::TRANSFER_DST));
        }
    }

    #[test]
    fn test_indirect_usage_flags() {
        let flags = BufferUsage::Indirect.to_vk_usage();
        assert!(flags.contains(vk::BufferUsageFlags::INDIRECT_BUFFER));
        assert!(flags.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
    }

    #[test]
    fn test_index_usage_flags() {
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER)
        );
    }

    #[test]
    fn test_buffers_are_host_visible() {
        for usage in ALL {
            assert_eq!(usage.memory_location(), MemoryLocation::CpuToGpu);
        }
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Indirect.name(), "indirect");
    }
}
