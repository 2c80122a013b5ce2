//! Offscreen render targets, one color/depth pair per ring slot.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use ringframe_rhi::RhiResult;
use ringframe_rhi::device::Device;
use ringframe_rhi::image::Image;

/// Format of the HDR scene color the postprocess pass samples.
pub const COLOR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

pub struct FrameTargets {
    pub color: Image,
    pub depth: Image,
}

pub struct OffscreenTargets {
    slots: Vec<FrameTargets>,
    extent: vk::Extent2D,
}

impl OffscreenTargets {
    pub fn new(device: Arc<Device>, count: usize, extent: vk::Extent2D) -> RhiResult<Self> {
        let slots = (0..count)
            .map(|_| {
                Ok(FrameTargets {
                    color: Image::new(
                        device.clone(),
                        "offscreen color",
                        extent,
                        COLOR_FORMAT,
                        vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                    )?,
                    depth: Image::new(
                        device.clone(),
                        "offscreen depth",
                        extent,
                        DEPTH_FORMAT,
                        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                    )?,
                })
            })
            .collect::<RhiResult<Vec<_>>>()?;

        debug!(
            "Created {} offscreen target pairs at {}x{}",
            count, extent.width, extent.height
        );
        Ok(Self { slots, extent })
    }

    /// Targets of ring slot `slot`.
    pub fn slot(&self, slot: usize) -> &FrameTargets {
        &self.slots[slot % self.slots.len()]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}
