//! Synchronization2 barriers used while recording a frame.

use ash::vk;

use ringframe_rhi::image::subresource_range;

/// Layout transitions a frame goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageTransition {
    /// Offscreen color target before the geometry pass. Contents discarded.
    UndefinedToColorAttachment,
    /// Depth target before the geometry pass. Contents discarded.
    UndefinedToDepthAttachment,
    /// Offscreen color after the geometry pass, before postprocess samples it.
    ColorAttachmentToShaderRead,
    /// Swapchain image after postprocess and overlay.
    ColorAttachmentToPresent,
}

struct TransitionMasks {
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_stage: vk::PipelineStageFlags2,
    src_access: vk::AccessFlags2,
    dst_stage: vk::PipelineStageFlags2,
    dst_access: vk::AccessFlags2,
}

impl ImageTransition {
    fn masks(self) -> TransitionMasks {
        match self {
            ImageTransition::UndefinedToColorAttachment => TransitionMasks {
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                // Waits on the previous frame's sampling of the same image,
                // and on the acquire semaphore for swapchain images.
                src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags2::FRAGMENT_SHADER,
                src_access: vk::AccessFlags2::NONE,
                dst_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                dst_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            },
            ImageTransition::UndefinedToDepthAttachment => TransitionMasks {
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                src_stage: vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                src_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                dst_stage: vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                dst_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            },
            ImageTransition::ColorAttachmentToShaderRead => TransitionMasks {
                old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                dst_stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
                dst_access: vk::AccessFlags2::SHADER_SAMPLED_READ,
            },
            ImageTransition::ColorAttachmentToPresent => TransitionMasks {
                old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
                src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                dst_stage: vk::PipelineStageFlags2::NONE,
                dst_access: vk::AccessFlags2::NONE,
            },
        }
    }

    pub fn old_layout(self) -> vk::ImageLayout {
        self.masks().old_layout
    }

    pub fn new_layout(self) -> vk::ImageLayout {
        self.masks().new_layout
    }

    pub fn barrier(
        self,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
    ) -> vk::ImageMemoryBarrier2<'static> {
        let m = self.masks();
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(m.src_stage)
            .src_access_mask(m.src_access)
            .dst_stage_mask(m.dst_stage)
            .dst_access_mask(m.dst_access)
            .old_layout(m.old_layout)
            .new_layout(m.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range(aspect))
    }
}

/// Whole-buffer memory dependency between two stages.
pub fn buffer_barrier(
    buffer: vk::Buffer,
    src_stage: vk::PipelineStageFlags2,
    src_access: vk::AccessFlags2,
    dst_stage: vk::PipelineStageFlags2,
    dst_access: vk::AccessFlags2,
) -> vk::BufferMemoryBarrier2<'static> {
    vk::BufferMemoryBarrier2::default()
        .src_stage_mask(src_stage)
        .src_access_mask(src_access)
        .dst_stage_mask(dst_stage)
        .dst_access_mask(dst_access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(buffer)
        .offset(0)
        .size(vk::WHOLE_SIZE)
}

/// Fill commands finished before compute reads and atomically updates.
pub fn transfer_to_compute(buffer: vk::Buffer) -> vk::BufferMemoryBarrier2<'static> {
    buffer_barrier(
        buffer,
        vk::PipelineStageFlags2::ALL_TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
    )
}

/// Compute (or a preceding fill) output consumed by indirect draws and
/// vertex shaders.
pub fn compute_to_indirect(buffer: vk::Buffer) -> vk::BufferMemoryBarrier2<'static> {
    buffer_barrier(
        buffer,
        vk::PipelineStageFlags2::COMPUTE_SHADER | vk::PipelineStageFlags2::ALL_TRANSFER,
        vk::AccessFlags2::SHADER_STORAGE_WRITE | vk::AccessFlags2::TRANSFER_WRITE,
        vk::PipelineStageFlags2::DRAW_INDIRECT | vk::PipelineStageFlags2::VERTEX_SHADER,
        vk::AccessFlags2::INDIRECT_COMMAND_READ | vk::AccessFlags2::SHADER_STORAGE_READ,
    )
}

/// Compute output read by the graphics shaders.
pub fn compute_to_graphics(buffer: vk::Buffer) -> vk::BufferMemoryBarrier2<'static> {
    buffer_barrier(
        buffer,
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::PipelineStageFlags2::VERTEX_SHADER | vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_READ,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_chain_layouts_line_up() {
        assert_eq!(
            ImageTransition::UndefinedToColorAttachment.new_layout(),
            ImageTransition::ColorAttachmentToShaderRead.old_layout()
        );
        assert_eq!(
            ImageTransition::UndefinedToColorAttachment.new_layout(),
            ImageTransition::ColorAttachmentToPresent.old_layout()
        );
        assert_eq!(
            ImageTransition::ColorAttachmentToPresent.new_layout(),
            vk::ImageLayout::PRESENT_SRC_KHR
        );
    }

    #[test]
    fn test_shader_read_barrier_targets_fragment_sampling() {
        let barrier = ImageTransition::ColorAttachmentToShaderRead
            .barrier(vk::Image::null(), vk::ImageAspectFlags::COLOR);
        assert_eq!(barrier.dst_stage_mask, vk::PipelineStageFlags2::FRAGMENT_SHADER);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags2::SHADER_SAMPLED_READ);
        assert_eq!(barrier.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_indirect_barrier_covers_count_read() {
        let barrier = compute_to_indirect(vk::Buffer::null());
        assert!(barrier.dst_stage_mask.contains(vk::PipelineStageFlags2::DRAW_INDIRECT));
        assert!(barrier.dst_access_mask.contains(vk::AccessFlags2::INDIRECT_COMMAND_READ));
        assert!(barrier.src_access_mask.contains(vk::AccessFlags2::TRANSFER_WRITE));
        assert_eq!(barrier.size, vk::WHOLE_SIZE);
    }
}
