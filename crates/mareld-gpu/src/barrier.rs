//! Image-state machine and barrier insertion.
//!
//! Vulkan does not track image layouts; a mismatch between the layout an
//! image is in and the layout an operation expects is undefined behavior
//! rather than an error. All layout changes in the engine therefore go
//! through [`transition`], which derives the access/stage masks from a
//! closed edge table and rejects any transition that is not listed.

use crate::error::{GpuError, Result};
use ash::vk;

/// Tracked state of an image, one per legal usage pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageState {
    /// Freshly created, contents undefined.
    Undefined,
    /// Storage-image access from compute shaders.
    General,
    /// Source of a transfer (copy) operation.
    TransferSrc,
    /// Destination of a transfer (copy) operation.
    TransferDst,
    /// Sampled read-only access from shaders.
    ShaderReadOnly,
    /// Color attachment of the main pass.
    ColorAttachment,
    /// Depth attachment of the main pass.
    DepthAttachment,
    /// Presentable to the surface.
    PresentSrc,
}

impl ImageState {
    /// Vulkan layout backing this state.
    pub fn layout(self) -> vk::ImageLayout {
        match self {
            Self::Undefined => vk::ImageLayout::UNDEFINED,
            Self::General => vk::ImageLayout::GENERAL,
            Self::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            Self::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            Self::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            Self::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            Self::DepthAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            Self::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }

    /// Memory accesses that must be visible before leaving / entering this state.
    pub fn access_mask(self) -> vk::AccessFlags {
        match self {
            Self::Undefined => vk::AccessFlags::empty(),
            Self::General => vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
            Self::TransferSrc => vk::AccessFlags::TRANSFER_READ,
            Self::TransferDst => vk::AccessFlags::TRANSFER_WRITE,
            Self::ShaderReadOnly => vk::AccessFlags::SHADER_READ,
            Self::ColorAttachment => {
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            }
            Self::DepthAttachment => {
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
            }
            Self::PresentSrc => vk::AccessFlags::MEMORY_READ,
        }
    }

    /// Pipeline stages that touch an image in this state.
    pub fn stage_mask(self) -> vk::PipelineStageFlags {
        match self {
            Self::Undefined => vk::PipelineStageFlags::TOP_OF_PIPE,
            Self::General => vk::PipelineStageFlags::COMPUTE_SHADER,
            Self::TransferSrc | Self::TransferDst => vk::PipelineStageFlags::TRANSFER,
            Self::ShaderReadOnly => {
                vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::COMPUTE_SHADER
            }
            Self::ColorAttachment => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            Self::DepthAttachment => {
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
            }
            Self::PresentSrc => vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        }
    }

    /// Image aspect the state applies to.
    pub fn aspect_mask(self) -> vk::ImageAspectFlags {
        match self {
            Self::DepthAttachment => vk::ImageAspectFlags::DEPTH,
            _ => vk::ImageAspectFlags::COLOR,
        }
    }
}

/// Masks and layouts for one legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEdge {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Transitions the engine performs. Anything else is a bug, not a new edge
/// to add casually: every entry here corresponds to one call site pattern.
const ALLOWED: &[(ImageState, ImageState)] = &[
    // Initial placement of freshly created images.
    (ImageState::Undefined, ImageState::General),
    (ImageState::Undefined, ImageState::TransferDst),
    (ImageState::Undefined, ImageState::ColorAttachment),
    (ImageState::Undefined, ImageState::DepthAttachment),
    // Texture uploads.
    (ImageState::TransferDst, ImageState::ShaderReadOnly),
    // Storage image <-> copy source/destination (spectrum scratch, post chain).
    (ImageState::General, ImageState::TransferSrc),
    (ImageState::General, ImageState::TransferDst),
    (ImageState::TransferSrc, ImageState::General),
    (ImageState::TransferDst, ImageState::General),
    // Swapchain image through the post-processing chain.
    (ImageState::PresentSrc, ImageState::TransferSrc),
    (ImageState::TransferSrc, ImageState::TransferDst),
    (ImageState::TransferDst, ImageState::PresentSrc),
    (ImageState::ColorAttachment, ImageState::PresentSrc),
    (ImageState::ColorAttachment, ImageState::TransferSrc),
    // Depth buffer exposed read-only to depth-aware post effects.
    (ImageState::DepthAttachment, ImageState::ShaderReadOnly),
    (ImageState::ShaderReadOnly, ImageState::DepthAttachment),
];

/// Look up the masks for a transition, failing fast on unlisted edges.
pub fn edge(from: ImageState, to: ImageState) -> Result<TransitionEdge> {
    if !ALLOWED.contains(&(from, to)) {
        return Err(GpuError::InvalidTransition { from, to });
    }
    Ok(TransitionEdge {
        old_layout: from.layout(),
        new_layout: to.layout(),
        src_access: from.access_mask(),
        dst_access: to.access_mask(),
        src_stage: from.stage_mask(),
        dst_stage: to.stage_mask(),
    })
}

/// Record an image layout transition on a command buffer.
///
/// The aspect is taken from whichever side of the edge is depth-flavored,
/// so depth round trips keep the DEPTH aspect.
///
/// # Safety
/// The device, command buffer, and image must be valid, and the image must
/// actually be in `from` when the barrier executes.
pub unsafe fn transition(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    from: ImageState,
    to: ImageState,
) -> Result<()> {
    let e = edge(from, to)?;

    let aspect = if from == ImageState::DepthAttachment || to == ImageState::DepthAttachment {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    };

    let barrier = vk::ImageMemoryBarrier::default()
        .src_access_mask(e.src_access)
        .dst_access_mask(e.dst_access)
        .old_layout(e.old_layout)
        .new_layout(e.new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    device.cmd_pipeline_barrier(
        cmd,
        e.src_stage,
        e.dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier],
    );

    Ok(())
}

/// Record a full execution + memory barrier.
///
/// Used between every pair of dependent compute dispatches in the ocean
/// pipeline: dispatches are otherwise free to overlap, and the FFT passes
/// read what the previous pass wrote.
///
/// # Safety
/// The device and command buffer must be valid.
pub unsafe fn full_memory_barrier(device: &ash::Device, cmd: vk::CommandBuffer) {
    let barrier = vk::MemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ);

    device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::ALL_COMMANDS,
        vk::PipelineStageFlags::ALL_COMMANDS,
        vk::DependencyFlags::empty(),
        &[barrier],
        &[],
        &[],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_path_edges() {
        let e = edge(ImageState::Undefined, ImageState::TransferDst).unwrap();
        assert_eq!(e.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(e.new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(e.src_access, vk::AccessFlags::empty());
        assert_eq!(e.dst_access, vk::AccessFlags::TRANSFER_WRITE);

        let e = edge(ImageState::TransferDst, ImageState::ShaderReadOnly).unwrap();
        assert_eq!(e.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert!(e
            .dst_stage
            .contains(vk::PipelineStageFlags::FRAGMENT_SHADER));
    }

    #[test]
    fn storage_copy_round_trip_edges() {
        for (from, to) in [
            (ImageState::General, ImageState::TransferSrc),
            (ImageState::General, ImageState::TransferDst),
            (ImageState::TransferSrc, ImageState::General),
            (ImageState::TransferDst, ImageState::General),
        ] {
            let e = edge(from, to).unwrap();
            assert_eq!(e.old_layout, from.layout());
            assert_eq!(e.new_layout, to.layout());
        }
    }

    #[test]
    fn swapchain_chain_edges() {
        assert!(edge(ImageState::PresentSrc, ImageState::TransferSrc).is_ok());
        assert!(edge(ImageState::TransferSrc, ImageState::TransferDst).is_ok());
        assert!(edge(ImageState::TransferDst, ImageState::PresentSrc).is_ok());
        assert!(edge(ImageState::ColorAttachment, ImageState::PresentSrc).is_ok());
    }

    #[test]
    fn depth_round_trip_keeps_depth_masks() {
        let e = edge(ImageState::DepthAttachment, ImageState::ShaderReadOnly).unwrap();
        assert!(e
            .src_access
            .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
        let back = edge(ImageState::ShaderReadOnly, ImageState::DepthAttachment).unwrap();
        assert!(back
            .dst_stage
            .contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS));
    }

    #[test]
    fn unlisted_edges_are_rejected() {
        for (from, to) in [
            (ImageState::ShaderReadOnly, ImageState::General),
            (ImageState::PresentSrc, ImageState::General),
            (ImageState::Undefined, ImageState::PresentSrc),
            (ImageState::DepthAttachment, ImageState::TransferSrc),
        ] {
            match edge(from, to) {
                Err(GpuError::InvalidTransition { from: f, to: t }) => {
                    assert_eq!(f, from);
                    assert_eq!(t, to);
                }
                other => panic!("expected InvalidTransition, got {other:?}"),
            }
        }
    }

    #[test]
    fn depth_state_uses_depth_aspect() {
        assert_eq!(
            ImageState::DepthAttachment.aspect_mask(),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(ImageState::General.aspect_mask(), vk::ImageAspectFlags::COLOR);
    }
}
