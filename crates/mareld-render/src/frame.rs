//! Per-frame context handed to effects and draw systems.

use crate::camera::Camera;
use crate::scene::Scene;
use ash::vk;

/// Ephemeral view of one frame being recorded.
///
/// Constructed fresh after image acquisition and dropped after
/// submission; the command buffer handles are valid only for this
/// frame's recording.
pub struct FrameContext<'a> {
    /// Frame-in-flight slot, cycling 0..N-1.
    pub frame_index: usize,
    /// Acquired swapchain image index; may differ from `frame_index`.
    pub image_index: usize,
    /// Seconds since the previous frame.
    pub frame_time: f32,
    /// Pre-processing command buffer (compute before the main pass).
    pub pre_cmd: vk::CommandBuffer,
    /// Main render pass command buffer.
    pub main_cmd: vk::CommandBuffer,
    /// Post-processing command buffer.
    pub post_cmd: vk::CommandBuffer,
    /// Camera for this frame.
    pub camera: &'a Camera,
    /// Global descriptor set bound to this slot's uniform buffer.
    pub global_set: vk::DescriptorSet,
    /// The scene registry.
    pub scene: &'a Scene,
}
