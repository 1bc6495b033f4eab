//! Engine-wide descriptor set layouts.
//!
//! Created once at setup, passed by reference to every constructor that
//! binds against them, destroyed after the last frame. No global state.

use ash::vk;
use mareld_gpu::descriptors::DescriptorSetLayoutBuilder;
use mareld_gpu::{GpuContext, Result};

/// The descriptor set layouts shared across systems.
pub struct EngineLayouts {
    /// Set 0 everywhere: the global UBO.
    pub global: vk::DescriptorSetLayout,
    /// Material set of textured meshes: one combined image sampler.
    pub material: vk::DescriptorSetLayout,
    /// Post-processing scratch pair: read image at 0, write image at 1.
    pub post_pair: vk::DescriptorSetLayout,
    /// Scene depth, read-only, for depth-aware post effects.
    pub depth: vk::DescriptorSetLayout,
}

impl EngineLayouts {
    /// Create all layouts.
    pub fn new(gpu: &GpuContext) -> Result<Self> {
        let device = gpu.device();

        unsafe {
            let global = DescriptorSetLayoutBuilder::new()
                .uniform_buffer(0, vk::ShaderStageFlags::ALL_GRAPHICS)
                .build(device)?;

            let material = DescriptorSetLayoutBuilder::new()
                .sampled_image(0, vk::ShaderStageFlags::FRAGMENT)
                .build(device)?;

            let post_pair = DescriptorSetLayoutBuilder::new()
                .storage_image(0, vk::ShaderStageFlags::COMPUTE)
                .storage_image(1, vk::ShaderStageFlags::COMPUTE)
                .build(device)?;

            let depth = DescriptorSetLayoutBuilder::new()
                .sampled_image(0, vk::ShaderStageFlags::COMPUTE)
                .build(device)?;

            Ok(Self {
                global,
                material,
                post_pair,
                depth,
            })
        }
    }

    /// Destroy all layouts.
    ///
    /// # Safety
    /// No pipeline or descriptor set built from these layouts may be in
    /// use.
    pub unsafe fn destroy(&self, gpu: &GpuContext) {
        let device = gpu.device();
        device.destroy_descriptor_set_layout(self.global, None);
        device.destroy_descriptor_set_layout(self.material, None);
        device.destroy_descriptor_set_layout(self.post_pair, None);
        device.destroy_descriptor_set_layout(self.depth, None);
    }
}
