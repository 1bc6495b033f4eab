//! Post-processing chain over a ping-pong texture pair.

use crate::effects::PostProcessEffect;
use crate::frame::FrameContext;
use crate::layouts::EngineLayouts;
use crate::Result;
use ash::vk;
use mareld_gpu::barrier::{self, full_memory_barrier, ImageState};
use mareld_gpu::command::CommandPool;
use mareld_gpu::descriptors::{
    write_combined_image_sampler, write_storage_image, DescriptorPool,
};
use mareld_gpu::swapchain::Swapchain;
use mareld_gpu::texture::Texture;
use mareld_gpu::GpuContext;

/// Two slots used alternately as read source and write destination.
///
/// The chain always starts reading slot 0 of the pair; after an odd
/// number of swaps the roles are swapped back so the next frame's chain
/// starts from the same logical slot regardless of chain length parity.
#[derive(Debug, Clone, Copy)]
pub struct PingPongSlots<T> {
    slots: [T; 2],
    current: usize,
}

impl<T: Copy> PingPongSlots<T> {
    /// Create with the starting slot first.
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
            current: 0,
        }
    }

    /// The slot the next effect reads from.
    pub fn current(&self) -> T {
        self.slots[self.current]
    }

    /// Index of the current slot (0 or 1).
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Swap roles after an effect ran.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Undo the parity drift of an odd-length chain.
    pub fn restore_parity(&mut self, chain_len: usize) {
        if chain_len % 2 == 1 {
            self.swap();
        }
    }
}

/// Texture index holding the final image after `effect_count` effects,
/// given the chain copied its input into texture 0.
pub fn final_texture_index(effect_count: usize) -> usize {
    effect_count % 2
}

/// Ordered chain of full-screen compute effects applied between two
/// swapchain copies.
///
/// `add_effect`/`clear_effects` must not be called while a frame
/// referencing the old list is in flight; the caller synchronizes
/// (in practice: only between `present_frame` and the next
/// `begin_frame`, or behind a device wait).
pub struct PostProcessManager {
    effects: Vec<Box<dyn PostProcessEffect>>,
    resources: Option<PostResources>,
}

/// Extent-sized resources, rebuilt on swapchain recreation.
struct PostResources {
    pool: DescriptorPool,
    /// Scratch pair per frame in flight.
    textures: Vec<[Texture; 2]>,
    /// Descriptor pairs per frame in flight: (A reads, B reads).
    pair_sets: Vec<PingPongSlots<vk::DescriptorSet>>,
    /// Depth reads per swapchain image; depth buffers belong to
    /// swapchain images, not frame slots.
    depth_sets: Vec<vk::DescriptorSet>,
    extent: vk::Extent2D,
}

impl PostProcessManager {
    /// Create the manager and its extent-sized resources.
    pub fn new(
        gpu: &GpuContext,
        cmd_pool: &CommandPool,
        layouts: &EngineLayouts,
        swapchain: &Swapchain,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let resources = create_resources(gpu, cmd_pool, layouts, swapchain, frames_in_flight)?;
        Ok(Self {
            effects: Vec::new(),
            resources: Some(resources),
        })
    }

    /// Append an effect to the chain.
    pub fn add_effect(&mut self, effect: Box<dyn PostProcessEffect>) {
        self.effects.push(effect);
    }

    /// Drop all effects.
    pub fn clear_effects(&mut self) {
        self.effects.clear();
    }

    /// Number of registered effects.
    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// Current scratch extent.
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.resources.as_ref().map(|r| r.extent)
    }

    /// Rebuild extent-sized resources after swapchain recreation.
    ///
    /// # Safety
    /// The GPU must be idle.
    pub unsafe fn recreate(
        &mut self,
        gpu: &GpuContext,
        cmd_pool: &CommandPool,
        layouts: &EngineLayouts,
        swapchain: &Swapchain,
        frames_in_flight: usize,
    ) -> Result<()> {
        if let Some(mut old) = self.resources.take() {
            old.destroy(gpu);
        }
        self.resources = Some(create_resources(
            gpu,
            cmd_pool,
            layouts,
            swapchain,
            frames_in_flight,
        )?);
        Ok(())
    }

    /// Record the full chain for one frame.
    ///
    /// Copies the swapchain image into the scratch pair, runs every
    /// effect with a full barrier before each dispatch, and copies the
    /// result back, restoring the swapchain image to presentable state.
    /// An empty chain still performs both copies and leaves the frame
    /// visually unmodified.
    ///
    /// # Safety
    /// `ctx.post_cmd` must be recording; the swapchain image must be in
    /// PresentSrc state and the depth image in DepthAttachment state.
    pub unsafe fn record_chain(
        &mut self,
        gpu: &GpuContext,
        ctx: &FrameContext<'_>,
        swapchain_image: vk::Image,
        depth_image: vk::Image,
    ) -> Result<()> {
        let device = gpu.device();
        let cmd = ctx.post_cmd;
        let resources = self
            .resources
            .as_mut()
            .ok_or_else(|| crate::RenderError::FrameState("post resources missing".into()))?;
        let extent = resources.extent;
        let frame = ctx.frame_index;

        // Scene depth becomes sampleable for depth-aware effects.
        barrier::transition(
            device,
            cmd,
            depth_image,
            ImageState::DepthAttachment,
            ImageState::ShaderReadOnly,
        )?;

        // Swapchain image -> scratch texture 0.
        barrier::transition(
            device,
            cmd,
            swapchain_image,
            ImageState::PresentSrc,
            ImageState::TransferSrc,
        )?;
        let scratch_in = &mut resources.textures[frame][0];
        scratch_in.transition(device, cmd, ImageState::TransferDst)?;
        copy_image(
            device,
            cmd,
            swapchain_image,
            scratch_in.image(),
            extent,
        );
        scratch_in.transition(device, cmd, ImageState::General)?;

        // The chain proper.
        let pair = &mut resources.pair_sets[frame];
        for effect in &self.effects {
            full_memory_barrier(device, cmd);
            effect.record_post(
                device,
                ctx,
                pair.current(),
                resources.depth_sets[ctx.image_index],
                extent,
            );
            pair.swap();
        }
        pair.restore_parity(self.effects.len());

        // Result -> swapchain image, restored to presentable state.
        full_memory_barrier(device, cmd);
        let result = &mut resources.textures[frame][final_texture_index(self.effects.len())];
        result.transition(device, cmd, ImageState::TransferSrc)?;
        barrier::transition(
            device,
            cmd,
            swapchain_image,
            ImageState::TransferSrc,
            ImageState::TransferDst,
        )?;
        copy_image(device, cmd, result.image(), swapchain_image, extent);
        barrier::transition(
            device,
            cmd,
            swapchain_image,
            ImageState::TransferDst,
            ImageState::PresentSrc,
        )?;
        result.transition(device, cmd, ImageState::General)?;

        // Depth back to attachment state for the next frame.
        barrier::transition(
            device,
            cmd,
            depth_image,
            ImageState::ShaderReadOnly,
            ImageState::DepthAttachment,
        )?;

        Ok(())
    }

    /// Destroy all GPU resources, including the registered effects'.
    ///
    /// # Safety
    /// The chain must not be referenced by in-flight GPU work.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        for effect in &mut self.effects {
            effect.destroy(gpu);
        }
        self.effects.clear();
        if let Some(mut resources) = self.resources.take() {
            resources.destroy(gpu);
        }
    }
}

impl PostResources {
    unsafe fn destroy(&mut self, gpu: &GpuContext) {
        for pair in &mut self.textures {
            for texture in pair {
                texture.destroy(gpu);
            }
        }
        self.textures.clear();
        self.pool.destroy(gpu.device());
    }
}

fn create_resources(
    gpu: &GpuContext,
    cmd_pool: &CommandPool,
    layouts: &EngineLayouts,
    swapchain: &Swapchain,
    frames_in_flight: usize,
) -> Result<PostResources> {
    let device = gpu.device();
    let extent = swapchain.extent;
    let image_count = swapchain.images.len();

    let n = frames_in_flight as u32;
    let pool_sizes = [
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::STORAGE_IMAGE)
            .descriptor_count(n * 4),
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(image_count as u32),
    ];
    let pool = unsafe {
        DescriptorPool::new(device, n * 2 + image_count as u32, &pool_sizes)?
    };

    let mut textures = Vec::with_capacity(frames_in_flight);
    let mut pair_sets = Vec::with_capacity(frames_in_flight);
    for frame in 0..frames_in_flight {
        let a = Texture::storage(
            gpu,
            cmd_pool,
            extent.width,
            extent.height,
            swapchain.format,
            &format!("post_scratch_a_{frame}"),
        )?;
        let b = Texture::storage(
            gpu,
            cmd_pool,
            extent.width,
            extent.height,
            swapchain.format,
            &format!("post_scratch_b_{frame}"),
        )?;

        let sets = unsafe { pool.allocate(device, &[layouts.post_pair, layouts.post_pair])? };
        unsafe {
            // First set reads A and writes B; second is the mirror.
            write_storage_image(device, sets[0], 0, a.view(), a.layout());
            write_storage_image(device, sets[0], 1, b.view(), b.layout());
            write_storage_image(device, sets[1], 0, b.view(), b.layout());
            write_storage_image(device, sets[1], 1, a.view(), a.layout());
        }

        textures.push([a, b]);
        pair_sets.push(PingPongSlots::new(sets[0], sets[1]));
    }

    let mut depth_sets = Vec::with_capacity(image_count);
    for depth in &swapchain.depth_attachments {
        let set = unsafe { pool.allocate(device, &[layouts.depth])?[0] };
        unsafe {
            write_combined_image_sampler(
                device,
                set,
                0,
                depth.sampler,
                depth.view,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
        }
        depth_sets.push(set);
    }

    Ok(PostResources {
        pool,
        textures,
        pair_sets,
        depth_sets,
        extent,
    })
}

unsafe fn copy_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: vk::Image,
    dst: vk::Image,
    extent: vk::Extent2D,
) {
    let layers = vk::ImageSubresourceLayers::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .mip_level(0)
        .base_array_layer(0)
        .layer_count(1);

    let region = vk::ImageCopy::default()
        .src_subresource(layers)
        .dst_subresource(layers)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        });

    device.cmd_copy_image(
        cmd,
        src,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        dst,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        &[region],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_chains_keep_the_starting_slot() {
        for chain_len in [0usize, 2, 4] {
            let mut pair = PingPongSlots::new('a', 'b');
            for _ in 0..chain_len {
                pair.swap();
            }
            pair.restore_parity(chain_len);
            assert_eq!(pair.current(), 'a');
        }
    }

    #[test]
    fn odd_chains_are_swapped_back() {
        for chain_len in [1usize, 3, 5] {
            let mut pair = PingPongSlots::new('a', 'b');
            for _ in 0..chain_len {
                pair.swap();
            }
            assert_eq!(pair.current(), 'b');
            pair.restore_parity(chain_len);
            assert_eq!(pair.current(), 'a');
        }
    }

    #[test]
    fn consecutive_frames_start_from_the_same_slot() {
        // Run the chain bookkeeping twice for odd lengths: frame 2 must
        // read from the same logical slot frame 1 started with.
        for chain_len in [1usize, 3, 5] {
            let mut pair = PingPongSlots::new(0u32, 1u32);
            for _frame in 0..2 {
                let start = pair.current();
                assert_eq!(start, 0);
                for _ in 0..chain_len {
                    pair.swap();
                }
                pair.restore_parity(chain_len);
            }
            assert_eq!(pair.current(), 0);
        }
    }

    #[test]
    fn final_texture_follows_effect_parity() {
        // The input copy lands in texture 0; each effect moves the image
        // to the other texture of the pair.
        assert_eq!(final_texture_index(0), 0);
        assert_eq!(final_texture_index(1), 1);
        assert_eq!(final_texture_index(2), 0);
        assert_eq!(final_texture_index(5), 1);
    }
}
