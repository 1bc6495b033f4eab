//! GPU textures with explicitly tracked image state.

use crate::barrier::{self, ImageState};
use crate::command::{execute_single_time, CommandPool};
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::GpuImage;
use ash::vk;
use gpu_allocator::MemoryLocation;

/// One allocated image with its view, sampler, and tracked state.
///
/// Vulkan never reports a layout mismatch; it silently misbehaves. Every
/// texture therefore records which [`ImageState`] it is in, and all state
/// changes go through [`Texture::transition`] so the tracked state and the
/// recorded barriers cannot drift apart.
pub struct Texture {
    image: GpuImage,
    view: vk::ImageView,
    sampler: vk::Sampler,
    state: ImageState,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Texture {
    /// Create an empty storage-capable texture in General state.
    ///
    /// Used for compute outputs: FFT fields, wave outputs, and the
    /// post-processing scratch pair. Storage textures also carry transfer
    /// usage because the spectrum copy and the post chain copy through
    /// them.
    pub fn storage(
        gpu: &GpuContext,
        pool: &CommandPool,
        width: u32,
        height: u32,
        format: vk::Format,
        name: &str,
    ) -> Result<Self> {
        let usage = vk::ImageUsageFlags::STORAGE
            | vk::ImageUsageFlags::SAMPLED
            | vk::ImageUsageFlags::TRANSFER_SRC
            | vk::ImageUsageFlags::TRANSFER_DST;
        let mut texture = Self::allocate(gpu, width, height, format, usage, name)?;

        unsafe {
            execute_single_time(gpu.device(), pool, gpu.graphics_queue(), |cmd| {
                let _ = barrier::transition(
                    gpu.device(),
                    cmd,
                    texture.image.image,
                    ImageState::Undefined,
                    ImageState::General,
                );
            })?;
        }
        texture.state = ImageState::General;

        Ok(texture)
    }

    /// Create a storage texture initialized from CPU data.
    ///
    /// Used for the noise texture and any precomputed tables that compute
    /// shaders read as storage images. Ends in General state.
    pub fn storage_with_data(
        gpu: &GpuContext,
        pool: &CommandPool,
        width: u32,
        height: u32,
        format: vk::Format,
        data: &[u8],
        name: &str,
    ) -> Result<Self> {
        let usage = vk::ImageUsageFlags::STORAGE
            | vk::ImageUsageFlags::SAMPLED
            | vk::ImageUsageFlags::TRANSFER_SRC
            | vk::ImageUsageFlags::TRANSFER_DST;
        let mut texture = Self::allocate(gpu, width, height, format, usage, name)?;
        texture.upload(gpu, pool, data, ImageState::General)?;
        Ok(texture)
    }

    /// Create a sampled texture from CPU pixel data.
    ///
    /// Used for mesh textures decoded from image files. Ends in
    /// ShaderReadOnly state.
    pub fn sampled_with_data(
        gpu: &GpuContext,
        pool: &CommandPool,
        width: u32,
        height: u32,
        format: vk::Format,
        data: &[u8],
        name: &str,
    ) -> Result<Self> {
        let usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST;
        let mut texture = Self::allocate(gpu, width, height, format, usage, name)?;
        texture.upload(gpu, pool, data, ImageState::ShaderReadOnly)?;
        Ok(texture)
    }

    fn allocate(
        gpu: &GpuContext,
        width: u32,
        height: u32,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        name: &str,
    ) -> Result<Self> {
        let device = gpu.device();

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = gpu
            .allocator()
            .lock()
            .create_image(&image_info, MemoryLocation::GpuOnly, name)?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        let view = unsafe { device.create_image_view(&view_info, None)? };

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT);
        let sampler = unsafe { device.create_sampler(&sampler_info, None)? };

        Ok(Self {
            image,
            view,
            sampler,
            state: ImageState::Undefined,
            format,
            extent: vk::Extent2D { width, height },
        })
    }

    fn upload(
        &mut self,
        gpu: &GpuContext,
        pool: &CommandPool,
        data: &[u8],
        final_state: ImageState,
    ) -> Result<()> {
        let device = gpu.device();

        let mut staging = gpu.allocator().lock().create_buffer(
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "texture_staging",
        )?;
        staging.write(data)?;

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            });

        let image = self.image.image;
        let mut transition_err = Ok(());
        unsafe {
            execute_single_time(device, pool, gpu.graphics_queue(), |cmd| {
                transition_err = (|| -> Result<()> {
                    barrier::transition(
                        device,
                        cmd,
                        image,
                        ImageState::Undefined,
                        ImageState::TransferDst,
                    )?;
                    device.cmd_copy_buffer_to_image(
                        cmd,
                        staging.buffer,
                        image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[region],
                    );
                    barrier::transition(device, cmd, image, ImageState::TransferDst, final_state)
                })();
            })?;
        }
        gpu.allocator().lock().free_buffer(&mut staging)?;
        transition_err?;

        self.state = final_state;
        Ok(())
    }

    /// Record a state transition and update the tracked state.
    ///
    /// # Safety
    /// The device and command buffer must be valid, and the barrier must
    /// execute before any use of the texture in the new state.
    pub unsafe fn transition(
        &mut self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        to: ImageState,
    ) -> Result<()> {
        barrier::transition(device, cmd, self.image.image, self.state, to)?;
        self.state = to;
        Ok(())
    }

    /// Record a full-extent copy between two storage textures.
    ///
    /// Both must be in General state; both are returned to it. Used for
    /// the per-frame spectrum scratch copy.
    ///
    /// # Safety
    /// The device and command buffer must be valid; extents must match.
    pub unsafe fn record_copy(
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        src: &mut Texture,
        dst: &mut Texture,
    ) -> Result<()> {
        if src.extent != dst.extent {
            return Err(GpuError::InvalidState(format!(
                "copy extent mismatch: {:?} vs {:?}",
                src.extent, dst.extent
            )));
        }

        src.transition(device, cmd, ImageState::TransferSrc)?;
        dst.transition(device, cmd, ImageState::TransferDst)?;

        let region = vk::ImageCopy::default()
            .src_subresource(color_layer())
            .dst_subresource(color_layer())
            .extent(vk::Extent3D {
                width: src.extent.width,
                height: src.extent.height,
                depth: 1,
            });

        device.cmd_copy_image(
            cmd,
            src.image.image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            dst.image.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );

        src.transition(device, cmd, ImageState::General)?;
        dst.transition(device, cmd, ImageState::General)?;

        Ok(())
    }

    /// Raw image handle.
    pub fn image(&self) -> vk::Image {
        self.image.image
    }

    /// Image view for descriptor writes.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Sampler for combined image sampler descriptors.
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Current tracked state.
    pub fn state(&self) -> ImageState {
        self.state
    }

    /// Layout matching the current tracked state.
    pub fn layout(&self) -> vk::ImageLayout {
        self.state.layout()
    }

    /// Texture format.
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Texture extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Destroy the texture and free its memory.
    ///
    /// # Safety
    /// The texture must not be in use by the GPU.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        let device = gpu.device();
        device.destroy_sampler(self.sampler, None);
        device.destroy_image_view(self.view, None);
        let _ = gpu.allocator().lock().free_image(&mut self.image);
    }
}

fn color_layer() -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .mip_level(0)
        .base_array_layer(0)
        .layer_count(1)
}
