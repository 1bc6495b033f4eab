//! Vulkan abstraction layer for the Mareld engine.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - Memory allocation via gpu-allocator
//! - Command buffer management
//! - Swapchain handling with per-image depth attachments
//! - Textures with explicitly tracked image state
//! - A generational texture arena
//! - Synchronization primitives and the per-frame sync handoff

pub mod arena;
pub mod barrier;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use arena::{TextureArena, TextureHandle};
pub use barrier::{full_memory_barrier, ImageState};
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{
    write_combined_image_sampler, write_storage_image, write_uniform_buffer, DescriptorPool,
    DescriptorSetLayoutBuilder,
};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use pipeline::{ComputePipeline, GraphicsPipeline, GraphicsPipelineConfig};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::Swapchain;
pub use sync::{create_fence, create_semaphore, FrameSync, SyncHandoff};
pub use texture::Texture;

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
