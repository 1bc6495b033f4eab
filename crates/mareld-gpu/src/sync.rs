//! Synchronization primitives and the per-frame stage handoff.

use crate::error::{GpuError, Result};
use ash::vk;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = device.create_semaphore(&create_info, None)?;
    Ok(semaphore)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = device.create_fence(&create_info, None)?;
    Ok(fence)
}

/// Wait for a fence to be signaled.
///
/// Expiry surfaces as the retriable [`GpuError::Timeout`].
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(
    device: &ash::Device,
    fence: vk::Fence,
    timeout_ns: u64,
) -> Result<()> {
    match device.wait_for_fences(&[fence], true, timeout_ns) {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) => Err(GpuError::Timeout),
        Err(e) => Err(GpuError::from(e)),
    }
}

/// Reset a fence to unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.reset_fences(&[fence])?;
    Ok(())
}

/// The semaphore link between two successive submissions of one frame.
///
/// Each submission stage consumes the handoff produced by the previous
/// stage and returns a fresh one wrapping its own completion semaphore.
/// Values are never mutated in place, so a stage cannot accidentally wait
/// on a stale semaphore from a prior frame.
#[derive(Debug, Clone, Copy)]
pub struct SyncHandoff {
    semaphore: vk::Semaphore,
    wait_stage: vk::PipelineStageFlags,
}

impl SyncHandoff {
    /// Wrap the completion semaphore a stage just signaled.
    pub fn new(semaphore: vk::Semaphore, wait_stage: vk::PipelineStageFlags) -> Self {
        Self {
            semaphore,
            wait_stage,
        }
    }

    /// The semaphore the next stage must wait on.
    pub fn semaphore(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// The pipeline stage at which the wait applies.
    pub fn wait_stage(&self) -> vk::PipelineStageFlags {
        self.wait_stage
    }
}

/// Per-frame-in-flight synchronization resources.
///
/// One of these exists per frame slot; the fence gates reuse of every
/// resource indexed by that slot.
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready.
    pub image_available: vk::Semaphore,
    /// Signaled when the pre-processing submission completes.
    pub pre_finished: vk::Semaphore,
    /// Signaled when the main render submission completes.
    pub main_finished: vk::Semaphore,
    /// Signaled by the last submission of the frame; waited before the
    /// slot is reused.
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create frame synchronization resources.
    ///
    /// The fence starts signaled so the first use of the slot does not
    /// block.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        Ok(Self {
            image_available: create_semaphore(device)?,
            pre_finished: create_semaphore(device)?,
            main_finished: create_semaphore(device)?,
            in_flight: create_fence(device, true)?,
        })
    }

    /// Wait until the slot's previous frame has fully completed.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device, timeout_ns: u64) -> Result<()> {
        wait_for_fence(device, self.in_flight, timeout_ns)
    }

    /// Re-arm the fence for the next use of this slot.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        reset_fence(device, self.in_flight)
    }

    /// Destroy synchronization resources.
    ///
    /// # Safety
    /// The device must be valid and resources must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.pre_finished, None);
        device.destroy_semaphore(self.main_finished, None);
        device.destroy_fence(self.in_flight, None);
    }
}
