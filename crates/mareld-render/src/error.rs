//! Rendering error types.

use ash::vk;
use mareld_gpu::GpuError;
use thiserror::Error;

/// Errors surfaced by the frame orchestrator.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The swapchain no longer matches the surface; recreate and retry
    /// the frame from the top.
    #[error("Swapchain out of date; recreation required")]
    SwapchainOutOfDate,

    /// Image acquisition timed out; retriable.
    #[error("Swapchain image acquisition timed out")]
    AcquireTimeout,

    /// A frame operation was invoked outside its valid window.
    #[error("Frame state error: {0}")]
    FrameState(String),

    /// Any other GPU error. Creation-time failures are fatal: they
    /// indicate misconfiguration, not a transient condition.
    #[error(transparent)]
    Gpu(GpuError),
}

impl From<GpuError> for RenderError {
    fn from(e: GpuError) -> Self {
        match e {
            GpuError::SwapchainOutOfDate => Self::SwapchainOutOfDate,
            GpuError::Timeout => Self::AcquireTimeout,
            other => Self::Gpu(other),
        }
    }
}

impl From<vk::Result> for RenderError {
    fn from(e: vk::Result) -> Self {
        Self::from(GpuError::from(e))
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
