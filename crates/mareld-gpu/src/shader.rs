//! SPIR-V shader module loading.
//!
//! Shaders are opaque compiled programs identified by path; only their
//! invocation contracts (bindings, push constants, dispatch sizes) are
//! known to the engine.

use crate::error::{GpuError, Result};
use ash::vk;
use std::path::Path;

/// Read a SPIR-V binary from disk into properly aligned words.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| {
        GpuError::ShaderCompilation(format!("failed to open {}: {e}", path.display()))
    })?;

    ash::util::read_spv(&mut file).map_err(|e| {
        GpuError::ShaderCompilation(format!("failed to read {}: {e}", path.display()))
    })
}

/// Create a shader module from SPIR-V words.
///
/// # Safety
/// The device must be valid and the code must be valid SPIR-V.
pub unsafe fn create_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo::default().code(code);
    device
        .create_shader_module(&info, None)
        .map_err(|e| GpuError::ShaderCompilation(e.to_string()))
}
