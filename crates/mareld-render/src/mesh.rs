//! GPU-resident meshes.

use ash::vk;
use gpu_allocator::MemoryLocation;
use mareld_assets::{MeshData, Vertex};
use mareld_gpu::memory::GpuBuffer;
use mareld_gpu::{GpuContext, Result};

/// Vertex and index buffers for one mesh.
pub struct GpuMesh {
    vertex_buffer: GpuBuffer,
    index_buffer: Option<GpuBuffer>,
    vertex_count: u32,
    index_count: u32,
}

impl GpuMesh {
    /// Upload mesh data.
    pub fn upload(gpu: &GpuContext, data: &MeshData, name: &str) -> Result<Self> {
        let mut allocator = gpu.allocator().lock();

        let vertex_bytes = std::mem::size_of_val(data.vertices.as_slice()) as u64;
        let vertex_buffer = allocator.create_buffer(
            vertex_bytes,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryLocation::CpuToGpu,
            &format!("{name}_vertices"),
        )?;
        vertex_buffer.write(&data.vertices)?;

        let index_buffer = if data.indices.is_empty() {
            None
        } else {
            let index_bytes = std::mem::size_of_val(data.indices.as_slice()) as u64;
            let buffer = allocator.create_buffer(
                index_bytes,
                vk::BufferUsageFlags::INDEX_BUFFER,
                MemoryLocation::CpuToGpu,
                &format!("{name}_indices"),
            )?;
            buffer.write(&data.indices)?;
            Some(buffer)
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertices.len() as u32,
            index_count: data.indices.len() as u32,
        })
    }

    /// Bind buffers and issue the draw.
    ///
    /// # Safety
    /// The command buffer must be inside a compatible render pass with a
    /// mesh pipeline bound.
    pub unsafe fn record_draw(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
        if let Some(index_buffer) = &self.index_buffer {
            device.cmd_bind_index_buffer(cmd, index_buffer.buffer, 0, vk::IndexType::UINT32);
            device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
        } else {
            device.cmd_draw(cmd, self.vertex_count, 1, 0, 0);
        }
    }

    /// Number of indices (0 for unindexed meshes).
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Destroy the buffers.
    ///
    /// # Safety
    /// The mesh must not be referenced by in-flight GPU work.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        let mut allocator = gpu.allocator().lock();
        let _ = allocator.free_buffer(&mut self.vertex_buffer);
        if let Some(index_buffer) = &mut self.index_buffer {
            let _ = allocator.free_buffer(index_buffer);
        }
    }
}

/// Vertex binding description matching [`Vertex`].
pub fn vertex_bindings() -> Vec<vk::VertexInputBindingDescription> {
    vec![vk::VertexInputBindingDescription::default()
        .binding(0)
        .stride(Vertex::SIZE as u32)
        .input_rate(vk::VertexInputRate::VERTEX)]
}

/// Vertex attribute descriptions matching [`Vertex`].
pub fn vertex_attributes() -> Vec<vk::VertexInputAttributeDescription> {
    vec![
        vk::VertexInputAttributeDescription::default()
            .location(0)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(std::mem::offset_of!(Vertex, position) as u32),
        vk::VertexInputAttributeDescription::default()
            .location(1)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(std::mem::offset_of!(Vertex, color) as u32),
        vk::VertexInputAttributeDescription::default()
            .location(2)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(std::mem::offset_of!(Vertex, normal) as u32),
        vk::VertexInputAttributeDescription::default()
            .location(3)
            .binding(0)
            .format(vk::Format::R32G32_SFLOAT)
            .offset(std::mem::offset_of!(Vertex, uv) as u32),
    ]
}

/// Placeholder mesh for scene-level tests that never record draws.
#[cfg(test)]
pub(crate) fn null_mesh() -> GpuMesh {
    GpuMesh {
        vertex_buffer: GpuBuffer {
            buffer: vk::Buffer::null(),
            allocation: None,
            size: 0,
        },
        index_buffer: None,
        vertex_count: 0,
        index_count: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_cover_the_vertex() {
        let attrs = vertex_attributes();
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[3].offset, 36);
        assert_eq!(vertex_bindings()[0].stride, 44);
    }
}
