use wgpu::util::DeviceExt;

use crate::error::PipelineError;
use crate::mesh::MeshGeometry;

use super::scoped;

/// GPU-resident copy of the mesh. Created once, never written again.
pub(crate) struct MeshBuffer {
    pub buffer: wgpu::Buffer,
    pub vertex_count: u32,
    pub byte_len: u64,
}

impl MeshBuffer {
    /// Uploads `geometry` into a vertex buffer without `COPY_DST`, so the
    /// contents are fixed for the buffer's lifetime.
    pub fn upload(device: &wgpu::Device, geometry: &MeshGeometry) -> Result<Self, PipelineError> {
        let contents = geometry.as_bytes();
        let (buffer, error) = scoped(device, wgpu::ErrorFilter::OutOfMemory, || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quad vertices"),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        if let Some(err) = error {
            return Err(PipelineError::resource("vertex buffer", err.to_string()));
        }

        tracing::debug!(
            vertices = geometry.vertex_count(),
            bytes = contents.len(),
            "uploaded vertex buffer"
        );
        Ok(Self {
            buffer,
            vertex_count: geometry.vertex_count(),
            byte_len: contents.len() as u64,
        })
    }
}
