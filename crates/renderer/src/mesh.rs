use bytemuck::{Pod, Zeroable};

/// One 2D position, tightly packed as two `f32`s.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
}

impl Vertex {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { position: [x, y] }
    }
}

/// Full-viewport quad, ordered for a triangle strip.
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new(-1.0, 1.0),
    Vertex::new(1.0, 1.0),
    Vertex::new(-1.0, -1.0),
    Vertex::new(1.0, -1.0),
];

/// Immutable vertex data for the single mesh the pipeline draws.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    vertices: Vec<Vertex>,
}

impl MeshGeometry {
    pub fn quad() -> Self {
        Self {
            vertices: QUAD_VERTICES.to_vec(),
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub const fn stride() -> u64 {
        std::mem::size_of::<Vertex>() as u64
    }

    pub fn topology() -> wgpu::PrimitiveTopology {
        wgpu::PrimitiveTopology::TriangleStrip
    }

    /// Vertex buffer layout feeding the position attribute at `location`.
    pub fn attributes(location: u32) -> [wgpu::VertexAttribute; 1] {
        [wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: location,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_is_thirty_two_bytes_in_strip_order() {
        let quad = MeshGeometry::quad();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.as_bytes().len(), 4 * 2 * 4);
        assert_eq!(MeshGeometry::stride(), 8);

        let floats: &[f32] = bytemuck::cast_slice(quad.as_bytes());
        assert_eq!(floats, &[-1.0, 1.0, 1.0, 1.0, -1.0, -1.0, 1.0, -1.0]);
    }
}
