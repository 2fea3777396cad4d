//! Vertex data and lazily generated geometry buffers.

use wgpu::util::DeviceExt;

/// Canonical vertex layout shared by every mesh in the engine.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 3],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0; 3],
            tangent: [0.0; 3],
            uv: [0.0; 2],
            color: [1.0, 1.0, 1.0],
        }
    }
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x3,
        3 => Float32x2,
        4 => Float32x3,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[derive(Debug)]
pub struct GeometryBuffers {
    pub vertex: wgpu::Buffer,
    pub index: Option<wgpu::Buffer>,
}

/// CPU-side mesh data plus its lazily created GPU buffers.
///
/// Vertex and index buffers are allocated and uploaded exactly once, on the
/// first [`ensure_generated`](Self::ensure_generated) before a draw. Editing
/// `vertices`/`indices` after generation has no GPU effect unless the
/// geometry is [`invalidate`](Self::invalidate)d first.
#[derive(Debug, Default)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub topology: wgpu::PrimitiveTopology,
    gpu: Option<GeometryBuffers>,
}

impl Geometry {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            topology: wgpu::PrimitiveTopology::TriangleList,
            gpu: None,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.gpu.is_some()
    }

    /// Create and fill the GPU buffers if they do not exist yet.
    pub fn ensure_generated(&mut self, device: &wgpu::Device) {
        if self.gpu.is_some() {
            return;
        }
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("geometry vertex buffer"),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = if self.indices.is_empty() {
            None
        } else {
            Some(
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("geometry index buffer"),
                    contents: bytemuck::cast_slice(&self.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
            )
        };
        self.gpu = Some(GeometryBuffers { vertex, index });
    }

    /// Drop the GPU buffers so the next draw re-uploads the CPU data.
    pub fn invalidate(&mut self) {
        self.gpu = None;
    }

    pub fn buffers(&self) -> Option<&GeometryBuffers> {
        self.gpu.as_ref()
    }

    /// Number of elements a draw call covers: indices when indexed,
    /// vertices otherwise.
    pub fn draw_count(&self) -> u32 {
        if self.indices.is_empty() {
            self.vertices.len() as u32
        } else {
            self.indices.len() as u32
        }
    }

    /// Two-triangle quad covering clip space, for fullscreen passes.
    pub fn screen_quad() -> Self {
        Self::quad(1)
    }

    /// Unit quad in the XY plane subdivided `subdivisions` times per axis.
    pub fn quad(subdivisions: u32) -> Self {
        let n = subdivisions.max(1);
        let mut vertices = Vec::with_capacity(((n + 1) * (n + 1)) as usize);
        for y in 0..=n {
            for x in 0..=n {
                let u = x as f32 / n as f32;
                let v = y as f32 / n as f32;
                vertices.push(Vertex {
                    position: [u * 2.0 - 1.0, v * 2.0 - 1.0, 0.0],
                    normal: [0.0, 0.0, 1.0],
                    tangent: [1.0, 0.0, 0.0],
                    uv: [u, v],
                    ..Default::default()
                });
            }
        }
        let mut indices = Vec::with_capacity((n * n * 6) as usize);
        for y in 0..n {
            for x in 0..n {
                let i = y * (n + 1) + x;
                indices.extend_from_slice(&[i, i + 1, i + n + 1, i + 1, i + n + 2, i + n + 1]);
            }
        }
        Self::new(vertices, indices)
    }
}
