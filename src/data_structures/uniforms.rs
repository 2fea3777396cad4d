//! Fixed-size uniform blocks with lazy GPU allocation.

/// A uniform block of fixed byte size bound at a fixed binding index.
///
/// The GPU buffer is created on first [`generate`](Self::generate); until
/// then the block only records its size and binding. Uploads may target the
/// whole block or a sub-range.
#[derive(Debug)]
pub struct UniformBuffer {
    pub size: u64,
    pub binding: u32,
    buffer: Option<wgpu::Buffer>,
}

impl UniformBuffer {
    pub fn new(size: u64, binding: u32) -> Self {
        Self {
            size,
            binding,
            buffer: None,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.buffer.is_some()
    }

    /// Allocate the GPU buffer. Calling this on an already generated block
    /// is a no-op.
    pub fn generate(&mut self, device: &wgpu::Device) {
        if self.buffer.is_some() {
            return;
        }
        self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform buffer"),
            size: self.size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
    }

    /// Upload `data` at byte `offset` into the block. Out-of-range writes
    /// and writes to an ungenerated block are dropped with an error log, the
    /// block stays usable.
    pub fn upload(&self, queue: &wgpu::Queue, data: &[u8], offset: u64) {
        let Some(buffer) = &self.buffer else {
            log::error!(
                "uniform upload to ungenerated block (binding {})",
                self.binding
            );
            return;
        };
        if offset + data.len() as u64 > self.size {
            log::error!(
                "uniform upload out of range: offset {} + len {} > size {}",
                offset,
                data.len(),
                self.size
            );
            return;
        }
        queue.write_buffer(buffer, offset, data);
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }
}
