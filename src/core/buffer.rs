use crate::core::device::BufferId;
use crate::core::gpu::Gpu;
use log::debug;

/// A GPU byte buffer whose storage only ever grows.
#[derive(Debug)]
pub struct Buffer {
    id: BufferId,
    capacity: usize,
}

impl Buffer {
    pub fn new(gpu: &mut Gpu) -> Self {
        Self {
            id: gpu.device_mut().create_buffer(),
            capacity: 0,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Writes `bytes` at `offset`. Storage is reallocated (stream-draw) when the
    /// write does not fit; otherwise it is updated in place.
    pub fn set_bytes(&mut self, gpu: &mut Gpu, bytes: &[u8], offset: usize) {
        let required = offset + bytes.len();
        if required > self.capacity {
            debug!(
                "Buffer {:?} grows {} -> {} bytes",
                self.id, self.capacity, required
            );
            gpu.device_mut().allocate_buffer(self.id, required);
            self.capacity = required;
        }
        gpu.device_mut().write_buffer(self.id, offset, bytes);
    }

    /// Typed convenience over [`Buffer::set_bytes`] at offset 0.
    pub fn set_data<T: bytemuck::Pod>(&mut self, gpu: &mut Gpu, data: &[T]) {
        self.set_bytes(gpu, bytemuck::cast_slice(data), 0);
    }
}
