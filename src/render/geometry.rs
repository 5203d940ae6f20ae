//! Growable vertex/index buffers rewritten in full once per frame.
//!
//! The whole frame's geometry is concatenated and overwritten from offset
//! zero every frame (write-discard). That is sound here because the frame
//! loop is synchronous: the previous frame's GPU work has been submitted and
//! no read of the old contents is in flight when we overwrite.

use std::mem;

use tracing::debug;

pub const INITIAL_VERTEX_CAPACITY: usize = 5_000;
pub const INITIAL_INDEX_CAPACITY: usize = 10_000;

const VERTEX_SIZE: usize = mem::size_of::<egui::epaint::Vertex>();
const INDEX_SIZE: usize = mem::size_of::<u32>();

/// Growth policy for an undersized buffer: `None` when the current capacity
/// suffices, otherwise the replacement element count, `max(initial,
/// required * 1.5)`. Capacity never shrinks.
pub fn grown_capacity(current: usize, required: usize, initial: usize) -> Option<usize> {
    if required <= current {
        return None;
    }
    Some(initial.max(required + required / 2))
}

pub struct GeometryBuffers {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    index_capacity: usize,
}

impl GeometryBuffers {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            vertex_buffer: create_vertex_buffer(device, INITIAL_VERTEX_CAPACITY),
            index_buffer: create_index_buffer(device, INITIAL_INDEX_CAPACITY),
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
            index_capacity: INITIAL_INDEX_CAPACITY,
        }
    }

    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertex_capacity
    }

    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    /// Replace any buffer too small for the demanded element counts. Old
    /// buffers are dropped, not resized in place.
    pub fn ensure_capacity(
        &mut self,
        device: &wgpu::Device,
        required_vertices: usize,
        required_indices: usize,
    ) {
        if let Some(new_cap) =
            grown_capacity(self.vertex_capacity, required_vertices, INITIAL_VERTEX_CAPACITY)
        {
            debug!(
                old = self.vertex_capacity,
                new = new_cap,
                "growing vertex buffer"
            );
            self.vertex_buffer = create_vertex_buffer(device, new_cap);
            self.vertex_capacity = new_cap;
        }
        if let Some(new_cap) =
            grown_capacity(self.index_capacity, required_indices, INITIAL_INDEX_CAPACITY)
        {
            debug!(
                old = self.index_capacity,
                new = new_cap,
                "growing index buffer"
            );
            self.index_buffer = create_index_buffer(device, new_cap);
            self.index_capacity = new_cap;
        }
    }

    /// Overwrite both buffers with the frame's full payload. Callers must
    /// have sized the buffers with [`ensure_capacity`](Self::ensure_capacity)
    /// first.
    pub fn upload(&self, queue: &wgpu::Queue, vertex_bytes: &[u8], index_bytes: &[u8]) {
        debug_assert!(vertex_bytes.len() <= self.vertex_capacity * VERTEX_SIZE);
        debug_assert!(index_bytes.len() <= self.index_capacity * INDEX_SIZE);
        if !vertex_bytes.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, vertex_bytes);
        }
        if !index_bytes.is_empty() {
            queue.write_buffer(&self.index_buffer, 0, index_bytes);
        }
    }
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("overlay_vertex_buffer"),
        size: (capacity * VERTEX_SIZE) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_index_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("overlay_index_buffer"),
        size: (capacity * INDEX_SIZE) as u64,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sufficient_capacity_is_kept() {
        assert_eq!(grown_capacity(5_000, 4_999, INITIAL_VERTEX_CAPACITY), None);
        assert_eq!(grown_capacity(5_000, 5_000, INITIAL_VERTEX_CAPACITY), None);
    }

    #[test]
    fn growth_is_one_and_a_half_times_demand() {
        assert_eq!(
            grown_capacity(5_000, 12_000, INITIAL_VERTEX_CAPACITY),
            Some(18_000)
        );
    }

    #[test]
    fn capacity_never_shrinks() {
        // 12_000 demanded grows to 18_000; 10_000 afterwards changes nothing.
        let grown = grown_capacity(5_000, 12_000, INITIAL_VERTEX_CAPACITY).unwrap();
        assert_eq!(grown, 18_000);
        assert_eq!(grown_capacity(grown, 10_000, INITIAL_VERTEX_CAPACITY), None);
    }

    #[test]
    fn growth_respects_initial_floor() {
        // A tiny demand on a tiny buffer still allocates the initial size.
        assert_eq!(grown_capacity(8, 16, INITIAL_INDEX_CAPACITY), Some(10_000));
    }

    #[test]
    fn growth_is_monotonic_across_frames() {
        let mut capacity = INITIAL_VERTEX_CAPACITY;
        let demands = [6_000usize, 2_000, 9_500, 9_000, 20_000, 1];
        let mut last = capacity;
        for demand in demands {
            if let Some(new_cap) = grown_capacity(capacity, demand, INITIAL_VERTEX_CAPACITY) {
                capacity = new_cap;
            }
            assert!(capacity >= last);
            assert!(capacity >= demand);
            last = capacity;
        }
    }
}
