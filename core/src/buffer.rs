//! Vertex and index buffer store
//!
//! Buffers are created lazily the first time an ID is uploaded to. Re-uploading
//! replaces the contents but keeps the device handle, so vertex arrays that captured
//! the handle see the new data on their next draw.

use hashbrown::HashMap;
use tracing::debug;

use crate::device::{BufferHandle, BufferTarget, BufferUsage, RasterDevice};
use crate::error::{BridgeError, BridgeResult};
use rasterlink_shared::BufferId;

/// A device buffer and the number of elements last uploaded to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBuffer {
    pub handle: BufferHandle,
    pub element_count: usize,
}

/// Vertex (f32) and index (u32) buffers. The two kinds have separate ID spaces.
#[derive(Debug, Default)]
pub struct BufferStore {
    vertex: HashMap<BufferId, GpuBuffer>,
    index: HashMap<BufferId, GpuBuffer>,
}

fn upload<D: RasterDevice + ?Sized>(
    table: &mut HashMap<BufferId, GpuBuffer>,
    device: &mut D,
    target: BufferTarget,
    buffer_id: BufferId,
    bytes: &[u8],
    element_count: usize,
) -> GpuBuffer {
    let entry = table.entry(buffer_id).or_insert_with(|| {
        let handle = device.create_buffer();
        debug!("Created {:?} {} -> {:?}", target, buffer_id, handle);
        GpuBuffer {
            handle,
            element_count: 0,
        }
    });
    device.bind_buffer(target, Some(entry.handle));
    device.buffer_data(target, bytes, BufferUsage::StaticDraw);
    device.bind_buffer(target, None);
    entry.element_count = element_count;
    *entry
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload per-vertex or per-instance float data to `buffer_id`.
    pub fn upload_vertex<D: RasterDevice + ?Sized>(
        &mut self,
        device: &mut D,
        buffer_id: BufferId,
        data: &[f32],
    ) -> GpuBuffer {
        upload(
            &mut self.vertex,
            device,
            BufferTarget::Array,
            buffer_id,
            bytemuck::cast_slice(data),
            data.len(),
        )
    }

    /// Upload u32 indices to `buffer_id`.
    ///
    /// Must not be called while a vertex array is bound: the element binding is
    /// vertex-array state.
    pub fn upload_index<D: RasterDevice + ?Sized>(
        &mut self,
        device: &mut D,
        buffer_id: BufferId,
        data: &[u32],
    ) -> GpuBuffer {
        upload(
            &mut self.index,
            device,
            BufferTarget::ElementArray,
            buffer_id,
            bytemuck::cast_slice(data),
            data.len(),
        )
    }

    pub fn vertex(&self, buffer_id: BufferId) -> BridgeResult<&GpuBuffer> {
        self.vertex
            .get(&buffer_id)
            .ok_or(BridgeError::UnknownVertexBuffer(buffer_id))
    }

    pub fn index(&self, buffer_id: BufferId) -> BridgeResult<&GpuBuffer> {
        self.index
            .get(&buffer_id)
            .ok_or(BridgeError::UnknownIndexBuffer(buffer_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;

    #[test]
    fn first_upload_creates_buffer() {
        let mut device = HeadlessDevice::new();
        let mut store = BufferStore::new();
        let buffer = store.upload_vertex(&mut device, BufferId(3), &[1.0, 2.0, 3.0]);

        assert_eq!(buffer.element_count, 3);
        assert_eq!(
            device.buffer_contents(buffer.handle).unwrap(),
            bytemuck::cast_slice::<f32, u8>(&[1.0, 2.0, 3.0])
        );
        assert!(store.vertex(BufferId(4)).is_err());
        assert!(store.index(BufferId(3)).is_err());
    }

    #[test]
    fn reupload_keeps_handle_and_updates_count() {
        let mut device = HeadlessDevice::new();
        let mut store = BufferStore::new();
        let first = store.upload_index(&mut device, BufferId(1), &[0, 1, 2]);
        let second = store.upload_index(&mut device, BufferId(1), &[0, 1, 2, 2, 3, 0]);

        assert_eq!(first.handle, second.handle);
        assert_eq!(store.index(BufferId(1)).unwrap().element_count, 6);
        assert_eq!(device.buffer_contents(second.handle).unwrap().len(), 24);
        assert!(device.take_errors().is_empty());
    }

    #[test]
    fn vertex_and_index_ids_are_independent() {
        let mut device = HeadlessDevice::new();
        let mut store = BufferStore::new();
        let vb = store.upload_vertex(&mut device, BufferId(0), &[0.5]);
        let ib = store.upload_index(&mut device, BufferId(0), &[7]);
        assert_ne!(vb.handle, ib.handle);
    }
}
