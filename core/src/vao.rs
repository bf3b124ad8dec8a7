//! Vertex layout binder
//!
//! Captures geometry, instance and index buffers plus a shader's packed attribute
//! layout in a vertex-array object keyed by [`VaoId`].

use hashbrown::HashMap;
use tracing::debug;

use crate::buffer::BufferStore;
use crate::device::{BufferTarget, RasterDevice, VertexArrayHandle};
use crate::error::{BridgeError, BridgeResult};
use crate::shader::{AttribSlot, ShaderProgram};
use rasterlink_shared::{BufferId, ShaderId, VaoId};

/// Per-vertex attributes advance every vertex, per-instance ones every instance.
const VERTEX_DIVISOR: u32 = 0;
const INSTANCE_DIVISOR: u32 = 1;

/// A vertex-array object and the buffer IDs it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub handle: VertexArrayHandle,
    pub shader_id: ShaderId,
    pub geometry_buffer_id: BufferId,
    pub instance_buffer_id: BufferId,
    pub index_buffer_id: BufferId,
}

/// Buffer IDs for [`VertexLayouts::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaoBuffers {
    pub geometry: BufferId,
    pub instance: BufferId,
    pub index: BufferId,
}

fn bind_attribs<D: RasterDevice + ?Sized>(device: &mut D, attribs: &[AttribSlot], divisor: u32) {
    for attrib in attribs {
        // Unused attributes are dropped by the compiler; nothing to bind.
        let Some(location) = attrib.location else {
            continue;
        };
        device.vertex_attrib_pointer(
            location,
            attrib.components,
            attrib.byte_stride,
            attrib.byte_offset,
        );
        device.enable_vertex_attrib(location);
        device.vertex_attrib_divisor(location, divisor);
    }
}

#[derive(Debug, Default)]
pub struct VertexLayouts {
    layouts: HashMap<VaoId, VertexLayout>,
}

impl VertexLayouts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the vertex array for `vao_id`, destroying any previous one at that ID.
    ///
    /// All three buffers must already exist. Leaves no vertex array bound.
    pub fn allocate<D: RasterDevice + ?Sized>(
        &mut self,
        device: &mut D,
        vao_id: VaoId,
        shader_id: ShaderId,
        shader: &ShaderProgram,
        buffers: &BufferStore,
        ids: VaoBuffers,
    ) -> BridgeResult<&VertexLayout> {
        let geometry = buffers.vertex(ids.geometry)?.handle;
        let instance = buffers.vertex(ids.instance)?.handle;
        let index = buffers.index(ids.index)?.handle;

        if let Some(previous) = self.layouts.remove(&vao_id) {
            debug!("Replacing {} ({:?})", vao_id, previous.handle);
            device.delete_vertex_array(previous.handle);
        }

        let handle = device.create_vertex_array();
        device.bind_vertex_array(Some(handle));

        device.bind_buffer(BufferTarget::Array, Some(geometry));
        bind_attribs(device, &shader.geometry_attribs, VERTEX_DIVISOR);

        device.bind_buffer(BufferTarget::Array, Some(instance));
        bind_attribs(device, &shader.instance_attribs, INSTANCE_DIVISOR);

        device.bind_buffer(BufferTarget::ElementArray, Some(index));

        device.bind_vertex_array(None);
        device.bind_buffer(BufferTarget::Array, None);

        let layout = VertexLayout {
            handle,
            shader_id,
            geometry_buffer_id: ids.geometry,
            instance_buffer_id: ids.instance,
            index_buffer_id: ids.index,
        };
        self.layouts.insert(vao_id, layout);
        self.get(vao_id)
    }

    pub fn get(&self, vao_id: VaoId) -> BridgeResult<&VertexLayout> {
        self.layouts
            .get(&vao_id)
            .ok_or(BridgeError::UnknownVao(vao_id))
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
