//! Draw dispatcher
//!
//! One instanced, indexed draw per call: program, vertex array, uniform blocks and
//! sampler units are bound, then the whole index buffer is drawn once per instance.

use smallvec::SmallVec;
use tracing::trace;

use crate::buffer::BufferStore;
use crate::device::RasterDevice;
use crate::error::{BridgeError, BridgeResult};
use crate::shader::{ShaderProgram, ShaderRegistry};
use crate::texture::TextureStore;
use crate::vao::VertexLayouts;
use rasterlink_shared::{BufferId, ShaderId, TextureId, UNIFORM_BLOCK_COUNT, UniformBlock, VaoId};

/// Arguments of one draw.
#[derive(Debug, Clone, Default)]
pub struct DrawRequest<'a> {
    pub shader_id: ShaderId,
    pub vao_id: VaoId,
    /// Indexed by [`UniformBlock::index`]. `None` leaves the block at its last value.
    pub uniforms: [Option<&'a [f32]>; UNIFORM_BLOCK_COUNT],
    /// Texture for sampler slot `i`. `None` leaves that unit as it is.
    pub textures: SmallVec<[Option<TextureId>; 4]>,
}

impl<'a> DrawRequest<'a> {
    pub fn new(shader_id: ShaderId, vao_id: VaoId) -> Self {
        Self {
            shader_id,
            vao_id,
            ..Default::default()
        }
    }

    pub fn with_uniforms(mut self, block: UniformBlock, values: &'a [f32]) -> Self {
        self.uniforms[block.index()] = Some(values);
        self
    }

    pub fn with_texture(mut self, texture_id: TextureId) -> Self {
        self.textures.push(Some(texture_id));
        self
    }
}

/// Instances described by an instance buffer of `element_count` floats.
///
/// A shader without instance slots draws a single instance.
pub fn instance_count(element_count: usize, shader: &ShaderProgram) -> BridgeResult<u32> {
    let slots = shader.instance_slots;
    if slots == 0 {
        return Ok(1);
    }
    if element_count % slots as usize != 0 {
        return Err(BridgeError::InstanceCountMismatch {
            element_count,
            slot_count: slots,
        });
    }
    Ok((element_count / slots as usize) as u32)
}

/// Index count for one draw call; the device takes it as a 32-bit count.
pub fn index_count(buffer_id: BufferId, element_count: usize) -> BridgeResult<u32> {
    u32::try_from(element_count)
        .map_err(|_| BridgeError::IndexCountOverflow(buffer_id, element_count))
}

/// Read-only view of the stores a draw needs.
pub struct DrawResources<'r> {
    pub shaders: &'r ShaderRegistry,
    pub buffers: &'r BufferStore,
    pub vertex_layouts: &'r VertexLayouts,
    pub textures: &'r TextureStore,
}

impl DrawResources<'_> {
    /// Validate and issue one draw.
    ///
    /// Every lookup and count check happens before the first device call, so a rejected
    /// draw leaves device state untouched.
    pub fn draw<D: RasterDevice + ?Sized>(
        &self,
        device: &mut D,
        request: &DrawRequest<'_>,
    ) -> BridgeResult<()> {
        let shader = self.shaders.get(request.shader_id)?;
        let layout = self.vertex_layouts.get(request.vao_id)?;
        let instances = self.buffers.vertex(layout.instance_buffer_id)?;
        let indices = self.buffers.index(layout.index_buffer_id)?;
        let instance_count = instance_count(instances.element_count, shader)?;
        let index_count = index_count(layout.index_buffer_id, indices.element_count)?;

        let max_units = device.limits().max_texture_image_units;
        let mut units: SmallVec<[_; 4]> = SmallVec::new();
        for (slot, binding) in shader.texture_bindings.iter().enumerate() {
            let Some(Some(texture_id)) = request.textures.get(slot) else {
                continue;
            };
            if slot as u32 >= max_units {
                return Err(BridgeError::TextureUnitOverflow {
                    slot,
                    max: max_units,
                });
            }
            let texture = self.textures.get(*texture_id)?;
            units.push((slot as u32, texture.handle, binding.location));
        }

        device.use_program(Some(shader.program));
        device.bind_vertex_array(Some(layout.handle));

        for block in UniformBlock::ALL {
            let (Some(values), Some(location)) =
                (request.uniforms[block.index()], shader.uniform_block(block))
            else {
                continue;
            };
            device.uniform_f32_array(location, values);
        }

        for (unit, handle, location) in units {
            device.active_texture(unit);
            device.bind_texture(Some(handle));
            if let Some(location) = location {
                device.uniform_sampler(location, unit);
            }
        }

        trace!(
            "Draw {} with {}: {} indices x {} instances",
            request.vao_id, request.shader_id, index_count, instance_count
        );
        device.draw_elements_instanced(index_count, instance_count);
        device.bind_vertex_array(None);
        Ok(())
    }
}
