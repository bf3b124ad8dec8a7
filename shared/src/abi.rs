//! Argument bundles written by the guest into linear memory.
//!
//! Commands with more than a handful of scalar arguments pass a single pointer to one
//! of these `#[repr(C)]` structs. Variable-length fields are [`WasmSlice`]s: an offset
//! into linear memory plus an element count. All fields are 32-bit so the layout has
//! no padding and is identical on every target.

use bytemuck::{Pod, Zeroable};

/// (pointer, length) reference into guest linear memory. `len` counts elements, not bytes.
///
/// A null pointer means "not supplied".
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct WasmSlice {
    pub ptr: u32,
    pub len: u32,
}

impl WasmSlice {
    pub const NULL: WasmSlice = WasmSlice { ptr: 0, len: 0 };

    #[inline]
    pub const fn new(ptr: u32, len: u32) -> Self {
        Self { ptr, len }
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.ptr == 0
    }
}

/// `CompileShader(shader_id, vertex_src, pixel_src, geometry_slots, instance_slots, textures)`
///
/// `vertex` and `pixel` are UTF-8 byte slices, `textures` is a slice of [`TextureDescArgs`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct CompileShaderArgs {
    pub shader_id: u32,
    pub vertex: WasmSlice,
    pub pixel: WasmSlice,
    pub geometry_slots: u32,
    pub instance_slots: u32,
    pub textures: WasmSlice,
}

/// One sampler declared by a shader. `name` is a UTF-8 byte slice without the `ds_` prefix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct TextureDescArgs {
    pub name: WasmSlice,
    pub sampler_type: u32,
}

/// `DrawCall(shader_id, vao_id, const_table?, pass?, view?, draw?, user?, live?, textures)`
///
/// `uniforms` is indexed by `UniformBlock::index()` and holds f32 slices; `textures` is a
/// u32 slice of texture IDs where `TEXTURE_SLOT_EMPTY` skips the slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct DrawCallArgs {
    pub shader_id: u32,
    pub vao_id: u32,
    pub uniforms: [WasmSlice; crate::UNIFORM_BLOCK_COUNT],
    pub textures: WasmSlice,
}

/// One color attachment of an off-screen pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ColorTargetArgs {
    pub texture_id: u32,
    /// Nonzero: clear only when the texture is (re)allocated.
    pub init_only: u32,
    pub clear_color: [f32; 4],
}

/// Optional depth attachment of an off-screen pass. Ignored unless `enabled` is nonzero.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct DepthTargetArgs {
    pub enabled: u32,
    pub texture_id: u32,
    pub init_only: u32,
    pub clear_depth: f32,
}

/// `BeginRenderTexture(pass_id, width, height, color_targets, depth_target)`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct BeginRenderTextureArgs {
    pub pass_id: u32,
    pub width: u32,
    pub height: u32,
    /// Slice of [`ColorTargetArgs`].
    pub color_targets: WasmSlice,
    pub depth_target: DepthTargetArgs,
}
