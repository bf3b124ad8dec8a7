//! Resource, pass and draw FFI functions

use wasmtime::Caller;

use super::{BridgeContext, with_memory};
use crate::command::Command;
use crate::device::RasterDevice;
use rasterlink_shared::{BufferId, ShaderId, VaoId};

/// Run a command that needs no guest memory.
fn execute_scalar<D: RasterDevice + 'static>(
    caller: &mut Caller<'_, BridgeContext<D>>,
    command: Command<'_>,
) -> bool {
    let fn_name = command.name();
    let ctx = caller.data_mut();
    let Some(bridge) = ctx.bridge.as_mut() else {
        tracing::trace!("{}: no rendering context, command dropped", fn_name);
        return false;
    };
    let result = bridge.execute(command);
    ctx.report(fn_name, result)
}

/// Compile and register a shader from a `CompileShaderArgs` bundle.
///
/// Returns 1 on success, 0 if decoding, compiling or linking failed.
pub(super) fn compile_shader<D: RasterDevice + 'static>(
    mut caller: Caller<'_, BridgeContext<D>>,
    args_ptr: u32,
) -> i32 {
    with_memory(&mut caller, "compile_shader", |memory, bridge| {
        Command::compile_shader(memory, args_ptr).and_then(|cmd| bridge.execute(cmd))
    }) as i32
}

/// Upload `len` u32 indices at `ptr` to index buffer `buffer_id`.
pub(super) fn alloc_index_buffer<D: RasterDevice + 'static>(
    mut caller: Caller<'_, BridgeContext<D>>,
    buffer_id: u32,
    ptr: u32,
    len: u32,
) {
    with_memory(&mut caller, "alloc_index_buffer", |memory, bridge| {
        Command::alloc_index_buffer(memory, buffer_id, ptr, len)
            .and_then(|cmd| bridge.execute(cmd))
    });
}

/// Upload `len` f32 values at `ptr` to vertex buffer `buffer_id`.
pub(super) fn alloc_array_buffer<D: RasterDevice + 'static>(
    mut caller: Caller<'_, BridgeContext<D>>,
    buffer_id: u32,
    ptr: u32,
    len: u32,
) {
    with_memory(&mut caller, "alloc_array_buffer", |memory, bridge| {
        Command::alloc_array_buffer(memory, buffer_id, ptr, len)
            .and_then(|cmd| bridge.execute(cmd))
    });
}

pub(super) fn alloc_vao<D: RasterDevice + 'static>(
    mut caller: Caller<'_, BridgeContext<D>>,
    vao_id: u32,
    shader_id: u32,
    geom_ib_id: u32,
    geom_vb_id: u32,
    inst_vb_id: u32,
) {
    execute_scalar(
        &mut caller,
        Command::AllocVao {
            vao_id: VaoId(vao_id),
            shader_id: ShaderId(shader_id),
            geom_ib_id: BufferId(geom_ib_id),
            geom_vb_id: BufferId(geom_vb_id),
            inst_vb_id: BufferId(inst_vb_id),
        },
    );
}

/// Upload `len` bytes of RGBA8 pixels at `ptr` (top row first).
pub(super) fn alloc_texture_image2d<D: RasterDevice + 'static>(
    mut caller: Caller<'_, BridgeContext<D>>,
    texture_id: u32,
    width: u32,
    height: u32,
    ptr: u32,
    len: u32,
) {
    with_memory(&mut caller, "alloc_texture_image2d", |memory, bridge| {
        Command::alloc_texture_image2d(memory, texture_id, width, height, ptr, len)
            .and_then(|cmd| bridge.execute(cmd))
    });
}

pub(super) fn begin_render_texture<D: RasterDevice + 'static>(
    mut caller: Caller<'_, BridgeContext<D>>,
    args_ptr: u32,
) {
    with_memory(&mut caller, "begin_render_texture", |memory, bridge| {
        Command::begin_render_texture(memory, args_ptr).and_then(|cmd| bridge.execute(cmd))
    });
}

pub(super) fn begin_render_canvas<D: RasterDevice + 'static>(
    mut caller: Caller<'_, BridgeContext<D>>,
    r: f32,
    g: f32,
    b: f32,
    a: f32,
    depth: f32,
) {
    execute_scalar(
        &mut caller,
        Command::BeginRenderCanvas {
            clear_color: [r, g, b, a],
            depth,
        },
    );
}

pub(super) fn set_default_depth_and_blend_mode<D: RasterDevice + 'static>(
    mut caller: Caller<'_, BridgeContext<D>>,
) {
    execute_scalar(&mut caller, Command::SetDefaultDepthAndBlendMode);
}

pub(super) fn draw_call<D: RasterDevice + 'static>(
    mut caller: Caller<'_, BridgeContext<D>>,
    args_ptr: u32,
) {
    with_memory(&mut caller, "draw_call", |memory, bridge| {
        Command::draw_call(memory, args_ptr).and_then(|cmd| bridge.execute(cmd))
    });
}
