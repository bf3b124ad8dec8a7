//! Tests for FFI functions

use super::*;
use crate::bootstrap::{DeviceCapabilities, SurfaceSize};
use crate::device::HeadlessDevice;
use crate::shader::ShaderOptions;
use crate::worker::{SignalReceiver, ThreadSpawner, WorkerSignal, WorkerSpawn, signal_channel};
use crate::command::Command;
use rasterlink_shared::{
    BufferId, CompileShaderArgs, DrawCallArgs, ShaderId, UniformBlock, VaoId, WasmSlice,
};
use wasmtime::{Engine, Instance, Module, Store};

type Ctx = BridgeContext<HeadlessDevice>;

const VS: &str = "attribute vec4 packed_geometry_0;
attribute vec4 packed_geometry_1;
attribute vec4 packed_instance_0;
uniform float pass_table[4];
void main() { gl_Position = packed_geometry_0 + packed_instance_0; }
";
const FS: &str = "void main() { gl_FragColor = vec4(1.0); }\n";

// Guest memory layout used by the frame module
const VS_PTR: u32 = 0x100;
const FS_PTR: u32 = 0x400;
const COMPILE_ARGS_PTR: u32 = 0x800;
const GEOMETRY_PTR: u32 = 0x900;
const INSTANCE_PTR: u32 = 0xA00;
const INDEX_PTR: u32 = 0xA80;
const PASS_UNIFORMS_PTR: u32 = 0xAC0;
const DRAW_ARGS_PTR: u32 = 0xB00;

const FRAME_WAT: &str = r#"
    (module
        (import "env" "compile_shader" (func $compile_shader (param i32) (result i32)))
        (import "env" "alloc_index_buffer" (func $alloc_index_buffer (param i32 i32 i32)))
        (import "env" "alloc_array_buffer" (func $alloc_array_buffer (param i32 i32 i32)))
        (import "env" "alloc_vao" (func $alloc_vao (param i32 i32 i32 i32 i32)))
        (import "env" "draw_call" (func $draw_call (param i32)))
        (import "env" "begin_render_canvas" (func $begin_render_canvas (param f32 f32 f32 f32 f32)))
        (import "env" "set_default_depth_and_blend_mode" (func $set_default_depth_and_blend_mode))
        (memory (export "memory") 1)
        (func (export "frame") (result i32)
            (local $ok i32)
            (local.set $ok (call $compile_shader (i32.const 0x800)))
            (call $alloc_array_buffer (i32.const 1) (i32.const 0x900) (i32.const 32))
            (call $alloc_array_buffer (i32.const 2) (i32.const 0xA00) (i32.const 4))
            (call $alloc_index_buffer (i32.const 1) (i32.const 0xA80) (i32.const 6))
            (call $alloc_vao (i32.const 1) (i32.const 1) (i32.const 1) (i32.const 1) (i32.const 2))
            (call $begin_render_canvas
                (f32.const 0) (f32.const 0) (f32.const 0) (f32.const 1) (f32.const 1))
            (call $set_default_depth_and_blend_mode)
            (call $draw_call (i32.const 0xB00))
            (local.get $ok)
        )
        (func (export "draw_at") (param i32)
            (call $draw_call (local.get 0))
        )
    )
"#;

fn headless_bridge() -> Bridge<HeadlessDevice> {
    let mut device = HeadlessDevice::new();
    let capabilities = DeviceCapabilities::probe(&mut device);
    Bridge::new(
        device,
        capabilities,
        SurfaceSize::new(320.0, 200.0, 1.0),
        ShaderOptions::default(),
    )
}

fn instantiate(wat: &str, ctx: Ctx) -> (Store<Ctx>, Instance) {
    let engine = Engine::default();
    let mut linker: Linker<Ctx> = Linker::new(&engine);
    register_bridge_ffi(&mut linker).unwrap();
    let wasm = wat::parse_str(wat).unwrap();
    let module = Module::new(&engine, wasm).unwrap();
    let mut store = Store::new(&engine, ctx);
    let instance = linker.instantiate(&mut store, &module).unwrap();
    (store, instance)
}

fn call_u32(store: &mut Store<Ctx>, instance: &Instance, name: &str, arg: u32) {
    instance
        .get_typed_func::<u32, ()>(&mut *store, name)
        .unwrap()
        .call(&mut *store, arg)
        .unwrap();
}

fn write(store: &mut Store<Ctx>, instance: &Instance, offset: u32, bytes: &[u8]) {
    let memory = instance.get_memory(&mut *store, "memory").unwrap();
    memory.write(&mut *store, offset as usize, bytes).unwrap();
}

/// Fill guest memory with the quad scene the frame module draws.
fn write_scene(store: &mut Store<Ctx>, instance: &Instance, instance_floats: &[f32]) {
    write(store, instance, VS_PTR, VS.as_bytes());
    write(store, instance, FS_PTR, FS.as_bytes());
    let compile = CompileShaderArgs {
        shader_id: 1,
        vertex: WasmSlice::new(VS_PTR, VS.len() as u32),
        pixel: WasmSlice::new(FS_PTR, FS.len() as u32),
        geometry_slots: 8,
        instance_slots: 4,
        textures: WasmSlice::NULL,
    };
    write(store, instance, COMPILE_ARGS_PTR, bytemuck::bytes_of(&compile));
    write(store, instance, GEOMETRY_PTR, bytemuck::cast_slice(&[0.5f32; 32]));
    write(store, instance, INSTANCE_PTR, bytemuck::cast_slice(instance_floats));
    write(store, instance, INDEX_PTR, bytemuck::cast_slice(&[0u32, 1, 2, 2, 3, 0]));
    write(store, instance, PASS_UNIFORMS_PTR, bytemuck::cast_slice(&[1.0f32, 2.0, 3.0, 4.0]));

    let mut uniforms = [WasmSlice::NULL; 6];
    uniforms[UniformBlock::Pass.index()] = WasmSlice::new(PASS_UNIFORMS_PTR, 4);
    let draw = DrawCallArgs {
        shader_id: 1,
        vao_id: 1,
        uniforms,
        textures: WasmSlice::NULL,
    };
    write(store, instance, DRAW_ARGS_PTR, bytemuck::bytes_of(&draw));
}

fn run_frame(store: &mut Store<Ctx>, instance: &Instance) -> i32 {
    instance
        .get_typed_func::<(), i32>(&mut *store, "frame")
        .unwrap()
        .call(&mut *store, ())
        .unwrap()
}

fn context() -> (Ctx, SignalReceiver) {
    let (tx, rx) = signal_channel();
    (BridgeContext::new(Some(headless_bridge()), tx), rx)
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_register_bridge_ffi() {
    let engine = Engine::default();
    let mut linker: Linker<Ctx> = Linker::new(&engine);
    assert!(register_bridge_ffi(&mut linker).is_ok());
}

#[test]
fn test_all_imports_resolve() {
    let wat = r#"
        (module
            (import "env" "compile_shader" (func (param i32) (result i32)))
            (import "env" "alloc_index_buffer" (func (param i32 i32 i32)))
            (import "env" "alloc_array_buffer" (func (param i32 i32 i32)))
            (import "env" "alloc_vao" (func (param i32 i32 i32 i32 i32)))
            (import "env" "draw_call" (func (param i32)))
            (import "env" "alloc_texture_image2d" (func (param i32 i32 i32 i32 i32)))
            (import "env" "begin_render_texture" (func (param i32)))
            (import "env" "begin_render_canvas" (func (param f32 f32 f32 f32 f32)))
            (import "env" "set_default_depth_and_blend_mode" (func))
            (import "env" "spawn_worker" (func (param i32 i32 i32 i32) (result i32)))
            (import "env" "worker_signal" (func (param i32 i32)))
            (memory (export "memory") 1)
        )
    "#;
    let (ctx, _rx) = context();
    instantiate(wat, ctx);
}

#[test]
fn test_command_names_match_imports() {
    let engine = Engine::default();
    let mut linker: Linker<Ctx> = Linker::new(&engine);
    register_bridge_ffi(&mut linker).unwrap();
    let (ctx, _rx) = context();
    let mut store = Store::new(&engine, ctx);

    let commands = [
        Command::AllocVao {
            vao_id: VaoId(1),
            shader_id: ShaderId(1),
            geom_ib_id: BufferId(1),
            geom_vb_id: BufferId(1),
            inst_vb_id: BufferId(2),
        },
        Command::AllocIndexBuffer {
            buffer_id: BufferId(1),
            data: &[],
        },
        Command::DrawCall(crate::draw::DrawRequest::new(ShaderId(1), VaoId(1))),
        Command::BeginRenderCanvas {
            clear_color: [0.0; 4],
            depth: 1.0,
        },
        Command::SetDefaultDepthAndBlendMode,
    ];
    for command in commands {
        assert!(
            linker.get(&mut store, "env", command.name()).is_some(),
            "{} is not registered",
            command.name()
        );
    }
}

// ============================================================================
// Commands from a guest
// ============================================================================

#[test]
fn test_frame_draws_one_quad() {
    let (ctx, _rx) = context();
    let (mut store, instance) = instantiate(FRAME_WAT, ctx);
    write_scene(&mut store, &instance, &[0.0; 4]);

    assert_eq!(run_frame(&mut store, &instance), 1);

    let bridge = store.data_mut().bridge_mut().unwrap();
    assert_eq!(bridge.device().draw_calls(), vec![(6, 1)]);
    assert_eq!(bridge.device().raster_state().viewport, (0, 0, 320, 200));
    assert!(bridge.device().raster_state().blend);

    let shader = bridge.shaders().get(ShaderId(1)).unwrap();
    let pass_table = shader.uniform_block(UniformBlock::Pass).unwrap();
    assert_eq!(
        bridge.device().uniform_value(pass_table),
        Some(&[1.0, 2.0, 3.0, 4.0][..])
    );
    assert!(bridge.device_mut().take_errors().is_empty());
}

#[test]
fn test_partial_instance_drops_draw() {
    let (ctx, _rx) = context();
    let (mut store, instance) = instantiate(FRAME_WAT, ctx);
    write_scene(&mut store, &instance, &[0.0; 4]);
    run_frame(&mut store, &instance);

    // Six floats is not a whole number of 4-slot instances.
    let bridge = store.data_mut().bridge_mut().unwrap();
    bridge
        .execute(Command::AllocArrayBuffer {
            buffer_id: BufferId(2),
            data: &[0.0; 6],
        })
        .unwrap();

    let draw_at = instance
        .get_typed_func::<u32, ()>(&mut store, "draw_at")
        .unwrap();
    draw_at.call(&mut store, DRAW_ARGS_PTR).unwrap();
    let bridge = store.data().bridge().unwrap();
    assert_eq!(bridge.device().draw_calls(), vec![(6, 1)]);
    assert_eq!(
        store.data().last_error(),
        Some(&BridgeError::InstanceCountMismatch {
            element_count: 6,
            slot_count: 4
        })
    );
}

#[test]
fn test_scalar_command_error_is_kept() {
    let wat = r#"
        (module
            (import "env" "alloc_vao" (func $alloc_vao (param i32 i32 i32 i32 i32)))
            (memory (export "memory") 1)
            (func (export "alloc") (param i32)
                (call $alloc_vao (i32.const 1) (local.get 0) (i32.const 1) (i32.const 1) (i32.const 2))
            )
        )
    "#;
    let (ctx, _rx) = context();
    let (mut store, instance) = instantiate(wat, ctx);
    call_u32(&mut store, &instance, "alloc", 9);

    assert_eq!(
        store.data_mut().take_last_error(),
        Some(BridgeError::UnknownShader(ShaderId(9)))
    );
    assert_eq!(store.data().last_error(), None);
}

#[test]
fn test_missing_memory_export_is_reported() {
    let wat = r#"
        (module
            (import "env" "draw_call" (func $draw_call (param i32)))
            (func (export "draw_at") (param i32)
                (call $draw_call (local.get 0))
            )
        )
    "#;
    let (ctx, _rx) = context();
    let (mut store, instance) = instantiate(wat, ctx);
    call_u32(&mut store, &instance, "draw_at", DRAW_ARGS_PTR);

    assert_eq!(store.data().last_error(), Some(&BridgeError::MissingMemory));
    assert!(store.data().bridge().unwrap().device().draw_calls().is_empty());
}

#[test]
fn test_out_of_bounds_args_are_dropped() {
    let (ctx, _rx) = context();
    let (mut store, instance) = instantiate(FRAME_WAT, ctx);
    let draw_at = instance
        .get_typed_func::<u32, ()>(&mut store, "draw_at")
        .unwrap();

    // One page is 64 KiB; the args bundle would straddle the end.
    draw_at.call(&mut store, 65536 - 8).unwrap();
    let bridge = store.data().bridge().unwrap();
    assert!(bridge.device().draw_calls().is_empty());
}

#[test]
fn test_compile_failure_returns_zero() {
    let (ctx, _rx) = context();
    let (mut store, instance) = instantiate(FRAME_WAT, ctx);
    write_scene(&mut store, &instance, &[0.0; 4]);
    // Turn `void main` into `int  main`.
    write(&mut store, &instance, VS_PTR + VS.find("void").unwrap() as u32, b"int ");

    assert_eq!(run_frame(&mut store, &instance), 0);
    assert!(matches!(
        store.data().last_error(),
        Some(BridgeError::UnknownShader(_))
    ));
    let bridge = store.data().bridge().unwrap();
    assert!(bridge.shaders().is_empty());
    assert!(bridge.device().draw_calls().is_empty());
}

#[test]
fn test_commands_dropped_without_context() {
    let (tx, _rx) = signal_channel();
    let (mut store, instance) = instantiate(FRAME_WAT, BridgeContext::new(None, tx));
    write_scene(&mut store, &instance, &[0.0; 4]);

    assert_eq!(run_frame(&mut store, &instance), 0);
    assert!(store.data().bridge().is_none());
}

// ============================================================================
// Workers
// ============================================================================

const WORKER_WAT: &str = r#"
    (module
        (import "env" "spawn_worker" (func $spawn_worker (param i32 i32 i32 i32) (result i32)))
        (import "env" "worker_signal" (func $worker_signal (param i32 i32)))
        (memory (export "memory") 1)
        (func (export "spawn") (result i32)
            (call $spawn_worker (i32.const 7) (i32.const 0x100) (i32.const 0x8000) (i32.const 0x4000))
        )
        (func (export "signal") (param i32 i32)
            (call $worker_signal (local.get 0) (local.get 1))
        )
    )
"#;

#[test]
fn test_worker_signal_reaches_receiver() {
    let (ctx, mut rx) = context();
    let (mut store, instance) = instantiate(WORKER_WAT, ctx);
    let signal = instance
        .get_typed_func::<(u32, u32), ()>(&mut store, "signal")
        .unwrap();
    signal.call(&mut store, (1, 2)).unwrap();
    signal.call(&mut store, (3, 4)).unwrap();

    assert_eq!(
        rx.drain(),
        vec![WorkerSignal::new(1, 2), WorkerSignal::new(3, 4)]
    );
}

#[test]
fn test_spawn_without_spawner_fails() {
    let (ctx, _rx) = context();
    let (mut store, instance) = instantiate(WORKER_WAT, ctx);
    let spawn = instance
        .get_typed_func::<(), i32>(&mut store, "spawn")
        .unwrap();
    assert_eq!(spawn.call(&mut store, ()).unwrap(), 0);
}

#[test]
fn test_spawn_worker_posts_result() {
    let (ctx, mut rx) = context();
    let ctx = ctx.with_spawner(ThreadSpawner::new(|spawn: WorkerSpawn| {
        ((spawn.entry as u64) << 32) | (spawn.context_ptr + spawn.stack_ptr + spawn.tls_ptr) as u64
    }));
    let (mut store, instance) = instantiate(WORKER_WAT, ctx);
    let spawn = instance
        .get_typed_func::<(), i32>(&mut store, "spawn")
        .unwrap();
    assert_eq!(spawn.call(&mut store, ()).unwrap(), 1);

    assert_eq!(rx.blocking_recv(), Some(WorkerSignal::new(7, 0xC100)));
}
