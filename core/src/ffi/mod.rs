//! Bridge FFI host functions
//!
//! Every bridge command is a host function under the `env` module. Argument bundles
//! are read from the guest's exported linear memory. A command that fails is logged
//! and dropped; only `compile_shader` and `spawn_worker` report success to the guest.

mod graphics;
mod worker;

#[cfg(test)]
mod tests;

use anyhow::Result;
use tracing::{trace, warn};
use wasmtime::{Caller, Linker, Memory};

use crate::bridge::Bridge;
use crate::device::RasterDevice;
use crate::error::{BridgeError, BridgeResult};
use crate::memory::GuestMemory;
use crate::worker::{SignalSender, WorkerSpawner};

/// Store data for a guest instance driving a bridge.
pub struct BridgeContext<D> {
    /// `None` when bootstrap failed; every command is then dropped.
    pub bridge: Option<Bridge<D>>,
    /// Guest linear memory. Looked up from the `memory` export when unset.
    pub memory: Option<Memory>,
    signals: SignalSender,
    spawner: Option<Box<dyn WorkerSpawner>>,
    last_error: Option<BridgeError>,
}

impl<D> BridgeContext<D> {
    pub fn new(bridge: Option<Bridge<D>>, signals: SignalSender) -> Self {
        Self {
            bridge,
            memory: None,
            signals,
            spawner: None,
            last_error: None,
        }
    }

    pub fn with_spawner(mut self, spawner: impl WorkerSpawner + 'static) -> Self {
        self.spawner = Some(Box::new(spawner));
        self
    }

    pub fn bridge(&self) -> Option<&Bridge<D>> {
        self.bridge.as_ref()
    }

    pub fn bridge_mut(&mut self) -> Option<&mut Bridge<D>> {
        self.bridge.as_mut()
    }

    /// Error of the most recently dropped command.
    pub fn last_error(&self) -> Option<&BridgeError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<BridgeError> {
        self.last_error.take()
    }

    /// Log a failed command and keep its error. Returns whether it succeeded.
    fn report(&mut self, fn_name: &str, result: BridgeResult<()>) -> bool {
        let Err(e) = result else {
            return true;
        };
        if e.is_contract_violation() {
            warn!("{}: {}", fn_name, e);
        } else {
            // Compile and link failures were already reported with their listings.
            trace!("{}: {}", fn_name, e);
        }
        self.last_error = Some(e);
        false
    }
}

/// Register all bridge FFI functions with the linker
pub fn register_bridge_ffi<D: RasterDevice + 'static>(
    linker: &mut Linker<BridgeContext<D>>,
) -> Result<()> {
    // Resources
    linker.func_wrap("env", "compile_shader", graphics::compile_shader)?;
    linker.func_wrap("env", "alloc_index_buffer", graphics::alloc_index_buffer)?;
    linker.func_wrap("env", "alloc_array_buffer", graphics::alloc_array_buffer)?;
    linker.func_wrap("env", "alloc_vao", graphics::alloc_vao)?;
    linker.func_wrap("env", "alloc_texture_image2d", graphics::alloc_texture_image2d)?;

    // Passes and drawing
    linker.func_wrap("env", "begin_render_texture", graphics::begin_render_texture)?;
    linker.func_wrap("env", "begin_render_canvas", graphics::begin_render_canvas)?;
    linker.func_wrap(
        "env",
        "set_default_depth_and_blend_mode",
        graphics::set_default_depth_and_blend_mode,
    )?;
    linker.func_wrap("env", "draw_call", graphics::draw_call)?;

    // Workers
    linker.func_wrap("env", "spawn_worker", worker::spawn_worker)?;
    linker.func_wrap("env", "worker_signal", worker::worker_signal)?;

    Ok(())
}

/// Run a command that reads its arguments from guest memory.
///
/// Guest bytes and the bridge are borrowed together for the duration of `run`.
/// Returns whether the command succeeded.
fn with_memory<D: RasterDevice + 'static>(
    caller: &mut Caller<'_, BridgeContext<D>>,
    fn_name: &str,
    run: impl FnOnce(&GuestMemory<'_>, &mut Bridge<D>) -> BridgeResult<()>,
) -> bool {
    if caller.data().bridge.is_none() {
        trace!("{}: no rendering context, command dropped", fn_name);
        return false;
    }
    let memory = match caller.data().memory {
        Some(memory) => memory,
        None => match caller.get_export("memory").and_then(|e| e.into_memory()) {
            Some(memory) => memory,
            None => {
                return caller
                    .data_mut()
                    .report(fn_name, Err(BridgeError::MissingMemory));
            }
        },
    };
    let (bytes, ctx) = memory.data_and_store_mut(caller);
    let Some(bridge) = ctx.bridge.as_mut() else {
        return false;
    };
    let result = run(&GuestMemory::new(bytes), bridge);
    ctx.report(fn_name, result)
}
