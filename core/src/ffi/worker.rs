//! Worker FFI functions

use tracing::warn;
use wasmtime::Caller;

use super::BridgeContext;
use crate::worker::{WorkerSignal, WorkerSpawn};

/// Start a worker instance at function-table index `entry`.
///
/// Returns 1 if the worker was started, 0 if no spawner is installed or spawning failed.
pub(super) fn spawn_worker<D: 'static>(
    mut caller: Caller<'_, BridgeContext<D>>,
    entry: u32,
    context_ptr: u32,
    stack_ptr: u32,
    tls_ptr: u32,
) -> i32 {
    let ctx = caller.data_mut();
    let signals = ctx.signals.clone();
    let Some(spawner) = ctx.spawner.as_mut() else {
        warn!("spawn_worker: no worker spawner installed");
        return 0;
    };
    let spawn = WorkerSpawn {
        entry,
        context_ptr,
        stack_ptr,
        tls_ptr,
    };
    let result = spawner.spawn(spawn, signals);
    ctx.report("spawn_worker", result) as i32
}

/// Post a 64-bit completion value (as two halves) to the driving thread.
pub(super) fn worker_signal<D: 'static>(caller: Caller<'_, BridgeContext<D>>, hi: u32, lo: u32) {
    if !caller.data().signals.send(WorkerSignal::new(hi, lo)) {
        tracing::debug!("worker_signal: receiver closed, signal dropped");
    }
}
