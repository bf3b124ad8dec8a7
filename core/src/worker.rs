//! Worker signal channel
//!
//! Workers are additional guest instances sharing linear memory with the driving
//! instance. Each runs its entry point to completion and posts a 64-bit result (split
//! into two 32-bit halves) back to the driving thread. Signals are fire-and-forget:
//! no acknowledgement, no backpressure, no cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};

/// Completion signal from a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerSignal {
    pub hi: u32,
    pub lo: u32,
}

impl WorkerSignal {
    pub const fn new(hi: u32, lo: u32) -> Self {
        Self { hi, lo }
    }

    pub const fn value(self) -> u64 {
        ((self.hi as u64) << 32) | self.lo as u64
    }

    pub const fn from_value(value: u64) -> Self {
        Self {
            hi: (value >> 32) as u32,
            lo: value as u32,
        }
    }
}

/// Sending half. Cheap to clone; one per worker.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<WorkerSignal>,
}

impl SignalSender {
    /// Post a signal. Returns `false` (and drops the signal) if the receiver is gone.
    pub fn send(&self, signal: WorkerSignal) -> bool {
        self.tx.send(signal).is_ok()
    }
}

/// Receiving half, owned by the driving thread.
#[derive(Debug)]
pub struct SignalReceiver {
    rx: mpsc::UnboundedReceiver<WorkerSignal>,
}

impl SignalReceiver {
    pub fn try_recv(&mut self) -> Option<WorkerSignal> {
        self.rx.try_recv().ok()
    }

    /// Every signal posted so far, in arrival order.
    pub fn drain(&mut self) -> Vec<WorkerSignal> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Block until a signal arrives. `None` once every sender is dropped.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Option<WorkerSignal> {
        self.rx.blocking_recv()
    }

    pub async fn recv(&mut self) -> Option<WorkerSignal> {
        self.rx.recv().await
    }
}

/// Unbounded single-consumer channel for worker signals.
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, SignalReceiver { rx })
}

/// Guest-supplied start parameters of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSpawn {
    /// Function-table index of the worker entry point
    pub entry: u32,
    pub context_ptr: u32,
    /// Top of the worker's dedicated stack region
    pub stack_ptr: u32,
    /// Base of the worker's thread-local region
    pub tls_ptr: u32,
}

/// Starts workers. The instantiation protocol itself belongs to the host.
pub trait WorkerSpawner: Send {
    fn spawn(&mut self, spawn: WorkerSpawn, signals: SignalSender) -> BridgeResult<()>;
}

/// Runs each worker on its own OS thread.
///
/// `run` instantiates and runs the worker for a [`WorkerSpawn`] and returns its
/// 64-bit result, which is posted as a [`WorkerSignal`] when it finishes.
pub struct ThreadSpawner<F> {
    run: Arc<F>,
    next_id: AtomicU32,
}

impl<F> ThreadSpawner<F>
where
    F: Fn(WorkerSpawn) -> u64 + Send + Sync + 'static,
{
    pub fn new(run: F) -> Self {
        Self {
            run: Arc::new(run),
            next_id: AtomicU32::new(0),
        }
    }
}

impl<F> WorkerSpawner for ThreadSpawner<F>
where
    F: Fn(WorkerSpawn) -> u64 + Send + Sync + 'static,
{
    fn spawn(&mut self, spawn: WorkerSpawn, signals: SignalSender) -> BridgeResult<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let run = Arc::clone(&self.run);
        std::thread::Builder::new()
            .name(format!("rasterlink-worker-{id}"))
            .spawn(move || {
                let result = run(spawn);
                debug!("Worker {} finished with {:#x}", id, result);
                if !signals.send(WorkerSignal::from_value(result)) {
                    warn!("Worker {} result dropped: receiver closed", id);
                }
            })
            .map(|_| ())
            .map_err(|e| BridgeError::WorkerSpawn(e.to_string()))
    }
}
