//! rasterlink core - command bridge from a WASM guest to an immediate-mode rasterizer
//!
//! The guest encodes drawing intent as flat commands pointing into its linear memory.
//! This crate decodes each command and drives a GL-style [`RasterDevice`], keeping
//! device handles in tables keyed by guest-chosen integer IDs.
//!
//! # Architecture
//!
//! - [`Bridge`] - Owns the device and every resource table, executes [`Command`]s
//! - [`RasterDevice`] - The device state machine; [`HeadlessDevice`] runs it in memory
//! - [`ffi::register_bridge_ffi`] - wasmtime host functions for each command
//! - [`bootstrap`] - Context acquisition, extensions and capability limits

pub mod bootstrap;
pub mod bridge;
pub mod buffer;
pub mod command;
pub mod config;
pub mod device;
pub mod draw;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod memory;
pub mod pass;
pub mod shader;
pub mod texture;
pub mod vao;
pub mod worker;

pub use bootstrap::{
    ContextAttributes, DeviceCapabilities, SurfaceHost, SurfaceSize, bootstrap as bootstrap_bridge,
};
pub use bridge::Bridge;
pub use command::Command;
pub use config::BridgeConfig;
pub use device::{HeadlessDevice, RasterDevice};
pub use draw::DrawRequest;
pub use error::{BridgeError, BridgeResult};
pub use ffi::{BridgeContext, register_bridge_ffi};
pub use memory::GuestMemory;
pub use worker::{SignalReceiver, SignalSender, WorkerSignal, WorkerSpawner, signal_channel};
