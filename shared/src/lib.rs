//! Guest/host ABI for the rasterlink bridge.
//!
//! Types in this crate are shared by the host bridge and by guest-side command
//! encoders: resource ID newtypes, the `#[repr(C)]` argument bundles written into
//! linear memory, and the naming conventions generated shaders follow.

pub mod abi;
pub mod constants;
pub mod ids;

pub use abi::{
    BeginRenderTextureArgs, ColorTargetArgs, CompileShaderArgs, DepthTargetArgs, DrawCallArgs,
    TextureDescArgs, WasmSlice,
};
pub use constants::*;
pub use ids::{BufferId, PassId, ShaderId, TextureId, VaoId};
