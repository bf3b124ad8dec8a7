//! Bridge error types

use rasterlink_shared::{BufferId, ShaderId, TextureId, VaoId};

use crate::device::ShaderStage;

/// Errors produced while decoding or executing a guest command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// A shader stage failed to compile. The shader ID stays unregistered.
    #[error("{stage} shader of {shader_id} failed to compile:\n{log}\n{listing}")]
    Compile {
        shader_id: ShaderId,
        stage: ShaderStage,
        log: String,
        /// Line-numbered rendering of the stage source
        listing: String,
    },

    /// Program linking failed. The shader ID stays unregistered.
    #[error("{shader_id} failed to link:\n{log}\n{vertex_listing}\n{fragment_listing}")]
    Link {
        shader_id: ShaderId,
        log: String,
        vertex_listing: String,
        fragment_listing: String,
    },

    /// No rendering context could be acquired; nothing else will run.
    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),

    /// The guest module has no `memory` export to read argument data from.
    #[error("guest module does not export linear memory")]
    MissingMemory,

    #[error("memory access ({len} bytes at {ptr}) exceeds bounds ({memory_size})")]
    BoundsViolation {
        ptr: u32,
        len: usize,
        memory_size: usize,
    },

    #[error("pointer {ptr} is not aligned to {align} bytes")]
    Misaligned { ptr: u32, align: usize },

    #[error("string at {ptr} is not valid UTF-8")]
    InvalidUtf8 { ptr: u32 },

    #[error("unknown {0}")]
    UnknownShader(ShaderId),

    #[error("unknown vertex {0}")]
    UnknownVertexBuffer(BufferId),

    #[error("unknown index {0}")]
    UnknownIndexBuffer(BufferId),

    #[error("unknown {0}")]
    UnknownVao(VaoId),

    #[error("unknown {0}")]
    UnknownTexture(TextureId),

    /// Instance buffer length is not a whole number of instances.
    #[error(
        "instance buffer holds {element_count} floats, not a multiple of {slot_count} slots per instance"
    )]
    InstanceCountMismatch { element_count: usize, slot_count: u32 },

    #[error("texture slot {slot} exceeds the device's {max} texture units")]
    TextureUnitOverflow { slot: usize, max: u32 },

    #[error("{count} color targets requested, at most {max} supported")]
    ColorTargetOverflow { count: usize, max: usize },

    #[error("pixel data is {actual} bytes, expected {expected} for the declared size")]
    PixelSizeMismatch { expected: usize, actual: usize },

    /// Packed attribute groups needed by a shader exceed what the device can bind.
    #[error(
        "{shader_id} needs {geometry_slots} geometry + {instance_slots} instance slots, more than {max_attribs} attributes hold"
    )]
    InvalidSlotCount {
        shader_id: ShaderId,
        geometry_slots: u32,
        instance_slots: u32,
        max_attribs: u32,
    },

    #[error("index {0} holds {1} indices, more than one draw can issue")]
    IndexCountOverflow(BufferId, usize),

    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("failed to spawn worker: {0}")]
    WorkerSpawn(String),
}

impl BridgeError {
    /// Whether this error is a guest contract violation (bad IDs, counts or views)
    /// rather than a shader diagnostic or a host failure.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            BridgeError::Compile { .. }
                | BridgeError::Link { .. }
                | BridgeError::ContextUnavailable(_)
                | BridgeError::WorkerSpawn(_)
        )
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
