//! Shader registry
//!
//! Compiles guest-generated vertex/fragment pairs, reflects the packed attribute
//! layout, uniform blocks and samplers once, and keeps the result keyed by
//! [`ShaderId`]. Everything that binds or draws reads the reflected layout from here.

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, error};

use crate::device::{ProgramHandle, RasterDevice, ShaderStage, UniformLocation};
use crate::error::{BridgeError, BridgeResult};
use rasterlink_shared::{
    GEOMETRY_ATTRIB_PREFIX, INSTANCE_ATTRIB_PREFIX, SLOT_BYTES, SLOTS_PER_ATTRIB, ShaderId,
    TEXTURE_UNIFORM_PREFIX, UNIFORM_BLOCK_COUNT, UniformBlock,
};

/// Prepended to vertex sources when `prepend_prelude` is enabled.
pub const VERTEX_PRELUDE: &str = "precision highp float;
precision highp int;
vec4 sample2d(sampler2D sampler, vec2 pos){return texture2D(sampler, vec2(pos.x, 1.0-pos.y));}
";

/// Prepended to fragment sources when `prepend_prelude` is enabled.
pub const FRAGMENT_PRELUDE: &str = "#extension GL_OES_standard_derivatives : enable
precision highp float;
precision highp int;
vec4 sample2d(sampler2D sampler, vec2 pos){return texture2D(sampler, vec2(pos.x, 1.0-pos.y));}
";

/// One packed float attribute: up to four slots of a vertex or instance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribSlot {
    /// `None` when the compiler dropped the attribute; binders skip it.
    pub location: Option<u32>,
    pub byte_offset: u32,
    /// 1-4
    pub components: u32,
    /// Same for every attribute of a record: `4 * slot_count`
    pub byte_stride: u32,
}

/// Split `slot_count` packed floats into attributes of four components, the last one
/// holding the remainder. Returns `(byte_offset, components, byte_stride)` per attribute.
///
/// Byte values saturate; counts past [`check_slot_counts`] are never bound.
pub fn pack_slots(slot_count: u32) -> impl Iterator<Item = (u32, u32, u32)> {
    let groups = slot_count.div_ceil(SLOTS_PER_ATTRIB);
    let stride = slot_count.saturating_mul(SLOT_BYTES);
    (0..groups).map(move |i| {
        let first = i * SLOTS_PER_ATTRIB;
        let components = (slot_count - first).min(SLOTS_PER_ATTRIB);
        (first.saturating_mul(SLOT_BYTES), components, stride)
    })
}

/// Reject slot counts whose packed attributes do not fit in `max_attribs`.
pub fn check_slot_counts(
    shader_id: ShaderId,
    geometry_slots: u32,
    instance_slots: u32,
    max_attribs: u32,
) -> BridgeResult<()> {
    let groups = geometry_slots
        .div_ceil(SLOTS_PER_ATTRIB)
        .checked_add(instance_slots.div_ceil(SLOTS_PER_ATTRIB));
    match groups {
        Some(groups) if groups <= max_attribs => Ok(()),
        _ => Err(BridgeError::InvalidSlotCount {
            shader_id,
            geometry_slots,
            instance_slots,
            max_attribs,
        }),
    }
}

/// Resolve the packed attributes named `{prefix}{i}` against a linked program.
pub fn reflect_attribs<D: RasterDevice + ?Sized>(
    device: &D,
    program: ProgramHandle,
    prefix: &str,
    slot_count: u32,
) -> Vec<AttribSlot> {
    pack_slots(slot_count)
        .enumerate()
        .map(|(i, (byte_offset, components, byte_stride))| AttribSlot {
            location: device.attrib_location(program, &format!("{prefix}{i}")),
            byte_offset,
            components,
            byte_stride,
        })
        .collect()
}

/// A sampler declared by a shader, as supplied by the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor<'a> {
    pub name: &'a str,
    pub sampler_type: u32,
}

/// Reflected sampler uniform. Texture slot `i` of a draw binds to unit `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    pub name: String,
    pub sampler_type: u32,
    pub location: Option<UniformLocation>,
}

/// Source pair and layout parameters for one `compile` request.
#[derive(Debug, Clone)]
pub struct ShaderSource<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
    pub geometry_slots: u32,
    pub instance_slots: u32,
    pub textures: &'a [TextureDescriptor<'a>],
}

/// A linked program and everything reflected from it.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub vertex_source: String,
    pub fragment_source: String,
    pub geometry_slots: u32,
    pub instance_slots: u32,
    pub geometry_attribs: Vec<AttribSlot>,
    pub instance_attribs: Vec<AttribSlot>,
    /// Indexed by [`UniformBlock::index`]
    pub uniform_blocks: [Option<UniformLocation>; UNIFORM_BLOCK_COUNT],
    pub texture_bindings: SmallVec<[TextureBinding; 4]>,
    pub program: ProgramHandle,
}

impl ShaderProgram {
    #[inline]
    pub fn uniform_block(&self, block: UniformBlock) -> Option<UniformLocation> {
        self.uniform_blocks[block.index()]
    }
}

/// Source handling switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderOptions {
    /// Prepend [`VERTEX_PRELUDE`] / [`FRAGMENT_PRELUDE`] to the guest sources.
    pub prepend_prelude: bool,
    /// Include line-numbered sources in the error log on compile/link failure.
    pub log_sources_on_error: bool,
}

impl Default for ShaderOptions {
    fn default() -> Self {
        Self {
            prepend_prelude: false,
            log_sources_on_error: true,
        }
    }
}

/// Render `source` with 1-based line numbers, the way driver logs refer to lines.
pub fn numbered_listing(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + source.len() / 4);
    for (i, line) in source.lines().enumerate() {
        out.push_str(&format!("{:>4}: {}\n", i + 1, line));
    }
    out
}

/// Compiled shaders keyed by guest-assigned ID.
#[derive(Debug, Default)]
pub struct ShaderRegistry {
    shaders: HashMap<ShaderId, ShaderProgram>,
    options: ShaderOptions,
}

impl ShaderRegistry {
    pub fn new(options: ShaderOptions) -> Self {
        Self {
            shaders: HashMap::new(),
            options,
        }
    }

    pub fn get(&self, shader_id: ShaderId) -> BridgeResult<&ShaderProgram> {
        self.shaders
            .get(&shader_id)
            .ok_or(BridgeError::UnknownShader(shader_id))
    }

    pub fn contains(&self, shader_id: ShaderId) -> bool {
        self.shaders.contains_key(&shader_id)
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    fn stage_source(&self, stage: ShaderStage, source: &str) -> String {
        if !self.options.prepend_prelude {
            return source.to_string();
        }
        let prelude = match stage {
            ShaderStage::Vertex => VERTEX_PRELUDE,
            ShaderStage::Fragment => FRAGMENT_PRELUDE,
        };
        format!("{prelude}{source}")
    }

    /// Compile, link and reflect a shader, registering it under `shader_id`.
    ///
    /// Slot counts are checked against the device's attribute limit before anything is
    /// compiled. On failure nothing is registered and any program already at `shader_id`
    /// is kept.
    /// A successful compile replaces (and deletes) the previous program at that ID.
    pub fn compile<D: RasterDevice + ?Sized>(
        &mut self,
        device: &mut D,
        shader_id: ShaderId,
        source: &ShaderSource<'_>,
    ) -> BridgeResult<()> {
        check_slot_counts(
            shader_id,
            source.geometry_slots,
            source.instance_slots,
            device.limits().max_vertex_attribs,
        )?;
        let vertex_source = self.stage_source(ShaderStage::Vertex, source.vertex);
        let fragment_source = self.stage_source(ShaderStage::Fragment, source.fragment);

        let vertex = device
            .compile_stage(ShaderStage::Vertex, &vertex_source)
            .map_err(|log| self.compile_error(shader_id, ShaderStage::Vertex, log, &vertex_source))?;
        let fragment = match device.compile_stage(ShaderStage::Fragment, &fragment_source) {
            Ok(fragment) => fragment,
            Err(log) => {
                device.delete_stage(vertex);
                return Err(self.compile_error(
                    shader_id,
                    ShaderStage::Fragment,
                    log,
                    &fragment_source,
                ));
            }
        };

        let linked = device.link_program(vertex, fragment);
        device.delete_stage(vertex);
        device.delete_stage(fragment);
        let program = linked.map_err(|log| {
            let err = BridgeError::Link {
                shader_id,
                log,
                vertex_listing: numbered_listing(&vertex_source),
                fragment_listing: numbered_listing(&fragment_source),
            };
            self.report(&err);
            err
        })?;

        let geometry_attribs = reflect_attribs(
            &*device,
            program,
            GEOMETRY_ATTRIB_PREFIX,
            source.geometry_slots,
        );
        let instance_attribs = reflect_attribs(
            &*device,
            program,
            INSTANCE_ATTRIB_PREFIX,
            source.instance_slots,
        );
        let uniform_blocks =
            UniformBlock::ALL.map(|block| device.uniform_location(program, block.uniform_name()));
        let texture_bindings = source
            .textures
            .iter()
            .map(|desc| TextureBinding {
                name: desc.name.to_string(),
                sampler_type: desc.sampler_type,
                location: device
                    .uniform_location(program, &format!("{TEXTURE_UNIFORM_PREFIX}{}", desc.name)),
            })
            .collect();

        debug!(
            "Compiled {}: {} geometry / {} instance attributes, {} samplers",
            shader_id,
            geometry_attribs.len(),
            instance_attribs.len(),
            source.textures.len()
        );

        let compiled = ShaderProgram {
            vertex_source,
            fragment_source,
            geometry_slots: source.geometry_slots,
            instance_slots: source.instance_slots,
            geometry_attribs,
            instance_attribs,
            uniform_blocks,
            texture_bindings,
            program,
        };
        if let Some(previous) = self.shaders.insert(shader_id, compiled) {
            if previous.program != program {
                device.delete_program(previous.program);
            }
        }
        Ok(())
    }

    fn compile_error(
        &self,
        shader_id: ShaderId,
        stage: ShaderStage,
        log: String,
        source: &str,
    ) -> BridgeError {
        let err = BridgeError::Compile {
            shader_id,
            stage,
            log,
            listing: numbered_listing(source),
        };
        self.report(&err);
        err
    }

    fn report(&self, err: &BridgeError) {
        match err {
            BridgeError::Compile {
                shader_id,
                stage,
                log,
                ..
            } if !self.options.log_sources_on_error => {
                error!("{} shader of {} failed to compile: {}", stage, shader_id, log)
            }
            BridgeError::Link { shader_id, log, .. } if !self.options.log_sources_on_error => {
                error!("{} failed to link: {}", shader_id, log)
            }
            _ => error!("{}", err),
        }
    }
}
