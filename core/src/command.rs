//! Guest commands
//!
//! A [`Command`] borrows its variable-length payloads straight out of guest memory.
//! Decoders turn the `#[repr(C)]` argument bundles into commands, checking every
//! pointer on the way.

use smallvec::SmallVec;

use crate::draw::DrawRequest;
use crate::error::BridgeResult;
use crate::memory::GuestMemory;
use crate::pass::{ColorTarget, DepthTarget, RenderPass};
use crate::shader::TextureDescriptor;
use rasterlink_shared::{
    BeginRenderTextureArgs, BufferId, ColorTargetArgs, CompileShaderArgs, DrawCallArgs, PassId,
    ShaderId, TEXTURE_SLOT_EMPTY, TextureDescArgs, TextureId, UniformBlock, VaoId,
};

/// One decoded bridge command.
#[derive(Debug, Clone)]
pub enum Command<'a> {
    CompileShader {
        shader_id: ShaderId,
        vertex: &'a str,
        pixel: &'a str,
        geometry_slots: u32,
        instance_slots: u32,
        textures: SmallVec<[TextureDescriptor<'a>; 4]>,
    },
    AllocIndexBuffer {
        buffer_id: BufferId,
        data: &'a [u32],
    },
    AllocArrayBuffer {
        buffer_id: BufferId,
        data: &'a [f32],
    },
    AllocVao {
        vao_id: VaoId,
        shader_id: ShaderId,
        geom_ib_id: BufferId,
        geom_vb_id: BufferId,
        inst_vb_id: BufferId,
    },
    DrawCall(DrawRequest<'a>),
    AllocTextureImage2D {
        texture_id: TextureId,
        width: u32,
        height: u32,
        data: &'a [u8],
    },
    BeginRenderTexture(RenderPass),
    BeginRenderCanvas {
        clear_color: [f32; 4],
        depth: f32,
    },
    SetDefaultDepthAndBlendMode,
}

impl<'a> Command<'a> {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CompileShader { .. } => "compile_shader",
            Command::AllocIndexBuffer { .. } => "alloc_index_buffer",
            Command::AllocArrayBuffer { .. } => "alloc_array_buffer",
            Command::AllocVao { .. } => "alloc_vao",
            Command::DrawCall(_) => "draw_call",
            Command::AllocTextureImage2D { .. } => "alloc_texture_image2d",
            Command::BeginRenderTexture(_) => "begin_render_texture",
            Command::BeginRenderCanvas { .. } => "begin_render_canvas",
            Command::SetDefaultDepthAndBlendMode => "set_default_depth_and_blend_mode",
        }
    }

    /// Decode a [`CompileShaderArgs`] bundle at `args_ptr`.
    pub fn compile_shader(memory: &GuestMemory<'a>, args_ptr: u32) -> BridgeResult<Self> {
        let args: CompileShaderArgs = memory.read(args_ptr)?;
        let vertex = memory.str(args.vertex.ptr, args.vertex.len)?;
        let pixel = memory.str(args.pixel.ptr, args.pixel.len)?;
        let descs: &[TextureDescArgs] = memory.optional_slice(args.textures)?.unwrap_or_default();
        let textures: SmallVec<[TextureDescriptor<'a>; 4]> = descs
            .iter()
            .map(|desc| {
                Ok(TextureDescriptor {
                    name: memory.str(desc.name.ptr, desc.name.len)?,
                    sampler_type: desc.sampler_type,
                })
            })
            .collect::<BridgeResult<_>>()?;
        Ok(Command::CompileShader {
            shader_id: ShaderId(args.shader_id),
            vertex,
            pixel,
            geometry_slots: args.geometry_slots,
            instance_slots: args.instance_slots,
            textures,
        })
    }

    pub fn alloc_index_buffer(
        memory: &GuestMemory<'a>,
        buffer_id: u32,
        ptr: u32,
        len: u32,
    ) -> BridgeResult<Self> {
        let data: &[u32] = memory.slice(ptr, len)?;
        Ok(Command::AllocIndexBuffer {
            buffer_id: BufferId(buffer_id),
            data,
        })
    }

    pub fn alloc_array_buffer(
        memory: &GuestMemory<'a>,
        buffer_id: u32,
        ptr: u32,
        len: u32,
    ) -> BridgeResult<Self> {
        let data: &[f32] = memory.slice(ptr, len)?;
        Ok(Command::AllocArrayBuffer {
            buffer_id: BufferId(buffer_id),
            data,
        })
    }

    pub fn alloc_texture_image2d(
        memory: &GuestMemory<'a>,
        texture_id: u32,
        width: u32,
        height: u32,
        ptr: u32,
        len: u32,
    ) -> BridgeResult<Self> {
        let data: &[u8] = memory.slice(ptr, len)?;
        Ok(Command::AllocTextureImage2D {
            texture_id: TextureId(texture_id),
            width,
            height,
            data,
        })
    }

    /// Decode a [`DrawCallArgs`] bundle at `args_ptr`.
    pub fn draw_call(memory: &GuestMemory<'a>, args_ptr: u32) -> BridgeResult<Self> {
        let args: DrawCallArgs = memory.read(args_ptr)?;
        let mut request = DrawRequest::new(ShaderId(args.shader_id), VaoId(args.vao_id));
        for block in UniformBlock::ALL {
            request.uniforms[block.index()] = memory.optional_slice(args.uniforms[block.index()])?;
        }
        let slots: &[u32] = memory.optional_slice(args.textures)?.unwrap_or_default();
        request.textures = slots
            .iter()
            .map(|&raw| (raw != TEXTURE_SLOT_EMPTY).then_some(TextureId(raw)))
            .collect();
        Ok(Command::DrawCall(request))
    }

    /// Decode a [`BeginRenderTextureArgs`] bundle at `args_ptr`.
    pub fn begin_render_texture(memory: &GuestMemory<'a>, args_ptr: u32) -> BridgeResult<Self> {
        let args: BeginRenderTextureArgs = memory.read(args_ptr)?;
        let targets: &[ColorTargetArgs] =
            memory.optional_slice(args.color_targets)?.unwrap_or_default();
        let depth = args.depth_target;
        Ok(Command::BeginRenderTexture(RenderPass {
            pass_id: PassId(args.pass_id),
            width: args.width,
            height: args.height,
            color_targets: targets
                .iter()
                .map(|t| ColorTarget {
                    texture_id: TextureId(t.texture_id),
                    clear_color: t.clear_color,
                    init_only: t.init_only != 0,
                })
                .collect(),
            depth_target: (depth.enabled != 0).then_some(DepthTarget {
                texture_id: TextureId(depth.texture_id),
                clear_depth: depth.clear_depth,
                init_only: depth.init_only != 0,
            }),
        }))
    }
}
