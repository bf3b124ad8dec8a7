//! Raster device abstraction
//!
//! [`RasterDevice`] is an immediate-mode, GL-style state machine: bindings, the current
//! program and blend/depth state are global. Only the bridge's stores call into it, and
//! only from the thread driving the bridge.
//!
//! - [`headless`] - In-memory reference device used by tests and replay tooling

pub mod headless;

pub use headless::{DeviceCall, HeadlessDevice};

use std::fmt;

macro_rules! device_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub u32);
        )*
    };
}

device_handle! {
    /// Linked program
    ProgramHandle;
    /// Compiled (unlinked) shader stage
    StageHandle;
    /// Vertex or index buffer
    BufferHandle;
    /// Vertex-array object
    VertexArrayHandle;
    /// 2D texture
    TextureHandle;
    /// Framebuffer object
    FramebufferHandle;
}

/// Resolved uniform location. Only valid for the program it was queried from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramHandle,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data
    Array,
    /// Index data, captured by the bound vertex array
    ElementArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Uploaded once, drawn many times
    StaticDraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    ClampToEdge,
}

/// Sampling parameters applied to the bound texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sampling {
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
}

impl Sampling {
    pub const NEAREST_CLAMP: Sampling = Sampling {
        min_filter: TextureFilter::Nearest,
        mag_filter: TextureFilter::Nearest,
        wrap_s: TextureWrap::ClampToEdge,
        wrap_t: TextureWrap::ClampToEdge,
    };

    pub const LINEAR_CLAMP: Sampling = Sampling {
        min_filter: TextureFilter::Linear,
        mag_filter: TextureFilter::Linear,
        wrap_s: TextureWrap::ClampToEdge,
        wrap_t: TextureWrap::ClampToEdge,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    Rgba8,
    Depth32F,
}

impl TexelFormat {
    pub const fn bytes_per_texel(self) -> usize {
        4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    Depth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    /// Initial state of a fresh context
    Less,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    One,
    OneMinusSrcAlpha,
}

/// Separate RGB/alpha blend function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

/// A combined clear of the bound framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearRequest {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
}

/// Implementation limits reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_vertex_uniform_vectors: u32,
    pub max_fragment_uniform_vectors: u32,
    pub max_texture_image_units: u32,
    pub max_vertex_attribs: u32,
}

/// Vendor/renderer strings, when the debug-info extension is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererInfo {
    pub vendor: String,
    pub renderer: String,
}

/// Immediate-mode rasterizer interface driven by the bridge.
///
/// Handles are opaque to callers. Operations that target "the bound X" act on whatever
/// the last `bind_*` call selected, exactly like the underlying state machine.
pub trait RasterDevice {
    // Context

    /// Try to enable an optional extension. Returns whether it is available.
    fn enable_extension(&mut self, name: &str) -> bool;
    fn limits(&self) -> DeviceLimits;
    fn renderer_info(&self) -> Option<RendererInfo>;

    // Shaders

    /// Compile one stage. On failure returns the compiler's info log.
    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageHandle, String>;
    /// Link two stages. On failure returns the linker's info log.
    fn link_program(
        &mut self,
        vertex: StageHandle,
        fragment: StageHandle,
    ) -> Result<ProgramHandle, String>;
    fn delete_stage(&mut self, stage: StageHandle);
    fn delete_program(&mut self, program: ProgramHandle);
    /// `None` when the attribute is absent or was optimized out.
    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;
    /// `None` when the uniform is absent or was optimized out.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn use_program(&mut self, program: Option<ProgramHandle>);

    // Buffers

    fn create_buffer(&mut self) -> BufferHandle;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferHandle>);
    /// Replace the contents of the buffer bound to `target`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);

    // Vertex arrays

    fn create_vertex_array(&mut self) -> VertexArrayHandle;
    fn delete_vertex_array(&mut self, vao: VertexArrayHandle);
    fn bind_vertex_array(&mut self, vao: Option<VertexArrayHandle>);
    /// Float attribute sourced from the bound array buffer.
    fn vertex_attrib_pointer(&mut self, location: u32, components: u32, stride: u32, offset: u32);
    fn enable_vertex_attrib(&mut self, location: u32);
    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32);

    // Textures

    fn create_texture(&mut self) -> TextureHandle;
    fn active_texture(&mut self, unit: u32);
    /// Bind to the active texture unit.
    fn bind_texture(&mut self, texture: Option<TextureHandle>);
    fn tex_parameters(&mut self, sampling: Sampling);
    /// Flip rows on upload so row 0 of the source becomes the bottom row.
    fn set_unpack_flip_y(&mut self, flip: bool);
    /// (Re)allocate the bound texture's image. `pixels: None` leaves contents undefined.
    fn tex_image_2d(&mut self, format: TexelFormat, width: u32, height: u32, pixels: Option<&[u8]>);

    // Framebuffers

    fn create_framebuffer(&mut self) -> FramebufferHandle;
    /// `None` selects the default (on-screen) framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);
    fn framebuffer_texture(&mut self, attachment: Attachment, texture: TextureHandle);
    /// Route fragment outputs 0..count to color attachments 0..count.
    fn draw_buffers(&mut self, count: u32);
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn clear(&mut self, request: ClearRequest);
    fn clear_color_attachment(&mut self, index: u32, color: [f32; 4]);

    // Raster state

    fn set_depth_test(&mut self, enabled: bool);
    fn depth_func(&mut self, func: DepthFunc);
    fn set_blend(&mut self, enabled: bool);
    fn blend_equation(&mut self, equation: BlendEquation);
    fn blend_func(&mut self, func: BlendFunc);

    // Uniforms and drawing

    fn uniform_f32_array(&mut self, location: UniformLocation, data: &[f32]);
    fn uniform_sampler(&mut self, location: UniformLocation, unit: u32);
    /// Indexed triangles from the bound vertex array's element buffer.
    fn draw_elements_instanced(&mut self, index_count: u32, instance_count: u32);
}
