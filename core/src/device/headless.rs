//! Headless reference device
//!
//! Keeps every resource in host memory and records each state-changing call, so command
//! streams can be executed and inspected without a GPU. Shader "compilation" only scans
//! declarations: enough to reflect attribute/uniform locations and to produce the same
//! classes of compile and link failure a driver reports.

use hashbrown::HashMap;

use super::{
    Attachment, BlendEquation, BlendFunc, BufferHandle, BufferTarget, BufferUsage, ClearRequest,
    DepthFunc, DeviceLimits, FramebufferHandle, ProgramHandle, RasterDevice, RendererInfo,
    Sampling, ShaderStage, StageHandle, TexelFormat, TextureHandle, UniformLocation,
    VertexArrayHandle,
};

/// A state-changing call observed by the headless device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    UseProgram(Option<ProgramHandle>),
    DeleteProgram(ProgramHandle),
    BufferData {
        buffer: BufferHandle,
        target: BufferTarget,
        len: usize,
        usage: BufferUsage,
    },
    CreateVertexArray(VertexArrayHandle),
    DeleteVertexArray(VertexArrayHandle),
    BindVertexArray(Option<VertexArrayHandle>),
    VertexAttrib {
        location: u32,
        components: u32,
        stride: u32,
        offset: u32,
    },
    VertexAttribDivisor {
        location: u32,
        divisor: u32,
    },
    BindTexture {
        unit: u32,
        texture: Option<TextureHandle>,
    },
    TexImage {
        texture: TextureHandle,
        format: TexelFormat,
        width: u32,
        height: u32,
    },
    BindFramebuffer(Option<FramebufferHandle>),
    FramebufferTexture {
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
    },
    DrawBuffers(u32),
    Viewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Clear {
        framebuffer: Option<FramebufferHandle>,
        request: ClearRequest,
    },
    ClearColorAttachment {
        framebuffer: Option<FramebufferHandle>,
        index: u32,
        color: [f32; 4],
    },
    DepthTest(bool),
    DepthFunc(DepthFunc),
    Blend(bool),
    BlendEquation(BlendEquation),
    BlendFunc(BlendFunc),
    Uniform {
        location: UniformLocation,
        values: Vec<f32>,
    },
    UniformSampler {
        location: UniformLocation,
        unit: u32,
    },
    DrawElementsInstanced {
        program: Option<ProgramHandle>,
        vertex_array: Option<VertexArrayHandle>,
        index_count: u32,
        instance_count: u32,
    },
}

/// Attribute state captured by a vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribState {
    pub buffer: Option<BufferHandle>,
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
    pub enabled: bool,
    pub divisor: u32,
}

/// State captured by one vertex array (or the default array when none is bound).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexArrayState {
    pub attribs: HashMap<u32, AttribState>,
    pub element_buffer: Option<BufferHandle>,
}

/// Image backing a texture. With flip-Y unpacking, row 0 is the bottom row of the source.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub format: TexelFormat,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub sampling: Option<Sampling>,
}

#[derive(Debug, Default)]
struct StageRecord {
    stage: Option<ShaderStage>,
    attributes: Vec<String>,
    uniforms: Vec<String>,
    varyings_out: Vec<(String, String)>,
    varyings_in: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    attributes: Vec<String>,
    uniforms: Vec<String>,
}

#[derive(Debug, Default)]
struct BoundState {
    program: Option<ProgramHandle>,
    array_buffer: Option<BufferHandle>,
    vertex_array: Option<VertexArrayHandle>,
    framebuffer: Option<FramebufferHandle>,
    active_unit: u32,
    units: HashMap<u32, TextureHandle>,
    flip_y: bool,
}

/// Raster state toggled by `set_*`/`*_func` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterState {
    pub depth_test: bool,
    pub depth_func: DepthFunc,
    pub blend: bool,
    pub blend_equation: BlendEquation,
    pub blend_func: Option<BlendFunc>,
    pub viewport: (i32, i32, u32, u32),
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_func: DepthFunc::Less,
            blend: false,
            blend_equation: BlendEquation::Add,
            blend_func: None,
            viewport: (0, 0, 0, 0),
        }
    }
}

/// In-memory [`RasterDevice`].
#[derive(Debug)]
pub struct HeadlessDevice {
    next_handle: u32,
    calls: Vec<DeviceCall>,
    errors: Vec<String>,
    limits: DeviceLimits,
    renderer_info: Option<RendererInfo>,
    supported_extensions: Vec<String>,
    enabled_extensions: Vec<String>,
    stages: HashMap<StageHandle, StageRecord>,
    programs: HashMap<ProgramHandle, ProgramRecord>,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArrayState>,
    default_vertex_array: VertexArrayState,
    textures: HashMap<TextureHandle, Option<TextureImage>>,
    framebuffers: HashMap<FramebufferHandle, HashMap<Attachment, TextureHandle>>,
    uniforms: HashMap<UniformLocation, Vec<f32>>,
    bound: BoundState,
    raster: RasterState,
}

/// Extensions the headless device pretends to support.
pub const HEADLESS_EXTENSIONS: &[&str] = &[
    "ANGLE_instanced_arrays",
    "OES_vertex_array_object",
    "OES_standard_derivatives",
    "OES_element_index_uint",
    "WEBGL_draw_buffers",
    "WEBGL_depth_texture",
];

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits {
            max_vertex_uniform_vectors: 256,
            max_fragment_uniform_vectors: 224,
            max_texture_image_units: 16,
            max_vertex_attribs: 16,
        })
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            next_handle: 1,
            calls: Vec::new(),
            errors: Vec::new(),
            limits,
            renderer_info: Some(RendererInfo {
                vendor: "rasterlink".to_string(),
                renderer: "headless".to_string(),
            }),
            supported_extensions: HEADLESS_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            enabled_extensions: Vec::new(),
            stages: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            default_vertex_array: VertexArrayState::default(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            uniforms: HashMap::new(),
            bound: BoundState::default(),
            raster: RasterState::default(),
        }
    }

    /// Restrict the extensions this device reports as available.
    pub fn with_extensions(mut self, names: &[&str]) -> Self {
        self.supported_extensions = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn without_renderer_info(mut self) -> Self {
        self.renderer_info = None;
        self
    }

    fn next(&mut self) -> u32 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn record(&mut self, call: DeviceCall) {
        self.calls.push(call);
    }

    fn error(&mut self, message: String) {
        tracing::trace!("headless device error: {}", message);
        self.errors.push(message);
    }

    fn current_vertex_array(&mut self) -> &mut VertexArrayState {
        match self.bound.vertex_array {
            Some(vao) => self.vertex_arrays.entry(vao).or_default(),
            None => &mut self.default_vertex_array,
        }
    }

    fn current_vertex_array_ref(&self) -> &VertexArrayState {
        self.bound
            .vertex_array
            .and_then(|vao| self.vertex_arrays.get(&vao))
            .unwrap_or(&self.default_vertex_array)
    }

    fn bound_texture(&self) -> Option<TextureHandle> {
        self.bound.units.get(&self.bound.active_unit).copied()
    }

    fn fill_attachment(&mut self, attachment: Attachment, texel: [u8; 4]) {
        let Some(framebuffer) = self.bound.framebuffer else {
            return;
        };
        let Some(texture) = self
            .framebuffers
            .get(&framebuffer)
            .and_then(|attachments| attachments.get(&attachment))
            .copied()
        else {
            return;
        };
        if let Some(Some(image)) = self.textures.get_mut(&texture) {
            for chunk in image.pixels.chunks_exact_mut(4) {
                chunk.copy_from_slice(&texel);
            }
        }
    }

    fn color_attachment_indices(&self) -> Vec<u32> {
        let Some(framebuffer) = self.bound.framebuffer else {
            return Vec::new();
        };
        let mut indices: Vec<u32> = self
            .framebuffers
            .get(&framebuffer)
            .map(|attachments| {
                attachments
                    .keys()
                    .filter_map(|a| match a {
                        Attachment::Color(i) => Some(*i),
                        Attachment::Depth => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        indices.sort_unstable();
        indices
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Every state-changing call since creation (or the last [`take_calls`](Self::take_calls)).
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    /// Invalid operations the device observed (the equivalent of a GL error queue).
    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }

    pub fn draw_calls(&self) -> Vec<(u32, u32)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::DrawElementsInstanced {
                    index_count,
                    instance_count,
                    ..
                } => Some((*index_count, *instance_count)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    DeviceCall::Clear { .. } | DeviceCall::ClearColorAttachment { .. }
                )
            })
            .count()
    }

    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn vertex_array(&self, vao: VertexArrayHandle) -> Option<&VertexArrayState> {
        self.vertex_arrays.get(&vao)
    }

    pub fn texture_image(&self, texture: TextureHandle) -> Option<&TextureImage> {
        self.textures.get(&texture).and_then(Option::as_ref)
    }

    pub fn framebuffer_attachment(
        &self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
    ) -> Option<TextureHandle> {
        self.framebuffers.get(&framebuffer)?.get(&attachment).copied()
    }

    pub fn uniform_value(&self, location: UniformLocation) -> Option<&[f32]> {
        self.uniforms.get(&location).map(Vec::as_slice)
    }

    pub fn texture_on_unit(&self, unit: u32) -> Option<TextureHandle> {
        self.bound.units.get(&unit).copied()
    }

    pub fn bound_vertex_array(&self) -> Option<VertexArrayHandle> {
        self.bound.vertex_array
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.bound.framebuffer
    }

    pub fn raster_state(&self) -> RasterState {
        self.raster
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Declaration scanning
// ============================================================================

fn strip_array(name: &str) -> &str {
    name.split('[').next().unwrap_or(name)
}

fn scan_stage(stage: ShaderStage, source: &str) -> (StageRecord, bool) {
    let mut record = StageRecord {
        stage: Some(stage),
        ..Default::default()
    };
    let mut has_main = false;

    for line in source.lines() {
        let tokens: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ';')
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.windows(2).any(|w| w[0] == "void" && w[1].starts_with("main")) {
            has_main = true;
        }
        if tokens.len() < 3 {
            continue;
        }
        let name = strip_array(tokens[tokens.len() - 1]).to_string();
        let ty = tokens[tokens.len() - 2].to_string();
        match (tokens[0], stage) {
            ("attribute", ShaderStage::Vertex) | ("in", ShaderStage::Vertex) => {
                record.attributes.push(name)
            }
            ("uniform", _) => record.uniforms.push(name),
            ("varying", ShaderStage::Vertex) | ("out", ShaderStage::Vertex) => {
                record.varyings_out.push((ty, name))
            }
            ("varying", ShaderStage::Fragment) | ("in", ShaderStage::Fragment) => {
                record.varyings_in.push((ty, name))
            }
            _ => {}
        }
    }

    (record, has_main)
}

impl RasterDevice for HeadlessDevice {
    fn enable_extension(&mut self, name: &str) -> bool {
        let supported = self.supported_extensions.iter().any(|e| e == name);
        if supported && !self.enabled_extensions.iter().any(|e| e == name) {
            self.enabled_extensions.push(name.to_string());
        }
        supported
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn renderer_info(&self) -> Option<RendererInfo> {
        self.renderer_info.clone()
    }

    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageHandle, String> {
        let (record, has_main) = scan_stage(stage, source);
        if !has_main {
            let last_line = source.lines().count().max(1);
            return Err(format!(
                "ERROR: 0:{}: 'main' : function not defined",
                last_line
            ));
        }
        let handle = StageHandle(self.next());
        self.stages.insert(handle, record);
        Ok(handle)
    }

    fn link_program(
        &mut self,
        vertex: StageHandle,
        fragment: StageHandle,
    ) -> Result<ProgramHandle, String> {
        let (Some(vs), Some(fs)) = (self.stages.get(&vertex), self.stages.get(&fragment)) else {
            return Err("ERROR: invalid shader object".to_string());
        };
        if vs.stage != Some(ShaderStage::Vertex) || fs.stage != Some(ShaderStage::Fragment) {
            return Err("ERROR: stages attached in the wrong slots".to_string());
        }

        let mut log = String::new();
        for (ty, name) in &fs.varyings_in {
            match vs.varyings_out.iter().find(|(_, n)| n == name) {
                Some((vty, _)) if vty == ty => {}
                Some((vty, _)) => log.push_str(&format!(
                    "ERROR: varying '{}' has type {} in the fragment stage but {} in the vertex stage\n",
                    name, ty, vty
                )),
                None => log.push_str(&format!(
                    "ERROR: varying '{}' is not declared in the vertex stage\n",
                    name
                )),
            }
        }
        if !log.is_empty() {
            return Err(log.trim_end().to_string());
        }

        let mut uniforms = vs.uniforms.clone();
        for name in &fs.uniforms {
            if !uniforms.contains(name) {
                uniforms.push(name.clone());
            }
        }
        let record = ProgramRecord {
            attributes: vs.attributes.clone(),
            uniforms,
        };
        let handle = ProgramHandle(self.next());
        self.programs.insert(handle, record);
        Ok(handle)
    }

    fn delete_stage(&mut self, stage: StageHandle) {
        self.stages.remove(&stage);
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.uniforms.retain(|location, _| location.program != program);
        if self.bound.program == Some(program) {
            self.bound.program = None;
        }
        self.record(DeviceCall::DeleteProgram(program));
    }

    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let record = self.programs.get(&program)?;
        record
            .attributes
            .iter()
            .position(|a| a == name)
            .map(|i| i as u32)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let record = self.programs.get(&program)?;
        record
            .uniforms
            .iter()
            .position(|u| u == name)
            .map(|i| UniformLocation {
                program,
                index: i as u32,
            })
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        if let Some(p) = program {
            if !self.programs.contains_key(&p) {
                self.error(format!("use_program: unknown program {:?}", p));
            }
        }
        self.bound.program = program;
        self.record(DeviceCall::UseProgram(program));
    }

    fn create_buffer(&mut self) -> BufferHandle {
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, Vec::new());
        handle
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferHandle>) {
        match target {
            BufferTarget::Array => self.bound.array_buffer = buffer,
            BufferTarget::ElementArray => self.current_vertex_array().element_buffer = buffer,
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let bound = match target {
            BufferTarget::Array => self.bound.array_buffer,
            BufferTarget::ElementArray => self.current_vertex_array_ref().element_buffer,
        };
        let Some(buffer) = bound else {
            self.error(format!("buffer_data: no buffer bound to {:?}", target));
            return;
        };
        match self.buffers.get_mut(&buffer) {
            Some(contents) => {
                contents.clear();
                contents.extend_from_slice(data);
            }
            None => {
                self.error(format!("buffer_data: unknown buffer {:?}", buffer));
                return;
            }
        }
        self.record(DeviceCall::BufferData {
            buffer,
            target,
            len: data.len(),
            usage,
        });
    }

    fn create_vertex_array(&mut self) -> VertexArrayHandle {
        let handle = VertexArrayHandle(self.next());
        self.vertex_arrays.insert(handle, VertexArrayState::default());
        self.record(DeviceCall::CreateVertexArray(handle));
        handle
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayHandle) {
        if self.vertex_arrays.remove(&vao).is_none() {
            self.error(format!("delete_vertex_array: unknown {:?}", vao));
        }
        if self.bound.vertex_array == Some(vao) {
            self.bound.vertex_array = None;
        }
        self.record(DeviceCall::DeleteVertexArray(vao));
    }

    fn bind_vertex_array(&mut self, vao: Option<VertexArrayHandle>) {
        if let Some(v) = vao {
            if !self.vertex_arrays.contains_key(&v) {
                self.error(format!("bind_vertex_array: unknown {:?}", v));
            }
        }
        self.bound.vertex_array = vao;
        self.record(DeviceCall::BindVertexArray(vao));
    }

    fn vertex_attrib_pointer(&mut self, location: u32, components: u32, stride: u32, offset: u32) {
        if !(1..=4).contains(&components) {
            self.error(format!(
                "vertex_attrib_pointer: {} components at location {}",
                components, location
            ));
            return;
        }
        let buffer = self.bound.array_buffer;
        let attrib = self
            .current_vertex_array()
            .attribs
            .entry(location)
            .or_insert(AttribState {
                buffer,
                components,
                stride,
                offset,
                enabled: false,
                divisor: 0,
            });
        attrib.buffer = buffer;
        attrib.components = components;
        attrib.stride = stride;
        attrib.offset = offset;
        self.record(DeviceCall::VertexAttrib {
            location,
            components,
            stride,
            offset,
        });
    }

    fn enable_vertex_attrib(&mut self, location: u32) {
        match self.current_vertex_array().attribs.get_mut(&location) {
            Some(attrib) => attrib.enabled = true,
            None => self.error(format!(
                "enable_vertex_attrib: location {} has no pointer",
                location
            )),
        }
    }

    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32) {
        if let Some(attrib) = self.current_vertex_array().attribs.get_mut(&location) {
            attrib.divisor = divisor;
        }
        self.record(DeviceCall::VertexAttribDivisor { location, divisor });
    }

    fn create_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.next());
        self.textures.insert(handle, None);
        handle
    }

    fn active_texture(&mut self, unit: u32) {
        if unit >= self.limits.max_texture_image_units {
            self.error(format!("active_texture: unit {} out of range", unit));
        }
        self.bound.active_unit = unit;
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        let unit = self.bound.active_unit;
        match texture {
            Some(t) => {
                self.bound.units.insert(unit, t);
            }
            None => {
                self.bound.units.remove(&unit);
            }
        }
        self.record(DeviceCall::BindTexture { unit, texture });
    }

    fn tex_parameters(&mut self, sampling: Sampling) {
        let Some(texture) = self.bound_texture() else {
            self.error("tex_parameters: no texture bound".to_string());
            return;
        };
        match self.textures.get_mut(&texture) {
            Some(Some(image)) => image.sampling = Some(sampling),
            // Parameters set before the first image: keep them for the allocation.
            Some(slot) => {
                *slot = Some(TextureImage {
                    format: TexelFormat::Rgba8,
                    width: 0,
                    height: 0,
                    pixels: Vec::new(),
                    sampling: Some(sampling),
                })
            }
            None => self.error(format!("tex_parameters: unknown texture {:?}", texture)),
        }
    }

    fn set_unpack_flip_y(&mut self, flip: bool) {
        self.bound.flip_y = flip;
    }

    fn tex_image_2d(&mut self, format: TexelFormat, width: u32, height: u32, pixels: Option<&[u8]>) {
        let Some(texture) = self.bound_texture() else {
            self.error("tex_image_2d: no texture bound".to_string());
            return;
        };
        let row = width as usize * format.bytes_per_texel();
        let size = row * height as usize;
        let data = match pixels {
            Some(p) if p.len() != size => {
                self.error(format!(
                    "tex_image_2d: {} bytes supplied for {}x{}",
                    p.len(),
                    width,
                    height
                ));
                return;
            }
            Some(p) if self.bound.flip_y && row > 0 => {
                p.chunks_exact(row).rev().flatten().copied().collect()
            }
            Some(p) => p.to_vec(),
            None => vec![0u8; size],
        };
        let sampling = self
            .textures
            .get(&texture)
            .and_then(|slot| slot.as_ref())
            .and_then(|image| image.sampling);
        self.textures.insert(
            texture,
            Some(TextureImage {
                format,
                width,
                height,
                pixels: data,
                sampling,
            }),
        );
        self.record(DeviceCall::TexImage {
            texture,
            format,
            width,
            height,
        });
    }

    fn create_framebuffer(&mut self) -> FramebufferHandle {
        let handle = FramebufferHandle(self.next());
        self.framebuffers.insert(handle, HashMap::new());
        handle
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound.framebuffer = framebuffer;
        self.record(DeviceCall::BindFramebuffer(framebuffer));
    }

    fn framebuffer_texture(&mut self, attachment: Attachment, texture: TextureHandle) {
        let Some(framebuffer) = self.bound.framebuffer else {
            self.error("framebuffer_texture: default framebuffer bound".to_string());
            return;
        };
        if let Some(attachments) = self.framebuffers.get_mut(&framebuffer) {
            attachments.insert(attachment, texture);
        }
        self.record(DeviceCall::FramebufferTexture {
            framebuffer,
            attachment,
            texture,
        });
    }

    fn draw_buffers(&mut self, count: u32) {
        self.record(DeviceCall::DrawBuffers(count));
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.raster.viewport = (x, y, width, height);
        self.record(DeviceCall::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn clear(&mut self, request: ClearRequest) {
        if let Some(color) = request.color {
            let texel = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            for index in self.color_attachment_indices() {
                self.fill_attachment(Attachment::Color(index), texel);
            }
        }
        if let Some(depth) = request.depth {
            self.fill_attachment(Attachment::Depth, depth.to_ne_bytes());
        }
        self.record(DeviceCall::Clear {
            framebuffer: self.bound.framebuffer,
            request,
        });
    }

    fn clear_color_attachment(&mut self, index: u32, color: [f32; 4]) {
        let texel = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        self.fill_attachment(Attachment::Color(index), texel);
        self.record(DeviceCall::ClearColorAttachment {
            framebuffer: self.bound.framebuffer,
            index,
            color,
        });
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.raster.depth_test = enabled;
        self.record(DeviceCall::DepthTest(enabled));
    }

    fn depth_func(&mut self, func: DepthFunc) {
        self.raster.depth_func = func;
        self.record(DeviceCall::DepthFunc(func));
    }

    fn set_blend(&mut self, enabled: bool) {
        self.raster.blend = enabled;
        self.record(DeviceCall::Blend(enabled));
    }

    fn blend_equation(&mut self, equation: BlendEquation) {
        self.raster.blend_equation = equation;
        self.record(DeviceCall::BlendEquation(equation));
    }

    fn blend_func(&mut self, func: BlendFunc) {
        self.raster.blend_func = Some(func);
        self.record(DeviceCall::BlendFunc(func));
    }

    fn uniform_f32_array(&mut self, location: UniformLocation, data: &[f32]) {
        if self.bound.program != Some(location.program) {
            self.error(format!(
                "uniform_f32_array: location belongs to {:?}, bound program is {:?}",
                location.program, self.bound.program
            ));
            return;
        }
        self.uniforms.insert(location, data.to_vec());
        self.record(DeviceCall::Uniform {
            location,
            values: data.to_vec(),
        });
    }

    fn uniform_sampler(&mut self, location: UniformLocation, unit: u32) {
        if self.bound.program != Some(location.program) {
            self.error("uniform_sampler: location does not belong to the bound program".into());
            return;
        }
        self.uniforms.insert(location, vec![unit as f32]);
        self.record(DeviceCall::UniformSampler { location, unit });
    }

    fn draw_elements_instanced(&mut self, index_count: u32, instance_count: u32) {
        if self.bound.program.is_none() {
            self.error("draw_elements_instanced: no program bound".to_string());
        }
        if self.current_vertex_array_ref().element_buffer.is_none() {
            self.error("draw_elements_instanced: no element buffer bound".to_string());
        }
        self.record(DeviceCall::DrawElementsInstanced {
            program: self.bound.program,
            vertex_array: self.bound.vertex_array,
            index_count,
            instance_count,
        });
    }
}
