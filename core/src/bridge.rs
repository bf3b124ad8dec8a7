//! The command bridge
//!
//! [`Bridge`] owns the device and every resource table. Commands execute synchronously
//! in arrival order; there is no queue and nothing is deferred.

use tracing::debug;

use crate::bootstrap::{DeviceCapabilities, SurfaceSize};
use crate::buffer::BufferStore;
use crate::command::Command;
use crate::device::RasterDevice;
use crate::draw::DrawResources;
use crate::error::BridgeResult;
use crate::pass::{self, RenderTargets};
use crate::shader::{ShaderOptions, ShaderRegistry, ShaderSource};
use crate::texture::TextureStore;
use crate::vao::{VaoBuffers, VertexLayouts};

/// Device plus resource tables for one guest instance.
#[derive(Debug)]
pub struct Bridge<D> {
    device: D,
    capabilities: DeviceCapabilities,
    surface: SurfaceSize,
    shaders: ShaderRegistry,
    buffers: BufferStore,
    vertex_layouts: VertexLayouts,
    textures: TextureStore,
    render_targets: RenderTargets,
}

impl<D: RasterDevice> Bridge<D> {
    pub fn new(
        device: D,
        capabilities: DeviceCapabilities,
        surface: SurfaceSize,
        shader_options: ShaderOptions,
    ) -> Self {
        Self {
            device,
            capabilities,
            surface,
            shaders: ShaderRegistry::new(shader_options),
            buffers: BufferStore::new(),
            vertex_layouts: VertexLayouts::new(),
            textures: TextureStore::new(),
            render_targets: RenderTargets::new(),
        }
    }

    /// Execute one command against the device.
    pub fn execute(&mut self, command: Command<'_>) -> BridgeResult<()> {
        match command {
            Command::CompileShader {
                shader_id,
                vertex,
                pixel,
                geometry_slots,
                instance_slots,
                textures,
            } => self.shaders.compile(
                &mut self.device,
                shader_id,
                &ShaderSource {
                    vertex,
                    fragment: pixel,
                    geometry_slots,
                    instance_slots,
                    textures: &textures,
                },
            ),
            Command::AllocIndexBuffer { buffer_id, data } => {
                self.buffers.upload_index(&mut self.device, buffer_id, data);
                Ok(())
            }
            Command::AllocArrayBuffer { buffer_id, data } => {
                self.buffers.upload_vertex(&mut self.device, buffer_id, data);
                Ok(())
            }
            Command::AllocVao {
                vao_id,
                shader_id,
                geom_ib_id,
                geom_vb_id,
                inst_vb_id,
            } => {
                let shader = self.shaders.get(shader_id)?;
                self.vertex_layouts
                    .allocate(
                        &mut self.device,
                        vao_id,
                        shader_id,
                        shader,
                        &self.buffers,
                        VaoBuffers {
                            geometry: geom_vb_id,
                            instance: inst_vb_id,
                            index: geom_ib_id,
                        },
                    )
                    .map(|_| ())
            }
            Command::DrawCall(request) => DrawResources {
                shaders: &self.shaders,
                buffers: &self.buffers,
                vertex_layouts: &self.vertex_layouts,
                textures: &self.textures,
            }
            .draw(&mut self.device, &request),
            Command::AllocTextureImage2D {
                texture_id,
                width,
                height,
                data,
            } => self
                .textures
                .upload_image(&mut self.device, texture_id, width, height, data)
                .map(|_| ()),
            Command::BeginRenderTexture(render_pass) => {
                self.render_targets
                    .begin_pass(&mut self.device, &mut self.textures, &render_pass)
            }
            Command::BeginRenderCanvas { clear_color, depth } => {
                pass::begin_pass_on_surface(
                    &mut self.device,
                    self.surface.pixel_size(),
                    clear_color,
                    depth,
                );
                Ok(())
            }
            Command::SetDefaultDepthAndBlendMode => {
                pass::set_default_raster_state(&mut self.device);
                Ok(())
            }
        }
    }

    /// Record a surface resize. The next on-surface pass covers the new pixel size.
    pub fn resize(&mut self, size: SurfaceSize) {
        debug!(
            "Surface resized to {}x{} @ {}",
            size.width, size.height, size.dpi_factor
        );
        self.surface = size;
    }
}

impl<D> Bridge<D> {
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn surface_size(&self) -> SurfaceSize {
        self.surface
    }

    pub fn shaders(&self) -> &ShaderRegistry {
        &self.shaders
    }

    pub fn buffers(&self) -> &BufferStore {
        &self.buffers
    }

    pub fn vertex_layouts(&self) -> &VertexLayouts {
        &self.vertex_layouts
    }

    pub fn textures(&self) -> &TextureStore {
        &self.textures
    }

    pub fn render_targets(&self) -> &RenderTargets {
        &self.render_targets
    }
}
