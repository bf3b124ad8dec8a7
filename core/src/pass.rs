//! Render target manager
//!
//! Off-screen passes render into framebuffers keyed by [`PassId`]. Framebuffers carry
//! no size of their own; each attached texture is sized to the pass and reallocated
//! when the pass size changes. Also hosts the on-surface pass and the default raster
//! state reset, the other two commands that touch global framebuffer state.

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::device::{
    Attachment, BlendEquation, BlendFactor, BlendFunc, ClearRequest, DepthFunc,
    FramebufferHandle, RasterDevice, TexelFormat,
};
use crate::error::{BridgeError, BridgeResult};
use crate::texture::TextureStore;
use rasterlink_shared::{MAX_COLOR_TARGETS, PassId, TextureId};

/// Blend function installed by [`set_default_raster_state`]: premultiplied-alpha over.
pub const DEFAULT_BLEND_FUNC: BlendFunc = BlendFunc {
    src_rgb: BlendFactor::One,
    dst_rgb: BlendFactor::OneMinusSrcAlpha,
    src_alpha: BlendFactor::One,
    dst_alpha: BlendFactor::OneMinusSrcAlpha,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTarget {
    pub texture_id: TextureId,
    pub clear_color: [f32; 4],
    /// Clear only when the texture is (re)allocated instead of every pass.
    pub init_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthTarget {
    pub texture_id: TextureId,
    pub clear_depth: f32,
    pub init_only: bool,
}

/// Arguments of one `begin_pass`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub pass_id: PassId,
    pub width: u32,
    pub height: u32,
    pub color_targets: SmallVec<[ColorTarget; MAX_COLOR_TARGETS]>,
    pub depth_target: Option<DepthTarget>,
}

/// A framebuffer and the textures last attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub handle: FramebufferHandle,
    pub color_attachments: SmallVec<[TextureId; MAX_COLOR_TARGETS]>,
    pub depth_attachment: Option<TextureId>,
}

#[derive(Debug, Default)]
pub struct RenderTargets {
    targets: HashMap<PassId, RenderTarget>,
}

impl RenderTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pass_id: PassId) -> Option<&RenderTarget> {
        self.targets.get(&pass_id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Bind the pass framebuffer, size and attach its textures, set the viewport and
    /// clear the attachments that need it.
    ///
    /// A color target is cleared with its own clear color when its texture was
    /// reallocated, or on every pass unless it is `init_only`. The same rule applies to
    /// the depth target with its clear depth.
    pub fn begin_pass<D: RasterDevice + ?Sized>(
        &mut self,
        device: &mut D,
        textures: &mut TextureStore,
        pass: &RenderPass,
    ) -> BridgeResult<()> {
        if pass.color_targets.len() > MAX_COLOR_TARGETS {
            return Err(BridgeError::ColorTargetOverflow {
                count: pass.color_targets.len(),
                max: MAX_COLOR_TARGETS,
            });
        }
        if pass.width == 0 || pass.height == 0 {
            return Err(BridgeError::InvalidDimensions {
                width: pass.width,
                height: pass.height,
            });
        }

        let target = self.targets.entry(pass.pass_id).or_insert_with(|| {
            let handle = device.create_framebuffer();
            debug!("Created framebuffer for {} -> {:?}", pass.pass_id, handle);
            RenderTarget {
                handle,
                color_attachments: SmallVec::new(),
                depth_attachment: None,
            }
        });
        device.bind_framebuffer(Some(target.handle));

        let mut color_clears: SmallVec<[(u32, [f32; 4]); MAX_COLOR_TARGETS]> = SmallVec::new();
        target.color_attachments.clear();
        for (index, color) in pass.color_targets.iter().enumerate() {
            let index = index as u32;
            let texture = textures.ensure_render_target(
                device,
                color.texture_id,
                pass.width,
                pass.height,
                TexelFormat::Rgba8,
            )?;
            if texture.reallocated || !color.init_only {
                color_clears.push((index, color.clear_color));
            }
            device.framebuffer_texture(Attachment::Color(index), texture.handle);
            target.color_attachments.push(color.texture_id);
        }
        device.draw_buffers(pass.color_targets.len() as u32);

        let mut depth_clear = None;
        target.depth_attachment = None;
        if let Some(depth) = &pass.depth_target {
            let texture = textures.ensure_render_target(
                device,
                depth.texture_id,
                pass.width,
                pass.height,
                TexelFormat::Depth32F,
            )?;
            if texture.reallocated || !depth.init_only {
                depth_clear = Some(depth.clear_depth);
            }
            device.framebuffer_texture(Attachment::Depth, texture.handle);
            target.depth_attachment = Some(depth.texture_id);
        }

        device.viewport(0, 0, pass.width, pass.height);

        for (index, color) in color_clears {
            device.clear_color_attachment(index, color);
        }
        if depth_clear.is_some() {
            device.clear(ClearRequest {
                color: None,
                depth: depth_clear,
            });
        }
        Ok(())
    }
}

/// Bind the on-screen surface, cover it with the viewport and clear color and depth.
pub fn begin_pass_on_surface<D: RasterDevice + ?Sized>(
    device: &mut D,
    surface_size: (u32, u32),
    clear_color: [f32; 4],
    clear_depth: f32,
) {
    device.bind_framebuffer(None);
    device.viewport(0, 0, surface_size.0, surface_size.1);
    device.clear(ClearRequest {
        color: Some(clear_color),
        depth: Some(clear_depth),
    });
}

/// One-shot global reset: depth test off (comparison preconfigured to greater-or-equal),
/// additive blend equation with premultiplied-alpha factors, blending on.
pub fn set_default_raster_state<D: RasterDevice + ?Sized>(device: &mut D) {
    device.set_depth_test(false);
    device.depth_func(DepthFunc::GreaterEqual);
    device.blend_equation(BlendEquation::Add);
    device.blend_func(DEFAULT_BLEND_FUNC);
    device.set_blend(true);
}
