//! Texture store
//!
//! Textures come from two places: pixel uploads from the guest (fixed size, nearest
//! sampling) and render-target allocation by the render target manager (size tracked
//! and reallocated when a pass asks for a different size).

use hashbrown::HashMap;
use tracing::debug;

use crate::device::{RasterDevice, Sampling, TexelFormat, TextureHandle};
use crate::error::{BridgeError, BridgeResult};
use rasterlink_shared::TextureId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub handle: TextureHandle,
    /// Tracked only for render targets; uploaded images leave this `None`.
    pub size: Option<(u32, u32)>,
    pub format: TexelFormat,
}

/// Outcome of [`TextureStore::ensure_render_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTexture {
    pub handle: TextureHandle,
    /// The backing image was (re)allocated; its contents are undefined until cleared.
    pub reallocated: bool,
}

fn validate_dimensions(width: u32, height: u32) -> BridgeResult<()> {
    if width == 0 || height == 0 {
        return Err(BridgeError::InvalidDimensions { width, height });
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct TextureStore {
    textures: HashMap<TextureId, Texture>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create<D: RasterDevice + ?Sized>(
        &mut self,
        device: &mut D,
        texture_id: TextureId,
        format: TexelFormat,
    ) -> &mut Texture {
        self.textures.entry(texture_id).or_insert_with(|| {
            let handle = device.create_texture();
            debug!("Created {} -> {:?}", texture_id, handle);
            Texture {
                handle,
                size: None,
                format,
            }
        })
    }

    /// Upload `width * height` RGBA8 pixels, top row first.
    ///
    /// The texture stays bound to the active unit; draws rebind every unit they use.
    ///
    /// Rows are flipped on upload so texture coordinates match the surface convention
    /// (origin bottom-left).
    pub fn upload_image<D: RasterDevice + ?Sized>(
        &mut self,
        device: &mut D,
        texture_id: TextureId,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> BridgeResult<TextureHandle> {
        validate_dimensions(width, height)?;
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(BridgeError::PixelSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }

        let texture = self.get_or_create(device, texture_id, TexelFormat::Rgba8);
        texture.size = None;
        texture.format = TexelFormat::Rgba8;
        let handle = texture.handle;

        device.bind_texture(Some(handle));
        device.tex_parameters(Sampling::NEAREST_CLAMP);
        device.set_unpack_flip_y(true);
        device.tex_image_2d(TexelFormat::Rgba8, width, height, Some(pixels));
        device.set_unpack_flip_y(false);
        Ok(handle)
    }

    /// Get or create a render-target texture of exactly `width x height`.
    ///
    /// The handle is kept across resizes; only the backing image is reallocated.
    pub fn ensure_render_target<D: RasterDevice + ?Sized>(
        &mut self,
        device: &mut D,
        texture_id: TextureId,
        width: u32,
        height: u32,
        format: TexelFormat,
    ) -> BridgeResult<RenderTexture> {
        validate_dimensions(width, height)?;
        let texture = self.get_or_create(device, texture_id, format);
        let handle = texture.handle;
        if texture.size == Some((width, height)) && texture.format == format {
            return Ok(RenderTexture {
                handle,
                reallocated: false,
            });
        }

        debug!(
            "Allocating {} as {:?} render target {}x{} (was {:?})",
            texture_id, format, width, height, texture.size
        );
        texture.size = Some((width, height));
        texture.format = format;

        device.bind_texture(Some(handle));
        device.tex_parameters(Sampling::LINEAR_CLAMP);
        device.tex_image_2d(format, width, height, None);
        Ok(RenderTexture {
            handle,
            reallocated: true,
        })
    }

    pub fn get(&self, texture_id: TextureId) -> BridgeResult<&Texture> {
        self.textures
            .get(&texture_id)
            .ok_or(BridgeError::UnknownTexture(texture_id))
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, HeadlessDevice};

    #[test]
    fn upload_round_trip_with_vertical_flip() {
        let mut device = HeadlessDevice::new();
        let mut store = TextureStore::new();
        let (w, h) = (3u32, 2u32);
        let pixels: Vec<u8> = (0..(w * h * 4) as u8).collect();
        let handle = store
            .upload_image(&mut device, TextureId(1), w, h, &pixels)
            .unwrap();

        let image = device.texture_image(handle).unwrap();
        assert_eq!((image.width, image.height), (w, h));
        assert_eq!(image.sampling, Some(Sampling::NEAREST_CLAMP));

        // Stored bottom row first: undo the flip to recover the upload.
        let row = (w * 4) as usize;
        let restored: Vec<u8> = image.pixels.chunks_exact(row).rev().flatten().copied().collect();
        assert_eq!(restored, pixels);
        assert_eq!(store.get(TextureId(1)).unwrap().size, None);
    }

    #[test]
    fn allocation_binds_once_and_never_unbinds() {
        let mut device = HeadlessDevice::new();
        let mut store = TextureStore::new();
        let image = store
            .upload_image(&mut device, TextureId(1), 1, 1, &[1, 2, 3, 4])
            .unwrap();
        let target = store
            .ensure_render_target(&mut device, TextureId(2), 8, 8, TexelFormat::Rgba8)
            .unwrap();

        let binds: Vec<_> = device
            .calls()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::BindTexture { texture, .. } => Some(*texture),
                _ => None,
            })
            .collect();
        assert_eq!(binds, vec![Some(image), Some(target.handle)]);
    }

    #[test]
    fn upload_rejects_wrong_length() {
        let mut device = HeadlessDevice::new();
        let mut store = TextureStore::new();
        let err = store
            .upload_image(&mut device, TextureId(1), 2, 2, &[0; 15])
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::PixelSizeMismatch {
                expected: 16,
                actual: 15
            }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn reupload_reuses_handle() {
        let mut device = HeadlessDevice::new();
        let mut store = TextureStore::new();
        let a = store
            .upload_image(&mut device, TextureId(4), 1, 1, &[1, 2, 3, 4])
            .unwrap();
        let b = store
            .upload_image(&mut device, TextureId(4), 2, 1, &[0; 8])
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(device.texture_image(b).unwrap().width, 2);
    }

    #[test]
    fn render_target_reallocates_only_on_size_change() {
        let mut device = HeadlessDevice::new();
        let mut store = TextureStore::new();
        let first = store
            .ensure_render_target(&mut device, TextureId(5), 64, 32, TexelFormat::Rgba8)
            .unwrap();
        assert!(first.reallocated);

        let same = store
            .ensure_render_target(&mut device, TextureId(5), 64, 32, TexelFormat::Rgba8)
            .unwrap();
        assert!(!same.reallocated);

        let resized = store
            .ensure_render_target(&mut device, TextureId(5), 64, 64, TexelFormat::Rgba8)
            .unwrap();
        assert!(resized.reallocated);
        assert_eq!(resized.handle, first.handle);
        assert_eq!(store.get(TextureId(5)).unwrap().size, Some((64, 64)));
        assert_eq!(
            device.texture_image(first.handle).unwrap().sampling,
            Some(Sampling::LINEAR_CLAMP)
        );
    }

    #[test]
    fn zero_sized_render_target_is_rejected() {
        let mut device = HeadlessDevice::new();
        let mut store = TextureStore::new();
        assert_eq!(
            store
                .ensure_render_target(&mut device, TextureId(1), 0, 8, TexelFormat::Rgba8)
                .unwrap_err(),
            BridgeError::InvalidDimensions {
                width: 0,
                height: 8
            }
        );
    }
}
