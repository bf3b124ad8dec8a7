//! Device context bootstrap
//!
//! One-time setup against the host surface: acquire a context with the configured
//! attributes, enable optional extensions, query capability limits and build the
//! [`Bridge`]. When no context can be acquired the surface shows a static diagnostic
//! and no bridge exists.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::device::RasterDevice;
use crate::error::{BridgeError, BridgeResult};

/// Attributes requested when the rendering context is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAttributes {
    #[serde(default = "default_true")]
    pub alpha: bool,
    #[serde(default = "default_true")]
    pub depth: bool,
    #[serde(default = "default_true")]
    pub stencil: bool,
    #[serde(default = "default_true")]
    pub antialias: bool,
    #[serde(default)]
    pub premultiplied_alpha: bool,
    #[serde(default)]
    pub preserve_drawing_buffer: bool,
    #[serde(default = "default_true")]
    pub prefer_low_power: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            alpha: true,
            depth: true,
            stencil: true,
            antialias: true,
            premultiplied_alpha: false,
            preserve_drawing_buffer: false,
            prefer_low_power: true,
        }
    }
}

/// Surface size in CSS units plus the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
    pub dpi_factor: f32,
}

impl SurfaceSize {
    pub fn new(width: f32, height: f32, dpi_factor: f32) -> Self {
        Self {
            width,
            height,
            dpi_factor,
        }
    }

    /// Drawing-buffer size in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width * self.dpi_factor).round().max(0.0) as u32,
            (self.height * self.dpi_factor).round().max(0.0) as u32,
        )
    }
}

/// The windowing collaborator that owns the rendering surface.
pub trait SurfaceHost {
    type Device: RasterDevice;

    /// Create a rendering context on the surface. `None` when the platform has none.
    fn acquire_context(&mut self, attributes: &ContextAttributes) -> Option<Self::Device>;

    fn surface_size(&self) -> SurfaceSize;

    /// Replace the surface with a static message.
    fn show_diagnostic(&mut self, message: &str);
}

/// Extensions requested best-effort after the context is created.
pub const OPTIONAL_EXTENSIONS: &[&str] = &[
    "ANGLE_instanced_arrays",
    "OES_vertex_array_object",
    "OES_standard_derivatives",
    "OES_element_index_uint",
    "WEBGL_draw_buffers",
    "WEBGL_depth_texture",
];

/// Shown on the surface when no rendering context is available.
pub const CONTEXT_UNAVAILABLE_MESSAGE: &str = "This application needs hardware-accelerated \
graphics to run, but no rendering context could be created. Update your browser or graphics \
drivers, or enable GPU acceleration, then reload.";

/// What the acquired context supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Smaller of the vertex and fragment uniform-vector limits
    pub max_uniform_vectors: u32,
    pub max_texture_units: u32,
    pub max_vertex_attribs: u32,
    pub vendor: Option<String>,
    pub renderer: Option<String>,
    /// Optional extensions that were enabled
    pub extensions: Vec<String>,
}

impl DeviceCapabilities {
    /// Enable [`OPTIONAL_EXTENSIONS`] and query limits.
    pub fn probe<D: RasterDevice + ?Sized>(device: &mut D) -> Self {
        let extensions = OPTIONAL_EXTENSIONS
            .iter()
            .filter(|name| device.enable_extension(name))
            .map(|name| name.to_string())
            .collect();
        let limits = device.limits();
        let info = device.renderer_info();
        Self {
            max_uniform_vectors: limits
                .max_vertex_uniform_vectors
                .min(limits.max_fragment_uniform_vectors),
            max_texture_units: limits.max_texture_image_units,
            max_vertex_attribs: limits.max_vertex_attribs,
            vendor: info.as_ref().map(|i| i.vendor.clone()),
            renderer: info.map(|i| i.renderer),
            extensions,
        }
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e == name)
    }
}

/// Acquire the context and build a bridge around it.
///
/// On failure the host is told to show [`CONTEXT_UNAVAILABLE_MESSAGE`]; the error is
/// terminal for the subsystem.
pub fn bootstrap<H: SurfaceHost>(
    host: &mut H,
    config: &BridgeConfig,
) -> BridgeResult<Bridge<H::Device>> {
    let Some(mut device) = host.acquire_context(&config.context) else {
        warn!("No rendering context available; showing diagnostic");
        host.show_diagnostic(CONTEXT_UNAVAILABLE_MESSAGE);
        return Err(BridgeError::ContextUnavailable(
            "no rendering context could be acquired".to_string(),
        ));
    };

    let capabilities = DeviceCapabilities::probe(&mut device);
    for name in OPTIONAL_EXTENSIONS {
        if !capabilities.has_extension(name) {
            warn!("Optional extension {} unavailable", name);
        }
    }
    info!(
        "Rendering context ready: {} / {} ({} uniform vectors, {} texture units)",
        capabilities.vendor.as_deref().unwrap_or("unknown"),
        capabilities.renderer.as_deref().unwrap_or("unknown"),
        capabilities.max_uniform_vectors,
        capabilities.max_texture_units
    );

    Ok(Bridge::new(
        device,
        capabilities,
        host.surface_size(),
        config.shaders.options(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceLimits, HeadlessDevice};

    struct TestHost {
        device: Option<HeadlessDevice>,
        requested: Option<ContextAttributes>,
        diagnostic: Option<String>,
    }

    impl TestHost {
        fn with(device: Option<HeadlessDevice>) -> Self {
            Self {
                device,
                requested: None,
                diagnostic: None,
            }
        }
    }

    impl SurfaceHost for TestHost {
        type Device = HeadlessDevice;

        fn acquire_context(&mut self, attributes: &ContextAttributes) -> Option<HeadlessDevice> {
            self.requested = Some(*attributes);
            self.device.take()
        }

        fn surface_size(&self) -> SurfaceSize {
            SurfaceSize::new(400.0, 300.0, 2.0)
        }

        fn show_diagnostic(&mut self, message: &str) {
            self.diagnostic = Some(message.to_string());
        }
    }

    #[test]
    fn capabilities_take_smaller_uniform_limit() {
        let mut device = HeadlessDevice::with_limits(DeviceLimits {
            max_vertex_uniform_vectors: 128,
            max_fragment_uniform_vectors: 64,
            max_texture_image_units: 8,
            max_vertex_attribs: 16,
        });
        let caps = DeviceCapabilities::probe(&mut device);
        assert_eq!(caps.max_uniform_vectors, 64);
        assert_eq!(caps.max_texture_units, 8);
        assert_eq!(caps.max_vertex_attribs, 16);
        assert_eq!(caps.vendor.as_deref(), Some("rasterlink"));
        assert_eq!(caps.extensions.len(), OPTIONAL_EXTENSIONS.len());
    }

    #[test]
    fn missing_extensions_and_renderer_info_are_tolerated() {
        let mut device = HeadlessDevice::new()
            .with_extensions(&["OES_standard_derivatives"])
            .without_renderer_info();
        let caps = DeviceCapabilities::probe(&mut device);
        assert_eq!(caps.extensions, vec!["OES_standard_derivatives".to_string()]);
        assert!(caps.vendor.is_none());
        assert_eq!(device.enabled_extensions(), &caps.extensions[..]);
    }

    #[test]
    fn bootstrap_builds_bridge() {
        let mut host = TestHost::with(Some(HeadlessDevice::new()));
        let mut config = BridgeConfig::default();
        config.context.antialias = false;

        let bridge = bootstrap(&mut host, &config).unwrap();
        assert_eq!(host.requested.map(|a| a.antialias), Some(false));
        assert_eq!(bridge.surface_size().pixel_size(), (800, 600));
        assert!(host.diagnostic.is_none());
    }

    #[test]
    fn no_context_shows_diagnostic() {
        let mut host = TestHost::with(None);
        let err = bootstrap(&mut host, &BridgeConfig::default()).unwrap_err();
        assert!(matches!(err, BridgeError::ContextUnavailable(_)));
        assert!(!err.is_contract_violation());
        assert_eq!(host.diagnostic.as_deref(), Some(CONTEXT_UNAVAILABLE_MESSAGE));
    }

    #[test]
    fn pixel_size_rounds() {
        assert_eq!(SurfaceSize::new(100.5, 10.0, 1.5).pixel_size(), (151, 15));
    }
}
