//! Configuration management (config.toml)
//!
//! Context attributes requested at bootstrap, shader source handling and the default
//! log filter. Stored as TOML in the platform-specific config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bootstrap::ContextAttributes;
use crate::shader::ShaderOptions;

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    /// Rendering context attributes
    #[serde(default)]
    pub context: ContextAttributes,
    /// Shader source handling
    #[serde(default)]
    pub shaders: ShaderConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Prepend the precision/`sample2d` prelude to guest sources (default: false)
    #[serde(default)]
    pub prepend_prelude: bool,
    /// Log line-numbered sources with compile/link errors (default: true)
    #[serde(default = "default_true")]
    pub log_sources_on_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset (default: "info")
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_true() -> bool {
    true
}
fn default_filter() -> String {
    "info".to_string()
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            prepend_prelude: false,
            log_sources_on_error: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl ShaderConfig {
    pub fn options(&self) -> ShaderOptions {
        ShaderOptions {
            prepend_prelude: self.prepend_prelude,
            log_sources_on_error: self.log_sources_on_error,
        }
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Linux: `~/.config/rasterlink`. Returns `None` if the home directory cannot be
/// determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.rasterlink", "", "rasterlink")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads `config.toml` from the platform config directory.
///
/// Returns defaults if the file doesn't exist or cannot be parsed.
pub fn load() -> BridgeConfig {
    config_dir()
        .map(|dir| load_from(&dir.join("config.toml")))
        .unwrap_or_default()
}

/// Loads a configuration file, falling back to defaults on any error.
pub fn load_from(path: &Path) -> BridgeConfig {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
                None
            }
        })
        .unwrap_or_default()
}

/// Writes the configuration as pretty TOML, creating parent directories.
pub fn save_to(config: &BridgeConfig, path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let content = toml::to_string_pretty(config).map_err(std::io::Error::other)?;
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = BridgeConfig::default();
        assert!(config.context.alpha);
        assert!(config.context.depth);
        assert!(!config.context.premultiplied_alpha);
        assert!(!config.shaders.prepend_prelude);
        assert!(config.shaders.log_sources_on_error);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_config_deserialize_partial_context() {
        let toml_str = r#"
[context]
antialias = false
"#;
        let config: BridgeConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.context.antialias);
        assert!(config.context.alpha); // default
        assert!(config.context.stencil); // default
    }

    #[test]
    fn test_shader_options() {
        let toml_str = r#"
[shaders]
prepend_prelude = true
log_sources_on_error = false
"#;
        let config: BridgeConfig = toml::from_str(toml_str).unwrap();
        let options = config.shaders.options();
        assert!(options.prepend_prelude);
        assert!(!options.log_sources_on_error);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = BridgeConfig::default();
        config.context.preserve_drawing_buffer = true;
        config.logging.filter = "rasterlink_core=debug".to_string();

        save_to(&config, &path).unwrap();
        assert_eq!(load_from(&path), config);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[context\nalpha = ").unwrap();
        assert_eq!(load_from(&path), BridgeConfig::default());
        assert_eq!(load_from(&dir.path().join("missing.toml")), BridgeConfig::default());
    }
}
