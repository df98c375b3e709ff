//! Surface configuration and context descriptors
//!
//! Everything a caller hands to [`crate::RenderingContext`] at creation time
//! lives here: the serializable surface configuration, the present/reset
//! flags, the API dialect hint used by the import path, and the descriptors
//! bundling them with native handles.

#[cfg(not(target_arch = "wasm32"))]
use std::ffi::c_void;

use bitflags::bitflags;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use serde::{Deserialize, Serialize};

bitflags! {
    /// Present and resize behavior flags
    ///
    /// Passed to [`crate::RenderingContext::resize`]; the MSAA bits select the
    /// sample count of the backing renderbuffers on backends that composite
    /// through an intermediate framebuffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ResetFlags: u32 {
        /// Synchronize presentation with the display refresh
        const VSYNC = 1 << 0;
        /// 2x multisample anti-aliasing
        const MSAA_X2 = 1 << 1;
        /// 4x multisample anti-aliasing
        const MSAA_X4 = 1 << 2;
        /// 8x multisample anti-aliasing
        const MSAA_X8 = 1 << 3;
        /// 16x multisample anti-aliasing
        const MSAA_X16 = 1 << 4;
        /// Request an sRGB-capable backbuffer
        const SRGB_BACKBUFFER = 1 << 5;
    }
}

impl ResetFlags {
    /// Flags for the given MSAA sample count (1 or 0 means no MSAA)
    #[must_use]
    pub fn from_msaa_samples(samples: u32) -> Self {
        match samples {
            s if s >= 16 => Self::MSAA_X16,
            s if s >= 8 => Self::MSAA_X8,
            s if s >= 4 => Self::MSAA_X4,
            s if s >= 2 => Self::MSAA_X2,
            _ => Self::empty(),
        }
    }

    /// MSAA sample count selected by these flags (1 when MSAA is off)
    #[must_use]
    pub fn msaa_samples(self) -> u32 {
        if self.contains(Self::MSAA_X16) {
            16
        } else if self.contains(Self::MSAA_X8) {
            8
        } else if self.contains(Self::MSAA_X4) {
            4
        } else if self.contains(Self::MSAA_X2) {
            2
        } else {
            1
        }
    }
}

/// Surface configuration for context creation
///
/// Loadable from TOML or RON through [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Initial backbuffer width in pixels
    pub width: u32,
    /// Initial backbuffer height in pixels
    pub height: u32,
    /// Synchronize presentation with the display refresh
    pub vsync: bool,
    /// MSAA sample count; 1 disables multisampling
    pub msaa: u32,
    /// Request an sRGB-capable backbuffer
    pub srgb: bool,
    /// Enable verbose driver diagnostics where the backend supports them
    pub debug: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            vsync: true,
            msaa: 1,
            srgb: false,
            debug: false,
        }
    }
}

impl SurfaceConfig {
    /// Reset flags equivalent to this configuration
    #[must_use]
    pub fn reset_flags(&self) -> ResetFlags {
        let mut flags = ResetFlags::from_msaa_samples(self.msaa);
        if self.vsync {
            flags |= ResetFlags::VSYNC;
        }
        if self.srgb {
            flags |= ResetFlags::SRGB_BACKBUFFER;
        }
        flags
    }
}

impl Config for SurfaceConfig {}

/// Which dialect of the GL family a context speaks
///
/// Recorded after creation; for the import path the hosting environment
/// supplies it as a hint since the context was negotiated elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiDialect {
    /// Desktop OpenGL at the given version
    OpenGl {
        /// Major version
        major: u8,
        /// Minor version
        minor: u8,
    },
    /// OpenGL ES at the given version
    OpenGlEs {
        /// Major version
        major: u8,
        /// Minor version
        minor: u8,
    },
    /// WebGL 2 in a browser host
    WebGl2,
}

impl ApiDialect {
    /// True for the embedded dialects (GLES, WebGL)
    #[must_use]
    pub fn is_embedded(self) -> bool {
        !matches!(self, Self::OpenGl { .. })
    }
}

/// Whether the native context handle is released on destroy
///
/// Imported contexts are tagged [`Borrowed`](Self::Borrowed) so teardown can
/// never release a handle this layer does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOwnership {
    /// Created by this layer; released on destroy
    Owned,
    /// Adopted from the hosting environment; never released here
    Borrowed,
}

/// Full description of the context to create
#[derive(Debug, Clone)]
pub struct ContextDescriptor {
    /// Surface configuration
    pub config: SurfaceConfig,
    /// Native handle of the main window, if any
    pub window: Option<RawWindowHandle>,
    /// Native display/connection handle, if any
    pub display: Option<RawDisplayHandle>,
}

impl ContextDescriptor {
    /// Descriptor for a context presenting to the given native window
    #[must_use]
    pub fn windowed(config: SurfaceConfig, window: RawWindowHandle, display: RawDisplayHandle) -> Self {
        Self {
            config,
            window: Some(window),
            display: Some(display),
        }
    }

    /// Descriptor for a context without a main window
    ///
    /// Backends fall back to an offscreen surface (pbuffer) where the
    /// platform supports one.
    #[must_use]
    pub fn windowless(config: SurfaceConfig) -> Self {
        Self {
            config,
            window: None,
            display: None,
        }
    }
}

/// An externally created context/surface pair to adopt
///
/// Used when the hosting environment owns context creation (e.g. a browser
/// embedder). The adopted handles are never released by this layer.
#[derive(Debug, Clone)]
pub struct ImportDescriptor {
    /// The foreign native context handle
    #[cfg(not(target_arch = "wasm32"))]
    pub context: *mut c_void,
    /// The foreign native display/device handle
    #[cfg(not(target_arch = "wasm32"))]
    pub display: *mut c_void,
    /// The foreign native surface/drawable handle
    #[cfg(not(target_arch = "wasm32"))]
    pub surface: *mut c_void,
    /// The already-constructed WebGL 2 context
    #[cfg(target_arch = "wasm32")]
    pub webgl: web_sys::WebGl2RenderingContext,
    /// Which API dialect the foreign context speaks
    pub dialect: ApiDialect,
    /// Current surface width in pixels
    pub width: u32,
    /// Current surface height in pixels
    pub height: u32,
}

/// Configuration load/save support
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a TOML or RON file
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to a TOML or RON file
    ///
    /// # Errors
    /// Returns [`ConfigError`] when serialization or the write fails.
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = SurfaceConfig::default();
        assert!(config.width > 0 && config.height > 0);
        assert_eq!(config.msaa, 1);
        assert!(config.vsync);
    }

    #[test]
    fn config_parses_from_toml() {
        let config: SurfaceConfig =
            toml::from_str("width = 1920\nheight = 1080\nmsaa = 4\nvsync = false\n").unwrap();
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.msaa, 4);
        assert!(!config.vsync);
        // Unlisted fields fall back to defaults
        assert!(!config.srgb);
    }

    #[test]
    fn reset_flags_round_trip_msaa_samples() {
        assert_eq!(ResetFlags::from_msaa_samples(1), ResetFlags::empty());
        assert_eq!(ResetFlags::from_msaa_samples(4).msaa_samples(), 4);
        assert_eq!(ResetFlags::from_msaa_samples(16).msaa_samples(), 16);
        // Non-power-of-two counts settle on the next lower supported level
        assert_eq!(ResetFlags::from_msaa_samples(6).msaa_samples(), 4);
    }

    #[test]
    fn config_reset_flags_reflect_settings() {
        let config = SurfaceConfig {
            vsync: true,
            msaa: 8,
            srgb: true,
            ..SurfaceConfig::default()
        };
        let flags = config.reset_flags();
        assert!(flags.contains(ResetFlags::VSYNC));
        assert!(flags.contains(ResetFlags::MSAA_X8));
        assert!(flags.contains(ResetFlags::SRGB_BACKBUFFER));
    }

    #[test]
    fn dialects_report_embedded() {
        assert!(!ApiDialect::OpenGl { major: 3, minor: 3 }.is_embedded());
        assert!(ApiDialect::OpenGlEs { major: 2, minor: 0 }.is_embedded());
        assert!(ApiDialect::WebGl2.is_embedded());
    }
}
