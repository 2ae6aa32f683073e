//! Persisted video configuration schema
//!
//! Mirrors the `Zenilib/Textures/*` and `Zenilib/Video/*` keys of the
//! application's configuration file. Missing keys fall back to the
//! conservative defaults, so a partially written file still loads.

use serde::{Deserialize, Serialize};

use super::Config;
use crate::render::backends::BackendKind;

/// Root of the persisted configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// The `Zenilib` root element
    #[serde(rename = "Zenilib", default)]
    pub zenilib: ZenilibConfig,
}

/// Sections under the `Zenilib` root
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ZenilibConfig {
    /// `Zenilib/Textures`
    #[serde(rename = "Textures", default)]
    pub textures: TextureSettings,
    /// `Zenilib/Video`
    #[serde(rename = "Video", default)]
    pub video: VideoSettings,
}

/// `Zenilib/Textures`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSettings {
    /// Anisotropic filtering level, 0 disables it
    #[serde(rename = "Anisotropy")]
    pub anisotropy: i32,
    /// Bilinear texture filtering
    #[serde(rename = "Bilinear_Filtering")]
    pub bilinear_filtering: bool,
    /// Mipmap generation
    #[serde(rename = "Mipmapping")]
    pub mipmapping: bool,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            anisotropy: 0,
            bilinear_filtering: true,
            mipmapping: true,
        }
    }
}

/// `Zenilib/Video`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Backend family name, `"OpenGL"` or `"Vulkan"`
    #[serde(rename = "API")]
    pub api: String,
    /// Start in fullscreen mode
    #[serde(rename = "Full_Screen")]
    pub full_screen: bool,
    /// Multisampling level, 0 disables it
    #[serde(rename = "Multisampling")]
    pub multisampling: i32,
    /// Vertical synchronization
    #[serde(rename = "Vertical_Sync")]
    pub vertical_sync: bool,
    /// `Zenilib/Video/Resolution`
    #[serde(rename = "Resolution")]
    pub resolution: ResolutionSettings,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            api: BackendKind::first_compiled().config_name().to_string(),
            full_screen: false,
            multisampling: 0,
            vertical_sync: false,
            resolution: ResolutionSettings::default(),
        }
    }
}

/// `Zenilib/Video/Resolution`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionSettings {
    /// Width in pixels
    #[serde(rename = "Width")]
    pub width: i32,
    /// Height in pixels
    #[serde(rename = "Height")]
    pub height: i32,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self { width: 800, height: 600 }
    }
}

impl VideoConfig {
    /// The conservative configuration written when no backup can be restored
    ///
    /// Anisotropy 0, bilinear filtering and mipmapping on, the first
    /// compiled-in backend, windowed, no multisampling, 800x600, no vsync.
    pub fn conservative() -> Self {
        Self {
            zenilib: ZenilibConfig::default(),
        }
    }

    /// Backend family named by `Zenilib/Video/API`, if it names one
    pub fn backend(&self) -> Option<BackendKind> {
        BackendKind::from_config_name(&self.zenilib.video.api)
    }

    /// Requested resolution, if both dimensions are positive
    pub fn resolution(&self) -> Option<(u32, u32)> {
        let ResolutionSettings { width, height } = self.zenilib.video.resolution;
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self::conservative()
    }
}

impl Config for VideoConfig {}
