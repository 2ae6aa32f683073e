//! Window chrome: title, task bar message and icon
//!
//! The chrome outlives any single device. The lifecycle controller keeps a
//! [`WindowChrome`] and pushes it to each device it constructs.

use std::path::{Path, PathBuf};

use crate::render::error::DeviceError;

/// Title and task bar message used until the application sets its own
pub const DEFAULT_TITLE: &str = "Zenilib Application";

/// Icon loaded at first initialization unless the application picks another
pub const DEFAULT_ICON: &str = "icons/icon.png";

/// Decoded window icon in RGBA8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowIcon {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row-major RGBA8 pixels
    pub rgba: Vec<u8>,
    /// File the icon was read from
    pub path: PathBuf,
}

impl WindowIcon {
    /// Decode an icon file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| DeviceError::IconLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("Loaded window icon {}x{} from '{}'", width, height, path.display());

        Ok(Self {
            width,
            height,
            rgba: rgba.into_raw(),
            path: path.to_path_buf(),
        })
    }

    /// Pixels packed one `u32` per pixel with red in the low byte
    pub fn packed_pixels(&self) -> Vec<u32> {
        self.rgba
            .chunks_exact(4)
            .map(|px| u32::from_le_bytes([px[0], px[1], px[2], px[3]]))
            .collect()
    }
}

/// Title, task bar message and icon path of the application window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowChrome {
    /// Window title
    pub title: String,
    /// Task bar message, shown when the window is minimized
    pub taskmsg: String,
    /// Icon file
    pub icon: PathBuf,
}

impl Default for WindowChrome {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            taskmsg: DEFAULT_TITLE.to_string(),
            icon: PathBuf::from(DEFAULT_ICON),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_defaults() {
        let chrome = WindowChrome::default();
        assert_eq!(chrome.title, "Zenilib Application");
        assert_eq!(chrome.taskmsg, "Zenilib Application");
        assert_eq!(chrome.icon, PathBuf::from("icons/icon.png"));
    }

    #[test]
    fn test_load_png_icon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon.png");
        image::RgbaImage::from_pixel(2, 3, image::Rgba([0x11, 0x22, 0x33, 0xff]))
            .save(&path)
            .unwrap();

        let icon = WindowIcon::load(&path).unwrap();
        assert_eq!((icon.width, icon.height), (2, 3));
        assert_eq!(icon.rgba.len(), 2 * 3 * 4);
        assert_eq!(icon.packed_pixels()[0], 0xff33_2211);
    }

    #[test]
    fn test_missing_icon_reports_path() {
        let err = WindowIcon::load("does/not/exist.png").unwrap_err();
        match err {
            DeviceError::IconLoad { path, .. } => assert_eq!(path, PathBuf::from("does/not/exist.png")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
