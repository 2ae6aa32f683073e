//! Fonts rendered into glyph atlases

use std::collections::BTreeMap;

use crate::render::device::{Device, GpuHandle, ResourceDesc, ResourceKind};
use crate::render::error::{DeviceError, DeviceResult};

use super::ResettableResource;

/// Characters rasterized for every font
const DEFAULT_GLYPHS: std::ops::RangeInclusive<char> = ' '..='~';

/// Description of one font
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    /// Font file
    pub file: String,
    /// Glyph height in pixels
    pub height: f32,
    /// Characters in the atlas
    pub glyphs: Vec<char>,
}

impl FontSpec {
    /// Font covering printable ASCII
    pub fn ascii(file: impl Into<String>, height: f32) -> Self {
        Self {
            file: file.into(),
            height,
            glyphs: DEFAULT_GLYPHS.collect(),
        }
    }

    /// Bytes of a square single-channel atlas holding every glyph
    ///
    /// `None` when the height is not a positive finite number or the atlas
    /// would not fit in memory.
    pub fn atlas_bytes(&self) -> Option<usize> {
        if !self.height.is_finite() || self.height <= 0.0 {
            return None;
        }
        let cell = self.height.ceil() as usize;
        let per_row = (self.glyphs.len() as f64).sqrt().ceil() as usize;
        let side = per_row.max(1).checked_mul(cell)?;
        side.checked_mul(side)
    }
}

#[derive(Debug, Clone)]
struct FontEntry {
    spec: FontSpec,
    atlas: Option<GpuHandle>,
}

/// Font cache keyed by name
#[derive(Debug, Clone, Default)]
pub struct FontCache {
    fonts: BTreeMap<String, FontEntry>,
}

impl FontCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a font and build its atlas
    pub fn insert(&mut self, device: &mut dyn Device, name: &str, spec: FontSpec) -> DeviceResult<GpuHandle> {
        let mut entry = FontEntry { spec, atlas: None };
        let handle = Self::build_atlas(device, name, &mut entry)?;
        if let Some(old) = self.fonts.insert(name.to_string(), entry).and_then(|entry| entry.atlas) {
            device.destroy_resource(old);
        }
        Ok(handle)
    }

    /// Atlas handle of a font
    pub fn atlas(&self, name: &str) -> Option<GpuHandle> {
        self.fonts.get(name).and_then(|entry| entry.atlas)
    }

    /// Description of a cached font
    pub fn spec(&self, name: &str) -> Option<&FontSpec> {
        self.fonts.get(name).map(|entry| &entry.spec)
    }

    /// Number of cached fonts
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    fn build_atlas(device: &mut dyn Device, name: &str, entry: &mut FontEntry) -> DeviceResult<GpuHandle> {
        let bytes = entry.spec.atlas_bytes().ok_or_else(|| {
            DeviceError::Allocation(format!("font '{}' has an unusable height {}", name, entry.spec.height))
        })?;
        let desc = ResourceDesc::new(ResourceKind::Font, name, bytes);
        let handle = device.create_resource(desc)?;
        entry.atlas = Some(handle);
        Ok(handle)
    }
}

impl ResettableResource for FontCache {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Font
    }

    fn lose_resources(&mut self, device: &mut dyn Device) {
        for entry in self.fonts.values_mut() {
            if let Some(handle) = entry.atlas.take() {
                device.destroy_resource(handle);
            }
        }
    }

    fn reload_resources(&mut self, device: &mut dyn Device) -> DeviceResult<()> {
        for (name, entry) in self.fonts.iter_mut() {
            Self::build_atlas(device, name, entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::null::NullDevice;

    #[test]
    fn test_ascii_atlas_size() {
        let spec = FontSpec::ascii("fonts/sans.ttf", 16.0);
        assert_eq!(spec.glyphs.len(), 95);
        // 95 glyphs fit a 10x10 grid of 16px cells
        assert_eq!(spec.atlas_bytes(), Some(160 * 160));
    }

    #[test]
    fn test_unusable_heights_are_rejected() {
        let mut device = NullDevice::new();
        let mut cache = FontCache::new();
        for height in [0.0, -4.0, f32::NAN, f32::INFINITY, f32::MAX] {
            let spec = FontSpec::ascii("fonts/sans.ttf", height);
            assert_eq!(spec.atlas_bytes(), None, "height {}", height);
            let err = cache.insert(&mut device, "broken", spec).unwrap_err();
            assert!(matches!(err, DeviceError::Allocation(_)));
        }
        assert!(cache.is_empty());
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn test_lose_and_reload() {
        let mut device = NullDevice::new();
        let mut cache = FontCache::new();
        cache.insert(&mut device, "title", FontSpec::ascii("fonts/sans.ttf", 32.0)).unwrap();

        cache.lose_resources(&mut device);
        assert_eq!(cache.atlas("title"), None);

        cache.reload_resources(&mut device).unwrap();
        let atlas = cache.atlas("title").unwrap();
        assert!(device.owns(atlas));
        assert_eq!(cache.spec("title").map(|s| s.height), Some(32.0));
    }
}
