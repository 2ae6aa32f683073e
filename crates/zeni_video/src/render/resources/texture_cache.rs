//! Named textures with CPU-side pixel data
//!
//! The cache keeps every image it was given in RGBA8 so that a device reset
//! only costs a re-upload. The byte size handed to the device accounts for
//! the mip chain when mipmapping is enabled in the texture settings.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::TextureSettings;
use crate::render::device::{Device, GpuHandle, ResourceDesc, ResourceKind};
use crate::render::error::{DeviceError, DeviceResult};

use super::ResettableResource;

#[derive(Debug, Clone)]
struct TextureEntry {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    handle: Option<GpuHandle>,
}

/// Texture cache keyed by name
#[derive(Debug, Clone, Default)]
pub struct TextureCache {
    settings: TextureSettings,
    textures: BTreeMap<String, TextureEntry>,
}

impl TextureCache {
    /// Empty cache using `settings` for uploads
    pub fn new(settings: TextureSettings) -> Self {
        Self {
            settings,
            textures: BTreeMap::new(),
        }
    }

    /// Filtering settings applied to uploads
    pub fn settings(&self) -> &TextureSettings {
        &self.settings
    }

    /// Add or replace a texture from raw RGBA8 pixels and upload it
    pub fn insert(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    ) -> DeviceResult<GpuHandle> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(DeviceError::Allocation(format!(
                "texture '{}' has {} bytes, expected {}",
                name,
                rgba.len(),
                expected
            )));
        }

        let mut entry = TextureEntry {
            width,
            height,
            rgba,
            handle: None,
        };
        // The previous texture stays cached until its replacement is on the device
        let handle = Self::upload(&self.settings, device, name, &mut entry)?;
        if let Some(old) = self.textures.insert(name.to_string(), entry).and_then(|entry| entry.handle) {
            device.destroy_resource(old);
        }
        Ok(handle)
    }

    /// Decode an image file and add it under `name`
    pub fn load_file(&mut self, device: &mut dyn Device, name: &str, path: impl AsRef<Path>) -> DeviceResult<GpuHandle> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| DeviceError::Allocation(format!("could not load '{}': {}", path.display(), e)))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        log::debug!("Loaded texture '{}' {}x{} from '{}'", name, width, height, path.display());
        self.insert(device, name, width, height, image.into_raw())
    }

    /// Handle of a loaded texture
    pub fn get(&self, name: &str) -> Option<GpuHandle> {
        self.textures.get(name).and_then(|entry| entry.handle)
    }

    /// Size of a cached texture
    pub fn dimensions(&self, name: &str) -> Option<(u32, u32)> {
        self.textures.get(name).map(|entry| (entry.width, entry.height))
    }

    /// Remove a texture and release its handle
    pub fn remove(&mut self, device: &mut dyn Device, name: &str) -> bool {
        match self.textures.remove(name) {
            Some(entry) => {
                if let Some(handle) = entry.handle {
                    device.destroy_resource(handle);
                }
                true
            }
            None => false,
        }
    }

    /// Number of cached textures
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    fn upload(
        settings: &TextureSettings,
        device: &mut dyn Device,
        name: &str,
        entry: &mut TextureEntry,
    ) -> DeviceResult<GpuHandle> {
        let base = entry.rgba.len();
        // A full mip chain adds a third of the base level
        let byte_len = if settings.mipmapping { base + base / 3 } else { base };
        let handle = device.create_resource(ResourceDesc::new(ResourceKind::Texture, name, byte_len))?;
        entry.handle = Some(handle);
        Ok(handle)
    }
}

impl ResettableResource for TextureCache {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    fn lose_resources(&mut self, device: &mut dyn Device) {
        for entry in self.textures.values_mut() {
            if let Some(handle) = entry.handle.take() {
                device.destroy_resource(handle);
            }
        }
    }

    fn reload_resources(&mut self, device: &mut dyn Device) -> DeviceResult<()> {
        for (name, entry) in self.textures.iter_mut() {
            Self::upload(&self.settings, device, name, entry)?;
        }
        Ok(())
    }
}
