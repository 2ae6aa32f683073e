//! Vertex buffer with a CPU-side copy of its data

use crate::foundation::math::Vec3;
use crate::render::device::{Device, GpuHandle, ResourceDesc, ResourceKind};
use crate::render::error::DeviceResult;

use super::ResettableResource;

/// Triangle vertices kept in memory so they can be uploaded again after a reset
#[derive(Debug, Clone)]
pub struct VertexBuffer {
    label: String,
    vertices: Vec<Vec3>,
    handle: Option<GpuHandle>,
}

impl VertexBuffer {
    /// Buffer holding `vertices`, not yet uploaded
    pub fn new(label: impl Into<String>, vertices: Vec<Vec3>) -> Self {
        Self {
            label: label.into(),
            vertices,
            handle: None,
        }
    }

    /// Upload the vertices, replacing any earlier upload on the same device
    pub fn upload(&mut self, device: &mut dyn Device) -> DeviceResult<GpuHandle> {
        if let Some(old) = self.handle.take() {
            device.destroy_resource(old);
        }
        let desc = ResourceDesc::new(ResourceKind::VertexBuffer, self.label.clone(), self.byte_len());
        let handle = device.create_resource(desc)?;
        self.handle = Some(handle);
        Ok(handle)
    }

    /// Handle of the current upload
    pub fn handle(&self) -> Option<GpuHandle> {
        self.handle
    }

    /// Whether the vertices live on the GPU
    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    /// The CPU-side vertices
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Size of the uploaded data in bytes
    pub fn byte_len(&self) -> usize {
        self.vertices.len() * std::mem::size_of::<[f32; 3]>()
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl ResettableResource for VertexBuffer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::VertexBuffer
    }

    fn lose_resources(&mut self, device: &mut dyn Device) {
        if let Some(handle) = self.handle.take() {
            device.destroy_resource(handle);
        }
    }

    fn reload_resources(&mut self, device: &mut dyn Device) -> DeviceResult<()> {
        self.upload(device).map(|_| ())
    }
}
