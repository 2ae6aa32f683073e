//! Null device
//!
//! Satisfies the [`Device`] contract without touching any driver. The
//! lifecycle controller hands it out through `device_or_null()` to
//! collaborators that must keep working while no real device exists.

use crate::render::backends::BackendKind;
use crate::render::device::{Device, DeviceProperties, GpuHandle, RenderState, ResourceDesc, ResourceTable};
use crate::render::error::DeviceResult;
use crate::render::window::WindowIcon;

/// Device that does nothing
#[derive(Debug)]
pub struct NullDevice {
    properties: DeviceProperties,
    state: RenderState,
    resources: ResourceTable,
}

impl NullDevice {
    /// Null devices always report generation 0, which no real device uses
    pub fn new() -> Self {
        Self {
            properties: DeviceProperties {
                backend: BackendKind::Null,
                generation: 0,
                screen_size: (0, 0),
                full_screen: false,
                multisampling: 0,
                vertical_sync: false,
                opengl_context: false,
            },
            state: RenderState::default(),
            resources: ResourceTable::new(0),
        }
    }
}

impl Default for NullDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for NullDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn render_state(&self) -> &RenderState {
        &self.state
    }

    fn render_state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }

    fn present(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    fn set_caption(&mut self, _title: &str, _taskmsg: &str) -> DeviceResult<()> {
        Ok(())
    }

    fn set_icon(&mut self, _icon: &WindowIcon) -> DeviceResult<()> {
        Ok(())
    }

    fn create_resource(&mut self, desc: ResourceDesc) -> DeviceResult<GpuHandle> {
        log::trace!("Null device ignoring allocation of '{}'", desc.label);
        Ok(self.resources.insert(desc))
    }

    fn destroy_resource(&mut self, handle: GpuHandle) -> bool {
        self.resources.remove(handle).is_some()
    }

    fn resources(&self) -> &ResourceTable {
        &self.resources
    }
}
