//! Headless virtual-display backend
//!
//! Emulates a display of fixed size so the whole lifecycle can run without a
//! GPU or a window system. The granted size follows the same rules a real
//! window system applies: fullscreen takes the display size, a missing
//! request takes the display size, and a request larger than the display is
//! clamped to it.

use std::path::{Path, PathBuf};

use crate::foundation::math::Color;
use crate::render::backends::{BackendKind, DeviceParams};
use crate::render::device::{Device, DeviceProperties, GpuHandle, RenderState, ResourceDesc, ResourceTable};
use crate::render::error::{DeviceError, DeviceResult};
use crate::render::window::WindowIcon;

/// A display the headless backend pretends to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualDisplay {
    /// Display size in pixels
    pub size: (u32, u32),
    /// Whether a window manager is running; without one captions fail
    pub window_manager: bool,
    /// Highest multisampling level the display supports
    pub max_multisampling: u32,
}

impl VirtualDisplay {
    /// Display of `width` x `height` with a window manager
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            window_manager: true,
            max_multisampling: 16,
        }
    }

    /// Toggle window manager support
    pub fn with_window_manager(mut self, available: bool) -> Self {
        self.window_manager = available;
        self
    }

    /// Size a device built with `params` would be granted
    pub fn grant(&self, params: &DeviceParams) -> (u32, u32) {
        if params.full_screen() {
            return self.size;
        }
        match params.resolution {
            Some((w, h)) if w > 0 && h > 0 => (w.min(self.size.0), h.min(self.size.1)),
            _ => self.size,
        }
    }
}

impl Default for VirtualDisplay {
    fn default() -> Self {
        Self::new(1024, 768)
    }
}

/// Factory building headless devices of family `kind` on `display`
pub fn factory(kind: BackendKind, display: VirtualDisplay) -> impl Fn(&DeviceParams) -> DeviceResult<Box<dyn Device>> {
    move |params| HeadlessDevice::new(kind, display, params).map(|d| Box::new(d) as Box<dyn Device>)
}

/// Device on a [`VirtualDisplay`]
#[derive(Debug)]
pub struct HeadlessDevice {
    display: VirtualDisplay,
    properties: DeviceProperties,
    state: RenderState,
    resources: ResourceTable,
    framed: bool,
    caption: Option<(String, String)>,
    icon: Option<PathBuf>,
    frames_presented: u64,
    last_clear: Option<Color>,
}

impl HeadlessDevice {
    /// Build a device of family `kind`
    pub fn new(kind: BackendKind, display: VirtualDisplay, params: &DeviceParams) -> DeviceResult<Self> {
        if display.size.0 == 0 || display.size.1 == 0 {
            return Err(DeviceError::construction(kind, "virtual display has no area"));
        }

        let screen_size = display.grant(params);
        let multisampling = params.multisampling.clamp(1, display.max_multisampling.max(1));
        log::info!(
            "Headless {} device {}x{} (generation {})",
            kind,
            screen_size.0,
            screen_size.1,
            params.generation
        );

        let mut device = Self {
            display,
            properties: DeviceProperties {
                backend: kind,
                generation: params.generation,
                screen_size,
                full_screen: params.full_screen(),
                multisampling,
                vertical_sync: params.vertical_sync(),
                opengl_context: kind == BackendKind::OpenGl,
            },
            state: RenderState::default(),
            resources: ResourceTable::new(params.generation),
            framed: params.show_frame() && !params.full_screen(),
            caption: None,
            icon: None,
            frames_presented: 0,
            last_clear: None,
        };

        if let Err(e) = device.set_caption(&params.title, &params.taskmsg) {
            log::debug!("Initial caption skipped: {}", e);
        }
        Ok(device)
    }

    /// Display the device runs on
    pub fn display(&self) -> &VirtualDisplay {
        &self.display
    }

    /// Current `(title, taskmsg)`, if the window manager accepted one
    pub fn caption(&self) -> Option<(&str, &str)> {
        self.caption.as_ref().map(|(t, m)| (t.as_str(), m.as_str()))
    }

    /// File of the icon currently applied
    pub fn icon_path(&self) -> Option<&Path> {
        self.icon.as_deref()
    }

    /// Whether the window has decorations
    pub fn is_framed(&self) -> bool {
        self.framed
    }

    /// Frames presented so far
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Color the last presented frame was cleared to
    pub fn last_clear(&self) -> Option<Color> {
        self.last_clear
    }
}

impl Device for HeadlessDevice {
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
        self.last_clear = Some(self.state.clear_color);
        self.frames_presented += 1;
        Ok(())
    }

    fn set_caption(&mut self, title: &str, taskmsg: &str) -> DeviceResult<()> {
        if !self.display.window_manager {
            return Err(DeviceError::CaptionUnavailable);
        }
        self.caption = Some((title.to_string(), taskmsg.to_string()));
        Ok(())
    }

    fn set_icon(&mut self, icon: &WindowIcon) -> DeviceResult<()> {
        if !self.display.window_manager {
            return Err(DeviceError::IconLoad {
                path: icon.path.clone(),
                reason: "no window manager".to_string(),
            });
        }
        self.icon = Some(icon.path.clone());
        Ok(())
    }

    fn create_resource(&mut self, desc: ResourceDesc) -> DeviceResult<GpuHandle> {
        Ok(self.resources.insert(desc))
    }

    fn destroy_resource(&mut self, handle: GpuHandle) -> bool {
        self.resources.remove(handle).is_some()
    }

    fn resources(&self) -> &ResourceTable {
        &self.resources
    }
}

impl Drop for HeadlessDevice {
    fn drop(&mut self) {
        let leaked = self.resources.clear();
        if leaked > 0 {
            log::debug!(
                "Headless device generation {} released {} live resources",
                self.properties.generation,
                leaked
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::DisplayFlags;

    fn params(resolution: Option<(u32, u32)>, flags: DisplayFlags) -> DeviceParams {
        DeviceParams {
            resolution,
            flags,
            ..DeviceParams::default()
        }
    }

    #[test]
    fn test_grant_rules() {
        let display = VirtualDisplay::new(1024, 768);
        assert_eq!(display.grant(&params(Some((1024, 768)), DisplayFlags::SHOW_FRAME)), (1024, 768));
        assert_eq!(display.grant(&params(Some((640, 480)), DisplayFlags::SHOW_FRAME)), (640, 480));
        assert_eq!(display.grant(&params(Some((2048, 480)), DisplayFlags::SHOW_FRAME)), (1024, 480));
        assert_eq!(display.grant(&params(None, DisplayFlags::SHOW_FRAME)), (1024, 768));
        assert_eq!(display.grant(&params(Some((640, 480)), DisplayFlags::FULL_SCREEN)), (1024, 768));
        assert_eq!(display.grant(&params(Some((0, 480)), DisplayFlags::empty())), (1024, 768));
    }

    #[test]
    fn test_device_reports_granted_properties() {
        let flags = DisplayFlags::SHOW_FRAME | DisplayFlags::VERTICAL_SYNC;
        let mut p = params(Some((800, 600)), flags);
        p.multisampling = 64;
        p.generation = 3;

        let device = HeadlessDevice::new(BackendKind::OpenGl, VirtualDisplay::default(), &p).unwrap();
        assert_eq!(device.screen_size(), (800, 600));
        assert_eq!(device.generation(), 3);
        assert!(device.is_opengl());
        assert!(device.properties().vertical_sync);
        assert_eq!(device.properties().multisampling, 16);
        assert!(device.is_framed());
        assert_eq!(device.caption(), Some(("Zenilib Application", "Zenilib Application")));
    }

    #[test]
    fn test_zero_area_display_fails() {
        let display = VirtualDisplay::new(0, 0);
        let err = HeadlessDevice::new(BackendKind::Vulkan, display, &DeviceParams::default()).unwrap_err();
        assert!(matches!(err, DeviceError::Construction { backend: BackendKind::Vulkan, .. }));
    }

    #[test]
    fn test_caption_without_window_manager() {
        let display = VirtualDisplay::default().with_window_manager(false);
        let mut device = HeadlessDevice::new(BackendKind::Vulkan, display, &DeviceParams::default()).unwrap();
        assert_eq!(device.caption(), None);
        assert_eq!(device.set_caption("a", "b"), Err(DeviceError::CaptionUnavailable));
    }

    #[test]
    fn test_present_clears_to_clear_color() {
        let mut device = HeadlessDevice::new(BackendKind::Vulkan, VirtualDisplay::default(), &DeviceParams::default()).unwrap();
        device.set_clear_color(Color::rgb(0.0, 0.5, 1.0));
        device.present().unwrap();
        device.present().unwrap();
        assert_eq!(device.frames_presented(), 2);
        assert_eq!(device.last_clear(), Some(Color::rgb(0.0, 0.5, 1.0)));
    }
}
