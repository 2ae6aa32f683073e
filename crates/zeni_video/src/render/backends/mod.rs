//! Backend implementations and the capability table
//!
//! Two native families are known: OpenGL (cargo feature `opengl`) and Vulkan
//! (cargo feature `vulkan`). The headless virtual display and the null device
//! are always available. Which factories the negotiator may try is decided at
//! runtime by a [`BackendTable`].

use std::fmt;

use bitflags::bitflags;

use crate::render::device::Device;
use crate::render::error::DeviceResult;

pub mod headless;
pub mod null;

#[cfg(any(feature = "opengl", feature = "vulkan"))]
pub mod glfw_window;

/// OpenGL backend
#[cfg(feature = "opengl")]
pub mod opengl;

/// Vulkan backend
#[cfg(feature = "vulkan")]
pub mod vulkan;

/// Backend family of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// OpenGL context on a native window
    OpenGl,
    /// Vulkan surface on a native window
    Vulkan,
    /// No device work at all
    Null,
}

impl BackendKind {
    /// Order in which [`VideoMode::Any`] tries the native families
    pub const PRIORITY: [BackendKind; 2] = [BackendKind::OpenGl, BackendKind::Vulkan];

    /// Value written to `Zenilib/Video/API`
    pub fn config_name(self) -> &'static str {
        match self {
            Self::OpenGl => "OpenGL",
            Self::Vulkan => "Vulkan",
            Self::Null => "Null",
        }
    }

    /// Parse a `Zenilib/Video/API` value
    ///
    /// Matching ignores case. `"DX9"` from older configuration files selects
    /// the Vulkan family.
    pub fn from_config_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("opengl") {
            Some(Self::OpenGl)
        } else if name.eq_ignore_ascii_case("vulkan") || name.eq_ignore_ascii_case("dx9") {
            Some(Self::Vulkan)
        } else {
            None
        }
    }

    /// First native family compiled into this build, OpenGL when none is
    pub fn first_compiled() -> Self {
        if cfg!(feature = "opengl") {
            Self::OpenGl
        } else if cfg!(feature = "vulkan") {
            Self::Vulkan
        } else {
            Self::OpenGl
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

/// Preferred backend family requested before initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoMode {
    /// Any family, in [`BackendKind::PRIORITY`] order
    #[default]
    Any,
    /// OpenGL only
    OpenGl,
    /// Vulkan only
    Vulkan,
}

impl VideoMode {
    /// Families this mode may try, in order
    pub fn candidates(self) -> &'static [BackendKind] {
        match self {
            Self::Any => &BackendKind::PRIORITY,
            Self::OpenGl => &[BackendKind::OpenGl],
            Self::Vulkan => &[BackendKind::Vulkan],
        }
    }
}

impl From<BackendKind> for VideoMode {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::OpenGl => Self::OpenGl,
            BackendKind::Vulkan => Self::Vulkan,
            BackendKind::Null => Self::Any,
        }
    }
}

impl fmt::Display for VideoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::OpenGl => f.write_str("OpenGL"),
            Self::Vulkan => f.write_str("Vulkan"),
        }
    }
}

bitflags! {
    /// Window flags requested at construction
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DisplayFlags: u32 {
        /// Take over the whole display
        const FULL_SCREEN = 1 << 0;
        /// Decorated window with a title bar
        const SHOW_FRAME = 1 << 1;
        /// Wait for vertical sync when presenting
        const VERTICAL_SYNC = 1 << 2;
    }
}

impl Default for DisplayFlags {
    fn default() -> Self {
        Self::SHOW_FRAME
    }
}

/// Everything a backend factory needs to build a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParams {
    /// Generation assigned to the device being built
    pub generation: u32,
    /// Requested size, `None` for the display size
    pub resolution: Option<(u32, u32)>,
    /// Window flags
    pub flags: DisplayFlags,
    /// Requested multisampling level
    pub multisampling: u32,
    /// Initial window title
    pub title: String,
    /// Initial task bar message
    pub taskmsg: String,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self {
            generation: 1,
            resolution: None,
            flags: DisplayFlags::default(),
            multisampling: 1,
            title: crate::render::window::DEFAULT_TITLE.to_string(),
            taskmsg: crate::render::window::DEFAULT_TITLE.to_string(),
        }
    }
}

impl DeviceParams {
    /// Whether fullscreen was requested
    pub fn full_screen(&self) -> bool {
        self.flags.contains(DisplayFlags::FULL_SCREEN)
    }

    /// Whether vertical sync was requested
    pub fn vertical_sync(&self) -> bool {
        self.flags.contains(DisplayFlags::VERTICAL_SYNC)
    }

    /// Whether a decorated window was requested
    pub fn show_frame(&self) -> bool {
        self.flags.contains(DisplayFlags::SHOW_FRAME)
    }
}

/// Builds a device of one family, or reports why it could not
pub type BackendFactory = Box<dyn Fn(&DeviceParams) -> DeviceResult<Box<dyn Device>>>;

/// Runtime list of `(kind, factory)` pairs the negotiator may try
#[derive(Default)]
pub struct BackendTable {
    entries: Vec<(BackendKind, BackendFactory)>,
}

impl fmt::Debug for BackendTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendTable").field("kinds", &self.kinds()).finish()
    }
}

impl BackendTable {
    /// Empty table; nothing is available
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `kind`, replacing an earlier one
    pub fn with<F>(mut self, kind: BackendKind, factory: F) -> Self
    where
        F: Fn(&DeviceParams) -> DeviceResult<Box<dyn Device>> + 'static,
    {
        self.insert(kind, Box::new(factory));
        self
    }

    /// Register `factory` for `kind`, replacing an earlier one
    pub fn insert(&mut self, kind: BackendKind, factory: BackendFactory) {
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((kind, factory)),
        }
    }

    /// Remove the factory for `kind`
    pub fn remove(&mut self, kind: BackendKind) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| *k != kind);
        self.entries.len() != before
    }

    /// Table of the native backends compiled into this build
    pub fn compiled() -> Self {
        #[allow(unused_mut)]
        let mut table = Self::new();
        #[cfg(feature = "opengl")]
        table.insert(BackendKind::OpenGl, Box::new(opengl::construct));
        #[cfg(feature = "vulkan")]
        table.insert(BackendKind::Vulkan, Box::new(vulkan::construct));
        table
    }

    /// Whether a factory is registered for `kind`
    pub fn is_available(&self, kind: BackendKind) -> bool {
        self.entries.iter().any(|(k, _)| *k == kind)
    }

    /// Factory registered for `kind`
    pub fn factory(&self, kind: BackendKind) -> Option<&BackendFactory> {
        self.entries.iter().find(|(k, _)| *k == kind).map(|(_, f)| f)
    }

    /// Registered families in registration order
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.entries.iter().map(|(k, _)| *k).collect()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
