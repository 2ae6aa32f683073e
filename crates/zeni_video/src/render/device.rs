//! Backend device contract
//!
//! Every backend, real or not, implements [`Device`]. The trait carries the
//! small amount of render state the lifecycle cares about (colors, alpha
//! test, preview transform), the properties the device was actually granted,
//! and a handle table for GPU resources so resettable resources can tell a
//! live handle from one created by an earlier device.

use slotmap::{new_key_type, SlotMap};

use crate::foundation::math::{preview_matrix, Color, Mat4};
use crate::render::backends::BackendKind;
use crate::render::error::DeviceResult;
use crate::render::window::WindowIcon;

new_key_type! {
    /// Slot of a GPU resource inside one device's [`ResourceTable`]
    pub struct ResourceKey;
}

/// Handle to a GPU resource owned by a specific device generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuHandle {
    generation: u32,
    key: ResourceKey,
}

impl GpuHandle {
    /// Generation of the device that created this handle
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Category of a GPU resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Vertex data
    VertexBuffer,
    /// Texture image
    Texture,
    /// Glyph atlas of a font
    Font,
}

/// Description of a GPU resource to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDesc {
    /// Category
    pub kind: ResourceKind,
    /// Debug label
    pub label: String,
    /// Size of the uploaded data in bytes
    pub byte_len: usize,
}

impl ResourceDesc {
    /// Describe a resource
    pub fn new(kind: ResourceKind, label: impl Into<String>, byte_len: usize) -> Self {
        Self {
            kind,
            label: label.into(),
            byte_len,
        }
    }
}

/// Live GPU resources of one device
///
/// Handles from another generation are never found, so a handle that
/// survived a reinit is harmless to release.
#[derive(Debug)]
pub struct ResourceTable {
    generation: u32,
    slots: SlotMap<ResourceKey, ResourceDesc>,
}

impl ResourceTable {
    /// Empty table for the device of `generation`
    pub fn new(generation: u32) -> Self {
        Self {
            generation,
            slots: SlotMap::with_key(),
        }
    }

    /// Record a resource and hand out its handle
    pub fn insert(&mut self, desc: ResourceDesc) -> GpuHandle {
        GpuHandle {
            generation: self.generation,
            key: self.slots.insert(desc),
        }
    }

    /// Forget a resource, returning its description if it was live here
    pub fn remove(&mut self, handle: GpuHandle) -> Option<ResourceDesc> {
        if handle.generation != self.generation {
            return None;
        }
        self.slots.remove(handle.key)
    }

    /// Whether `handle` refers to a live resource of this table
    pub fn contains(&self, handle: GpuHandle) -> bool {
        handle.generation == self.generation && self.slots.contains_key(handle.key)
    }

    /// Description of a live resource
    pub fn get(&self, handle: GpuHandle) -> Option<&ResourceDesc> {
        if handle.generation != self.generation {
            return None;
        }
        self.slots.get(handle.key)
    }

    /// Number of live resources
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no resources are live
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every record, returning how many were still live
    pub fn clear(&mut self) -> usize {
        let live = self.slots.len();
        self.slots.clear();
        live
    }
}

/// Comparison used by the alpha test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaFunction {
    /// Never passes
    Never,
    /// Passes if alpha < reference
    Less,
    /// Passes if alpha == reference
    Equal,
    /// Passes if alpha <= reference
    LessOrEqual,
    /// Passes if alpha > reference
    Greater,
    /// Passes if alpha != reference
    NotEqual,
    /// Passes if alpha >= reference
    GreaterOrEqual,
    /// Always passes
    #[default]
    Always,
}

impl AlphaFunction {
    /// Evaluate the comparison for a fragment alpha
    #[allow(clippy::float_cmp)]
    pub fn passes(self, alpha: f32, reference: f32) -> bool {
        match self {
            Self::Never => false,
            Self::Less => alpha < reference,
            Self::Equal => alpha == reference,
            Self::LessOrEqual => alpha <= reference,
            Self::Greater => alpha > reference,
            Self::NotEqual => alpha != reference,
            Self::GreaterOrEqual => alpha >= reference,
            Self::Always => true,
        }
    }
}

/// Alpha test configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlphaTest {
    /// Whether fragments are tested at all
    pub enabled: bool,
    /// Comparison against `reference`
    pub function: AlphaFunction,
    /// Reference alpha value
    pub reference: f32,
}

impl AlphaTest {
    /// Whether a fragment with `alpha` survives this test
    pub fn accepts(&self, alpha: f32) -> bool {
        !self.enabled || self.function.passes(alpha, self.reference)
    }
}

/// Mutable render state shared by all backends
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    /// Current draw color
    pub color: Color,
    /// Color the frame is cleared to
    pub clear_color: Color,
    /// Alpha test
    pub alpha_test: AlphaTest,
    preview: Mat4,
}

impl RenderState {
    /// Fixed preview transform
    pub fn preview(&self) -> &Mat4 {
        &self.preview
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            clear_color: Color::BLACK,
            alpha_test: AlphaTest::default(),
            preview: preview_matrix(),
        }
    }
}

/// What the device was actually granted at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProperties {
    /// Backend family
    pub backend: BackendKind,
    /// Construction counter of the owning controller
    pub generation: u32,
    /// Granted screen size in pixels
    pub screen_size: (u32, u32),
    /// Whether the device is fullscreen
    pub full_screen: bool,
    /// Granted multisampling level
    pub multisampling: u32,
    /// Whether presentation waits for vertical sync
    pub vertical_sync: bool,
    /// Whether the window carries an OpenGL context
    pub opengl_context: bool,
}

/// A live window/context/surface plus its render state
pub trait Device {
    /// Properties granted at construction
    fn properties(&self) -> &DeviceProperties;

    /// Current render state
    fn render_state(&self) -> &RenderState;

    /// Mutable render state. Backends that mirror state into a driver
    /// override the setters below instead of relying on this alone.
    fn render_state_mut(&mut self) -> &mut RenderState;

    /// Clear to the clear color and display the current frame
    fn present(&mut self) -> DeviceResult<()>;

    /// Set the window title and task bar message
    fn set_caption(&mut self, title: &str, taskmsg: &str) -> DeviceResult<()>;

    /// Set the window icon
    fn set_icon(&mut self, icon: &WindowIcon) -> DeviceResult<()>;

    /// Create a GPU resource
    fn create_resource(&mut self, desc: ResourceDesc) -> DeviceResult<GpuHandle>;

    /// Release a GPU resource. Returns false for handles this device does not own.
    fn destroy_resource(&mut self, handle: GpuHandle) -> bool;

    /// Live GPU resources
    fn resources(&self) -> &ResourceTable;

    /// Backend family
    fn backend(&self) -> BackendKind {
        self.properties().backend
    }

    /// Construction counter of the owning controller
    fn generation(&self) -> u32 {
        self.properties().generation
    }

    /// Actual screen size in pixels
    fn screen_size(&self) -> (u32, u32) {
        self.properties().screen_size
    }

    /// Whether the device is fullscreen
    fn is_full_screen(&self) -> bool {
        self.properties().full_screen
    }

    /// Whether the window carries an OpenGL context
    fn is_opengl(&self) -> bool {
        self.properties().opengl_context
    }

    /// Current draw color
    fn color(&self) -> Color {
        self.render_state().color
    }

    /// Set the draw color
    fn set_color(&mut self, color: Color) {
        self.render_state_mut().color = color;
    }

    /// Current clear color
    fn clear_color(&self) -> Color {
        self.render_state().clear_color
    }

    /// Set the clear color used by [`Device::present`]
    fn set_clear_color(&mut self, color: Color) {
        self.render_state_mut().clear_color = color;
    }

    /// Current alpha test
    fn alpha_test(&self) -> AlphaTest {
        self.render_state().alpha_test
    }

    /// Configure the alpha test
    fn set_alpha_test(&mut self, enabled: bool, function: AlphaFunction, reference: f32) {
        self.render_state_mut().alpha_test = AlphaTest {
            enabled,
            function,
            reference,
        };
    }

    /// Fixed preview transform
    fn preview(&self) -> &Mat4 {
        self.render_state().preview()
    }

    /// Whether `handle` is live on this device
    fn owns(&self, handle: GpuHandle) -> bool {
        self.resources().contains(handle)
    }

    /// Number of live GPU resources
    fn live_resources(&self) -> usize {
        self.resources().len()
    }
}
