//! OpenGL backend
//!
//! A GLFW window with a current OpenGL context. The handful of GL entry
//! points the device needs are resolved through the context at construction;
//! a context that cannot provide them counts as a failed construction.

use std::ffi::c_void;

use glfw::Context;

use crate::render::backends::glfw_window::{ClientApi, NativeWindow};
use crate::render::backends::{BackendKind, DeviceParams};
use crate::render::device::{
    AlphaFunction, AlphaTest, Device, DeviceProperties, GpuHandle, RenderState, ResourceDesc, ResourceTable,
};
use crate::render::error::{DeviceError, DeviceResult};
use crate::render::window::WindowIcon;

const GL_COLOR_BUFFER_BIT: u32 = 0x0000_4000;
const GL_DEPTH_BUFFER_BIT: u32 = 0x0000_0100;
const GL_ALPHA_TEST: u32 = 0x0BC0;

type ClearColorFn = unsafe extern "system" fn(f32, f32, f32, f32);
type ClearFn = unsafe extern "system" fn(u32);
type CapabilityFn = unsafe extern "system" fn(u32);
type AlphaFuncFn = unsafe extern "system" fn(u32, f32);

fn gl_alpha_function(function: AlphaFunction) -> u32 {
    match function {
        AlphaFunction::Never => 0x0200,
        AlphaFunction::Less => 0x0201,
        AlphaFunction::Equal => 0x0202,
        AlphaFunction::LessOrEqual => 0x0203,
        AlphaFunction::Greater => 0x0204,
        AlphaFunction::NotEqual => 0x0205,
        AlphaFunction::GreaterOrEqual => 0x0206,
        AlphaFunction::Always => 0x0207,
    }
}

/// GL entry points used by the device
struct GlFunctions {
    clear_color: ClearColorFn,
    clear: ClearFn,
    enable: CapabilityFn,
    disable: CapabilityFn,
    // Absent from core profiles
    alpha_func: Option<AlphaFuncFn>,
}

impl GlFunctions {
    fn load(window: &mut NativeWindow) -> DeviceResult<Self> {
        let mut resolve = |name: &str| -> *const c_void { window.window_mut().get_proc_address(name) as *const c_void };

        let clear_color = resolve("glClearColor");
        let clear = resolve("glClear");
        let enable = resolve("glEnable");
        let disable = resolve("glDisable");
        let alpha_func = resolve("glAlphaFunc");

        if [clear_color, clear, enable, disable].iter().any(|p| p.is_null()) {
            return Err(DeviceError::construction(BackendKind::OpenGl, "missing core GL entry points"));
        }

        // SAFETY: each pointer was resolved by the current context for the
        // named function and checked for null; the signatures match the GL
        // specification for these entry points.
        unsafe {
            Ok(Self {
                clear_color: std::mem::transmute::<*const c_void, ClearColorFn>(clear_color),
                clear: std::mem::transmute::<*const c_void, ClearFn>(clear),
                enable: std::mem::transmute::<*const c_void, CapabilityFn>(enable),
                disable: std::mem::transmute::<*const c_void, CapabilityFn>(disable),
                alpha_func: (!alpha_func.is_null())
                    .then(|| std::mem::transmute::<*const c_void, AlphaFuncFn>(alpha_func)),
            })
        }
    }
}

/// Build an OpenGL device
pub fn construct(params: &DeviceParams) -> DeviceResult<Box<dyn Device>> {
    OpenGlDevice::new(params).map(|d| Box::new(d) as Box<dyn Device>)
}

/// Device backed by an OpenGL context
pub struct OpenGlDevice {
    window: NativeWindow,
    gl: GlFunctions,
    properties: DeviceProperties,
    state: RenderState,
    resources: ResourceTable,
}

impl OpenGlDevice {
    /// Open a window and make its context current
    pub fn new(params: &DeviceParams) -> DeviceResult<Self> {
        let mut window = NativeWindow::open(BackendKind::OpenGl, ClientApi::OpenGl, params)?;
        window.window_mut().make_current();

        let interval = if params.vertical_sync() {
            glfw::SwapInterval::Sync(1)
        } else {
            glfw::SwapInterval::None
        };
        window.glfw_mut().set_swap_interval(interval);

        let gl = GlFunctions::load(&mut window)?;
        let screen_size = window.framebuffer_size();
        log::info!(
            "OpenGL device {}x{} (generation {})",
            screen_size.0,
            screen_size.1,
            params.generation
        );

        let mut device = Self {
            window,
            gl,
            properties: DeviceProperties {
                backend: BackendKind::OpenGl,
                generation: params.generation,
                screen_size,
                full_screen: params.full_screen(),
                multisampling: params.multisampling.max(1),
                vertical_sync: params.vertical_sync(),
                opengl_context: true,
            },
            state: RenderState::default(),
            resources: ResourceTable::new(params.generation),
        };
        let alpha = device.state.alpha_test;
        device.apply_alpha_test(alpha);
        Ok(device)
    }

    /// The window this device draws into
    pub fn window(&self) -> &NativeWindow {
        &self.window
    }

    /// Mutable window, for event polling
    pub fn window_mut(&mut self) -> &mut NativeWindow {
        &mut self.window
    }

    fn apply_alpha_test(&mut self, test: AlphaTest) {
        // SAFETY: the context is current on this thread for the device's lifetime.
        unsafe {
            if test.enabled {
                (self.gl.enable)(GL_ALPHA_TEST);
            } else {
                (self.gl.disable)(GL_ALPHA_TEST);
            }
            if let Some(alpha_func) = self.gl.alpha_func {
                alpha_func(gl_alpha_function(test.function), test.reference);
            }
        }
    }
}

impl Device for OpenGlDevice {
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
        let [r, g, b, a] = self.state.clear_color.to_array();
        self.window.window_mut().swap_buffers();
        // SAFETY: the context is current on this thread for the device's lifetime.
        unsafe {
            (self.gl.clear_color)(r, g, b, a);
            (self.gl.clear)(GL_COLOR_BUFFER_BIT | GL_DEPTH_BUFFER_BIT);
        }
        self.window.poll_events();
        Ok(())
    }

    fn set_caption(&mut self, title: &str, taskmsg: &str) -> DeviceResult<()> {
        self.window.set_caption(title, taskmsg);
        Ok(())
    }

    fn set_icon(&mut self, icon: &WindowIcon) -> DeviceResult<()> {
        self.window.set_icon(icon);
        Ok(())
    }

    fn set_alpha_test(&mut self, enabled: bool, function: AlphaFunction, reference: f32) {
        let test = AlphaTest {
            enabled,
            function,
            reference,
        };
        self.state.alpha_test = test;
        self.apply_alpha_test(test);
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

impl Drop for OpenGlDevice {
    fn drop(&mut self) {
        let leaked = self.resources.clear();
        log::debug!(
            "Closing OpenGL device generation {} ({} live resources)",
            self.properties.generation,
            leaked
        );
    }
}
