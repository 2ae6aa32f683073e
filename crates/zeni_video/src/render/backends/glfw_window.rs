//! Native window shared by the OpenGL and Vulkan backends
//!
//! Wraps GLFW initialization, window creation for the requested size and
//! flags, and the caption/icon hooks. Each device owns its own window, so
//! tearing the device down closes the window as well.

use crate::render::backends::{BackendKind, DeviceParams};
use crate::render::error::{DeviceError, DeviceResult};
use crate::render::window::WindowIcon;

/// Size used when neither a resolution nor a monitor mode is known
const FALLBACK_SIZE: (u32, u32) = (800, 600);

/// Client API the window is created for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientApi {
    /// Window with an OpenGL context
    OpenGl,
    /// Window without a client API, for Vulkan surfaces
    NoApi,
}

/// GLFW window wrapper with proper resource management
pub struct NativeWindow {
    kind: BackendKind,
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl NativeWindow {
    /// Open a window for `params`
    pub fn open(kind: BackendKind, api: ClientApi, params: &DeviceParams) -> DeviceResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|e| DeviceError::construction(kind, format!("GLFW initialization failed: {:?}", e)))?;

        match api {
            ClientApi::OpenGl => glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::OpenGl)),
            ClientApi::NoApi => glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi)),
        }
        glfw.window_hint(glfw::WindowHint::Resizable(false));
        glfw.window_hint(glfw::WindowHint::Decorated(params.show_frame()));
        if api == ClientApi::OpenGl && params.multisampling > 1 {
            glfw.window_hint(glfw::WindowHint::Samples(Some(params.multisampling)));
        }

        let full_screen = params.full_screen();
        let requested = params.resolution;
        let title = params.title.clone();

        let created = glfw.with_primary_monitor(|glfw, monitor| {
            let monitor = monitor.map(|m| &*m);
            let desktop = monitor
                .and_then(|m| m.get_video_mode())
                .map(|mode| (mode.width, mode.height));

            match monitor {
                Some(m) if full_screen => {
                    let (w, h) = desktop.or(requested).unwrap_or(FALLBACK_SIZE);
                    glfw.create_window(w, h, &title, glfw::WindowMode::FullScreen(m))
                }
                _ => {
                    let (w, h) = requested.or(desktop).unwrap_or(FALLBACK_SIZE);
                    glfw.create_window(w, h, &title, glfw::WindowMode::Windowed)
                }
            }
        });

        let (mut window, events) =
            created.ok_or_else(|| DeviceError::construction(kind, "window creation failed"))?;
        window.set_close_polling(true);
        window.set_key_polling(true);

        Ok(Self {
            kind,
            glfw,
            window,
            events,
        })
    }

    /// Backend this window was opened for
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Framebuffer size in pixels as granted by the window system
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Process pending window events
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::Close = event {
                log::debug!("{} window close requested", self.kind);
            }
        }
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Set the window title; GLFW has no separate task bar text
    pub fn set_caption(&mut self, title: &str, taskmsg: &str) {
        self.window.set_title(title);
        if taskmsg != title {
            log::trace!("Task bar message '{}' shown as the window title", taskmsg);
        }
    }

    /// Set the window icon
    pub fn set_icon(&mut self, icon: &WindowIcon) {
        self.window.set_icon_from_pixels(vec![glfw::PixelImage {
            width: icon.width,
            height: icon.height,
            pixels: icon.packed_pixels(),
        }]);
    }

    /// GLFW library handle
    pub fn glfw(&self) -> &glfw::Glfw {
        &self.glfw
    }

    /// Mutable GLFW library handle
    pub fn glfw_mut(&mut self) -> &mut glfw::Glfw {
        &mut self.glfw
    }

    /// Underlying window
    pub fn window(&self) -> &glfw::PWindow {
        &self.window
    }

    /// Mutable underlying window
    pub fn window_mut(&mut self) -> &mut glfw::PWindow {
        &mut self.window
    }
}
