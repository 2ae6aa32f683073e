//! Video device lifecycle controller
//!
//! [`VideoLifecycle`] owns the single live device, the preinit parameters it
//! is built from, the window chrome, and the resource registry. It runs the
//! negotiator on first use, heals the persisted configuration when no backend
//! can be built, snapshots the configuration after the first success, and
//! sequences resource loss and reload around [`VideoLifecycle::reinit`] and
//! [`VideoLifecycle::destroy`].
//!
//! A reinit that fails to build a new device leaves the controller
//! uninitialized with every resource in the lost state. Nothing is retried
//! automatically; the next successful [`VideoLifecycle::get`] runs the reload
//! sweep that the failed reinit could not.

use std::fmt;
use std::path::PathBuf;

use crate::config::{ConfigError, ConfigGuardian, ConfigPaths, ConfigScope, VideoConfig};
use crate::render::backends::null::NullDevice;
use crate::render::backends::{BackendKind, BackendTable, DeviceParams, DisplayFlags, VideoMode};
use crate::render::device::Device;
use crate::render::error::{DeviceError, InitFailureCause, VideoError, VideoResult};
use crate::render::negotiator;
use crate::render::resources::ResourceRegistry;
use crate::render::window::{WindowChrome, WindowIcon};

/// Where the controller is in the device lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No device exists
    Uninitialized,
    /// The negotiator is building a device
    Initializing,
    /// A device exists
    Ready,
    /// Resources were lost and the old device is being torn down
    Lost,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Lost => write!(f, "lost"),
        }
    }
}

/// Parameters consulted when a device is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreinitParams {
    /// Preferred backend family
    pub video_mode: VideoMode,
    /// Requested size, `None` for the display size
    pub resolution: Option<(u32, u32)>,
    /// Fullscreen
    pub full_screen: bool,
    /// Multisampling level, 1 disables it
    pub multisampling: u32,
    /// Vertical sync
    pub vertical_sync: bool,
    /// Window decorations
    pub show_frame: bool,
}

impl Default for PreinitParams {
    fn default() -> Self {
        Self {
            video_mode: VideoMode::Any,
            resolution: None,
            full_screen: false,
            multisampling: 1,
            vertical_sync: false,
            show_frame: true,
        }
    }
}

impl PreinitParams {
    /// Parameters described by a persisted configuration
    ///
    /// Frame decoration is not persisted and keeps its default.
    pub fn from_config(config: &VideoConfig) -> Self {
        let video = &config.zenilib.video;
        Self {
            video_mode: config.backend().map_or(VideoMode::Any, VideoMode::from),
            resolution: config.resolution(),
            full_screen: video.full_screen,
            multisampling: u32::try_from(video.multisampling).unwrap_or(0).max(1),
            vertical_sync: video.vertical_sync,
            ..Self::default()
        }
    }

    /// Window flags for these parameters
    pub fn flags(&self) -> DisplayFlags {
        let mut flags = DisplayFlags::empty();
        flags.set(DisplayFlags::FULL_SCREEN, self.full_screen);
        flags.set(DisplayFlags::SHOW_FRAME, self.show_frame);
        flags.set(DisplayFlags::VERTICAL_SYNC, self.vertical_sync);
        flags
    }
}

/// What a preinit setter changed
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreinitEffect {
    /// The value will be used by the next construction
    NextConstruction,
    /// A device is live; the value only applies after [`VideoLifecycle::reinit`]
    PendingReinit,
}

/// Notification sent to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A device was constructed
    Ready {
        /// Backend family of the new device
        backend: BackendKind,
        /// Generation of the new device
        generation: u32,
    },
    /// Resources were lost ahead of a reinit
    Lost {
        /// Generation of the device being torn down
        generation: u32,
    },
    /// The device was destroyed
    Destroyed,
}

type Listener = Box<dyn FnMut(&DeviceEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Get,
    Reinit,
}

/// Owner of the video device
pub struct VideoLifecycle {
    state: LifecycleState,
    enabled: bool,
    preinit: PreinitParams,
    pending_preinit: bool,
    chrome: WindowChrome,
    table: BackendTable,
    guardian: ConfigGuardian,
    registry: ResourceRegistry,
    device: Option<Box<dyn Device>>,
    null: NullDevice,
    generation: u32,
    listeners: Vec<Listener>,
}

impl fmt::Debug for VideoLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoLifecycle")
            .field("state", &self.state)
            .field("enabled", &self.enabled)
            .field("preinit", &self.preinit)
            .field("generation", &self.generation)
            .field("backends", &self.table)
            .finish_non_exhaustive()
    }
}

impl VideoLifecycle {
    /// Controller over `table`, protecting the configuration behind `guardian`
    pub fn new(table: BackendTable, guardian: ConfigGuardian, registry: ResourceRegistry) -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            enabled: true,
            preinit: PreinitParams::default(),
            pending_preinit: false,
            chrome: WindowChrome::default(),
            table,
            guardian,
            registry,
            device: None,
            null: NullDevice::new(),
            generation: 0,
            listeners: Vec::new(),
        }
    }

    /// Controller for `app_name` with the compiled-in backends and the
    /// platform configuration paths
    pub fn for_application(app_name: &str) -> Result<Self, ConfigError> {
        let paths = ConfigPaths::for_application(app_name)?;
        Ok(Self::new(
            BackendTable::compiled(),
            ConfigGuardian::new(paths),
            ResourceRegistry::new(),
        ))
    }

    /// The live device, building it on first use
    ///
    /// On failure the persisted configuration is healed for the next run
    /// and the error is returned. A reload failure for resources lost by an
    /// earlier failed reinit is reported after the device is already live.
    pub fn get(&mut self) -> VideoResult<&mut dyn Device> {
        if self.device.is_none() {
            self.construct(Origin::Get)?;
        }
        let state = self.state;
        self.device
            .as_deref_mut()
            .map(|device| device as &mut dyn Device)
            .ok_or(VideoError::InvalidState { operation: "get", state })
    }

    /// Tear the device down and build a new one from the current preinit
    /// parameters
    ///
    /// Runs the lose sweep, drops the device, negotiates again, then runs
    /// the reload sweep. Only valid while ready.
    pub fn reinit(&mut self) -> VideoResult<()> {
        if self.state != LifecycleState::Ready {
            return Err(VideoError::InvalidState {
                operation: "reinit",
                state: self.state,
            });
        }
        let Some(mut device) = self.device.take() else {
            return Err(VideoError::InvalidState {
                operation: "reinit",
                state: self.state,
            });
        };

        log::info!("Reinitializing video device (generation {})", self.generation);
        self.state = LifecycleState::Lost;
        self.emit(DeviceEvent::Lost {
            generation: device.generation(),
        });
        self.registry.lose_all(device.as_mut());
        drop(device);

        self.construct(Origin::Reinit)
    }

    /// Lose every resource and drop the device
    ///
    /// Does nothing when no device exists.
    pub fn destroy(&mut self) {
        let Some(mut device) = self.device.take() else {
            return;
        };

        log::info!("Destroying video device (generation {})", device.generation());
        self.state = LifecycleState::Lost;
        self.registry.lose_all(device.as_mut());
        drop(device);

        self.state = LifecycleState::Uninitialized;
        self.emit(DeviceEvent::Destroyed);
    }

    fn construct(&mut self, origin: Origin) -> VideoResult<()> {
        self.state = LifecycleState::Initializing;

        if !self.enabled {
            self.state = LifecycleState::Uninitialized;
            log::warn!("Video is disabled; no device will be built");
            return Err(VideoError::DeviceInitFailure(InitFailureCause::Disabled));
        }

        let params = DeviceParams {
            generation: self.generation + 1,
            resolution: self.preinit.resolution,
            flags: self.preinit.flags(),
            multisampling: self.preinit.multisampling,
            title: self.chrome.title.clone(),
            taskmsg: self.chrome.taskmsg.clone(),
        };

        let mut device = match negotiator::select_and_construct(self.preinit.video_mode, &self.table, &params) {
            Ok(device) => device,
            Err(e) => {
                self.state = LifecycleState::Uninitialized;
                log::error!("{}", e);
                let report = self.guardian.heal();
                log::info!("Configuration healed: {:?}", report);
                return Err(e);
            }
        };

        self.generation = params.generation;
        self.pending_preinit = false;
        Self::apply_icon(device.as_mut(), &self.chrome);

        if origin == Origin::Get {
            self.guardian.snapshot();
        }

        let reload = if self.registry.is_lost() {
            self.registry.reload_all(device.as_mut()).map(|_| ())
        } else {
            Ok(())
        };

        let backend = device.backend();
        let (width, height) = device.screen_size();
        log::info!(
            "Video device ready: {} {}x{} (generation {})",
            backend,
            width,
            height,
            self.generation
        );
        self.device = Some(device);
        self.state = LifecycleState::Ready;
        self.emit(DeviceEvent::Ready {
            backend,
            generation: self.generation,
        });

        reload
    }

    fn apply_icon(device: &mut dyn Device, chrome: &WindowChrome) {
        match WindowIcon::load(&chrome.icon).and_then(|icon| device.set_icon(&icon)) {
            Ok(()) => log::debug!("Window icon set from '{}'", chrome.icon.display()),
            Err(e) => log::warn!("Could not load display window icon: {}", e),
        }
    }

    fn emit(&mut self, event: DeviceEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    /// Call `listener` on every device event
    pub fn subscribe(&mut self, listener: impl FnMut(&DeviceEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn preinit_changed(&mut self, what: &str) -> PreinitEffect {
        if self.device.is_some() {
            log::warn!("Preinit {} changed while a device is live; it applies after reinit", what);
            self.pending_preinit = true;
            PreinitEffect::PendingReinit
        } else {
            PreinitEffect::NextConstruction
        }
    }

    /// Preferred backend family
    pub fn preinit_video_mode(&mut self, mode: VideoMode) -> PreinitEffect {
        self.preinit.video_mode = mode;
        self.preinit_changed("video mode")
    }

    /// Requested size, `None` for the display size
    pub fn preinit_resolution(&mut self, resolution: Option<(u32, u32)>) -> PreinitEffect {
        self.preinit.resolution = resolution;
        self.preinit_changed("resolution")
    }

    /// Fullscreen
    pub fn preinit_full_screen(&mut self, full_screen: bool) -> PreinitEffect {
        self.preinit.full_screen = full_screen;
        self.preinit_changed("full screen")
    }

    /// Multisampling level
    pub fn preinit_multisampling(&mut self, multisampling: u32) -> PreinitEffect {
        self.preinit.multisampling = multisampling.max(1);
        self.preinit_changed("multisampling")
    }

    /// Vertical sync
    pub fn preinit_vertical_sync(&mut self, vertical_sync: bool) -> PreinitEffect {
        self.preinit.vertical_sync = vertical_sync;
        self.preinit_changed("vertical sync")
    }

    /// Window decorations
    pub fn preinit_show_frame(&mut self, show_frame: bool) -> PreinitEffect {
        self.preinit.show_frame = show_frame;
        self.preinit_changed("show frame")
    }

    /// Current preinit parameters
    pub fn preinit(&self) -> &PreinitParams {
        &self.preinit
    }

    /// Whether a preinit value changed since the live device was built
    pub fn has_pending_preinit(&self) -> bool {
        self.pending_preinit
    }

    /// Seed the preinit parameters from the persisted configuration
    ///
    /// Returns the scope that was read, or `None` when no readable
    /// configuration exists and the defaults stay in place.
    pub fn load_preinit_from_config(&mut self) -> Option<ConfigScope> {
        match self.guardian.load_current() {
            Some((scope, config)) => {
                let show_frame = self.preinit.show_frame;
                self.preinit = PreinitParams {
                    show_frame,
                    ..PreinitParams::from_config(&config)
                };
                match self.preinit_changed("configuration") {
                    PreinitEffect::NextConstruction => {
                        log::info!("Video preinit loaded from {} configuration", scope);
                    }
                    PreinitEffect::PendingReinit => {
                        log::info!("Video preinit loaded from {} configuration; applies after reinit", scope);
                    }
                }
                Some(scope)
            }
            None => {
                log::warn!("No video configuration found; using defaults");
                None
            }
        }
    }

    /// Allow or forbid building a device
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether building a device is allowed
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the window title
    pub fn set_title(&mut self, title: impl Into<String>) -> VideoResult<()> {
        self.chrome.title = title.into();
        self.apply_caption()
    }

    /// Set the task bar message
    pub fn set_taskmsg(&mut self, taskmsg: impl Into<String>) -> VideoResult<()> {
        self.chrome.taskmsg = taskmsg.into();
        self.apply_caption()
    }

    /// Set the window title and task bar message together
    pub fn set_tt(&mut self, title: impl Into<String>, taskmsg: impl Into<String>) -> VideoResult<()> {
        self.chrome.title = title.into();
        self.chrome.taskmsg = taskmsg.into();
        self.apply_caption()
    }

    fn apply_caption(&mut self) -> VideoResult<()> {
        let Some(device) = self.device.as_deref_mut() else {
            return Ok(());
        };
        match device.set_caption(&self.chrome.title, &self.chrome.taskmsg) {
            Ok(()) => Ok(()),
            Err(DeviceError::CaptionUnavailable) => {
                log::debug!("No window manager caption support; skipping title update");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Set the window icon file
    ///
    /// Applied at once when a device is live, otherwise at construction.
    pub fn set_icon(&mut self, path: impl Into<PathBuf>) -> VideoResult<()> {
        self.chrome.icon = path.into();
        let Some(device) = self.device.as_deref_mut() else {
            return Ok(());
        };
        let icon = WindowIcon::load(&self.chrome.icon)?;
        device.set_icon(&icon)?;
        Ok(())
    }

    /// Current window chrome
    pub fn chrome(&self) -> &WindowChrome {
        &self.chrome
    }

    /// Whether a device is live
    pub fn is_ready(&self) -> bool {
        self.state == LifecycleState::Ready
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Generation of the most recently built device, 0 before the first
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The live device, if any
    pub fn device(&mut self) -> Option<&mut dyn Device> {
        self.device.as_deref_mut().map(|device| device as &mut dyn Device)
    }

    /// The live device, or a null device that ignores everything
    pub fn device_or_null(&mut self) -> &mut dyn Device {
        match self.device.as_deref_mut() {
            Some(device) => device as &mut dyn Device,
            None => &mut self.null,
        }
    }

    /// Registry swept around resets
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Backends this controller may build
    pub fn backends(&self) -> &BackendTable {
        &self.table
    }

    /// Configuration guardian
    pub fn guardian(&self) -> &ConfigGuardian {
        &self.guardian
    }
}

impl Drop for VideoLifecycle {
    fn drop(&mut self) {
        self.destroy();
    }
}
