//! Error types for the video subsystem
//!
//! [`DeviceError`] is what a single backend reports; it never leaves the
//! negotiator as a construction failure. [`VideoError`] is what callers of
//! the lifecycle controller see.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::render::backends::{BackendKind, VideoMode};
use crate::render::lifecycle::LifecycleState;

/// Result type for backend operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Result type for lifecycle operations
pub type VideoResult<T> = Result<T, VideoError>;

/// Errors reported by a concrete backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The windowing system or driver refused to create the device
    #[error("{backend} device construction failed: {reason}")]
    Construction {
        /// Backend that failed
        backend: BackendKind,
        /// Driver or windowing system message
        reason: String,
    },

    /// The window manager does not support captions
    #[error("window caption unavailable")]
    CaptionUnavailable,

    /// The window icon could not be decoded or applied
    #[error("could not load window icon '{path}': {reason}")]
    IconLoad {
        /// Icon file
        path: PathBuf,
        /// Decoder or window manager message
        reason: String,
    },

    /// A GPU resource could not be created
    #[error("resource allocation failed: {0}")]
    Allocation(String),

    /// The frame could not be presented
    #[error("present failed: {0}")]
    Present(String),
}

impl DeviceError {
    /// Shorthand for [`DeviceError::Construction`]
    pub fn construction(backend: BackendKind, reason: impl Into<String>) -> Self {
        Self::Construction {
            backend,
            reason: reason.into(),
        }
    }
}

/// One failed backend construction, kept for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct BackendAttempt {
    /// Backend that was tried
    pub backend: BackendKind,
    /// Why it failed
    pub error: DeviceError,
}

/// Why no device could be constructed
#[derive(Debug, Clone, PartialEq)]
pub enum InitFailureCause {
    /// The video subsystem was disabled before initialization
    Disabled,
    /// The preferred backend is not in the capability table
    Unavailable(VideoMode),
    /// Every candidate backend failed to construct
    Exhausted(Vec<BackendAttempt>),
}

impl fmt::Display for InitFailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "video is disabled"),
            Self::Unavailable(mode) => write!(f, "no {} backend is available", mode),
            Self::Exhausted(attempts) if attempts.is_empty() => write!(f, "no backend is available"),
            Self::Exhausted(attempts) => {
                write!(f, "all backends failed")?;
                for attempt in attempts {
                    write!(f, "; {}", attempt.error)?;
                }
                Ok(())
            }
        }
    }
}

/// Errors surfaced by the lifecycle controller
#[derive(Error, Debug)]
pub enum VideoError {
    /// No backend could construct a device
    #[error("video device initialization failed: {0}")]
    DeviceInitFailure(InitFailureCause),

    /// The window icon could not be loaded (non-fatal)
    #[error("could not load window icon '{path}': {reason}")]
    IconLoadFailure {
        /// Icon file
        path: PathBuf,
        /// Decoder or window manager message
        reason: String,
    },

    /// The window manager does not support captions (non-fatal)
    #[error("window caption unavailable")]
    WindowCaptionUnavailable,

    /// The operation is not valid in the controller's current state
    #[error("cannot {operation} while the video device is {state:?}")]
    InvalidState {
        /// Requested operation
        operation: &'static str,
        /// State the controller was in
        state: LifecycleState,
    },

    /// A resettable resource could not rebuild its GPU state
    #[error("resource reload failed: {0}")]
    ResourceReload(String),

    /// Error from the live device
    #[error(transparent)]
    Device(DeviceError),
}

impl From<DeviceError> for VideoError {
    fn from(error: DeviceError) -> Self {
        match error {
            DeviceError::CaptionUnavailable => Self::WindowCaptionUnavailable,
            DeviceError::IconLoad { path, reason } => Self::IconLoadFailure { path, reason },
            other => Self::Device(other),
        }
    }
}

impl VideoError {
    /// Whether this is a [`VideoError::DeviceInitFailure`]
    pub fn is_init_failure(&self) -> bool {
        matches!(self, Self::DeviceInitFailure(_))
    }

    /// Whether the application can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::IconLoadFailure { .. } | Self::WindowCaptionUnavailable)
    }
}
