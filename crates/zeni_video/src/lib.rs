//! # zeni_video
//!
//! Video device lifecycle management with interchangeable OpenGL and Vulkan
//! backends.
//!
//! ## Features
//!
//! - **Backend negotiation**: the first backend that builds wins, in a fixed
//!   priority order, with per-backend failures kept out of the caller's way
//! - **Self-healing configuration**: a failed start restores the last
//!   configuration that worked, or writes conservative defaults
//! - **Device resets**: textures, fonts and vertex buffers are lost before a
//!   reinit and reloaded after it
//! - **Headless mode**: a virtual display backend for tests and GPU-less runs
//!
//! Native backends are behind the `opengl` and `vulkan` cargo features.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zeni_video::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut video = VideoLifecycle::for_application("My Game")?;
//!     video.load_preinit_from_config();
//!
//!     let device = video.get()?;
//!     device.set_clear_color(Color::rgb(0.1, 0.1, 0.2));
//!     device.present()?;
//!
//!     video.destroy();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigGuardian, ConfigPaths, VideoConfig},
        foundation::{
            math::{Color, Mat4, Vec3},
            time::Timer,
        },
        render::{
            backends::headless::VirtualDisplay,
            resources::{FontCache, TextureCache, VertexBuffer},
            AlphaFunction, BackendKind, BackendTable, Device, DeviceEvent, PreinitEffect, ResettableResource,
            ResourceRegistry, VideoError, VideoLifecycle, VideoMode,
        },
    };
}
