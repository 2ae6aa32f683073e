//! # Video device system
//!
//! Manages the one live video device of an application and everything that
//! must happen around it.
//!
//! ## Architecture
//!
//! - **Lifecycle**: [`VideoLifecycle`] builds, rebuilds and destroys the device
//! - **Negotiator**: picks a backend from the preferred [`VideoMode`] and the
//!   runtime [`BackendTable`]
//! - **Backends**: OpenGL and Vulkan behind cargo features, plus a headless
//!   virtual display and a null device
//! - **Resources**: GPU-backed objects registered with a [`ResourceRegistry`]
//!   so they can be lost and reloaded around a reset
//!
//! Only one backend is ever live, and switching families always goes
//! through a full reinit.

pub mod backends;
pub mod device;
pub mod error;
pub mod lifecycle;
pub mod negotiator;
pub mod resources;
pub mod window;

pub use backends::{BackendFactory, BackendKind, BackendTable, DeviceParams, DisplayFlags, VideoMode};
pub use device::{AlphaFunction, AlphaTest, Device, DeviceProperties, GpuHandle, RenderState, ResourceDesc, ResourceKind};
pub use error::{BackendAttempt, DeviceError, DeviceResult, InitFailureCause, VideoError, VideoResult};
pub use lifecycle::{DeviceEvent, LifecycleState, PreinitEffect, PreinitParams, VideoLifecycle};
pub use negotiator::{select_and_construct, SelectionOutcome};
pub use resources::{Registered, Registration, ResettableResource, ResourceRegistry};
pub use window::{WindowChrome, WindowIcon};
