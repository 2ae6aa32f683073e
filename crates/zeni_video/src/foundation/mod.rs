//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types (colors, matrices)
//! - File-system primitives used by the configuration backup protocol
//! - Time management
//! - Logging utilities

pub mod math;
pub mod fs;
pub mod time;
pub mod logging;
