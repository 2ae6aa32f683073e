//! Math utilities and types
//!
//! Provides the small set of math types the video device needs: colors for
//! the draw/clear state and the fixed preview transform.

pub use nalgebra::{Matrix4, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// RGBA color with floating point channels in the 0.0-1.0 range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel
    pub a: f32,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Opaque black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Fully transparent black
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a color from RGBA channels
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color from RGB channels
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Channels as `[r, g, b, a]`
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for Color {
    fn from(c: [f32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

/// The preview transform every device carries
///
/// Maps the unit square onto normalized device coordinates with the Y axis
/// pointing down: `T(-0.5, -0.5, 0) * S(0.5, -0.5, -1) * T(1, -1, 0)`.
pub fn preview_matrix() -> Mat4 {
    Mat4::new_translation(&Vec3::new(-0.5, -0.5, 0.0))
        * Mat4::new_nonuniform_scaling(&Vec3::new(0.5, -0.5, -1.0))
        * Mat4::new_translation(&Vec3::new(1.0, -1.0, 0.0))
}
