//! Parameter types for image operations.
//!
//! These structs describe *what* to encode, not *how*. They are the interface
//! between [`export`](crate::export), which decides crop rectangles, sizes and
//! file names, and the [`backend`](super::backend), which does the pixel work.
//! Keeping them plain data lets export logic run against a mock backend.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG quality (1-100, default 92). Clamped on construction.
//! - [`CropRect`]: region of the source image to keep.
//! - [`EncodeParams`]: crop rectangle, output size, quality and output path.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Quality setting for JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(92)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Rectangle within a source image, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Everything an encoder needs to write one output file.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub crop: CropRect,
    /// Final output dimensions; equal to the crop size when no downscale applies.
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
    pub output: PathBuf,
}
