//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the seam between the crop pipeline and pixel
//! codecs: it decodes source bytes into an RGBA buffer and encodes a cropped,
//! resized region to a file. Nothing outside the backend knows about file
//! formats.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate's pure-Rust codecs.

use super::params::EncodeParams;
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
}

/// Trait for image processing backends.
///
/// `Sync` so a single backend can be shared across rayon workers during
/// scanning and export.
pub trait ImageBackend: Sync {
    /// Decode an encoded image (JPEG, PNG, ...) into row-major RGBA8.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError>;

    /// Crop `source` to `params.crop`, resize to `params.width` x
    /// `params.height`, and write a JPEG to `params.output`.
    fn encode(&self, source: &RgbaImage, params: &EncodeParams) -> Result<(), BackendError>;
}
