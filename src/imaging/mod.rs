//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` with format sniffing |
//! | **Crop + resize → JPEG** | `crop_imm` + Lanczos3 + `JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop and output dimension math (unit testable)
//! - **Parameters**: Data structures describing an encode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{
    PREVIEW_MAX_SIDE, crop_rect, export_dimensions, fit_within, preview_dimensions,
};
pub use params::{CropRect, EncodeParams, Quality};
pub use rust_backend::{RustBackend, is_supported_image, supported_input_extensions};
