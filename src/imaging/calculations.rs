//! Pure calculation functions for crop and output dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::CropRect;
use crate::crop::{Dimensions, Offsets};

/// Longest side of an on-screen preview.
pub const PREVIEW_MAX_SIDE: u32 = 320;

/// Crop rectangle for an image with the given offsets.
///
/// Width and height are floored at 1 as a last-resort guard; valid offsets
/// never need it.
///
/// # Examples
/// ```
/// # use cardcrop::crop::{Dimensions, Offsets};
/// # use cardcrop::imaging::crop_rect;
/// let rect = crop_rect(Dimensions::new(100, 80), Offsets { top: 5, bottom: 10, left: 20, right: 30 });
/// assert_eq!((rect.x, rect.y, rect.width, rect.height), (20, 5, 50, 65));
/// ```
pub fn crop_rect(dims: Dimensions, offsets: Offsets) -> CropRect {
    let width = (dims.width as i64 - offsets.left as i64 - offsets.right as i64).max(1);
    let height = (dims.height as i64 - offsets.top as i64 - offsets.bottom as i64).max(1);
    CropRect {
        x: offsets.left.min(dims.width.saturating_sub(1)),
        y: offsets.top.min(dims.height.saturating_sub(1)),
        width: width as u32,
        height: height as u32,
    }
}

/// Downscale `(width, height)` so the longer side is at most `max_side`.
///
/// Never upscales. Each side is rounded and floored at 1.
///
/// # Examples
/// ```
/// # use cardcrop::imaging::fit_within;
/// assert_eq!(fit_within((2000, 1000), 500), (500, 250));
/// assert_eq!(fit_within((300, 200), 500), (300, 200));
/// ```
pub fn fit_within(size: (u32, u32), max_side: u32) -> (u32, u32) {
    let (width, height) = size;
    let longest = width.max(height);
    if longest <= max_side {
        return (width, height);
    }

    let scale = max_side as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Output dimensions for a crop rectangle under an export size limit.
pub fn export_dimensions(crop: CropRect, max_dimension: u32) -> (u32, u32) {
    fit_within((crop.width, crop.height), max_dimension)
}

/// Preview dimensions for a crop rectangle.
pub fn preview_dimensions(crop: CropRect) -> (u32, u32) {
    fit_within((crop.width, crop.height), PREVIEW_MAX_SIDE)
}
