//! Margin detection by scanning rows and columns inward from each edge.
//!
//! Rows are scanned first (top downward, then bottom upward but never past
//! the top boundary), then columns (left rightward, then right leftward but
//! never past the left boundary). A row or column is background when at
//! least [`BACKGROUND_RATIO`] of its sampled pixels classify as background,
//! which tolerates dust and scanner noise on an otherwise clean margin.
//!
//! Large images are sampled on a stride of `max(1, dimension / 600)` pixels;
//! the final pixel of every row/column is always included so the far edge is
//! never skipped by stride alignment.

use super::classifier::{WhiteThreshold, is_background};
use crate::crop::Offsets;
use image::RgbaImage;
use tracing::debug;

/// Fraction of sampled pixels that must be background for a whole line to be.
pub const BACKGROUND_RATIO: f64 = 0.995;

/// Target number of samples per line before striding kicks in.
const SAMPLES_PER_LINE: u32 = 600;

/// Safety margin kept around detected content, as a fraction of the short side.
const SAFETY_MARGIN_RATIO: f64 = 0.005;

/// Sampling stride for a line of `dimension` pixels.
fn stride(dimension: u32) -> usize {
    (dimension / SAMPLES_PER_LINE).max(1) as usize
}

/// Sample positions along a line: every `step`-th pixel plus the last one.
fn sample_positions(len: u32, step: usize) -> impl Iterator<Item = u32> {
    let last = len - 1;
    let tail = (last as usize % step != 0).then_some(last);
    (0..len).step_by(step).chain(tail)
}

fn line_is_background(samples: impl Iterator<Item = [u8; 3]>, threshold: WhiteThreshold) -> bool {
    let (mut total, mut background) = (0u32, 0u32);
    for rgb in samples {
        total += 1;
        if is_background(rgb, threshold) {
            background += 1;
        }
    }
    total > 0 && background as f64 / total as f64 >= BACKGROUND_RATIO
}

fn rgb_at(image: &RgbaImage, x: u32, y: u32) -> [u8; 3] {
    let [r, g, b, _] = image.get_pixel(x, y).0;
    [r, g, b]
}

struct Scanner<'a> {
    image: &'a RgbaImage,
    threshold: WhiteThreshold,
    step_x: usize,
    step_y: usize,
}

impl Scanner<'_> {
    fn row_is_background(&self, y: u32) -> bool {
        let samples = sample_positions(self.image.width(), self.step_x)
            .map(|x| rgb_at(self.image, x, y));
        line_is_background(samples, self.threshold)
    }

    fn column_is_background(&self, x: u32) -> bool {
        let samples = sample_positions(self.image.height(), self.step_y)
            .map(|y| rgb_at(self.image, x, y));
        line_is_background(samples, self.threshold)
    }
}

/// Inclusive content bounds in pixel indices, before margin conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBounds {
    pub top: i64,
    pub bottom: i64,
    pub left: i64,
    pub right: i64,
}

/// Locate the non-background content rectangle.
///
/// Falls back to the full extent on an axis whose scan collapsed (start not
/// strictly before end), so an all-white or mis-thresholded image never
/// produces an empty or inverted rectangle. A zero-sized image has nothing to
/// scan and yields its (empty) full extent.
pub fn content_bounds(image: &RgbaImage, threshold: WhiteThreshold) -> ContentBounds {
    let (width, height) = (image.width() as i64, image.height() as i64);
    if width == 0 || height == 0 {
        return ContentBounds {
            top: 0,
            bottom: height - 1,
            left: 0,
            right: width - 1,
        };
    }
    let scanner = Scanner {
        image,
        threshold,
        step_x: stride(image.width()),
        step_y: stride(image.height()),
    };

    let mut top = 0;
    while top < height && scanner.row_is_background(top as u32) {
        top += 1;
    }
    let mut bottom = height - 1;
    while bottom >= top && scanner.row_is_background(bottom as u32) {
        bottom -= 1;
    }

    let mut left = 0;
    while left < width && scanner.column_is_background(left as u32) {
        left += 1;
    }
    let mut right = width - 1;
    while right >= left && scanner.column_is_background(right as u32) {
        right -= 1;
    }

    if left >= right {
        left = 0;
        right = width - 1;
    }
    if top >= bottom {
        top = 0;
        bottom = height - 1;
    }

    ContentBounds {
        top,
        bottom,
        left,
        right,
    }
}

/// Safety margin in pixels: 0.5% of the shorter side, rounded.
pub fn safety_margin(width: u32, height: u32) -> i64 {
    (width.min(height) as f64 * SAFETY_MARGIN_RATIO).round() as i64
}

/// Detect the uniform light border and express it as edge offsets.
///
/// Pure function of pixel data and threshold. Returned offsets are clamped to
/// `[0, dimension - 1]` per side but, on pathological inputs, may still need
/// validating against the minimum-crop invariant before use.
///
/// Zero-sized images yield zero offsets.
pub fn detect(image: &RgbaImage, threshold: WhiteThreshold) -> Offsets {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Offsets::default();
    }

    let bounds = content_bounds(image, threshold);
    let margin = safety_margin(width, height);
    let (w, h) = (width as i64, height as i64);

    let offsets = Offsets {
        top: (bounds.top - margin).clamp(0, h - 1) as u32,
        bottom: (h - 1 - bounds.bottom - margin).clamp(0, h - 1) as u32,
        left: (bounds.left - margin).clamp(0, w - 1) as u32,
        right: (w - 1 - bounds.right - margin).clamp(0, w - 1) as u32,
    };

    debug!(
        width,
        height,
        threshold = threshold.value(),
        ?bounds,
        ?offsets,
        "detected border"
    );
    offsets
}
