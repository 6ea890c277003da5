//! Background pixel classification.
//!
//! A pixel belongs to the margin when it is bright *and* close to neutral.
//! Brightness is judged by Rec. 709 luminance; neutrality by the smallest
//! channel, with a second, looser rule that accepts a slight warm or cool
//! cast as long as the brightest channel clears the threshold.

use serde::{Deserialize, Serialize};

/// Luminance threshold above which a pixel may count as background.
///
/// Always within [`WhiteThreshold::MIN`]..=[`WhiteThreshold::MAX`]; values
/// outside that range are clamped on construction so the classifier never
/// sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct WhiteThreshold(u8);

impl WhiteThreshold {
    pub const MIN: u8 = 200;
    pub const MAX: u8 = 254;
    pub const DEFAULT: u8 = 245;

    pub fn new(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for WhiteThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl From<i64> for WhiteThreshold {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<WhiteThreshold> for i64 {
    fn from(threshold: WhiteThreshold) -> Self {
        threshold.0 as i64
    }
}

/// Slack below the threshold tolerated on the darkest channel of a neutral pixel.
const NEUTRAL_SLACK: i32 = 12;
/// Brightest channel must exceed the threshold by this much for a tinted pixel.
const TINT_PEAK: i32 = 4;
/// Slack below the threshold tolerated on the darkest channel of a tinted pixel.
const TINT_SLACK: i32 = 20;

/// Perceptual luminance (Rec. 709 weights).
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64
}

/// Whether an RGB pixel counts as part of the light margin.
///
/// ```
/// # use cardcrop::detection::{WhiteThreshold, is_background};
/// let t = WhiteThreshold::new(245);
/// assert!(is_background([250, 250, 250], t));
/// assert!(!is_background([255, 255, 0], t));
/// ```
pub fn is_background(rgb: [u8; 3], threshold: WhiteThreshold) -> bool {
    let [r, g, b] = rgb;
    let t = threshold.value() as i32;

    if luminance(r, g, b) < t as f64 {
        return false;
    }

    let min = r.min(g).min(b) as i32;
    let max = r.max(g).max(b) as i32;

    min >= t - NEUTRAL_SLACK || (max >= t + TINT_PEAK && min >= t - TINT_SLACK)
}
