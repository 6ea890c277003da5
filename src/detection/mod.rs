//! Automatic border detection.
//!
//! | Step | Function |
//! |---|---|
//! | Classify one pixel | [`is_background`] |
//! | Find content rectangle | [`border::content_bounds`] |
//! | Convert to offsets with safety margin | [`detect`] |

pub mod border;
mod classifier;

pub use border::detect;
pub use classifier::{WhiteThreshold, is_background, luminance};
