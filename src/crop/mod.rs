//! Crop geometry: per-image offsets, the manual edit rule, and adapting a
//! reference crop to differently sized images.

mod offsets;
mod reconcile;

pub use offsets::{Axis, Dimensions, Edge, MIN_CROP_PIXELS, Offsets, apply_edit};
pub use reconcile::{adapt, fit_pair_to_limit};
