//! Adapting one image's crop to another image's dimensions.
//!
//! When a batch propagates the reference crop, every target image may have a
//! different size. The template is clamped side by side, then each opposite
//! pair is squeezed into a shared budget of `dimension - 1` pixels so the
//! crop on that axis never collapses.

use super::offsets::{Dimensions, MIN_CROP_PIXELS, Offsets};

/// Fit an opposite pair of offsets into `a + b <= limit`.
///
/// Overflow is taken from both values in proportion to their share of the
/// total. If rounding leaves any excess (one value already at its floor), it
/// comes out of `b` first and then `a`. A zero limit forces both to zero.
///
/// ```
/// # use cardcrop::crop::fit_pair_to_limit;
/// assert_eq!(fit_pair_to_limit(3, 4, 10), (3, 4));
/// assert_eq!(fit_pair_to_limit(7, 7, 7), (3, 4));
/// assert_eq!(fit_pair_to_limit(5, 5, 0), (0, 0));
/// ```
pub fn fit_pair_to_limit(a: u32, b: u32, limit: u32) -> (u32, u32) {
    if limit == 0 {
        return (0, 0);
    }

    let (a, b, limit) = (a as i64, b as i64, limit as i64);
    let total = a + b;
    if total <= limit {
        return (a as u32, b as u32);
    }

    let overflow = total - limit;
    let reduce_a = (overflow as f64 * a as f64 / total as f64).round() as i64;
    let reduce_b = overflow - reduce_a;

    let mut a = (a - reduce_a).clamp(0, limit);
    let mut b = (b - reduce_b).clamp(0, limit);

    if a + b > limit {
        let excess = a + b - limit;
        if b >= excess {
            b -= excess;
        } else {
            let rest = excess - b;
            b = 0;
            a = (a - rest).max(0);
        }
    }

    (a as u32, b as u32)
}

/// Adapt template offsets to a target of different dimensions.
///
/// Each side is first clamped into `[0, dimension - 1]`, then top/bottom and
/// left/right are independently fitted to `dimension - 1` so at least
/// [`MIN_CROP_PIXELS`] survive on both axes.
pub fn adapt(template: Offsets, target: Dimensions) -> Offsets {
    let clamped = template.clamped_to(target);
    let limit = |dim: u32| dim.saturating_sub(MIN_CROP_PIXELS);

    let (top, bottom) = fit_pair_to_limit(clamped.top, clamped.bottom, limit(target.height));
    let (left, right) = fit_pair_to_limit(clamped.left, clamped.right, limit(target.width));

    Offsets {
        top,
        bottom,
        left,
        right,
    }
}
