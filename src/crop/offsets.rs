//! Crop offsets and the interactive edit rule.
//!
//! An [`Offsets`] value is the distance, in source pixels, to crop inward from
//! each edge. A usable crop keeps at least [`MIN_CROP_PIXELS`] on both axes:
//! `left + right < width` and `top + bottom < height`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest crop region, in pixels, any offset rule may leave on an axis.
pub const MIN_CROP_PIXELS: u32 = 1;

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Length of the axis an edge's offset is measured along.
    pub fn along(self, edge: Edge) -> u32 {
        match edge.axis() {
            Axis::Vertical => self.height,
            Axis::Horizontal => self.width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// top/bottom, measured over height
    Vertical,
    /// left/right, measured over width
    Horizontal,
}

/// One side of the crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Top, Edge::Bottom, Edge::Left, Edge::Right];

    pub fn axis(self) -> Axis {
        match self {
            Edge::Top | Edge::Bottom => Axis::Vertical,
            Edge::Left | Edge::Right => Axis::Horizontal,
        }
    }

    /// The other edge on the same axis.
    pub fn opposite(self) -> Edge {
        match self {
            Edge::Top => Edge::Bottom,
            Edge::Bottom => Edge::Top,
            Edge::Left => Edge::Right,
            Edge::Right => Edge::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Edge::Top => "top",
            Edge::Bottom => "bottom",
            Edge::Left => "left",
            Edge::Right => "right",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Edge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(Edge::Top),
            "bottom" => Ok(Edge::Bottom),
            "left" => Ok(Edge::Left),
            "right" => Ok(Edge::Right),
            other => Err(format!("unknown edge '{other}'")),
        }
    }
}

/// Per-edge crop distances in source pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offsets {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Offsets {
    pub fn uniform(value: u32) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }

    pub fn get(&self, edge: Edge) -> u32 {
        match edge {
            Edge::Top => self.top,
            Edge::Bottom => self.bottom,
            Edge::Left => self.left,
            Edge::Right => self.right,
        }
    }

    pub fn set(&mut self, edge: Edge, value: u32) {
        match edge {
            Edge::Top => self.top = value,
            Edge::Bottom => self.bottom = value,
            Edge::Left => self.left = value,
            Edge::Right => self.right = value,
        }
    }

    /// Whether at least one pixel survives the crop on both axes.
    pub fn is_valid_for(&self, dims: Dimensions) -> bool {
        (self.left as u64 + self.right as u64) < dims.width as u64
            && (self.top as u64 + self.bottom as u64) < dims.height as u64
    }

    /// Clamp every side independently into `[0, dimension - 1]`.
    pub fn clamped_to(&self, dims: Dimensions) -> Self {
        let clamp = |v: u32, dim: u32| v.min(dim.saturating_sub(1));
        Self {
            top: clamp(self.top, dims.height),
            bottom: clamp(self.bottom, dims.height),
            left: clamp(self.left, dims.width),
            right: clamp(self.right, dims.width),
        }
    }
}

impl fmt::Display for Offsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "top {}, bottom {}, left {}, right {}",
            self.top, self.bottom, self.left, self.right
        )
    }
}

/// Set one side to a user-supplied value and repair the same axis if needed.
///
/// The value is clamped to `[0, dimension - 1]` for the edge's axis. If the
/// crop on that axis then drops below [`MIN_CROP_PIXELS`], the *opposite*
/// side is reduced just enough to restore it. The opposite side is never
/// increased and the other axis is untouched.
pub fn apply_edit(offsets: Offsets, edge: Edge, value: i64, dims: Dimensions) -> Offsets {
    let dim = dims.along(edge) as i64;
    let max = (dim - 1).max(0);
    let mut next = offsets;
    let edited = value.clamp(0, max);
    next.set(edge, edited as u32);

    let opposite = edge.opposite();
    let remaining = dim - edited - next.get(opposite) as i64;
    if remaining < MIN_CROP_PIXELS as i64 {
        let repaired = (dim - MIN_CROP_PIXELS as i64 - edited).clamp(0, max);
        next.set(opposite, repaired as u32);
    }
    next
}
