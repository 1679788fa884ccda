//! Integer bounding boxes and coordinate rescaling.

use serde::{Deserialize, Serialize};

/// An axis-aligned box in pixel coordinates.
///
/// `(x, y)` is the top-left corner. Raw detector output may carry
/// non-positive sizes; the validator rejects those before grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a box from its edges. Inverted edges yield an empty box.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        let extent = |lo: i32, hi: i32| (hi as i64 - lo as i64).clamp(0, i32::MAX as i64) as i32;
        Self {
            x: left,
            y: top,
            width: extent(left, right),
            height: extent(top, bottom),
        }
    }

    /// Right edge (exclusive), saturating at `i32::MAX`.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive), saturating at `i32::MAX`.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Whether the far edges fit in `i32` without saturating.
    pub fn edges_representable(&self) -> bool {
        self.x.checked_add(self.width).is_some() && self.y.checked_add(self.height).is_some()
    }

    /// Area in square pixels; zero for empty boxes.
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Center point.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Area shared with `other`; zero when the boxes do not overlap.
    pub fn intersection_area(&self, other: &BoundingBox) -> i64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return 0;
        }
        (right as i64 - left as i64) * (bottom as i64 - top as i64)
    }

    /// Intersection over union, in `[0, 1]`.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let intersection = self.intersection_area(other);
        if intersection == 0 {
            return 0.0;
        }
        let union = self.area() + other.area() - intersection;
        if union <= 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }

    /// Grow the box by `fraction` of its width/height on every side.
    pub fn padded(&self, fraction: f64) -> BoundingBox {
        let pad_x = (self.width as f64 * fraction) as i32;
        let pad_y = (self.height as f64 * fraction) as i32;
        BoundingBox::from_edges(
            self.x.saturating_sub(pad_x),
            self.y.saturating_sub(pad_y),
            self.right().saturating_add(pad_x),
            self.bottom().saturating_add(pad_y),
        )
    }

    /// Clip to `[0, width) x [0, height)`. May return an empty box.
    pub fn clipped(&self, width: u32, height: u32) -> BoundingBox {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);
        BoundingBox::from_edges(
            self.x.clamp(0, max_x),
            self.y.clamp(0, max_y),
            self.right().clamp(0, max_x),
            self.bottom().clamp(0, max_y),
        )
    }
}

/// Maps boxes from one resolution to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxScaler {
    sx: f64,
    sy: f64,
}

impl BoxScaler {
    /// Scaler from a `from` resolution to a `to` resolution, both `(width, height)`.
    pub fn new(from: (u32, u32), to: (u32, u32)) -> Self {
        let ratio = |target: u32, source: u32| {
            if source == 0 {
                1.0
            } else {
                target as f64 / source as f64
            }
        };
        Self {
            sx: ratio(to.0, from.0),
            sy: ratio(to.1, from.1),
        }
    }

    /// Scale a box. Edges are scaled independently so adjacent boxes stay adjacent.
    pub fn scale(&self, bbox: &BoundingBox) -> BoundingBox {
        let left = (bbox.x as f64 * self.sx).round() as i32;
        let top = (bbox.y as f64 * self.sy).round() as i32;
        let right = (bbox.right() as f64 * self.sx).round() as i32;
        let bottom = (bbox.bottom() as f64 * self.sy).round() as i32;
        BoundingBox::from_edges(left, top, right, bottom)
    }
}
