//! Pixel-space geometry shared by the editor and persisted annotation shapes.
//!
//! The editor describes boxes as top-left corner plus extent; the backend
//! stores opposite corners `[x_min, y_min, x_max, y_max]`. Conversions here
//! always recompute min/max so inverted inputs come out ordered.

use serde::{Deserialize, Serialize};

/// Opposite-corner box `[x_min, y_min, x_max, y_max]` as stored by the backend.
pub type Corners = [f64; 4];

/// A single vertex in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Top-left corner plus extent, as drawn on the canvas.
///
/// `width`/`height` may be negative when a box was dragged up or left;
/// [`BoundingBox::to_corners`] normalises that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert to ordered opposite corners.
    pub fn to_corners(&self) -> Corners {
        normalize_corners([self.x, self.y, self.x + self.width, self.y + self.height])
    }

    /// Build a box from opposite corners, ordering them first so the
    /// resulting extent is never negative.
    pub fn from_corners(corners: Corners) -> Self {
        let [x_min, y_min, x_max, y_max] = normalize_corners(corners);
        Self {
            x: x_min,
            y: y_min,
            width: x_max - x_min,
            height: y_max - y_min,
        }
    }

    pub fn area(&self) -> f64 {
        (self.width * self.height).abs()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// Reorder a corner array so that `x_min <= x_max` and `y_min <= y_max`.
pub fn normalize_corners([x0, y0, x1, y1]: Corners) -> Corners {
    [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)]
}

/// Minimal axis-aligned bounds of a point set.
///
/// An empty point set yields `[0, 0, 0, 0]`.
pub fn polygon_bounds(points: &[Point]) -> Corners {
    let Some(first) = points.first() else {
        return [0.0; 4];
    };
    points.iter().skip(1).fold(
        [first.x, first.y, first.x, first.y],
        |[x_min, y_min, x_max, y_max], p| {
            [x_min.min(p.x), y_min.min(p.y), x_max.max(p.x), y_max.max(p.y)]
        },
    )
}

/// Flatten vertices into `[x1, y1, x2, y2, ...]`, keeping vertex order.
pub fn flatten_points(points: &[Point]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, p.y]).collect()
}

/// Regroup a flat coordinate sequence into consecutive vertex pairs.
///
/// A dangling trailing value (odd-length input) is dropped.
pub fn pair_points(flat: &[f64]) -> Vec<Point> {
    flat.chunks_exact(2).map(|xy| Point::new(xy[0], xy[1])).collect()
}

/// Unsigned area of the implicitly closed polygon (shoelace formula).
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    (twice / 2.0).abs()
}
