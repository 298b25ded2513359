//! Rectangles in the two coordinate systems the annotator juggles.
//!
//! Detection works in raster space (`row`, `col`), while the viewer reports scene
//! coordinates where `x` is the column and `y` the row. [`BoundingBox`] is the
//! former, [`PixelRect`] and [`SceneRect`] the latter.

use std::ops::Range;

use image::math::Rect;
use imageproc::point::Point;
use num_traits::{Num, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Half-open box in raster coordinates, as produced by blob detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub row_start: u32,
    pub row_stop: u32,
    pub col_start: u32,
    pub col_stop: u32,
}

impl BoundingBox {
    pub fn new(row_start: u32, row_stop: u32, col_start: u32, col_stop: u32) -> Self {
        Self {
            row_start,
            row_stop,
            col_start,
            col_stop,
        }
    }

    pub fn height(&self) -> u32 {
        self.row_stop.saturating_sub(self.row_start)
    }

    pub fn width(&self) -> u32 {
        self.col_stop.saturating_sub(self.col_start)
    }

    /// Pixel area of the box, computed in `usize` so large rasters cannot overflow.
    pub fn area(&self) -> usize {
        self.height() as usize * self.width() as usize
    }

    /// Integer midpoint as scene `(x, y)`.
    pub fn center(&self) -> (u32, u32) {
        (
            self.col_start + self.width() / 2,
            self.row_start + self.height() / 2,
        )
    }

    /// The same region expressed in scene coordinates.
    pub fn to_pixel_rect(&self) -> PixelRect {
        PixelRect {
            min_x: self.col_start,
            min_y: self.row_start,
            max_x: self.col_stop,
            max_y: self.row_stop,
        }
    }
}

impl From<BoundingBox> for Rect {
    fn from(bbox: BoundingBox) -> Self {
        Rect {
            x: bbox.col_start,
            y: bbox.row_start,
            width: bbox.width(),
            height: bbox.height(),
        }
    }
}

/// Normalised integer rectangle in scene coordinates (`x` = column, `y` = row).
///
/// `min` is inclusive and `max` exclusive when used to slice a raster, so a
/// rectangle with `min_x == max_x` covers no pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl PixelRect {
    pub fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Builds the rectangle spanned by a press and a release point.
    ///
    /// The drag may go in any direction; min and max are sorted out here.
    /// Generic over integer and floating scene points. Negative coordinates
    /// clamp to 0 and fractional ones truncate.
    pub fn from_corners<T>(start: Point<T>, end: Point<T>) -> Self
    where
        T: Copy + PartialOrd + Num + ToPrimitive,
    {
        // `T` is only `PartialOrd`, so no `min`/`max` from `Ord`.
        let (min_x, max_x) = if start.x < end.x {
            (start.x, end.x)
        } else {
            (end.x, start.x)
        };
        let (min_y, max_y) = if start.y < end.y {
            (start.y, end.y)
        } else {
            (end.y, start.y)
        };

        Self {
            min_x: min_x.to_u32().unwrap_or(0),
            min_y: min_y.to_u32().unwrap_or(0),
            max_x: max_x.to_u32().unwrap_or(0),
            max_y: max_y.to_u32().unwrap_or(0),
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Raster rows covered, i.e. the `y` span.
    pub fn rows(&self) -> Range<u32> {
        self.min_y..self.max_y.max(self.min_y)
    }

    /// Raster columns covered, i.e. the `x` span.
    pub fn cols(&self) -> Range<u32> {
        self.min_x..self.max_x.max(self.min_x)
    }

    /// Strict interior test, so a click exactly on the outline misses.
    pub fn contains<T: ToPrimitive>(&self, point: Point<T>) -> bool {
        let (Some(x), Some(y)) = (point.x.to_f64(), point.y.to_f64()) else {
            return false;
        };
        f64::from(self.min_x) < x
            && x < f64::from(self.max_x)
            && f64::from(self.min_y) < y
            && y < f64::from(self.max_y)
    }
}

/// Visible part of the scene, upper-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneRect {
    pub ul_x: f64,
    pub ul_y: f64,
    pub br_x: f64,
    pub br_y: f64,
}

impl SceneRect {
    pub fn new(ul_x: f64, ul_y: f64, br_x: f64, br_y: f64) -> Self {
        Self {
            ul_x,
            ul_y,
            br_x,
            br_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.br_x - self.ul_x
    }

    pub fn height(&self) -> f64 {
        self.br_y - self.ul_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.ul_x + self.br_x) / 2.0,
            (self.ul_y + self.br_y) / 2.0,
        )
    }

    /// Same size, translated so its centre lands on `(x, y)`.
    pub fn centered_on(&self, x: f64, y: f64) -> Self {
        let half_w = self.width() / 2.0;
        let half_h = self.height() / 2.0;
        Self {
            ul_x: x - half_w,
            ul_y: y - half_h,
            br_x: x + half_w,
            br_y: y + half_h,
        }
    }

    /// Maps the view onto a `width` x `height` raster.
    ///
    /// Edges round outward to whole pixels and are clamped to the raster, so a
    /// view lying entirely off the image maps to an empty rectangle.
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> PixelRect {
        let clamp = |v: f64, limit: u32| v.clamp(0.0, f64::from(limit)) as u32;

        let min_x = clamp(self.ul_x.min(self.br_x).floor(), width);
        let min_y = clamp(self.ul_y.min(self.br_y).floor(), height);
        let max_x = clamp(self.ul_x.max(self.br_x).ceil(), width);
        let max_y = clamp(self.ul_y.max(self.br_y).ceil(), height);

        PixelRect {
            min_x,
            min_y,
            max_x: max_x.max(min_x),
            max_y: max_y.max(min_y),
        }
    }
}
