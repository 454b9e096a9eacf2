//! Plain geometry shared by the canvas, the windows and the pointer path.
//!
//! Everything is expressed in `f64` pixels. Whether a value lives in world
//! space or screen space is a property of where it came from, not of the type;
//! [`crate::viewport::ViewportTransform`] is the only place that converts
//! between the two.

use crate::constants::{MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH, WORLD_BOUND};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// True when either side is zero, negative or not a number.
    pub fn is_degenerate(self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_parts(origin: Point, size: Size) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Splits off a band of `height` pixels from the top, returning
    /// `(band, rest)`. The band never exceeds the rect.
    pub fn split_top(&self, height: f64) -> (Rect, Rect) {
        let band = height.clamp(0.0, self.height.max(0.0));
        (
            Rect::new(self.x, self.y, self.width, band),
            Rect::new(self.x, self.y + band, self.width, self.height - band),
        )
    }

    pub fn inset(&self, margin: f64) -> Rect {
        let width = (self.width - margin * 2.0).max(0.0);
        let height = (self.height - margin * 2.0).max(0.0);
        Rect::new(self.x + margin, self.y + margin, width, height)
    }
}

/// Canonical world geometry of a window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geometry {
    pub position: Point,
    pub size: Size,
}

impl Geometry {
    pub fn new(position: Point, size: Size) -> Self {
        Self { position, size }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_parts(self.position, self.size)
    }

    /// Clamp into the world bound: size first, then the origin so the whole
    /// window stays inside `[0, WORLD_BOUND]` on both axes.
    pub fn clamped(self) -> Self {
        let width = finite_or(self.size.width, MIN_WINDOW_WIDTH).clamp(MIN_WINDOW_WIDTH, WORLD_BOUND);
        let height =
            finite_or(self.size.height, MIN_WINDOW_HEIGHT).clamp(MIN_WINDOW_HEIGHT, WORLD_BOUND);
        let x = finite_or(self.position.x, 0.0).clamp(0.0, WORLD_BOUND - width);
        let y = finite_or(self.position.y, 0.0).clamp(0.0, WORLD_BOUND - height);
        Self {
            position: Point::new(x, y),
            size: Size::new(width, height),
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_keeps_window_inside_world() {
        let g = Geometry::new(Point::new(9_900.0, -40.0), Size::new(600.0, 400.0)).clamped();
        assert_eq!(g.position, Point::new(WORLD_BOUND - 600.0, 0.0));
        assert_eq!(g.size, Size::new(600.0, 400.0));
    }

    #[test]
    fn clamped_bounds_oversized_and_nan() {
        let g = Geometry::new(Point::new(f64::NAN, 5.0), Size::new(50_000.0, 1.0)).clamped();
        assert_eq!(g.size.width, WORLD_BOUND);
        assert_eq!(g.size.height, MIN_WINDOW_HEIGHT);
        assert_eq!(g.position.x, 0.0);
    }

    #[test]
    fn degenerate_sizes() {
        assert!(Size::new(0.0, 10.0).is_degenerate());
        assert!(Size::new(10.0, f64::NAN).is_degenerate());
        assert!(!Size::new(1.0, 1.0).is_degenerate());
    }

    #[test]
    fn split_top_clamps_band() {
        let (band, rest) = Rect::new(0.0, 0.0, 100.0, 10.0).split_top(16.0);
        assert_eq!(band.height, 10.0);
        assert_eq!(rest.height, 0.0);
    }
}
