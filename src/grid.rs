//! Pixel box -> character grid fitting.

use std::fmt;

use crate::constants::{DEFAULT_FONT_SIZE, MAX_FONT_SIZE, MIN_FONT_SIZE};
use crate::geometry::Size;

/// Character grid a terminal emulator and its PTY agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridSize {
    pub cols: u16,
    pub rows: u16,
}

impl GridSize {
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Pixel size of one character cell for the active font.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub width: f64,
    pub height: f64,
}

impl CellMetrics {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub size: f64,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "monospace".to_string(),
            size: DEFAULT_FONT_SIZE,
        }
    }
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size: f64) -> Self {
        Self {
            family: family.into(),
            size: clamp_font_size(size),
        }
    }

    pub fn with_size(&self, size: f64) -> Self {
        Self {
            family: self.family.clone(),
            size: clamp_font_size(size),
        }
    }

    /// Approximate advance/line metrics for a monospace family. Families we
    /// know to run wider or narrower than the 0.6em default get their own
    /// advance factor.
    pub fn metrics(&self) -> CellMetrics {
        let family = self.family.to_ascii_lowercase();
        let advance = match family.as_str() {
            "iosevka" | "iosevka term" => 0.5,
            "jetbrains mono" | "fira code" | "fira mono" => 0.6,
            "courier" | "courier new" => 0.6,
            "menlo" | "monaco" | "dejavu sans mono" => 0.602,
            _ => 0.6,
        };
        CellMetrics::new(
            (self.size * advance).round().max(1.0),
            (self.size * 1.2).round().max(1.0),
        )
    }
}

fn clamp_font_size(size: f64) -> f64 {
    if size.is_finite() {
        size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
    } else {
        DEFAULT_FONT_SIZE
    }
}

/// Derives an exact grid from a laid-out pixel box.
///
/// A box that has not been laid out (zero, negative or NaN on either axis)
/// produces no fit; the caller is expected to retry later rather than send a
/// degenerate size.
pub fn fit(container: Size, metrics: CellMetrics) -> Option<GridSize> {
    if container.is_degenerate() || !(metrics.width > 0.0 && metrics.height > 0.0) {
        return None;
    }
    let cols = (container.width / metrics.width).floor();
    let rows = (container.height / metrics.height).floor();
    Some(GridSize::new(to_axis(cols), to_axis(rows)))
}

fn to_axis(value: f64) -> u16 {
    value.clamp(1.0, u16::MAX as f64) as u16
}
