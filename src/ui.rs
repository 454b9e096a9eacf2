//! UiFrame: a thin wrapper around `ratatui::Frame` that clamps drawing to the
//! visible area.
//!
//! Window frames and surfaces are positioned in canvas pixels, so after the
//! viewport transform they routinely land partly (or entirely) off screen.
//! Every draw call here takes signed host-cell coordinates and silently drops
//! whatever falls outside the buffer. Writing out-of-bounds into a `Buffer`
//! panics, so nothing else in the crate writes to one directly.
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::Widget;

use crate::constants::{HOST_CELL_HEIGHT_PX, HOST_CELL_WIDTH_PX};
use crate::geometry;

/// A rectangle of host cells whose origin may be negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellRect {
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
}

impl CellRect {
    pub const fn new(x: i32, y: i32, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Snaps a screen-pixel rectangle to the host cells it covers. Both edges
    /// round to the nearest cell boundary so adjacent rects never overlap.
    pub fn from_px(rect: geometry::Rect) -> Self {
        let x0 = (rect.x / HOST_CELL_WIDTH_PX).round();
        let y0 = (rect.y / HOST_CELL_HEIGHT_PX).round();
        let x1 = (rect.right() / HOST_CELL_WIDTH_PX).round();
        let y1 = (rect.bottom() / HOST_CELL_HEIGHT_PX).round();
        Self {
            x: clamp_i32(x0),
            y: clamp_i32(y0),
            width: (x1 - x0).clamp(0.0, u16::MAX as f64) as u16,
            height: (y1 - y0).clamp(0.0, u16::MAX as f64) as u16,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

fn clamp_i32(value: f64) -> i32 {
    value.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// Wrapper around `ratatui::Frame` that clamps drawing to the visible area.
pub struct UiFrame<'a> {
    area: Rect,
    buffer: &'a mut Buffer,
}

impl<'a> UiFrame<'a> {
    pub fn new(frame: &'a mut Frame<'_>) -> Self {
        let area = frame.area();
        let buffer = frame.buffer_mut();
        Self { area, buffer }
    }

    /// Construct a `UiFrame` directly from an area and buffer.
    pub fn from_parts(area: Rect, buffer: &'a mut Buffer) -> Self {
        Self { area, buffer }
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        self.buffer
    }

    fn clip_rect(&self, rect: Rect) -> Option<Rect> {
        let clipped = rect.intersection(self.area);
        if clipped.width == 0 || clipped.height == 0 {
            None
        } else {
            Some(clipped)
        }
    }

    /// Intersects a signed cell rect with the frame area.
    pub fn clip(&self, rect: CellRect) -> Option<Rect> {
        let x0 = rect.x.max(self.area.x as i32);
        let y0 = rect.y.max(self.area.y as i32);
        let x1 = rect.right().min(self.area.right() as i32);
        let y1 = rect.bottom().min(self.area.bottom() as i32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(
            x0 as u16,
            y0 as u16,
            (x1 - x0) as u16,
            (y1 - y0) as u16,
        ))
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.area.x as i32
            && y >= self.area.y as i32
            && x < self.area.right() as i32
            && y < self.area.bottom() as i32
    }

    pub fn render_widget<W>(&mut self, widget: W, area: Rect)
    where
        W: Widget,
    {
        if let Some(clipped) = self.clip_rect(area) {
            widget.render(clipped, self.buffer);
        }
    }

    /// Writes one symbol at a signed cell position, if it is visible.
    pub fn set_cell(&mut self, x: i32, y: i32, symbol: &str, style: Style) {
        if !self.contains(x, y) {
            return;
        }
        if let Some(cell) = self.buffer.cell_mut((x as u16, y as u16)) {
            cell.set_symbol(symbol);
            cell.set_style(style);
        }
    }

    /// Fills the visible part of `rect` with `symbol`.
    pub fn fill(&mut self, rect: CellRect, symbol: &str, style: Style) {
        let Some(clipped) = self.clip(rect) else {
            return;
        };
        for y in clipped.top()..clipped.bottom() {
            for x in clipped.left()..clipped.right() {
                if let Some(cell) = self.buffer.cell_mut((x, y)) {
                    cell.set_symbol(symbol);
                    cell.set_style(style);
                }
            }
        }
    }

    /// Writes `text` starting at a signed position, dropping characters that
    /// fall left or right of the frame.
    pub fn set_string(&mut self, x: i32, y: i32, text: &str, style: Style) {
        if y < self.area.y as i32 || y >= self.area.bottom() as i32 {
            return;
        }
        let mut buf = [0u8; 4];
        for (offset, ch) in text.chars().enumerate() {
            let cx = x.saturating_add(offset as i32);
            if cx >= self.area.right() as i32 {
                break;
            }
            self.set_cell(cx, y, ch.encode_utf8(&mut buf), style);
        }
    }
}

pub(crate) fn truncate_to_width(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    value.chars().take(width).collect()
}
