//! vt100-backed terminal surface for the host binary.
//!
//! The emulator is laid out in layout pixels (its grid times the font's cell
//! metrics) and painted into host cells by sampling: every host cell shows the
//! emulator cell under its top-left corner. Pointer events reach it already corrected,
//! so mapping a position to a cell only needs the surface origin.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::{Color as TColor, Modifier, Style};
use vt100::{MouseProtocolEncoding, MouseProtocolMode};

use crate::constants::{HOST_CELL_HEIGHT_PX, HOST_CELL_WIDTH_PX};
use crate::geometry::Point;
use crate::grid::{CellMetrics, GridSize};
use crate::pointer::{PointerButton, PointerEvent, PointerKind, PointerTarget, SurfaceMetrics};
use crate::ui::{CellRect, UiFrame};

const DEFAULT_SCROLLBACK_LEN: usize = 2000;

/// Replayed into a fresh parser on resize, so it is capped.
const MAX_HISTORY_CAP: usize = 2 * 1024 * 1024;
const PRUNE_TARGET: usize = 1024 * 1024;

const DSR_QUERY: &str = "\x1b[6n";

pub struct Emulator {
    parser: vt100::Parser,
    history: Vec<u8>,
    grid: GridSize,
    /// Bytes the emulator wants written to the PTY: mouse reports and
    /// cursor position replies.
    outgoing: Vec<u8>,
    surface_origin: Point,
    cell: CellMetrics,
    held: Option<PointerButton>,
    last_pointer_cell: Option<(u16, u16)>,
}

impl Emulator {
    pub fn new(grid: GridSize, cell: CellMetrics) -> Self {
        Self {
            parser: vt100::Parser::new(grid.rows, grid.cols, DEFAULT_SCROLLBACK_LEN),
            history: Vec::new(),
            grid,
            outgoing: Vec::new(),
            surface_origin: Point::ORIGIN,
            cell,
            held: None,
            last_pointer_cell: None,
        }
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }

    pub fn alternate_screen(&self) -> bool {
        self.parser.screen().alternate_screen()
    }

    /// Cell the last pointer event landed on.
    pub fn last_pointer_cell(&self) -> Option<(u16, u16)> {
        self.last_pointer_cell
    }

    pub fn process(&mut self, data: &str) {
        let bytes = data.as_bytes();
        self.history.extend_from_slice(bytes);
        if self.history.len() > MAX_HISTORY_CAP {
            let prune_amount = self.history.len() - PRUNE_TARGET;
            // Cut at a newline when one is close.
            let search_end = (prune_amount + 1024).min(self.history.len());
            let cut_index = self.history[prune_amount..search_end]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| prune_amount + i + 1)
                .unwrap_or(prune_amount);
            self.history.drain(0..cut_index);
        }
        self.parser.process(bytes);
        if data.contains(DSR_QUERY) {
            let (row, col) = self.parser.screen().cursor_position();
            let reply = format!("\x1b[{};{}R", row.saturating_add(1), col.saturating_add(1));
            self.outgoing.extend_from_slice(reply.as_bytes());
        }
    }

    /// Applies a new local grid immediately by replaying history into a parser
    /// of the new size. The PTY hears about it later, after the debounce.
    pub fn resize(&mut self, grid: GridSize) {
        if grid == self.grid || grid.cols == 0 || grid.rows == 0 {
            return;
        }
        let mut parser = vt100::Parser::new(grid.rows, grid.cols, DEFAULT_SCROLLBACK_LEN);
        parser.process(&self.history);
        self.parser = parser;
        self.grid = grid;
    }

    pub fn set_cell_metrics(&mut self, cell: CellMetrics) {
        self.cell = cell;
    }

    pub fn set_surface_origin(&mut self, origin: Point) {
        self.surface_origin = origin;
    }

    pub fn take_outgoing(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outgoing)
    }

    /// Maps a (corrected) client position to a grid cell.
    pub fn cell_at(&self, client: Point) -> Option<(u16, u16)> {
        let x = (client.x - self.surface_origin.x) / self.cell.width;
        let y = (client.y - self.surface_origin.y) / self.cell.height;
        if !(x >= 0.0 && y >= 0.0) {
            return None;
        }
        let (col, row) = (x.floor(), y.floor());
        if col >= self.grid.cols as f64 || row >= self.grid.rows as f64 {
            return None;
        }
        Some((col as u16, row as u16))
    }

    /// Paints the screen into the host cells covering `surface.visual`.
    pub fn render(&mut self, frame: &mut UiFrame<'_>, surface: &SurfaceMetrics, focused: bool) {
        self.surface_origin = surface.visual.origin();
        let Some((rx, ry)) = surface.scale_ratio() else {
            return;
        };
        // Only the on-screen part is sampled; a zoomed-in window can cover
        // millions of host cells.
        let Some(area) = frame.clip(CellRect::from_px(surface.visual)) else {
            return;
        };
        let screen = self.parser.screen();
        let cursor = (focused && !screen.hide_cursor()).then(|| screen.cursor_position());
        for cy in area.top() as i32..area.bottom() as i32 {
            for cx in area.left() as i32..area.right() as i32 {
                let corner = Point::new(
                    cx as f64 * HOST_CELL_WIDTH_PX,
                    cy as f64 * HOST_CELL_HEIGHT_PX,
                );
                let layout_x = (corner.x - surface.visual.x) / rx;
                let layout_y = (corner.y - surface.visual.y) / ry;
                let col = (layout_x / self.cell.width).floor();
                let row = (layout_y / self.cell.height).floor();
                let in_grid = col >= 0.0
                    && row >= 0.0
                    && col < self.grid.cols as f64
                    && row < self.grid.rows as f64;
                let Some(cell) = in_grid
                    .then(|| screen.cell(row as u16, col as u16))
                    .flatten()
                else {
                    frame.set_cell(cx, cy, " ", Style::default());
                    continue;
                };
                let mut symbol = cell.contents().chars().next().unwrap_or(' ');
                if cell.is_wide_continuation() {
                    symbol = ' ';
                }
                let mut style = cell_style(cell, screen);
                if cursor == Some((row as u16, col as u16)) {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                let mut buf = [0u8; 4];
                frame.set_cell(cx, cy, symbol.encode_utf8(&mut buf), style);
            }
        }
    }
}

impl PointerTarget for Emulator {
    fn dispatch_pointer(&mut self, event: &PointerEvent) {
        match event.kind {
            PointerKind::Down => self.held = Some(event.button),
            PointerKind::Up => self.held = None,
            _ => {}
        }
        let Some((col, row)) = self.cell_at(event.client) else {
            return;
        };
        self.last_pointer_cell = Some((col, row));
        // Only forward when the nested app opted in to SGR mouse reporting.
        let screen = self.parser.screen();
        if screen.mouse_protocol_encoding() != MouseProtocolEncoding::Sgr {
            return;
        }
        let dragging = self.held.is_some_and(|b| b != PointerButton::None);
        if !mouse_event_allowed(screen.mouse_protocol_mode(), event.kind, dragging) {
            return;
        }
        let held = self.held.unwrap_or_default();
        if let Some(bytes) = pointer_to_sgr(event, held, col, row) {
            self.outgoing.extend_from_slice(&bytes);
        }
    }
}

pub fn key_to_bytes(key: KeyEvent) -> Vec<u8> {
    match key.code {
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL)
                && let Some(byte) = ctrl_char(c)
            {
                return vec![byte];
            }
            let mut bytes = c.to_string().into_bytes();
            if key.modifiers.contains(KeyModifiers::ALT) {
                bytes.insert(0, 0x1b);
            }
            bytes
        }
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        _ => Vec::new(),
    }
}

fn ctrl_char(c: char) -> Option<u8> {
    let c = c.to_ascii_lowercase();
    if c.is_ascii_lowercase() {
        Some((c as u8) - b'a' + 1)
    } else {
        None
    }
}

fn mouse_event_allowed(mode: MouseProtocolMode, kind: PointerKind, dragging: bool) -> bool {
    use PointerKind::*;
    match mode {
        MouseProtocolMode::None => false,
        MouseProtocolMode::Press => matches!(kind, Down | Wheel),
        MouseProtocolMode::PressRelease => matches!(kind, Down | Up | Wheel),
        MouseProtocolMode::ButtonMotion => {
            matches!(kind, Down | Up | Wheel) || (kind == Move && dragging)
        }
        MouseProtocolMode::AnyMotion => matches!(kind, Down | Up | Wheel | Move),
    }
}

fn button_code(button: PointerButton) -> u8 {
    match button {
        PointerButton::Primary | PointerButton::None => 0,
        PointerButton::Middle => 1,
        PointerButton::Secondary => 2,
    }
}

fn pointer_to_sgr(event: &PointerEvent, held: PointerButton, col: u16, row: u16) -> Option<Vec<u8>> {
    let (mut code, release) = match event.kind {
        PointerKind::Down => (button_code(event.button), false),
        PointerKind::Up => (button_code(event.button), true),
        PointerKind::Move if held != PointerButton::None => (32 + button_code(held), false),
        PointerKind::Move => (35, false),
        PointerKind::Wheel if event.wheel.y < 0.0 => (64, false),
        PointerKind::Wheel if event.wheel.y > 0.0 => (65, false),
        PointerKind::Wheel if event.wheel.x < 0.0 => (66, false),
        PointerKind::Wheel if event.wheel.x > 0.0 => (67, false),
        _ => return None,
    };
    if event.modifiers.shift {
        code |= 4;
    }
    if event.modifiers.alt {
        code |= 8;
    }
    if event.modifiers.ctrl {
        code |= 16;
    }
    let action = if release { 'm' } else { 'M' };
    let col = col.saturating_add(1);
    let row = row.saturating_add(1);
    Some(format!("\x1b[<{};{};{}{}", code, col, row, action).into_bytes())
}

fn cell_style(cell: &vt100::Cell, screen: &vt100::Screen) -> Style {
    let (fg, bg) = resolve_colors(cell, screen);
    let mut style = Style::default();
    if let Some(fg) = fg {
        style = style.fg(fg);
    }
    if let Some(bg) = bg {
        style = style.bg(bg);
    }
    if cell.bold() {
        style = style.add_modifier(Modifier::BOLD);
    }
    if cell.dim() {
        style = style.add_modifier(Modifier::DIM);
    }
    if cell.italic() {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if cell.underline() {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if cell.inverse() {
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}

fn resolve_colors(cell: &vt100::Cell, screen: &vt100::Screen) -> (Option<TColor>, Option<TColor>) {
    let mut fg = resolve_color(cell.fgcolor(), screen.fgcolor());
    let bg = resolve_color(cell.bgcolor(), screen.bgcolor());
    if cell.bold() {
        fg = brighten_indexed(fg);
    }
    (fg, bg)
}

fn vt_color_to_ratatui(color: vt100::Color) -> Option<TColor> {
    match color {
        vt100::Color::Default => None,
        vt100::Color::Idx(idx) => Some(TColor::Indexed(idx)),
        vt100::Color::Rgb(r, g, b) => Some(TColor::Rgb(r, g, b)),
    }
}

fn resolve_color(color: vt100::Color, screen_default: vt100::Color) -> Option<TColor> {
    match color {
        vt100::Color::Default => vt_color_to_ratatui(screen_default),
        other => vt_color_to_ratatui(other),
    }
}

fn brighten_indexed(color: Option<TColor>) -> Option<TColor> {
    match color {
        Some(TColor::Indexed(idx)) if idx < 8 => Some(TColor::Indexed(idx + 8)),
        _ => color,
    }
}
