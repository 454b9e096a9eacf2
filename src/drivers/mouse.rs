//! Host mouse events to canvas pointer events.
//!
//! The host terminal reports cells; the canvas works in pixels. Each host cell
//! is `HOST_CELL_WIDTH_PX` x `HOST_CELL_HEIGHT_PX` and events land on its
//! centre.

use std::time::{Duration, Instant};

use crossterm::event::{KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::constants::{HOST_CELL_HEIGHT_PX, HOST_CELL_WIDTH_PX};
use crate::geometry::Point;
use crate::pointer::{Modifiers, PointerButton, PointerEvent, PointerKind};

const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);

/// One wheel notch scrolls three host rows.
pub const WHEEL_STEP_PX: f64 = 3.0 * HOST_CELL_HEIGHT_PX;

pub fn cell_center(column: u16, row: u16) -> Point {
    Point::new(
        (column as f64 + 0.5) * HOST_CELL_WIDTH_PX,
        (row as f64 + 0.5) * HOST_CELL_HEIGHT_PX,
    )
}

pub fn modifiers(mods: KeyModifiers) -> Modifiers {
    Modifiers {
        shift: mods.contains(KeyModifiers::SHIFT),
        ctrl: mods.contains(KeyModifiers::CONTROL),
        alt: mods.contains(KeyModifiers::ALT),
        meta: mods.contains(KeyModifiers::SUPER),
    }
}

fn button(button: MouseButton) -> PointerButton {
    match button {
        MouseButton::Left => PointerButton::Primary,
        MouseButton::Middle => PointerButton::Middle,
        MouseButton::Right => PointerButton::Secondary,
    }
}

#[derive(Debug, Default)]
pub struct MouseTranslator {
    last_down: Option<(Instant, u16, u16, MouseButton)>,
}

impl MouseTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A primary press on the same cell within the double-click window
    /// yields a `DoubleClick` after the `Down`. Right presses add a
    /// `ContextMenu`.
    pub fn translate(&mut self, event: MouseEvent, now: Instant) -> Vec<PointerEvent> {
        let client = cell_center(event.column, event.row);
        let mods = modifiers(event.modifiers);
        let base = |kind| PointerEvent::new(kind, client).with_modifiers(mods);
        match event.kind {
            MouseEventKind::Down(b) => {
                let down = base(PointerKind::Down).with_button(button(b));
                let repeat = self.last_down.is_some_and(|(at, col, row, prev)| {
                    prev == b
                        && col == event.column
                        && row == event.row
                        && now.duration_since(at) <= DOUBLE_CLICK_WINDOW
                });
                let mut out = vec![down];
                match b {
                    MouseButton::Left if repeat => {
                        out.push(base(PointerKind::DoubleClick).with_button(PointerButton::Primary));
                        self.last_down = None;
                    }
                    MouseButton::Right => {
                        out.push(base(PointerKind::ContextMenu).with_button(PointerButton::Secondary));
                        self.last_down = Some((now, event.column, event.row, b));
                    }
                    _ => self.last_down = Some((now, event.column, event.row, b)),
                }
                out
            }
            MouseEventKind::Up(b) => vec![base(PointerKind::Up).with_button(button(b))],
            MouseEventKind::Drag(b) => vec![base(PointerKind::Move).with_button(button(b))],
            MouseEventKind::Moved => vec![base(PointerKind::Move)],
            MouseEventKind::ScrollDown => vec![base(PointerKind::Wheel).with_wheel(0.0, WHEEL_STEP_PX)],
            MouseEventKind::ScrollUp => vec![base(PointerKind::Wheel).with_wheel(0.0, -WHEEL_STEP_PX)],
            MouseEventKind::ScrollRight => vec![base(PointerKind::Wheel).with_wheel(WHEEL_STEP_PX, 0.0)],
            MouseEventKind::ScrollLeft => vec![base(PointerKind::Wheel).with_wheel(-WHEEL_STEP_PX, 0.0)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn positions_land_on_cell_centres() {
        let mut t = MouseTranslator::new();
        let out = t.translate(mouse(MouseEventKind::Moved, 2, 3), Instant::now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].client, Point::new(20.0, 56.0));
    }

    #[test]
    fn second_press_on_same_cell_is_double_click() {
        let mut t = MouseTranslator::new();
        let now = Instant::now();
        let down = MouseEventKind::Down(MouseButton::Left);
        assert_eq!(t.translate(mouse(down, 1, 1), now).len(), 1);
        let out = t.translate(mouse(down, 1, 1), now + Duration::from_millis(200));
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].kind, PointerKind::DoubleClick);
        // A third press starts a new sequence.
        let out = t.translate(mouse(down, 1, 1), now + Duration::from_millis(300));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn slow_or_moved_press_is_not_double_click() {
        let mut t = MouseTranslator::new();
        let now = Instant::now();
        let down = MouseEventKind::Down(MouseButton::Left);
        t.translate(mouse(down, 1, 1), now);
        assert_eq!(t.translate(mouse(down, 2, 1), now).len(), 1);
        assert_eq!(t.translate(mouse(down, 2, 1), now + Duration::from_secs(1)).len(), 1);
    }

    #[test]
    fn scroll_maps_to_wheel_deltas() {
        let mut t = MouseTranslator::new();
        let mut ev = mouse(MouseEventKind::ScrollUp, 0, 0);
        ev.modifiers = KeyModifiers::CONTROL;
        let out = t.translate(ev, Instant::now());
        assert_eq!(out[0].kind, PointerKind::Wheel);
        assert_eq!(out[0].wheel.y, -WHEEL_STEP_PX);
        assert!(out[0].modifiers.ctrl);
    }
}
