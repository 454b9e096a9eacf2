use ratatui::style::{Color, Modifier, Style};

use crate::ui::{CellRect, UiFrame, truncate_to_width};
use crate::window::ModeKind;

/// What the title bar needs to know about a window for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecor<'a> {
    pub title: &'a str,
    pub focused: bool,
    pub mode: ModeKind,
    pub offline: bool,
}

impl FrameDecor<'_> {
    pub fn label(&self) -> String {
        let marker = match self.mode {
            ModeKind::Floating => "",
            ModeKind::Locked => "[lock] ",
            ModeKind::Docked => "[dock] ",
            ModeKind::Maximized => "[max] ",
        };
        let status = if self.offline { " (offline)" } else { "" };
        format!("{marker}{}{status}", self.title)
    }
}

pub trait WindowDecorator: std::fmt::Debug {
    /// Paints chrome around a window whose frame covers `rect`. The surface
    /// itself is painted separately, after `clear_surface`.
    fn render_frame(&self, frame: &mut UiFrame<'_>, rect: CellRect, decor: &FrameDecor<'_>);

    fn clear_surface(&self, frame: &mut UiFrame<'_>, rect: CellRect);

    /// Outline left on the canvas where a locked window came from.
    fn render_placeholder(&self, frame: &mut UiFrame<'_>, rect: CellRect, title: &str);

    fn render_dock(&self, frame: &mut UiFrame<'_>, rect: CellRect);
}

#[derive(Debug, Default)]
pub struct OpenStepDecorator;

impl OpenStepDecorator {
    fn header_style(focused: bool) -> Style {
        if focused {
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().bg(Color::DarkGray).fg(Color::White)
        }
    }

    fn border_style() -> Style {
        Style::default().fg(Color::DarkGray).bg(Color::Reset)
    }
}

impl WindowDecorator for OpenStepDecorator {
    fn render_frame(&self, frame: &mut UiFrame<'_>, rect: CellRect, decor: &FrameDecor<'_>) {
        if rect.is_empty() {
            return;
        }
        let header_style = Self::header_style(decor.focused);
        let header = CellRect::new(rect.x, rect.y, rect.width, 1);
        frame.fill(header, " ", header_style);

        let label = decor.label();
        let width = rect.width as usize;
        let label = truncate_to_width(&label, width);
        let start = rect.x + (width - label.chars().count()) as i32 / 2;
        frame.set_string(start, rect.y, &label, header_style);

        if rect.height > 1 {
            let right = rect.right() - 1;
            let bottom = rect.bottom() - 1;
            frame.set_cell(right, bottom, "◢", Self::border_style());
        }
    }

    fn clear_surface(&self, frame: &mut UiFrame<'_>, rect: CellRect) {
        frame.fill(rect, " ", Style::default());
    }

    fn render_placeholder(&self, frame: &mut UiFrame<'_>, rect: CellRect, title: &str) {
        if rect.width < 2 || rect.height < 2 {
            return;
        }
        let style = Self::border_style();
        let (left, top) = (rect.x, rect.y);
        let (right, bottom) = (rect.right() - 1, rect.bottom() - 1);
        for x in left + 1..right {
            frame.set_cell(x, top, "╌", style);
            frame.set_cell(x, bottom, "╌", style);
        }
        for y in top + 1..bottom {
            frame.set_cell(left, y, "╎", style);
            frame.set_cell(right, y, "╎", style);
        }
        frame.set_cell(left, top, "┌", style);
        frame.set_cell(right, top, "┐", style);
        frame.set_cell(left, bottom, "└", style);
        frame.set_cell(right, bottom, "┘", style);
        let inner = (rect.width - 2) as usize;
        let label = truncate_to_width(title, inner);
        frame.set_string(left + 1, top, &label, style.add_modifier(Modifier::ITALIC));
    }

    fn render_dock(&self, frame: &mut UiFrame<'_>, rect: CellRect) {
        frame.fill(rect, " ", Style::default().bg(Color::Black));
        let style = Self::border_style();
        for y in rect.y..rect.bottom() {
            frame.set_cell(rect.x, y, "│", style);
        }
    }
}
