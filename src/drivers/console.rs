use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{
    DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use super::{InputDriver, InputNormalizer};
use crate::ui::UiFrame;

/// crossterm-backed input. Events are read eagerly into a queue so that a
/// flood of drag or resize reports collapses before the canvas sees it.
pub struct ConsoleInputDriver {
    normalizer: InputNormalizer,
    event_queue: VecDeque<Event>,
}

impl Default for ConsoleInputDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleInputDriver {
    pub fn new() -> Self {
        Self {
            normalizer: InputNormalizer::new(),
            event_queue: VecDeque::new(),
        }
    }

    fn enqueue(&mut self, event: Event) {
        let Some(event) = self.normalizer.normalize(event) else {
            return;
        };
        match self.event_queue.back_mut() {
            Some(last) if InputNormalizer::supersedes(last, &event) => *last = event,
            _ => self.event_queue.push_back(event),
        }
    }
}

impl InputDriver for ConsoleInputDriver {
    /// Waits up to `timeout` for the first event, then takes whatever else
    /// is already buffered without blocking.
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        if self.event_queue.is_empty() && crossterm::event::poll(timeout)? {
            self.enqueue(crossterm::event::read()?);
        }
        while crossterm::event::poll(Duration::ZERO)? {
            self.enqueue(crossterm::event::read()?);
        }
        Ok(!self.event_queue.is_empty())
    }

    fn read(&mut self) -> io::Result<Event> {
        loop {
            if let Some(event) = self.event_queue.pop_front() {
                return Ok(event);
            }
            self.enqueue(crossterm::event::read()?);
        }
    }

    fn set_mouse_capture(&mut self, enabled: bool) -> io::Result<()> {
        if enabled {
            execute!(io::stdout(), EnableMouseCapture)
        } else {
            execute!(io::stdout(), DisableMouseCapture)
        }
    }
}

pub struct ConsoleOutputDriver {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    entered: bool,
}

impl ConsoleOutputDriver {
    pub fn new() -> io::Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        Ok(Self {
            terminal,
            entered: false,
        })
    }

    pub fn enter(&mut self) -> io::Result<()> {
        if self.entered {
            return Ok(());
        }
        execute!(
            self.terminal.backend_mut(),
            EnterAlternateScreen,
            EnableMouseCapture,
            EnableFocusChange
        )?;
        terminal::enable_raw_mode()?;
        self.terminal.hide_cursor()?;
        self.entered = true;
        Ok(())
    }

    pub fn exit(&mut self) -> io::Result<()> {
        if !self.entered {
            return Ok(());
        }
        terminal::disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            DisableFocusChange,
            DisableMouseCapture,
            LeaveAlternateScreen
        )?;
        self.terminal.show_cursor()?;
        self.entered = false;
        Ok(())
    }

    /// Host terminal size in cells.
    pub fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    pub fn draw<F>(&mut self, f: F) -> io::Result<()>
    where
        F: FnOnce(UiFrame<'_>),
    {
        self.terminal
            .draw(move |frame| {
                let wrapper = UiFrame::new(frame);
                f(wrapper);
            })
            .map(|_| ())
            .map_err(|err| io::Error::other(err.to_string()))
    }
}

impl Drop for ConsoleOutputDriver {
    fn drop(&mut self) {
        let _ = self.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

    fn drag(column: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind: MouseEventKind::Drag(MouseButton::Left),
            column,
            row: 3,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn queue_coalesces_drag_bursts() {
        let mut d = ConsoleInputDriver::new();
        d.enqueue(Event::Key(KeyEvent::new(KeyCode::Char('z'), KeyModifiers::NONE)));
        for column in 1..=5 {
            d.enqueue(drag(column));
        }
        d.enqueue(Event::Resize(80, 24));
        d.enqueue(Event::Resize(100, 30));
        assert_eq!(d.event_queue.len(), 3);
        assert!(matches!(d.read().unwrap(), Event::Key(k) if k.code == KeyCode::Char('z')));
        assert_eq!(d.read().unwrap(), drag(5));
        assert_eq!(d.read().unwrap(), Event::Resize(100, 30));
    }
}
