use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind};

/// Cleans up raw host events before the canvas sees them.
///
/// Key releases (and on Windows, repeats) are dropped and Shift+Tab is
/// reported as BackTab. Bursts of pointer drags and host resizes collapse to
/// their latest event: a window drag only cares where the pointer is now.
#[derive(Debug, Default)]
pub struct InputNormalizer {
    esc_down: bool,
}

impl InputNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, event: Event) -> Option<Event> {
        let Event::Key(mut key) = event else {
            return Some(event);
        };
        if key.code == KeyCode::Tab && key.modifiers.contains(KeyModifiers::SHIFT) {
            key.code = KeyCode::BackTab;
            key.modifiers.remove(KeyModifiers::SHIFT);
        }
        match key.kind {
            KeyEventKind::Release => {
                if key.code == KeyCode::Esc {
                    self.esc_down = false;
                }
                return None;
            }
            KeyEventKind::Repeat if cfg!(windows) => return None,
            _ => {}
        }
        // Windows reports a held Esc as a stream of presses.
        if cfg!(windows) && key.code == KeyCode::Esc {
            if self.esc_down {
                return None;
            }
            self.esc_down = true;
        } else {
            self.esc_down = false;
        }
        Some(Event::Key(key))
    }

    /// Whether `next` supersedes `queued` so only `next` needs handling.
    pub fn supersedes(queued: &Event, next: &Event) -> bool {
        match (queued, next) {
            (Event::Resize(..), Event::Resize(..)) => true,
            (Event::Mouse(a), Event::Mouse(b)) => {
                a.modifiers == b.modifiers
                    && match (a.kind, b.kind) {
                        (MouseEventKind::Drag(x), MouseEventKind::Drag(y)) => x == y,
                        (MouseEventKind::Moved, MouseEventKind::Moved) => true,
                        _ => false,
                    }
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, MouseButton, MouseEvent};

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn tab_with_shift_becomes_backtab() {
        let mut norm = InputNormalizer::new();
        let key = KeyEvent::new(KeyCode::Tab, KeyModifiers::SHIFT);
        let Some(Event::Key(k)) = norm.normalize(Event::Key(key)) else {
            panic!("expected key event");
        };
        assert_eq!(k.code, KeyCode::BackTab);
        assert!(!k.modifiers.contains(KeyModifiers::SHIFT));
    }

    #[test]
    fn release_key_is_ignored() {
        let mut norm = InputNormalizer::new();
        let mut key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert!(norm.normalize(Event::Key(key)).is_none());
    }

    #[test]
    fn drags_of_same_button_coalesce() {
        let left = MouseEventKind::Drag(MouseButton::Left);
        let right = MouseEventKind::Drag(MouseButton::Right);
        assert!(InputNormalizer::supersedes(&mouse(left, 1, 1), &mouse(left, 5, 2)));
        assert!(!InputNormalizer::supersedes(&mouse(left, 1, 1), &mouse(right, 5, 2)));
        let up = MouseEventKind::Up(MouseButton::Left);
        assert!(!InputNormalizer::supersedes(&mouse(left, 1, 1), &mouse(up, 5, 2)));
    }

    #[test]
    fn resizes_coalesce_and_pass_through() {
        let mut norm = InputNormalizer::new();
        assert_eq!(norm.normalize(Event::Resize(10, 20)), Some(Event::Resize(10, 20)));
        assert!(InputNormalizer::supersedes(&Event::Resize(10, 20), &Event::Resize(90, 30)));
    }
}
