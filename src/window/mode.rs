use std::fmt;

use thiserror::Error;

use crate::geometry::{Geometry, Point};

/// Per-window presentation mode. Exactly one at a time; the data each mode
/// needs lives inside its variant so that combinations such as "maximized and
/// locked" cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum WindowMode {
    #[default]
    Floating,
    /// Pinned to the viewport at `viewport_position`, drawn at `zoom`
    /// regardless of the canvas zoom.
    Locked { viewport_position: Point, zoom: f64 },
    Docked,
    /// Drawn over everything; `saved` is restored verbatim on leave.
    Maximized { saved: Geometry },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Floating,
    Locked,
    Docked,
    Maximized,
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModeKind::Floating => "floating",
            ModeKind::Locked => "locked",
            ModeKind::Docked => "docked",
            ModeKind::Maximized => "maximized",
        };
        f.write_str(s)
    }
}

/// Where a window's subtree is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// In world space, moving with the canvas.
    Inline,
    /// Fixed to the viewport.
    ViewportPortal,
    /// Inside the dock container.
    DockPortal,
    /// Fullscreen overlay.
    FullscreenPortal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Lock,
    Unlock,
    Dock,
    Undock,
    Maximize,
    Restore,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transition::Lock => "lock",
            Transition::Unlock => "unlock",
            Transition::Dock => "dock",
            Transition::Undock => "undock",
            Transition::Maximize => "maximize",
            Transition::Restore => "restore",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Move,
    Resize,
    LockedZoom,
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Gesture::Move => "move",
            Gesture::Resize => "resize",
            Gesture::LockedZoom => "change locked zoom of",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot maximize a locked window; unlock it first")]
    LockedCannotMaximize,
    #[error("cannot {transition} a {mode} window")]
    Illegal {
        transition: Transition,
        mode: ModeKind,
    },
    #[error("cannot {gesture} a {mode} window")]
    GestureNotAllowed { gesture: Gesture, mode: ModeKind },
}

impl WindowMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            WindowMode::Floating => ModeKind::Floating,
            WindowMode::Locked { .. } => ModeKind::Locked,
            WindowMode::Docked => ModeKind::Docked,
            WindowMode::Maximized { .. } => ModeKind::Maximized,
        }
    }

    pub fn render_target(&self) -> RenderTarget {
        match self {
            WindowMode::Floating => RenderTarget::Inline,
            WindowMode::Locked { .. } => RenderTarget::ViewportPortal,
            WindowMode::Docked => RenderTarget::DockPortal,
            WindowMode::Maximized { .. } => RenderTarget::FullscreenPortal,
        }
    }

    pub fn allows(&self, gesture: Gesture) -> bool {
        match (self, gesture) {
            (WindowMode::Floating, Gesture::Move | Gesture::Resize) => true,
            (WindowMode::Locked { .. }, Gesture::Move | Gesture::LockedZoom) => true,
            _ => false,
        }
    }

    pub fn check(&self, gesture: Gesture) -> Result<(), TransitionError> {
        if self.allows(gesture) {
            Ok(())
        } else {
            Err(TransitionError::GestureNotAllowed {
                gesture,
                mode: self.kind(),
            })
        }
    }

    /// Computes the next mode without touching anything. `lock_at` is the
    /// on-screen origin and zoom the window is showing at right now; `current`
    /// is its world geometry.
    pub fn next(
        &self,
        transition: Transition,
        current: Geometry,
        lock_at: (Point, f64),
    ) -> Result<WindowMode, TransitionError> {
        let illegal = || TransitionError::Illegal {
            transition,
            mode: self.kind(),
        };
        match (transition, self) {
            (Transition::Lock, WindowMode::Floating) => Ok(WindowMode::Locked {
                viewport_position: lock_at.0,
                zoom: lock_at.1,
            }),
            (Transition::Unlock, WindowMode::Locked { .. }) => Ok(WindowMode::Floating),
            (Transition::Dock, WindowMode::Floating) => Ok(WindowMode::Docked),
            (Transition::Undock, WindowMode::Docked) => Ok(WindowMode::Floating),
            (Transition::Maximize, WindowMode::Locked { .. }) => {
                Err(TransitionError::LockedCannotMaximize)
            }
            (Transition::Maximize, WindowMode::Floating) => {
                Ok(WindowMode::Maximized { saved: current })
            }
            (Transition::Restore, WindowMode::Maximized { .. }) => Ok(WindowMode::Floating),
            _ => Err(illegal()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;

    fn geo() -> Geometry {
        Geometry::new(Point::new(10.0, 20.0), Size::new(300.0, 200.0))
    }

    #[test]
    fn legal_transitions() {
        let lock_at = (Point::new(5.0, 6.0), 0.75);
        let locked = WindowMode::Floating
            .next(Transition::Lock, geo(), lock_at)
            .unwrap();
        assert_eq!(
            locked,
            WindowMode::Locked {
                viewport_position: Point::new(5.0, 6.0),
                zoom: 0.75
            }
        );
        assert_eq!(
            locked.next(Transition::Unlock, geo(), lock_at),
            Ok(WindowMode::Floating)
        );
        assert_eq!(
            WindowMode::Floating.next(Transition::Maximize, geo(), lock_at),
            Ok(WindowMode::Maximized { saved: geo() })
        );
    }

    #[test]
    fn maximize_from_locked_is_rejected() {
        let locked = WindowMode::Locked {
            viewport_position: Point::ORIGIN,
            zoom: 1.0,
        };
        assert_eq!(
            locked.next(Transition::Maximize, geo(), (Point::ORIGIN, 1.0)),
            Err(TransitionError::LockedCannotMaximize)
        );
    }

    #[test]
    fn mismatched_transitions_are_illegal() {
        let err = WindowMode::Docked
            .next(Transition::Lock, geo(), (Point::ORIGIN, 1.0))
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::Illegal {
                transition: Transition::Lock,
                mode: ModeKind::Docked
            }
        );
        assert_eq!(err.to_string(), "cannot lock a docked window");
        assert!(
            WindowMode::Floating
                .next(Transition::Restore, geo(), (Point::ORIGIN, 1.0))
                .is_err()
        );
    }

    #[test]
    fn gestures_per_mode() {
        assert!(WindowMode::Floating.allows(Gesture::Resize));
        assert!(!WindowMode::Docked.allows(Gesture::Move));
        assert!(!WindowMode::Maximized { saved: geo() }.allows(Gesture::Move));
        let locked = WindowMode::Locked {
            viewport_position: Point::ORIGIN,
            zoom: 1.0,
        };
        assert!(locked.allows(Gesture::Move));
        assert!(!locked.allows(Gesture::Resize));
        assert!(WindowMode::Floating.check(Gesture::LockedZoom).is_err());
    }
}
