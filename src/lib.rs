//! Zoomable, draggable terminal windows on an infinite canvas.
//!
//! The core ([`canvas`], [`window`], [`negotiator`], [`pointer`]) is
//! host-agnostic: it keeps window geometry in world space, fits windows to
//! exact character grids, negotiates sizes with a session manager over a
//! [`bridge::SessionBridge`] and corrects pointer input for scaled surfaces.
//! The remaining modules host it in a text terminal with local PTYs.

pub mod app;
pub mod bridge;
pub mod canvas;
pub mod config;
pub mod constants;
pub mod drivers;
pub mod emulator;
pub mod error;
pub mod event_loop;
pub mod events;
pub mod focus;
pub mod geometry;
pub mod grid;
pub mod keybindings;
pub mod negotiator;
pub mod placement;
pub mod pointer;
pub mod program;
pub mod pty;
pub mod timer;
pub mod tracing_sub;
pub mod ui;
pub mod viewport;
pub mod window;
