//! Shared crate-wide constants.

use std::time::Duration;

/// Side length of the square world, in world pixels. Window geometry is
/// clamped into `[0, WORLD_BOUND]` on both axes.
pub const WORLD_BOUND: f64 = 10_000.0;

pub const MIN_WINDOW_WIDTH: f64 = 160.0;
pub const MIN_WINDOW_HEIGHT: f64 = 96.0;

pub const DEFAULT_WINDOW_WIDTH: f64 = 640.0;
pub const DEFAULT_WINDOW_HEIGHT: f64 = 400.0;

/// Height of the window chrome above the terminal surface, in layout pixels.
pub const TITLE_BAR_HEIGHT: f64 = 16.0;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 4.0;

/// Ratio deviation below which pointer events are not rewritten.
pub const SCALE_EPSILON: f64 = 0.001;

/// Debounce for windows running a full-screen program. These redraw the whole
/// screen on resize, so latency matters more than coalescing.
pub const FULLSCREEN_RESIZE_DEBOUNCE: Duration = Duration::from_millis(20);

/// Debounce for ordinary shells; long enough to coalesce a drag.
pub const SHELL_RESIZE_DEBOUNCE: Duration = Duration::from_millis(200);

/// Delay between a sent resize and the follow-up repaint byte.
pub const REPAINT_DELAY: Duration = Duration::from_millis(50);

/// Form feed (Ctrl-L): asks curses-style programs to redraw.
pub const REPAINT_BYTE: char = '\x0c';

/// Output a detached local session buffers before its oldest bytes are dropped.
pub const DETACHED_OUTPUT_LIMIT: usize = 1 << 20;

pub const LAYOUT_RETRY_DELAY: Duration = Duration::from_millis(50);
pub const LAYOUT_RETRY_LIMIT: u8 = 10;

/// Offset between successive spawn candidates when the preferred spot is
/// already occupied.
pub const SPAWN_CASCADE_STEP: f64 = 40.0;
pub const SPAWN_MAX_ATTEMPTS: usize = 64;

/// Width of the dock strip as a fraction of the host viewport.
pub const DOCK_WIDTH_FRACTION: f64 = 0.34;

/// Inset of the fullscreen overlay from the host viewport edges.
pub const MAXIMIZED_MARGIN: f64 = 16.0;

/// Display pixels represented by one host terminal cell.
pub const HOST_CELL_WIDTH_PX: f64 = 8.0;
pub const HOST_CELL_HEIGHT_PX: f64 = 16.0;

pub const MIN_FONT_SIZE: f64 = 6.0;
pub const MAX_FONT_SIZE: f64 = 48.0;
pub const DEFAULT_FONT_SIZE: f64 = 13.0;
