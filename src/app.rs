//! The host application: a [`Canvas`] of PTY-backed windows drawn into the
//! host terminal.
//!
//! The canvas owns geometry, modes and negotiation. This layer owns one
//! vt100 [`Emulator`] per window, feeds it from the window's event
//! subscription, forwards keys to the focused session and paints the frame.

use std::collections::BTreeMap;
use std::io;
use std::sync::mpsc::Receiver;
use std::time::Instant;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use indoc::indoc;
use ratatui::layout::Rect as CellArea;
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::bridge::{SessionIo, TerminalId};
use crate::canvas::{Canvas, SpawnRequest};
use crate::config::CanvasConfig;
use crate::constants::{HOST_CELL_HEIGHT_PX, HOST_CELL_WIDTH_PX};
use crate::drivers::InputDriver;
use crate::drivers::console::{ConsoleInputDriver, ConsoleOutputDriver};
use crate::drivers::mouse::MouseTranslator;
use crate::emulator::{Emulator, key_to_bytes};
use crate::event_loop::{ControlFlow, EventLoop};
use crate::events::WindowEvent;
use crate::geometry::{Point, Size};
use crate::grid::GridSize;
use crate::keybindings::{Action, KeyBindings};
use crate::placement::dock_area;
use crate::program::ProgramKind;
use crate::pty::LocalPtyBridge;
use crate::ui::{CellRect, UiFrame};
use crate::viewport::CanvasView;
use crate::window::ModeKind;
use crate::window::decorator::{FrameDecor, OpenStepDecorator, WindowDecorator};

/// Emulator grid used until the window's first fit.
const FALLBACK_GRID: GridSize = GridSize::new(80, 24);

/// Keyboard pan step: eight host cells.
const PAN_STEP_PX: f64 = 8.0 * HOST_CELL_WIDTH_PX;
const KEY_ZOOM_FACTOR: f64 = 1.1;

const HELP_INTRO: &str = indoc! {"
    Drag a title bar to move a window; drag its side or bottom edge to resize.
    Double-click a title bar to maximize. Drag empty canvas to pan.
    Wheel pans the canvas, Ctrl+wheel zooms around the pointer.
    A focused window that enabled mouse reporting receives the wheel instead.
"};

struct Pane {
    events: Receiver<WindowEvent>,
    alternate_screen: bool,
}

pub struct App<B: SessionIo> {
    canvas: Canvas<B>,
    surfaces: BTreeMap<TerminalId, Emulator>,
    panes: BTreeMap<TerminalId, Pane>,
    keys: KeyBindings,
    mouse: MouseTranslator,
    decorator: OpenStepDecorator,
    help_visible: bool,
    quit: bool,
}

impl<B: SessionIo> App<B> {
    pub fn new(bridge: B, config: &CanvasConfig) -> Self {
        let view = CanvasView::new(config.display_scale);
        Self {
            canvas: Canvas::new(bridge, view, config.font.clone()),
            surfaces: BTreeMap::new(),
            panes: BTreeMap::new(),
            keys: KeyBindings::default(),
            mouse: MouseTranslator::new(),
            decorator: OpenStepDecorator,
            help_visible: false,
            quit: false,
        }
    }

    pub fn canvas(&self) -> &Canvas<B> {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas<B> {
        &mut self.canvas
    }

    pub fn surface(&self, id: &TerminalId) -> Option<&Emulator> {
        self.surfaces.get(id)
    }

    pub fn help_visible(&self) -> bool {
        self.help_visible
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.canvas.next_deadline()
    }

    /// Host terminal resized to `cols` x `rows` cells.
    pub fn set_host_size(&mut self, cols: u16, rows: u16, now: Instant) {
        let viewport = Size::new(
            cols as f64 * HOST_CELL_WIDTH_PX,
            rows as f64 * HOST_CELL_HEIGHT_PX,
        );
        self.canvas.set_viewport(viewport, now);
    }

    pub fn open_window(&mut self, now: Instant) -> Option<TerminalId> {
        match self.canvas.spawn_window(SpawnRequest::default(), now) {
            Ok(id) => {
                self.attach_surface(&id);
                Some(id)
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not open window");
                None
            }
        }
    }

    fn attach_surface(&mut self, id: &TerminalId) {
        if self.surfaces.contains_key(id) {
            return;
        }
        let Some(window) = self.canvas.window(id) else {
            return;
        };
        let grid = window.fitted().unwrap_or(FALLBACK_GRID);
        let emulator = Emulator::new(grid, window.font().metrics());
        let events = self.canvas.subscribe(id);
        self.surfaces.insert(id.clone(), emulator);
        self.panes.insert(
            id.clone(),
            Pane {
                events,
                alternate_screen: false,
            },
        );
    }

    /// One cooperative step: drain the bridge, apply window events, follow
    /// program changes, flush emulator replies and service due timers.
    pub fn pump(&mut self, now: Instant) {
        for message in self.canvas.bridge_mut().poll_inbound() {
            let id = message.terminal_id().clone();
            if let Err(err) = self.canvas.handle_inbound(message, now) {
                tracing::debug!(terminal_id = %id, error = %err, "inbound message ignored");
                continue;
            }
            self.attach_surface(&id);
        }
        self.drain_events();
        self.sync_program_kinds();
        self.flush_surface_output();
        for (id, outcome) in self.canvas.tick(now) {
            tracing::trace!(terminal_id = %id, ?outcome, "timers serviced");
        }
        self.drain_events();
    }

    fn drain_events(&mut self) {
        let mut closed = Vec::new();
        for (id, pane) in &self.panes {
            let Some(emulator) = self.surfaces.get_mut(id) else {
                continue;
            };
            for event in pane.events.try_iter() {
                match event {
                    WindowEvent::Output(data) => emulator.process(&data),
                    WindowEvent::Fitted(grid) => {
                        if let Some(window) = self.canvas.window(id) {
                            emulator.set_cell_metrics(window.font().metrics());
                        }
                        emulator.resize(grid);
                    }
                    WindowEvent::Closed => closed.push(id.clone()),
                    WindowEvent::Offline => {
                        tracing::debug!(terminal_id = %id, "surface offline");
                    }
                    WindowEvent::Negotiated(_)
                    | WindowEvent::ModeChanged(_)
                    | WindowEvent::Bound => {}
                }
            }
        }
        for id in closed {
            self.surfaces.remove(&id);
            self.panes.remove(&id);
        }
    }

    /// A program switching to the alternate screen is treated as full-screen
    /// for resize debouncing and repaint, whatever its name.
    fn sync_program_kinds(&mut self) {
        let mut changes = Vec::new();
        for (id, pane) in &mut self.panes {
            let Some(emulator) = self.surfaces.get(id) else {
                continue;
            };
            let alternate = emulator.alternate_screen();
            if alternate != pane.alternate_screen {
                pane.alternate_screen = alternate;
                changes.push((id.clone(), alternate));
            }
        }
        for (id, alternate) in changes {
            let kind = if alternate {
                ProgramKind::FullScreen
            } else {
                ProgramKind::Shell
            };
            let _ = self.canvas.set_program(&id, kind);
        }
    }

    fn flush_surface_output(&mut self) {
        for (id, emulator) in &mut self.surfaces {
            let bytes = emulator.take_outgoing();
            if bytes.is_empty() {
                continue;
            }
            if let Err(err) = self.canvas.bridge_mut().write_input(id, &bytes) {
                tracing::debug!(terminal_id = %id, error = %err, "dropping surface reply");
            }
        }
    }

    pub fn handle_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Key(key) => self.handle_key(key, now),
            Event::Mouse(mouse) => {
                for pointer in self.mouse.translate(mouse, now) {
                    let route = self.canvas.handle_pointer(pointer, now, &mut self.surfaces);
                    tracing::trace!(?route, "pointer routed");
                }
                self.flush_surface_output();
            }
            Event::Resize(cols, rows) => self.set_host_size(cols, rows, now),
            Event::Paste(text) => self.write_focused(text.as_bytes()),
            // A backgrounded host terminal is treated as a hidden viewport.
            Event::FocusGained => self.canvas.set_visible(true, now),
            Event::FocusLost => self.canvas.set_visible(false, now),
        }
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if let Some(action) = self.keys.action_for_key(&key) {
            self.run_action(action, now);
            return;
        }
        if self.help_visible {
            if key.code == KeyCode::Esc {
                self.help_visible = false;
            }
            return;
        }
        let bytes = key_to_bytes(key);
        if !bytes.is_empty() {
            self.write_focused(&bytes);
        }
    }

    fn write_focused(&mut self, bytes: &[u8]) {
        let Some(id) = self.canvas.focused().cloned() else {
            return;
        };
        if self.canvas.window(&id).is_none_or(|w| w.is_offline()) {
            return;
        }
        if let Err(err) = self.canvas.bridge_mut().write_input(&id, bytes) {
            tracing::debug!(terminal_id = %id, error = %err, "dropping input");
        }
    }

    pub fn run_action(&mut self, action: Action, now: Instant) {
        let focused = self.canvas.focused().cloned();
        tracing::debug!(%action, "canvas action");
        // Rejections and unknown ids are logged by the canvas.
        let result = match (action, focused) {
            (Action::Quit, _) => {
                self.quit = true;
                Ok(())
            }
            (Action::ToggleHelp, _) => {
                self.help_visible = !self.help_visible;
                Ok(())
            }
            (Action::NewWindow, _) => {
                self.open_window(now);
                Ok(())
            }
            (Action::FocusNext, _) => {
                self.canvas.cycle_focus(true);
                Ok(())
            }
            (Action::FocusPrev, _) => {
                self.canvas.cycle_focus(false);
                Ok(())
            }
            (Action::PanLeft, _) => {
                self.canvas.pan_by(PAN_STEP_PX, 0.0);
                Ok(())
            }
            (Action::PanRight, _) => {
                self.canvas.pan_by(-PAN_STEP_PX, 0.0);
                Ok(())
            }
            (Action::PanUp, _) => {
                self.canvas.pan_by(0.0, PAN_STEP_PX);
                Ok(())
            }
            (Action::PanDown, _) => {
                self.canvas.pan_by(0.0, -PAN_STEP_PX);
                Ok(())
            }
            (Action::ZoomIn, _) => {
                self.canvas.zoom_at(self.viewport_center(), KEY_ZOOM_FACTOR);
                Ok(())
            }
            (Action::ZoomOut, _) => {
                self.canvas
                    .zoom_at(self.viewport_center(), 1.0 / KEY_ZOOM_FACTOR);
                Ok(())
            }
            (Action::ZoomReset, _) => {
                self.canvas.set_zoom(1.0);
                Ok(())
            }
            (_, None) => Ok(()),
            (Action::CloseWindow, Some(id)) => self.canvas.close(&id, now),
            (Action::DetachWindow, Some(id)) => self.canvas.detach(&id),
            (Action::ReattachWindow, Some(id)) => self.canvas.reattach(&id).map(|_| ()),
            (Action::ToggleLock, Some(id)) => self.canvas.toggle_lock(&id, now),
            (Action::ToggleDock, Some(id)) => self.canvas.toggle_dock(&id, now),
            (Action::ToggleMaximize, Some(id)) => self.canvas.toggle_maximize(&id, now),
            (Action::FontLarger, Some(id)) => self.step_font(&id, 1.0, now),
            (Action::FontSmaller, Some(id)) => self.step_font(&id, -1.0, now),
        };
        if let Err(err) = result {
            tracing::debug!(%action, error = %err, "action had no effect");
        }
        self.drain_events();
    }

    fn step_font(&mut self, id: &TerminalId, delta: f64, now: Instant) -> crate::error::Result<()> {
        let Some(font) = self
            .canvas
            .window(id)
            .map(|w| w.font().with_size(w.font().size + delta))
        else {
            return Err(crate::error::CanvasError::UnknownWindow(id.clone()));
        };
        let metrics = font.metrics();
        self.canvas.set_font(id, font, now)?;
        if let Some(emulator) = self.surfaces.get_mut(id) {
            emulator.set_cell_metrics(metrics);
        }
        Ok(())
    }

    fn viewport_center(&self) -> Point {
        let viewport = self.canvas.view().viewport();
        Point::new(viewport.width / 2.0, viewport.height / 2.0)
    }

    pub fn render(&mut self, frame: &mut UiFrame<'_>) {
        let area = frame.area();
        frame.render_widget(Clear, area);
        let view = *self.canvas.view();

        if self.canvas.windows().any(|w| w.mode_kind() == ModeKind::Docked) {
            let dock = CellRect::from_px(dock_area(view.viewport()));
            self.decorator.render_dock(frame, dock);
        }

        for window in self.canvas.windows() {
            if let Ok(Some(rect)) = self.canvas.placeholder_rect(window.id()) {
                self.decorator
                    .render_placeholder(frame, CellRect::from_px(rect), window.title());
            }
        }

        let focused = self.canvas.focused().cloned();
        for id in self.canvas.paint_order() {
            let Some(window) = self.canvas.window(&id) else {
                continue;
            };
            let placement = self.canvas.placement_for(&id);
            let surface = window.surface_metrics(&placement);
            let is_focused = focused.as_ref() == Some(&id);
            self.decorator
                .clear_surface(frame, CellRect::from_px(surface.visual));
            if let Some(emulator) = self.surfaces.get_mut(&id) {
                emulator.render(frame, &surface, is_focused && !window.is_offline());
            }
            let decor = FrameDecor {
                title: window.title(),
                focused: is_focused,
                mode: window.mode_kind(),
                offline: window.is_offline(),
            };
            self.decorator.render_frame(
                frame,
                CellRect::from_px(window.frame_rect(&placement)),
                &decor,
            );
        }

        self.render_status(frame, area);
        if self.help_visible {
            self.render_help(frame, area);
        }
    }

    fn render_status(&self, frame: &mut UiFrame<'_>, area: CellArea) {
        if area.height == 0 {
            return;
        }
        let status = format!(
            " zoom {:.0}% | {} window(s) | Alt+H help ",
            self.canvas.view().zoom() * 100.0,
            self.canvas.len()
        );
        let y = area.bottom() as i32 - 1;
        let x = area.right() as i32 - status.chars().count() as i32;
        frame.set_string(
            x.max(area.x as i32),
            y,
            &status,
            Style::default().bg(Color::DarkGray).fg(Color::White),
        );
    }

    fn render_help(&self, frame: &mut UiFrame<'_>, area: CellArea) {
        let mut lines: Vec<Line> = HELP_INTRO.lines().map(Line::from).collect();
        lines.push(Line::from(""));
        for (action, combos) in self.keys.help_entries() {
            lines.push(Line::from(format!("{:<14} {}", combos.join(", "), action)));
        }
        let width = area.width.min(78);
        let height = area.height.min(lines.len() as u16 + 2);
        let rect = CellArea::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        );
        frame.render_widget(Clear, rect);
        let block = Block::default().title("Help").borders(Borders::ALL);
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
            rect,
        );
    }
}

/// Runs the binary: local PTYs on a canvas in the host terminal.
pub fn run(config: CanvasConfig) -> io::Result<()> {
    let bridge = LocalPtyBridge::new(config.shell.clone());
    let mut app = App::new(bridge, &config);
    let mut output = ConsoleOutputDriver::new()?;
    output.enter()?;
    let (cols, rows) = output.size()?;
    let now = Instant::now();
    app.set_host_size(cols, rows, now);
    for _ in 0..config.initial_windows {
        app.open_window(now);
    }

    let mut event_loop = EventLoop::new(ConsoleInputDriver::new(), config.tick);
    event_loop.driver().set_mouse_capture(true)?;
    let result = event_loop.run(|_driver, event| {
        let now = Instant::now();
        match event {
            Some(event) => app.handle_event(event, now),
            None => {
                app.pump(now);
                output.draw(|mut frame| app.render(&mut frame))?;
            }
        }
        Ok(if app.should_quit() {
            ControlFlow::Quit
        } else {
            match app.next_deadline() {
                Some(deadline) => ControlFlow::WaitUntil(deadline),
                None => ControlFlow::Continue,
            }
        })
    });
    output.exit()?;
    result
}
