//! The canvas: owner of every window, the shared view, the z counter and the
//! session bridge. All mutation happens here, on the UI thread.

use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::time::Instant;

use crate::bridge::{
    Delivery, InboundMessage, OutboundMessage, SessionBridge, SessionRef, TerminalId, deliver,
};
use crate::constants::{
    DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_WIDTH, HOST_CELL_HEIGHT_PX, HOST_CELL_WIDTH_PX,
};
use crate::error::{CanvasError, Result};
use crate::events::{EventBus, WindowEvent};
use crate::focus::FocusDirector;
use crate::geometry::{Geometry, Point, Rect, Size};
use crate::grid::{FontSpec, GridSize};
use crate::negotiator::PollOutcome;
use crate::placement::{self, FrameHit, ResizeEdge};
use crate::pointer::{
    Dispatch, InterceptContext, PointerButton, PointerEvent, PointerKind, PointerTarget,
};
use crate::program::ProgramKind;
use crate::viewport::CanvasView;
use crate::window::{
    FitResult, Gesture, ModeKind, Placement, RenderTarget, TerminalWindow, Transition,
};

/// Grid announced in `spawn` when the window has not been laid out yet.
const SPAWN_FALLBACK_GRID: GridSize = GridSize::new(80, 24);

/// Wheel zoom step per notch.
const WHEEL_ZOOM_FACTOR: f64 = 1.1;

#[derive(Debug, Clone, Default)]
pub struct SpawnRequest {
    pub id: Option<TerminalId>,
    pub title: Option<String>,
    /// World position; collision-avoiding placement when absent.
    pub position: Option<Point>,
    pub size: Option<Size>,
    pub command: Option<String>,
}

/// Emulator surfaces the canvas can deliver corrected pointer events to.
pub trait SurfaceSet {
    fn surface_mut(&mut self, id: &TerminalId) -> Option<&mut dyn PointerTarget>;
}

impl<T: PointerTarget> SurfaceSet for BTreeMap<TerminalId, T> {
    fn surface_mut(&mut self, id: &TerminalId) -> Option<&mut dyn PointerTarget> {
        self.get_mut(id).map(|t| t as &mut dyn PointerTarget)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerRoute {
    /// Reached a window's emulator surface.
    Surface { id: TerminalId, dispatch: Dispatch },
    /// Consumed by a window frame (title bar, resize border, placeholder).
    Frame(TerminalId),
    /// Handled by the canvas itself: pan, zoom or blur.
    Canvas,
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
enum Drag {
    Move {
        id: TerminalId,
        last: Point,
    },
    Resize {
        id: TerminalId,
        edge: ResizeEdge,
        start: Geometry,
        anchor: Point,
    },
    Pan {
        last: Point,
    },
}

impl Drag {
    fn window(&self) -> Option<&TerminalId> {
        match self {
            Drag::Move { id, .. } | Drag::Resize { id, .. } => Some(id),
            Drag::Pan { .. } => None,
        }
    }
}

pub struct Canvas<B: SessionBridge> {
    windows: BTreeMap<TerminalId, TerminalWindow>,
    view: CanvasView,
    focus: FocusDirector,
    bridge: B,
    bus: EventBus,
    default_font: FontSpec,
    dock_order: Vec<TerminalId>,
    drag: Option<Drag>,
    next_id: u64,
}

impl<B: SessionBridge> Canvas<B> {
    pub fn new(bridge: B, view: CanvasView, default_font: FontSpec) -> Self {
        Self {
            windows: BTreeMap::new(),
            view,
            focus: FocusDirector::new(),
            bridge,
            bus: EventBus::new(),
            default_font,
            dock_order: Vec::new(),
            drag: None,
            next_id: 1,
        }
    }

    pub fn view(&self) -> &CanvasView {
        &self.view
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    pub fn window(&self, id: &TerminalId) -> Option<&TerminalWindow> {
        self.windows.get(id)
    }

    pub fn windows(&self) -> impl Iterator<Item = &TerminalWindow> {
        self.windows.values()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn default_font(&self) -> &FontSpec {
        &self.default_font
    }

    pub fn subscribe(&mut self, id: &TerminalId) -> Receiver<WindowEvent> {
        self.bus.subscribe(id)
    }

    pub fn z_index(&self, id: &TerminalId) -> Option<u64> {
        self.focus.z_index(id)
    }

    pub fn focused(&self) -> Option<&TerminalId> {
        self.focus.owner()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    fn get(&self, id: &TerminalId) -> Result<&TerminalWindow> {
        self.windows
            .get(id)
            .ok_or_else(|| CanvasError::UnknownWindow(id.clone()))
    }

    fn get_mut(&mut self, id: &TerminalId) -> Result<&mut TerminalWindow> {
        self.windows
            .get_mut(id)
            .ok_or_else(|| CanvasError::UnknownWindow(id.clone()))
    }

    fn next_terminal_id(&mut self) -> TerminalId {
        loop {
            let id = TerminalId::new(format!("term-{}", self.next_id));
            self.next_id += 1;
            if !self.windows.contains_key(&id) {
                return id;
            }
        }
    }

    // ---- lifecycle ------------------------------------------------------

    /// Creates an offline window, asks the session manager for a session and
    /// focuses it. The window binds when `spawned` comes back.
    pub fn spawn_window(&mut self, request: SpawnRequest, now: Instant) -> Result<TerminalId> {
        let id = match request.id {
            Some(id) if self.windows.contains_key(&id) => {
                return Err(CanvasError::DuplicateWindow(id));
            }
            Some(id) => id,
            None => self.next_terminal_id(),
        };
        let size = request
            .size
            .unwrap_or(Size::new(DEFAULT_WINDOW_WIDTH, DEFAULT_WINDOW_HEIGHT));
        self.insert_window(id.clone(), request.position, size);
        if let Some(title) = request.title
            && let Some(window) = self.windows.get_mut(&id)
        {
            window.set_title(title);
        }
        self.focus.focus(&id);
        self.fit_window(&id, now);
        let grid = self
            .windows
            .get(&id)
            .and_then(TerminalWindow::fitted)
            .unwrap_or(SPAWN_FALLBACK_GRID);
        tracing::info!(terminal_id = %id, grid = %grid, "spawning session");
        let delivery = deliver(
            &mut self.bridge,
            OutboundMessage::Spawn {
                terminal_id: id.clone(),
                cols: grid.cols,
                rows: grid.rows,
                command: request.command,
            },
        );
        if delivery == Delivery::Sent
            && let Some(window) = self.windows.get_mut(&id)
        {
            window.announce(grid);
        }
        Ok(id)
    }

    fn insert_window(&mut self, id: TerminalId, position: Option<Point>, size: Size) {
        let position = position.unwrap_or_else(|| {
            let occupied: Vec<Rect> = self
                .windows
                .values()
                .filter(|w| w.mode_kind() == ModeKind::Floating)
                .map(|w| w.geometry().rect())
                .collect();
            placement::spawn_position(self.view.visible_world_rect(), size, &occupied)
        });
        let window = TerminalWindow::new(
            id.clone(),
            Geometry::new(position, size),
            self.default_font.clone(),
        );
        self.focus.insert(id.clone());
        self.windows.insert(id, window);
    }

    /// Removes the window for good and tells the session manager to kill the
    /// session.
    pub fn close(&mut self, id: &TerminalId, now: Instant) -> Result<()> {
        let mut window = self
            .windows
            .remove(id)
            .ok_or_else(|| CanvasError::UnknownWindow(id.clone()))?;
        window.dispose();
        self.focus.remove(id);
        self.bus.remove(id);
        if self.drag.as_ref().and_then(Drag::window) == Some(id) {
            self.drag = None;
        }
        let was_docked = self.undock_slot(id);
        deliver(
            &mut self.bridge,
            OutboundMessage::Close {
                terminal_id: id.clone(),
            },
        );
        tracing::info!(terminal_id = %id, "window closed");
        if was_docked {
            self.refit_docked(now);
        }
        Ok(())
    }

    /// Leaves the session running on the manager and demotes the window to an
    /// offline placeholder.
    pub fn detach(&mut self, id: &TerminalId) -> Result<()> {
        let window = self.get_mut(id)?;
        if window.is_offline() {
            return Err(CanvasError::Offline(id.clone()));
        }
        window.dispose();
        window.unbind();
        deliver(
            &mut self.bridge,
            OutboundMessage::Detach {
                terminal_id: id.clone(),
            },
        );
        self.bus.publish(id, WindowEvent::Offline);
        tracing::info!(terminal_id = %id, "window detached");
        Ok(())
    }

    /// Asks the session manager to reattach an offline window's session. The
    /// window binds again when `spawned` arrives.
    pub fn reattach(&mut self, id: &TerminalId) -> Result<Delivery> {
        if !self.get(id)?.is_offline() {
            return Ok(Delivery::Dropped);
        }
        Ok(deliver(
            &mut self.bridge,
            OutboundMessage::Attach {
                terminal_id: id.clone(),
            },
        ))
    }

    pub fn handle_inbound(&mut self, message: InboundMessage, now: Instant) -> Result<()> {
        match message {
            InboundMessage::Output { terminal_id, data } => {
                self.get(&terminal_id)?;
                self.bus.publish(&terminal_id, WindowEvent::Output(data));
            }
            InboundMessage::Spawned { terminal_id } => {
                if !self.windows.contains_key(&terminal_id) {
                    // A session the manager already had, e.g. from a previous run.
                    let size = Size::new(DEFAULT_WINDOW_WIDTH, DEFAULT_WINDOW_HEIGHT);
                    self.insert_window(terminal_id.clone(), None, size);
                }
                self.get_mut(&terminal_id)?
                    .bind(SessionRef::new(terminal_id.clone()));
                tracing::debug!(terminal_id = %terminal_id, "session bound");
                self.bus.publish(&terminal_id, WindowEvent::Bound);
                self.refit(&terminal_id, now);
            }
            InboundMessage::Exited { terminal_id } => {
                let window = self.get_mut(&terminal_id)?;
                window.dispose();
                if window.unbind().is_some() {
                    tracing::info!(terminal_id = %terminal_id, "session exited");
                    self.bus.publish(&terminal_id, WindowEvent::Offline);
                }
            }
            InboundMessage::Process { terminal_id, name } => {
                let kind = ProgramKind::classify(&name);
                let window = self.get_mut(&terminal_id)?;
                window.set_title(name);
                window.set_program(kind);
            }
        }
        Ok(())
    }

    /// Local override of the program classification, e.g. while the emulator
    /// is on the alternate screen.
    pub fn set_program(&mut self, id: &TerminalId, kind: ProgramKind) -> Result<()> {
        let window = self.get_mut(id)?;
        if window.program() != kind {
            tracing::trace!(terminal_id = %id, ?kind, "program kind changed");
            window.set_program(kind);
        }
        Ok(())
    }

    // ---- geometry -------------------------------------------------------

    pub fn move_window(&mut self, id: &TerminalId, position: Point) -> Result<()> {
        self.get_mut(id)?.move_to(position)?;
        Ok(())
    }

    /// Screen-space drag delta.
    pub fn drag_window(&mut self, id: &TerminalId, dx: f64, dy: f64) -> Result<()> {
        let view = self.view;
        self.get_mut(id)?.drag_by(dx, dy, &view)?;
        Ok(())
    }

    pub fn resize_window(&mut self, id: &TerminalId, size: Size, now: Instant) -> Result<()> {
        self.get_mut(id)?.resize_to(size)?;
        self.refit(id, now);
        Ok(())
    }

    pub fn set_locked_zoom(&mut self, id: &TerminalId, zoom: f64) -> Result<()> {
        self.get_mut(id)?.set_locked_zoom(zoom)?;
        Ok(())
    }

    pub fn screen_rect(&self, id: &TerminalId) -> Result<Rect> {
        let window = self.get(id)?;
        Ok(window.frame_rect(&self.placement_for(id)))
    }

    pub fn placeholder_rect(&self, id: &TerminalId) -> Result<Option<Rect>> {
        let window = self.get(id)?;
        Ok(window.placeholder_rect(&self.placement_for(id)))
    }

    pub fn placement_for(&self, id: &TerminalId) -> Placement {
        let mut placement = Placement::new(self.view);
        if let Some(index) = self.dock_order.iter().position(|d| d == id) {
            placement.dock_slot = placement::dock_slots(self.view.viewport(), self.dock_order.len())
                .get(index)
                .copied();
        }
        placement
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.view.pan_by(dx, dy);
    }

    pub fn set_pan(&mut self, pan: Point) {
        self.view.set_pan(pan);
    }

    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        self.view.set_zoom(zoom)
    }

    pub fn zoom_at(&mut self, anchor: Point, factor: f64) -> bool {
        self.view.zoom_at(anchor, factor)
    }

    pub fn set_display_scale(&mut self, scale: f64) {
        self.view.set_display_scale(scale);
    }

    /// Host viewport resized; docked and maximized windows follow it.
    pub fn set_viewport(&mut self, viewport: Size, now: Instant) {
        if self.view.set_viewport(viewport) {
            tracing::debug!(width = viewport.width, height = viewport.height, "viewport resized");
            self.refit_all(now);
        }
    }

    pub fn set_visible(&mut self, visible: bool, now: Instant) {
        if self.view.set_visible(visible) {
            self.refit_all(now);
        }
    }

    // ---- modes and focus ------------------------------------------------

    pub fn transition(
        &mut self,
        id: &TerminalId,
        transition: Transition,
        now: Instant,
    ) -> Result<()> {
        let placement = self.placement_for(id);
        let window = self.get_mut(id)?;
        if let Err(err) = window.transition(transition, &placement) {
            tracing::warn!(terminal_id = %id, error = %err, "rejected window transition");
            return Err(err.into());
        }
        let mode = window.mode_kind();
        match transition {
            Transition::Dock => self.dock_order.push(id.clone()),
            Transition::Undock => {
                self.undock_slot(id);
            }
            _ => {}
        }
        self.bus.publish(id, WindowEvent::ModeChanged(mode));
        if matches!(transition, Transition::Dock | Transition::Undock) {
            // Every docked slot moved.
            self.refit_docked(now);
        }
        self.refit(id, now);
        Ok(())
    }

    pub fn toggle_maximize(&mut self, id: &TerminalId, now: Instant) -> Result<()> {
        let transition = match self.get(id)?.mode_kind() {
            ModeKind::Maximized => Transition::Restore,
            _ => Transition::Maximize,
        };
        self.transition(id, transition, now)
    }

    pub fn toggle_lock(&mut self, id: &TerminalId, now: Instant) -> Result<()> {
        let transition = match self.get(id)?.mode_kind() {
            ModeKind::Locked => Transition::Unlock,
            _ => Transition::Lock,
        };
        self.transition(id, transition, now)
    }

    pub fn toggle_dock(&mut self, id: &TerminalId, now: Instant) -> Result<()> {
        let transition = match self.get(id)?.mode_kind() {
            ModeKind::Docked => Transition::Undock,
            _ => Transition::Dock,
        };
        self.transition(id, transition, now)
    }

    fn undock_slot(&mut self, id: &TerminalId) -> bool {
        let before = self.dock_order.len();
        self.dock_order.retain(|d| d != id);
        before != self.dock_order.len()
    }

    pub fn focus(&mut self, id: &TerminalId) -> Result<u64> {
        self.focus
            .focus(id)
            .ok_or_else(|| CanvasError::UnknownWindow(id.clone()))
    }

    pub fn blur(&mut self) {
        self.focus.blur();
    }

    pub fn cycle_focus(&mut self, forward: bool) -> Option<TerminalId> {
        self.focus.cycle(forward)
    }

    pub fn set_font(&mut self, id: &TerminalId, font: FontSpec, now: Instant) -> Result<()> {
        if self.get_mut(id)?.set_font(font) {
            self.refit(id, now);
        }
        Ok(())
    }

    // ---- fitting and timers ---------------------------------------------

    /// Refits one window. A hidden viewport is not laid out, so nothing is
    /// fitted until it shows again.
    fn refit(&mut self, id: &TerminalId, now: Instant) -> Option<FitResult> {
        if !self.view.visible() {
            return None;
        }
        self.fit_window(id, now)
    }

    fn fit_window(&mut self, id: &TerminalId, now: Instant) -> Option<FitResult> {
        let placement = self.placement_for(id);
        let result = self.windows.get_mut(id)?.refit(&placement, now);
        self.publish_fit(id, result);
        Some(result)
    }

    fn refit_all(&mut self, now: Instant) {
        let ids: Vec<TerminalId> = self.windows.keys().cloned().collect();
        for id in &ids {
            self.refit(id, now);
        }
    }

    fn refit_docked(&mut self, now: Instant) {
        let ids = self.dock_order.clone();
        for id in &ids {
            self.refit(id, now);
        }
    }

    fn publish_fit(&mut self, id: &TerminalId, result: FitResult) {
        if let FitResult::Fitted {
            grid,
            changed: true,
            ..
        } = result
        {
            self.bus.publish(id, WindowEvent::Fitted(grid));
        }
    }

    /// Services every due deadline. Returns what happened per window.
    pub fn tick(&mut self, now: Instant) -> Vec<(TerminalId, PollOutcome)> {
        let mut report = Vec::new();
        let ids: Vec<TerminalId> = self.windows.keys().cloned().collect();
        for id in ids {
            let placement = self.placement_for(&id);
            let Some(window) = self.windows.get_mut(&id) else {
                continue;
            };
            let poll = window.poll(now, &mut self.bridge);
            let retried = poll
                .refit_due
                .then(|| window.retry_fit(&placement, now));
            if let Some(result) = retried {
                self.publish_fit(&id, result);
            }
            if let Some((grid, Delivery::Sent)) = poll.negotiation.negotiated {
                self.bus.publish(&id, WindowEvent::Negotiated(grid));
            }
            if !poll.negotiation.is_empty() {
                report.push((id, poll.negotiation));
            }
        }
        report
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.windows
            .values()
            .filter_map(TerminalWindow::next_deadline)
            .min()
    }

    // ---- pointer routing ------------------------------------------------

    /// Ids in paint order: inline windows first, then each portal layer,
    /// each layer ordered by z.
    pub fn paint_order(&self) -> Vec<TerminalId> {
        let mut order: Vec<(u8, u64, &TerminalId)> = self
            .windows
            .values()
            .map(|w| {
                (
                    layer(w.render_target()),
                    self.focus.z_index(w.id()).unwrap_or(0),
                    w.id(),
                )
            })
            .collect();
        order.sort();
        order.into_iter().map(|(_, _, id)| id.clone()).collect()
    }

    /// Topmost window whose frame contains `point`.
    pub fn top_at(&self, point: Point) -> Option<(TerminalId, FrameHit)> {
        self.paint_order().into_iter().rev().find_map(|id| {
            let window = self.windows.get(&id)?;
            let placement = self.placement_for(&id);
            let frame = window.frame_rect(&placement);
            let title = window.title_rect(&placement);
            // Borders are one host cell thick whatever the zoom.
            let grip = Size::new(HOST_CELL_WIDTH_PX, HOST_CELL_HEIGHT_PX);
            placement::hit_frame(frame, title, grip, point).map(|hit| (id, hit))
        })
    }

    /// Routes one host pointer event: continues a drag, starts one on a frame,
    /// hands surface events to the corrector and the window's emulator, and
    /// lets everything else fall through to the canvas.
    pub fn handle_pointer<S: SurfaceSet + ?Sized>(
        &mut self,
        event: PointerEvent,
        now: Instant,
        surfaces: &mut S,
    ) -> PointerRoute {
        if let Some(route) = self.continue_drag(&event, now) {
            return route;
        }
        let Some((id, hit)) = self.top_at(event.client) else {
            return self.canvas_pointer(&event);
        };
        if event.kind == PointerKind::Down {
            self.focus.focus(&id);
        }
        let Some((mode, start)) = self.windows.get(&id).map(|w| (w.mode(), w.geometry())) else {
            return PointerRoute::Ignored;
        };
        let primary_down =
            event.kind == PointerKind::Down && event.button == PointerButton::Primary;
        match hit {
            FrameHit::Title => {
                if primary_down && mode.allows(Gesture::Move) {
                    self.drag = Some(Drag::Move {
                        id: id.clone(),
                        last: event.client,
                    });
                } else if event.kind == PointerKind::DoubleClick {
                    // Rejections are already logged.
                    let _ = self.toggle_maximize(&id, now);
                } else if event.kind == PointerKind::Wheel {
                    return self.canvas_pointer(&event);
                }
                PointerRoute::Frame(id)
            }
            FrameHit::Edge(edge) if mode.allows(Gesture::Resize) => {
                if primary_down {
                    self.drag = Some(Drag::Resize {
                        id: id.clone(),
                        edge,
                        start,
                        anchor: event.client,
                    });
                }
                PointerRoute::Frame(id)
            }
            _ => self.dispatch_to_surface(&id, &event, surfaces),
        }
    }

    fn dispatch_to_surface<S: SurfaceSet + ?Sized>(
        &mut self,
        id: &TerminalId,
        event: &PointerEvent,
        surfaces: &mut S,
    ) -> PointerRoute {
        let placement = self.placement_for(id);
        let window_focused = self.focus.is_focused(id);
        let dragging = self.drag.as_ref().and_then(Drag::window) == Some(id);
        // The focused window can sit under a portal layer.
        let in_focused_region = self
            .focus
            .owner()
            .and_then(|owner| {
                let focused = self.windows.get(owner)?;
                let metrics = focused.surface_metrics(&self.placement_for(owner));
                Some(metrics.visual.contains(event.client))
            })
            .unwrap_or(false);
        let Some(window) = self.windows.get_mut(id) else {
            return PointerRoute::Ignored;
        };
        let ctx = InterceptContext {
            surface: window.surface_metrics(&placement),
            window_focused,
            in_focused_region,
            dragging,
        };
        let native = if window.is_offline() {
            None
        } else {
            surfaces.surface_mut(id)
        };
        let Some(native) = native else {
            return if event.kind == PointerKind::Wheel {
                self.canvas_pointer(event)
            } else {
                PointerRoute::Frame(id.clone())
            };
        };
        match window.corrector_mut().handle(event, &ctx, native) {
            Dispatch::Bubbled => self.canvas_pointer(event),
            dispatch => PointerRoute::Surface {
                id: id.clone(),
                dispatch,
            },
        }
    }

    fn canvas_pointer(&mut self, event: &PointerEvent) -> PointerRoute {
        match event.kind {
            PointerKind::Down if event.button == PointerButton::Primary => {
                self.focus.blur();
                self.drag = Some(Drag::Pan { last: event.client });
                PointerRoute::Canvas
            }
            PointerKind::Wheel if event.modifiers.ctrl => {
                let factor = if event.wheel.y < 0.0 {
                    WHEEL_ZOOM_FACTOR
                } else {
                    1.0 / WHEEL_ZOOM_FACTOR
                };
                self.view.zoom_at(event.client, factor);
                PointerRoute::Canvas
            }
            PointerKind::Wheel => {
                self.view.pan_by(-event.wheel.x, -event.wheel.y);
                PointerRoute::Canvas
            }
            _ => PointerRoute::Ignored,
        }
    }

    fn continue_drag(&mut self, event: &PointerEvent, now: Instant) -> Option<PointerRoute> {
        if !matches!(event.kind, PointerKind::Move | PointerKind::Up) {
            return None;
        }
        let drag = self.drag.take()?;
        let finished = event.kind == PointerKind::Up;
        let route = match drag {
            Drag::Move { id, last } => {
                let view = self.view;
                let window = self.windows.get_mut(&id)?;
                let (dx, dy) = (event.client.x - last.x, event.client.y - last.y);
                if let Err(err) = window.drag_by(dx, dy, &view) {
                    tracing::debug!(terminal_id = %id, error = %err, "drag ended by mode change");
                    return Some(PointerRoute::Frame(id));
                }
                if !finished {
                    self.drag = Some(Drag::Move {
                        id: id.clone(),
                        last: event.client,
                    });
                }
                PointerRoute::Frame(id)
            }
            Drag::Resize {
                id,
                edge,
                start,
                anchor,
            } => {
                let zoom = self.view.transform().zoom();
                let dx = (event.client.x - anchor.x) / zoom;
                let dy = (event.client.y - anchor.y) / zoom;
                let geometry = placement::apply_resize(start, edge, dx, dy);
                let window = self.windows.get_mut(&id)?;
                if window.geometry() != geometry {
                    if let Err(err) = window.reshape(geometry) {
                        tracing::debug!(terminal_id = %id, error = %err, "resize ended by mode change");
                        return Some(PointerRoute::Frame(id));
                    }
                    self.refit(&id, now);
                }
                if !finished {
                    self.drag = Some(Drag::Resize {
                        id: id.clone(),
                        edge,
                        start,
                        anchor,
                    });
                }
                PointerRoute::Frame(id)
            }
            Drag::Pan { last } => {
                self.view
                    .pan_by(event.client.x - last.x, event.client.y - last.y);
                if !finished {
                    self.drag = Some(Drag::Pan { last: event.client });
                }
                PointerRoute::Canvas
            }
        };
        Some(route)
    }
}

fn layer(target: RenderTarget) -> u8 {
    match target {
        RenderTarget::Inline => 0,
        RenderTarget::ViewportPortal => 1,
        RenderTarget::DockPortal => 2,
        RenderTarget::FullscreenPortal => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryBridge;
    use std::time::Duration;

    fn canvas() -> Canvas<MemoryBridge> {
        let mut view = CanvasView::default();
        view.set_viewport(Size::new(1280.0, 800.0));
        Canvas::new(MemoryBridge::new(), view, FontSpec::default())
    }

    fn spawn_at(c: &mut Canvas<MemoryBridge>, name: &str, x: f64, y: f64, now: Instant) -> TerminalId {
        let id = c
            .spawn_window(
                SpawnRequest {
                    id: Some(TerminalId::new(name)),
                    position: Some(Point::new(x, y)),
                    size: Some(Size::new(600.0, 400.0)),
                    ..SpawnRequest::default()
                },
                now,
            )
            .unwrap();
        c.handle_inbound(
            InboundMessage::Spawned {
                terminal_id: id.clone(),
            },
            now,
        )
        .unwrap();
        id
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<PointerEvent>,
    }

    impl PointerTarget for Recorder {
        fn dispatch_pointer(&mut self, event: &PointerEvent) {
            self.seen.push(*event);
        }
    }

    #[test]
    fn spawn_sends_fitted_grid_then_binds() {
        let mut c = canvas();
        let now = Instant::now();
        let id = spawn_at(&mut c, "a", 0.0, 0.0, now);
        let sent = c.bridge().sent();
        assert_eq!(
            sent[0],
            OutboundMessage::Spawn {
                terminal_id: id.clone(),
                cols: 75,
                rows: 24,
                command: None
            }
        );
        assert!(!c.window(&id).unwrap().is_offline());
        assert_eq!(c.focused(), Some(&id));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut c = canvas();
        let now = Instant::now();
        spawn_at(&mut c, "a", 0.0, 0.0, now);
        let err = c
            .spawn_window(
                SpawnRequest {
                    id: Some("a".into()),
                    ..SpawnRequest::default()
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, CanvasError::DuplicateWindow(_)));
    }

    #[test]
    fn unknown_window_is_an_error() {
        let mut c = canvas();
        let err = c.close(&"nope".into(), Instant::now()).unwrap_err();
        assert!(matches!(err, CanvasError::UnknownWindow(_)));
        let err = c
            .handle_inbound(
                InboundMessage::Output {
                    terminal_id: "nope".into(),
                    data: "x".into(),
                },
                Instant::now(),
            )
            .unwrap_err();
        assert!(matches!(err, CanvasError::UnknownWindow(_)));
    }

    #[test]
    fn title_drag_moves_in_world_space() {
        let mut c = canvas();
        let now = Instant::now();
        let id = spawn_at(&mut c, "a", 100.0, 100.0, now);
        c.set_zoom(0.5);
        let mut surfaces: BTreeMap<TerminalId, Recorder> = BTreeMap::new();
        let down = PointerEvent::new(PointerKind::Down, Point::new(60.0, 52.0))
            .with_button(PointerButton::Primary);
        assert_eq!(c.handle_pointer(down, now, &mut surfaces), PointerRoute::Frame(id.clone()));
        let mv = PointerEvent::new(PointerKind::Move, Point::new(70.0, 57.0));
        c.handle_pointer(mv, now, &mut surfaces);
        let up = PointerEvent::new(PointerKind::Up, Point::new(70.0, 57.0));
        c.handle_pointer(up, now, &mut surfaces);
        assert!(!c.is_dragging());
        assert_eq!(c.window(&id).unwrap().geometry().position, Point::new(120.0, 110.0));
    }

    #[test]
    fn surface_click_is_corrected_and_delivered() {
        let mut c = canvas();
        let now = Instant::now();
        let id = spawn_at(&mut c, "a", 100.0, 100.0, now);
        c.set_zoom(0.5);
        let mut surfaces = BTreeMap::new();
        surfaces.insert(id.clone(), Recorder::default());
        // Surface starts at (50, 58) on screen, drawn at half size.
        let down = PointerEvent::new(PointerKind::Down, Point::new(60.0, 68.0))
            .with_button(PointerButton::Primary);
        let route = c.handle_pointer(down, now, &mut surfaces);
        assert_eq!(
            route,
            PointerRoute::Surface {
                id: id.clone(),
                dispatch: Dispatch::Corrected
            }
        );
        let got = surfaces[&id].seen[0];
        assert_eq!(got.client, Point::new(70.0, 78.0));
        assert_eq!(c.window(&id).unwrap().corrector().corrections(), 1);
    }

    #[test]
    fn wheel_on_unfocused_window_pans_canvas() {
        let mut c = canvas();
        let now = Instant::now();
        let id = spawn_at(&mut c, "a", 100.0, 100.0, now);
        c.blur();
        let mut surfaces = BTreeMap::new();
        surfaces.insert(id.clone(), Recorder::default());
        let wheel = PointerEvent::new(PointerKind::Wheel, Point::new(300.0, 300.0)).with_wheel(0.0, 48.0);
        assert_eq!(c.handle_pointer(wheel, now, &mut surfaces), PointerRoute::Canvas);
        assert_eq!(c.view().pan(), Point::new(0.0, -48.0));
        assert!(surfaces[&id].seen.is_empty());
    }

    #[test]
    fn edge_drag_resizes_and_negotiates_once() {
        let mut c = canvas();
        let now = Instant::now();
        let id = spawn_at(&mut c, "a", 0.0, 0.0, now);
        c.tick(now + Duration::from_millis(200));
        c.bridge_mut().take_sent();
        let mut surfaces: BTreeMap<TerminalId, Recorder> = BTreeMap::new();
        let down = PointerEvent::new(PointerKind::Down, Point::new(598.0, 398.0))
            .with_button(PointerButton::Primary);
        c.handle_pointer(down, now, &mut surfaces);
        for step in 1..=5 {
            let p = Point::new(598.0 + 16.0 * step as f64, 398.0);
            c.handle_pointer(PointerEvent::new(PointerKind::Move, p), now, &mut surfaces);
        }
        c.handle_pointer(
            PointerEvent::new(PointerKind::Up, Point::new(678.0, 398.0)),
            now,
            &mut surfaces,
        );
        assert_eq!(c.window(&id).unwrap().geometry().size.width, 680.0);
        c.tick(now + Duration::from_millis(200));
        assert_eq!(c.bridge().resizes(), vec![(id, 85, 24)]);
    }

    #[test]
    fn docking_assigns_slots_in_dock_order() {
        let mut c = canvas();
        let now = Instant::now();
        let a = spawn_at(&mut c, "a", 0.0, 0.0, now);
        let b = spawn_at(&mut c, "b", 700.0, 0.0, now);
        c.transition(&a, Transition::Dock, now).unwrap();
        c.transition(&b, Transition::Dock, now).unwrap();
        let ra = c.screen_rect(&a).unwrap();
        let rb = c.screen_rect(&b).unwrap();
        assert_eq!(ra, Rect::new(845.0, 0.0, 435.0, 400.0));
        assert_eq!(rb, Rect::new(845.0, 400.0, 435.0, 400.0));
        assert!(c.drag_window(&a, 5.0, 5.0).is_err());
        c.transition(&a, Transition::Undock, now).unwrap();
        assert_eq!(c.screen_rect(&b).unwrap(), Rect::new(845.0, 0.0, 435.0, 800.0));
    }

    #[test]
    fn maximized_paints_above_everything() {
        let mut c = canvas();
        let now = Instant::now();
        let a = spawn_at(&mut c, "a", 0.0, 0.0, now);
        let b = spawn_at(&mut c, "b", 50.0, 50.0, now);
        c.transition(&a, Transition::Maximize, now).unwrap();
        assert_eq!(c.paint_order(), vec![b, a.clone()]);
        let (top, _) = c.top_at(Point::new(100.0, 100.0)).unwrap();
        assert_eq!(top, a);
    }

    #[test]
    fn exit_and_reattach() {
        let mut c = canvas();
        let now = Instant::now();
        let id = spawn_at(&mut c, "a", 0.0, 0.0, now);
        let events = c.subscribe(&id);
        c.handle_inbound(
            InboundMessage::Exited {
                terminal_id: id.clone(),
            },
            now,
        )
        .unwrap();
        assert!(c.window(&id).unwrap().is_offline());
        assert_eq!(events.try_recv().unwrap(), WindowEvent::Offline);
        assert_eq!(c.reattach(&id).unwrap(), Delivery::Sent);
        assert_eq!(
            c.bridge().sent().last(),
            Some(&OutboundMessage::Attach {
                terminal_id: id.clone()
            })
        );
    }

    #[test]
    fn process_notification_classifies_and_titles() {
        let mut c = canvas();
        let now = Instant::now();
        let id = spawn_at(&mut c, "a", 0.0, 0.0, now);
        c.handle_inbound(
            InboundMessage::Process {
                terminal_id: id.clone(),
                name: "nvim".into(),
            },
            now,
        )
        .unwrap();
        let w = c.window(&id).unwrap();
        assert_eq!(w.program(), ProgramKind::FullScreen);
        assert_eq!(w.title(), "nvim");
    }

    fn fitted(c: &Canvas<MemoryBridge>, id: &TerminalId) -> Option<GridSize> {
        c.window(id).and_then(TerminalWindow::fitted)
    }

    #[test]
    fn font_change_refits_and_negotiates_once() {
        let mut c = canvas();
        let t0 = Instant::now();
        let id = spawn_at(&mut c, "a", 0.0, 0.0, t0);
        assert_eq!(fitted(&c, &id), Some(GridSize::new(75, 24)));

        c.set_font(&id, FontSpec::new("monospace", 15.0), t0).unwrap();
        assert_eq!(fitted(&c, &id), Some(GridSize::new(66, 21)));
        c.tick(t0 + Duration::from_millis(199));
        assert!(c.bridge().resizes().is_empty());
        c.tick(t0 + Duration::from_millis(200));
        assert_eq!(c.bridge().resizes(), vec![(id, 66, 21)]);
    }

    #[test]
    fn hidden_canvas_defers_fitting_until_shown() {
        let mut c = canvas();
        let t0 = Instant::now();
        let id = spawn_at(&mut c, "a", 0.0, 0.0, t0);

        c.set_visible(false, t0);
        c.resize_window(&id, Size::new(680.0, 400.0), t0 + Duration::from_millis(10))
            .unwrap();
        assert_eq!(fitted(&c, &id), Some(GridSize::new(75, 24)));
        assert_eq!(c.next_deadline(), None);

        let t1 = t0 + Duration::from_millis(500);
        c.set_visible(true, t1);
        assert_eq!(fitted(&c, &id), Some(GridSize::new(85, 24)));
        c.tick(t1 + Duration::from_millis(200));
        assert_eq!(c.bridge().resizes(), vec![(id, 85, 24)]);
    }

    #[test]
    fn viewport_resize_refits_maximized_window() {
        let mut c = canvas();
        let t0 = Instant::now();
        let id = spawn_at(&mut c, "a", 0.0, 0.0, t0);
        c.toggle_maximize(&id, t0).unwrap();
        assert_eq!(fitted(&c, &id), Some(GridSize::new(156, 47)));
        c.tick(t0 + Duration::from_millis(200));
        c.bridge_mut().take_sent();

        let t1 = t0 + Duration::from_millis(300);
        c.set_viewport(Size::new(1000.0, 700.0), t1);
        assert_eq!(fitted(&c, &id), Some(GridSize::new(121, 40)));
        c.tick(t1 + Duration::from_millis(200));
        c.tick(t1 + Duration::from_millis(600));
        assert_eq!(c.bridge().resizes(), vec![(id, 121, 40)]);
    }

    #[test]
    fn viewport_resize_refits_docked_window() {
        let mut c = canvas();
        let t0 = Instant::now();
        let id = spawn_at(&mut c, "a", 0.0, 0.0, t0);
        c.toggle_dock(&id, t0).unwrap();
        assert_eq!(fitted(&c, &id), Some(GridSize::new(54, 49)));
        c.tick(t0 + Duration::from_millis(200));
        c.bridge_mut().take_sent();

        let t1 = t0 + Duration::from_millis(300);
        c.set_viewport(Size::new(1000.0, 700.0), t1);
        assert_eq!(fitted(&c, &id), Some(GridSize::new(42, 42)));
        c.tick(t1 + Duration::from_millis(200));
        c.tick(t1 + Duration::from_millis(600));
        assert_eq!(c.bridge().resizes(), vec![(id, 42, 42)]);
    }

    #[test]
    fn closing_a_docked_window_refits_the_rest_from_the_given_instant() {
        let mut c = canvas();
        let t0 = Instant::now();
        let a = spawn_at(&mut c, "a", 0.0, 0.0, t0);
        let b = spawn_at(&mut c, "b", 700.0, 0.0, t0);
        c.toggle_dock(&a, t0).unwrap();
        c.toggle_dock(&b, t0).unwrap();
        assert_eq!(fitted(&c, &b), Some(GridSize::new(54, 24)));
        c.tick(t0 + Duration::from_millis(200));
        c.bridge_mut().take_sent();

        let t1 = t0 + Duration::from_millis(1000);
        c.close(&a, t1).unwrap();
        assert_eq!(fitted(&c, &b), Some(GridSize::new(54, 49)));
        assert_eq!(c.next_deadline(), Some(t1 + Duration::from_millis(200)));
    }

    #[test]
    fn wheel_over_focused_region_stays_with_the_surface() {
        let mut c = canvas();
        let now = Instant::now();
        let a = spawn_at(&mut c, "a", 100.0, 100.0, now);
        let b = spawn_at(&mut c, "b", 300.0, 200.0, now);
        c.toggle_lock(&b, now).unwrap();
        c.focus(&a).unwrap();
        let mut surfaces = BTreeMap::new();
        surfaces.insert(a.clone(), Recorder::default());
        surfaces.insert(b.clone(), Recorder::default());

        // The locked window paints above `a`, and `a` is focused underneath.
        let wheel = PointerEvent::new(PointerKind::Wheel, Point::new(500.0, 400.0))
            .with_wheel(0.0, 3.0);
        let route = c.handle_pointer(wheel, now, &mut surfaces);
        assert_eq!(
            route,
            PointerRoute::Surface {
                id: b.clone(),
                dispatch: Dispatch::Delivered
            }
        );
        assert_eq!(c.view().pan(), Point::new(0.0, 0.0));

        // Outside `a`, the unfocused surface lets the canvas scroll.
        let wheel = PointerEvent::new(PointerKind::Wheel, Point::new(800.0, 560.0))
            .with_wheel(0.0, 3.0);
        assert_eq!(c.handle_pointer(wheel, now, &mut surfaces), PointerRoute::Canvas);
        assert_eq!(c.view().pan(), Point::new(0.0, -3.0));
        assert_eq!(surfaces[&b].seen.len(), 1);
    }
}
