pub mod decorator;
mod mode;

use std::time::Instant;

pub use mode::{Gesture, ModeKind, RenderTarget, Transition, TransitionError, WindowMode};

use crate::bridge::{SessionBridge, SessionRef, TerminalId};
use crate::constants::{
    LAYOUT_RETRY_DELAY, LAYOUT_RETRY_LIMIT, MAX_ZOOM, MIN_ZOOM, TITLE_BAR_HEIGHT,
};
use crate::geometry::{Geometry, Point, Rect, Size};
use crate::grid::{self, FontSpec, GridSize};
use crate::negotiator::{Offer, PollOutcome, ResizeNegotiator};
use crate::placement::overlay_rect;
use crate::pointer::{PointerCorrector, SurfaceMetrics};
use crate::program::ProgramKind;
use crate::timer::{RetryBudget, RetryOutcome};
use crate::viewport::CanvasView;

/// Screen-space facts a window needs to place itself for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub view: CanvasView,
    /// Slot assigned by the dock; only meaningful while docked.
    pub dock_slot: Option<Rect>,
    /// Fullscreen overlay container.
    pub overlay: Rect,
}

impl Placement {
    pub fn new(view: CanvasView) -> Self {
        Self {
            view,
            dock_slot: None,
            overlay: overlay_rect(view.viewport()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitResult {
    /// Grid computed; `changed` says whether it differs from the last fit.
    Fitted {
        grid: GridSize,
        changed: bool,
        offer: Option<Offer>,
    },
    /// Not laid out yet; will retry.
    Deferred { attempt: u8 },
    /// Retries exhausted; the last known grid stays in effect.
    GaveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowPoll {
    pub refit_due: bool,
    pub negotiation: PollOutcome,
}

/// One terminal window on the canvas, live or offline.
#[derive(Debug)]
pub struct TerminalWindow {
    id: TerminalId,
    title: String,
    geometry: Geometry,
    mode: WindowMode,
    font: FontSpec,
    program: ProgramKind,
    session: Option<SessionRef>,
    fitted: Option<GridSize>,
    /// Grid sent with the spawn request, taken over when the session binds.
    announced: Option<GridSize>,
    negotiator: ResizeNegotiator,
    layout_retry: RetryBudget,
    corrector: PointerCorrector,
}

impl TerminalWindow {
    pub fn new(id: TerminalId, geometry: Geometry, font: FontSpec) -> Self {
        Self {
            title: id.to_string(),
            id,
            geometry: geometry.clamped(),
            mode: WindowMode::Floating,
            font,
            program: ProgramKind::Shell,
            session: None,
            fitted: None,
            announced: None,
            negotiator: ResizeNegotiator::new(),
            layout_retry: RetryBudget::new(LAYOUT_RETRY_LIMIT, LAYOUT_RETRY_DELAY),
            corrector: PointerCorrector::new(),
        }
    }

    pub fn id(&self) -> &TerminalId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    pub fn mode_kind(&self) -> ModeKind {
        self.mode.kind()
    }

    pub fn render_target(&self) -> RenderTarget {
        self.mode.render_target()
    }

    pub fn font(&self) -> &FontSpec {
        &self.font
    }

    /// Returns true when the cell metrics changed (a refit is needed).
    pub fn set_font(&mut self, font: FontSpec) -> bool {
        let changed = font.metrics() != self.font.metrics();
        self.font = font;
        changed
    }

    pub fn program(&self) -> ProgramKind {
        self.program
    }

    pub fn set_program(&mut self, program: ProgramKind) {
        self.program = program;
    }

    pub fn session(&self) -> Option<&SessionRef> {
        self.session.as_ref()
    }

    pub fn is_offline(&self) -> bool {
        self.session.is_none()
    }

    /// Binds to a (new) session. Whatever was negotiated with a previous
    /// session is forgotten; a grid sent in the spawn request counts as
    /// already negotiated.
    pub fn bind(&mut self, session: SessionRef) {
        self.session = Some(session);
        self.negotiator.forget();
        if let Some(grid) = self.announced.take() {
            self.negotiator.assume(grid);
        }
    }

    /// Remembers the grid the session will be created with.
    pub fn announce(&mut self, grid: GridSize) {
        self.announced = Some(grid);
    }

    /// Demotes to an offline placeholder. Geometry and mode are kept.
    pub fn unbind(&mut self) -> Option<SessionRef> {
        self.negotiator.forget();
        self.announced = None;
        self.layout_retry.reset();
        self.program = ProgramKind::Shell;
        self.session.take()
    }

    pub fn fitted(&self) -> Option<GridSize> {
        self.fitted
    }

    pub fn last_negotiated(&self) -> Option<GridSize> {
        self.negotiator.last_negotiated()
    }

    pub fn corrector(&self) -> &PointerCorrector {
        &self.corrector
    }

    pub fn corrector_mut(&mut self) -> &mut PointerCorrector {
        &mut self.corrector
    }

    /// Moves by a screen-space delta. Floating windows move in world space
    /// (the delta is divided by the effective zoom); locked windows move in
    /// viewport space.
    pub fn drag_by(&mut self, dx: f64, dy: f64, view: &CanvasView) -> Result<(), TransitionError> {
        self.mode.check(Gesture::Move)?;
        match &mut self.mode {
            WindowMode::Locked {
                viewport_position, ..
            } => {
                *viewport_position = viewport_position.offset(dx, dy);
            }
            _ => {
                let zoom = view.transform().zoom();
                let position = self.geometry.position.offset(dx / zoom, dy / zoom);
                self.geometry = Geometry::new(position, self.geometry.size).clamped();
            }
        }
        Ok(())
    }

    pub fn move_to(&mut self, position: Point) -> Result<(), TransitionError> {
        self.mode.check(Gesture::Move)?;
        if let WindowMode::Locked {
            viewport_position, ..
        } = &mut self.mode
        {
            *viewport_position = position;
        } else {
            self.geometry = Geometry::new(position, self.geometry.size).clamped();
        }
        Ok(())
    }

    pub fn resize_to(&mut self, size: Size) -> Result<(), TransitionError> {
        self.mode.check(Gesture::Resize)?;
        self.geometry = Geometry::new(self.geometry.position, size).clamped();
        Ok(())
    }

    /// Edge drags move the origin and the size together.
    pub fn reshape(&mut self, geometry: Geometry) -> Result<(), TransitionError> {
        self.mode.check(Gesture::Resize)?;
        self.geometry = geometry.clamped();
        Ok(())
    }

    pub fn set_locked_zoom(&mut self, zoom: f64) -> Result<(), TransitionError> {
        self.mode.check(Gesture::LockedZoom)?;
        if let WindowMode::Locked { zoom: current, .. } = &mut self.mode
            && zoom.is_finite()
        {
            *current = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
        Ok(())
    }

    /// Applies a mode transition. On error nothing changes.
    pub fn transition(
        &mut self,
        transition: Transition,
        placement: &Placement,
    ) -> Result<(), TransitionError> {
        let frame = self.frame_rect(placement);
        let lock_at = (frame.origin(), placement.view.zoom());
        let next = self.mode.next(transition, self.geometry, lock_at)?;
        if let (Transition::Restore, WindowMode::Maximized { saved }) = (transition, self.mode) {
            // Bit-for-bit; `saved` was clamped when it was taken.
            self.geometry = saved;
        }
        tracing::debug!(
            terminal_id = %self.id,
            from = %self.mode.kind(),
            to = %next.kind(),
            "window transition"
        );
        self.mode = next;
        Ok(())
    }

    /// Whole window (title bar + surface) on screen.
    pub fn frame_rect(&self, placement: &Placement) -> Rect {
        let view = &placement.view;
        match self.mode {
            WindowMode::Floating => view.transform().world_rect_to_screen(self.geometry.rect()),
            WindowMode::Locked {
                viewport_position,
                zoom,
            } => Rect::from_parts(
                viewport_position,
                self.geometry.size.scaled(zoom * view.display_scale()),
            ),
            WindowMode::Docked => placement.dock_slot.unwrap_or_default(),
            WindowMode::Maximized { .. } => placement.overlay,
        }
    }

    /// Visual scale applied to this window's layout box.
    pub fn visual_scale(&self, view: &CanvasView) -> f64 {
        match self.mode {
            WindowMode::Floating => view.transform().zoom(),
            WindowMode::Locked { zoom, .. } => zoom * view.display_scale(),
            WindowMode::Docked | WindowMode::Maximized { .. } => 1.0,
        }
    }

    pub fn title_rect(&self, placement: &Placement) -> Rect {
        let scale = self.visual_scale(&placement.view);
        self.frame_rect(placement).split_top(TITLE_BAR_HEIGHT * scale).0
    }

    /// Layout-pixel box available to the terminal surface (the offset size).
    pub fn layout_box(&self, placement: &Placement) -> Size {
        let outer = match self.mode {
            WindowMode::Floating | WindowMode::Locked { .. } => self.geometry.size,
            WindowMode::Docked => placement.dock_slot.unwrap_or_default().size(),
            WindowMode::Maximized { .. } => placement.overlay.size(),
        };
        Size::new(outer.width, (outer.height - TITLE_BAR_HEIGHT).max(0.0))
    }

    pub fn surface_metrics(&self, placement: &Placement) -> SurfaceMetrics {
        let scale = self.visual_scale(&placement.view);
        let (_, visual) = self
            .frame_rect(placement)
            .split_top(TITLE_BAR_HEIGHT * scale);
        SurfaceMetrics::new(visual, self.layout_box(placement))
    }

    /// World-space rectangle left on the canvas while the window is rendered
    /// elsewhere, so the spot it came from stays visible.
    pub fn placeholder_rect(&self, placement: &Placement) -> Option<Rect> {
        match self.mode {
            WindowMode::Locked { .. } => Some(
                placement
                    .view
                    .transform()
                    .world_rect_to_screen(self.geometry.rect()),
            ),
            _ => None,
        }
    }

    /// Recomputes the grid for the current render target and offers it to the
    /// negotiator. A fresh trigger restarts the layout retry budget.
    pub fn refit(&mut self, placement: &Placement, now: Instant) -> FitResult {
        self.layout_retry.reset();
        self.retry_fit(placement, now)
    }

    /// Fit attempt driven by the layout retry deadline; spends the budget.
    pub fn retry_fit(&mut self, placement: &Placement, now: Instant) -> FitResult {
        let layout = self.layout_box(placement);
        let Some(grid) = grid::fit(layout, self.font.metrics()) else {
            return match self.layout_retry.schedule(now) {
                RetryOutcome::Scheduled { attempt } => FitResult::Deferred { attempt },
                RetryOutcome::Exhausted => {
                    tracing::warn!(
                        terminal_id = %self.id,
                        last_grid = ?self.fitted,
                        "container never got a size; keeping last grid"
                    );
                    FitResult::GaveUp
                }
            };
        };
        self.layout_retry.reset();
        let changed = self.fitted != Some(grid);
        self.fitted = Some(grid);
        let offer = self
            .session
            .is_some()
            .then(|| self.negotiator.offer(grid, self.program, now));
        FitResult::Fitted {
            grid,
            changed,
            offer,
        }
    }

    pub fn poll<B: SessionBridge + ?Sized>(&mut self, now: Instant, bridge: &mut B) -> WindowPoll {
        let refit_due = self.layout_retry.fire(now);
        let negotiation = if self.session.is_some() {
            self.negotiator.poll(&self.id, self.program, now, bridge)
        } else {
            PollOutcome::default()
        };
        WindowPoll {
            refit_due,
            negotiation,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.negotiator.next_deadline(), self.layout_retry.at()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Cancels everything scheduled on behalf of this window.
    pub fn dispose(&mut self) {
        self.negotiator.cancel();
        self.layout_retry.reset();
    }
}
