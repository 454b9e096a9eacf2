//! Pointer/wheel coordinate correction for terminal surfaces rendered under a
//! visual scale.
//!
//! An emulator maps pointer positions to cells assuming its on-screen box is
//! the size it was laid out at. Canvas zoom, locked zoom and display scale all
//! shrink or grow the visual box without changing the layout size, so clicks
//! drift away from the cell under the pointer. The corrector sits in front of
//! the emulator, rescales the event into layout pixels and hands a rewritten
//! copy to the emulator's native surface.

use crate::constants::SCALE_EPSILON;
use crate::geometry::{Point, Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Up,
    Move,
    Click,
    DoubleClick,
    ContextMenu,
    Wheel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    None,
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelDelta {
    pub x: f64,
    pub y: f64,
}

/// Who produced an event. Rewritten events are tagged so they are never
/// corrected twice, however they find their way back to a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventOrigin {
    #[default]
    User,
    Corrected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub client: Point,
    pub button: PointerButton,
    pub modifiers: Modifiers,
    pub wheel: WheelDelta,
    pub origin: EventOrigin,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, client: Point) -> Self {
        Self {
            kind,
            client,
            button: PointerButton::None,
            modifiers: Modifiers::default(),
            wheel: WheelDelta::default(),
            origin: EventOrigin::User,
        }
    }

    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_wheel(mut self, x: f64, y: f64) -> Self {
        self.wheel = WheelDelta { x, y };
        self
    }

    pub fn is_corrected(&self) -> bool {
        self.origin == EventOrigin::Corrected
    }

    /// Same event, new position, tagged as corrected.
    fn relocated(&self, client: Point) -> Self {
        Self {
            client,
            origin: EventOrigin::Corrected,
            ..*self
        }
    }
}

/// What the host knows about a surface: where it is drawn (`visual`, the
/// bounding client rect) and the size it was laid out at (`layout`, the
/// offset size).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMetrics {
    pub visual: Rect,
    pub layout: Size,
}

impl SurfaceMetrics {
    pub fn new(visual: Rect, layout: Size) -> Self {
        Self { visual, layout }
    }

    /// Visual-to-layout ratio per axis, or `None` when either box is not laid
    /// out.
    pub fn scale_ratio(&self) -> Option<(f64, f64)> {
        if self.layout.is_degenerate() || self.visual.size().is_degenerate() {
            return None;
        }
        Some((
            self.visual.width / self.layout.width,
            self.visual.height / self.layout.height,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterceptContext {
    pub surface: SurfaceMetrics,
    /// The window owns focus.
    pub window_focused: bool,
    /// The pointer is inside a focused sub-region of the window.
    pub in_focused_region: bool,
    /// A move/resize drag on this window is in progress.
    pub dragging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interception {
    /// Let the original event through to the surface unchanged.
    Untouched,
    /// Not for this surface; the canvas underneath should handle it.
    Declined,
    /// Deliver this rewritten event instead and stop the original.
    Corrected(PointerEvent),
}

/// The emulator's own rendering surface. Corrected events are delivered here
/// directly, never to the wrapper that owns the corrector.
pub trait PointerTarget {
    fn dispatch_pointer(&mut self, event: &PointerEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Delivered,
    Corrected,
    Bubbled,
}

#[derive(Debug, Default)]
pub struct PointerCorrector {
    corrections: u64,
}

impl PointerCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events rewritten so far.
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    pub fn intercept(&mut self, event: &PointerEvent, ctx: &InterceptContext) -> Interception {
        if event.is_corrected() {
            return Interception::Untouched;
        }
        if event.kind == PointerKind::Wheel && !ctx.window_focused && !ctx.in_focused_region {
            return Interception::Declined;
        }
        if ctx.dragging {
            return Interception::Untouched;
        }
        let Some(ratio) = ctx.surface.scale_ratio() else {
            return Interception::Untouched;
        };
        if (ratio.0 - 1.0).abs() <= SCALE_EPSILON && (ratio.1 - 1.0).abs() <= SCALE_EPSILON {
            return Interception::Untouched;
        }
        self.corrections += 1;
        let client = correct_point(event.client, ctx.surface.visual, ratio);
        Interception::Corrected(event.relocated(client))
    }

    /// Runs the whole listener chain for one surface: correct if needed, then
    /// deliver to `native`.
    pub fn handle<T: PointerTarget + ?Sized>(
        &mut self,
        event: &PointerEvent,
        ctx: &InterceptContext,
        native: &mut T,
    ) -> Dispatch {
        match self.intercept(event, ctx) {
            Interception::Untouched => {
                native.dispatch_pointer(event);
                Dispatch::Delivered
            }
            Interception::Declined => Dispatch::Bubbled,
            Interception::Corrected(corrected) => {
                native.dispatch_pointer(&corrected);
                Dispatch::Corrected
            }
        }
    }
}

/// Maps a point inside a scaled box back to where it would sit in the
/// unscaled box sharing the same origin.
pub fn correct_point(point: Point, visual: Rect, ratio: (f64, f64)) -> Point {
    Point::new(
        visual.x + (point.x - visual.x) / ratio.0,
        visual.y + (point.y - visual.y) / ratio.1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<PointerEvent>,
    }

    impl PointerTarget for Recorder {
        fn dispatch_pointer(&mut self, event: &PointerEvent) {
            self.seen.push(*event);
        }
    }

    fn ctx(visual: Rect, layout: Size) -> InterceptContext {
        InterceptContext {
            surface: SurfaceMetrics::new(visual, layout),
            window_focused: true,
            in_focused_region: false,
            dragging: false,
        }
    }

    #[test]
    fn half_scale_click_is_doubled_from_origin() {
        let mut corrector = PointerCorrector::new();
        let mut native = Recorder::default();
        let c = ctx(Rect::new(50.0, 50.0, 300.0, 200.0), Size::new(600.0, 400.0));
        let event = PointerEvent::new(PointerKind::Down, Point::new(60.0, 70.0))
            .with_button(PointerButton::Primary)
            .with_modifiers(Modifiers {
                shift: true,
                ..Modifiers::default()
            });
        assert_eq!(corrector.handle(&event, &c, &mut native), Dispatch::Corrected);
        let got = native.seen[0];
        assert_eq!(got.client, Point::new(70.0, 90.0));
        assert_eq!(got.button, PointerButton::Primary);
        assert!(got.modifiers.shift);
        assert!(got.is_corrected());
    }

    #[test]
    fn unit_scale_passes_original_through() {
        let mut corrector = PointerCorrector::new();
        let mut native = Recorder::default();
        let c = ctx(Rect::new(0.0, 0.0, 600.0, 400.0), Size::new(600.0, 400.0));
        let event = PointerEvent::new(PointerKind::Click, Point::new(10.0, 10.0));
        assert_eq!(corrector.handle(&event, &c, &mut native), Dispatch::Delivered);
        assert_eq!(native.seen, vec![event]);
        assert_eq!(corrector.corrections(), 0);
    }

    #[test]
    fn within_epsilon_is_not_corrected() {
        let mut corrector = PointerCorrector::new();
        let c = ctx(Rect::new(0.0, 0.0, 600.3, 400.0), Size::new(600.0, 400.0));
        let event = PointerEvent::new(PointerKind::Move, Point::new(10.0, 10.0));
        assert_eq!(corrector.intercept(&event, &c), Interception::Untouched);
    }

    #[test]
    fn corrected_event_is_never_corrected_again() {
        let mut corrector = PointerCorrector::new();
        let c = ctx(Rect::new(0.0, 0.0, 300.0, 200.0), Size::new(600.0, 400.0));
        let event = PointerEvent::new(PointerKind::Down, Point::new(30.0, 20.0));
        let Interception::Corrected(corrected) = corrector.intercept(&event, &c) else {
            panic!("expected correction");
        };
        // The rewritten event re-enters the same listener.
        assert_eq!(corrector.intercept(&corrected, &c), Interception::Untouched);
        assert_eq!(corrector.corrections(), 1);
    }

    #[test]
    fn wheel_on_unfocused_window_is_declined() {
        let mut corrector = PointerCorrector::new();
        let mut native = Recorder::default();
        let mut c = ctx(Rect::new(0.0, 0.0, 300.0, 200.0), Size::new(600.0, 400.0));
        c.window_focused = false;
        let wheel = PointerEvent::new(PointerKind::Wheel, Point::new(5.0, 5.0)).with_wheel(0.0, 3.0);
        assert_eq!(corrector.handle(&wheel, &c, &mut native), Dispatch::Bubbled);
        assert!(native.seen.is_empty());

        c.in_focused_region = true;
        assert_eq!(corrector.handle(&wheel, &c, &mut native), Dispatch::Corrected);
        assert_eq!(native.seen[0].wheel, WheelDelta { x: 0.0, y: 3.0 });
    }

    #[test]
    fn drag_in_progress_skips_correction() {
        let mut corrector = PointerCorrector::new();
        let mut c = ctx(Rect::new(0.0, 0.0, 300.0, 200.0), Size::new(600.0, 400.0));
        c.dragging = true;
        let event = PointerEvent::new(PointerKind::Move, Point::new(30.0, 20.0));
        assert_eq!(corrector.intercept(&event, &c), Interception::Untouched);
    }

    #[test]
    fn anisotropic_ratio_corrects_each_axis() {
        let p = correct_point(Point::new(20.0, 20.0), Rect::new(10.0, 10.0, 100.0, 50.0), (0.5, 0.25));
        assert_eq!(p, Point::new(30.0, 50.0));
    }
}
