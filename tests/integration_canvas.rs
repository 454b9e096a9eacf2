use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use term_canvas::bridge::{InboundMessage, MemoryBridge, OutboundMessage, TerminalId};
use term_canvas::canvas::{Canvas, PointerRoute, SpawnRequest};
use term_canvas::error::CanvasError;
use term_canvas::geometry::{Point, Rect, Size};
use term_canvas::grid::{FontSpec, GridSize};
use term_canvas::pointer::{
    Dispatch, PointerButton, PointerEvent, PointerKind, PointerTarget,
};
use term_canvas::viewport::CanvasView;
use term_canvas::window::{ModeKind, Transition, TransitionError};

fn canvas_with_font(size: f64) -> Canvas<MemoryBridge> {
    let mut view = CanvasView::default();
    view.set_viewport(Size::new(1280.0, 800.0));
    Canvas::new(MemoryBridge::new(), view, FontSpec::new("monospace", size))
}

fn spawn_bound(
    c: &mut Canvas<MemoryBridge>,
    name: &str,
    position: Point,
    size: Size,
    now: Instant,
) -> TerminalId {
    let id = c
        .spawn_window(
            SpawnRequest {
                id: Some(TerminalId::new(name)),
                position: Some(position),
                size: Some(size),
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
fn floating_window_follows_canvas_zoom() {
    let mut c = canvas_with_font(13.0);
    let now = Instant::now();
    let id = spawn_bound(&mut c, "a", Point::new(100.0, 100.0), Size::new(600.0, 400.0), now);
    c.set_zoom(0.5);
    assert_eq!(c.screen_rect(&id).unwrap(), Rect::new(50.0, 50.0, 300.0, 200.0));
}

#[test]
fn burst_settles_into_a_single_resize() {
    let mut c = canvas_with_font(15.0);
    let t0 = Instant::now();
    let id = spawn_bound(&mut c, "a", Point::new(0.0, 0.0), Size::new(600.0, 400.0), t0);
    assert_eq!(c.window(&id).unwrap().fitted(), Some(GridSize::new(66, 21)));

    for (step, width) in [700.0, 750.0, 802.0].into_iter().enumerate() {
        let at = t0 + Duration::from_millis(10 * (step as u64 + 1));
        c.resize_window(&id, Size::new(width, 497.0), at).unwrap();
    }
    // 802 x 481 layout pixels over 9 x 18 cells.
    assert_eq!(c.window(&id).unwrap().fitted(), Some(GridSize::new(89, 26)));
    let t1 = t0 + Duration::from_millis(30);
    c.tick(t1 + Duration::from_millis(150));
    assert!(c.bridge().resizes().is_empty());
    c.tick(t1 + Duration::from_millis(200));
    assert_eq!(c.bridge().resizes(), vec![(id.clone(), 89, 26)]);

    // Same box again: nothing new to negotiate.
    let t2 = t1 + Duration::from_millis(300);
    c.resize_window(&id, Size::new(802.0, 497.0), t2).unwrap();
    assert_eq!(c.next_deadline(), None);
    c.tick(t2 + Duration::from_millis(500));
    assert_eq!(c.bridge().resizes().len(), 1);
}

#[test]
fn bound_session_keeps_the_spawn_grid() {
    let mut c = canvas_with_font(15.0);
    let t0 = Instant::now();
    let id = spawn_bound(&mut c, "a", Point::new(0.0, 0.0), Size::new(802.0, 497.0), t0);
    assert!(matches!(
        c.bridge().sent()[0],
        OutboundMessage::Spawn { cols: 89, rows: 26, .. }
    ));
    assert_eq!(
        c.window(&id).unwrap().last_negotiated(),
        Some(GridSize::new(89, 26))
    );
    assert_eq!(c.next_deadline(), None);
    c.tick(t0 + Duration::from_millis(500));
    assert!(c.bridge().resizes().is_empty());
}

#[test]
fn resize_burst_returning_to_start_sends_nothing() {
    let mut c = canvas_with_font(15.0);
    let t0 = Instant::now();
    let id = spawn_bound(&mut c, "a", Point::new(0.0, 0.0), Size::new(802.0, 497.0), t0);

    let t1 = t0 + Duration::from_millis(400);
    c.resize_window(&id, Size::new(700.0, 497.0), t1).unwrap();
    assert!(c.next_deadline().is_some());
    c.resize_window(&id, Size::new(802.0, 497.0), t1 + Duration::from_millis(50))
        .unwrap();
    assert_eq!(c.next_deadline(), None);
    c.tick(t1 + Duration::from_millis(600));
    assert!(c.bridge().resizes().is_empty());
    assert_eq!(
        c.window(&id).unwrap().last_negotiated(),
        Some(GridSize::new(89, 26))
    );
}

#[test]
fn locked_window_cannot_maximize() {
    let mut c = canvas_with_font(13.0);
    let now = Instant::now();
    let id = spawn_bound(&mut c, "a", Point::new(100.0, 100.0), Size::new(600.0, 400.0), now);
    c.toggle_lock(&id, now).unwrap();
    let mode = c.window(&id).unwrap().mode();
    let geometry = c.window(&id).unwrap().geometry();

    let err = c.transition(&id, Transition::Maximize, now).unwrap_err();
    assert!(matches!(
        err,
        CanvasError::Transition(TransitionError::LockedCannotMaximize)
    ));
    assert_eq!(c.window(&id).unwrap().mode(), mode);
    assert_eq!(c.window(&id).unwrap().geometry(), geometry);
    assert_eq!(c.window(&id).unwrap().mode_kind(), ModeKind::Locked);
}

#[test]
fn locked_window_ignores_canvas_zoom() {
    let mut c = canvas_with_font(13.0);
    let now = Instant::now();
    let id = spawn_bound(&mut c, "a", Point::new(100.0, 100.0), Size::new(600.0, 400.0), now);
    c.toggle_lock(&id, now).unwrap();
    let locked = c.screen_rect(&id).unwrap();
    assert_eq!(locked, Rect::new(100.0, 100.0, 600.0, 400.0));

    c.set_zoom(2.0);
    c.pan_by(30.0, -20.0);
    assert_eq!(c.screen_rect(&id).unwrap(), locked);

    // The spot it came from still tracks the canvas.
    let placeholder = c.placeholder_rect(&id).unwrap().unwrap();
    assert_eq!(placeholder, Rect::new(230.0, 180.0, 1200.0, 800.0));

    c.set_locked_zoom(&id, 0.5).unwrap();
    assert_eq!(c.screen_rect(&id).unwrap().size(), Size::new(300.0, 200.0));
}

#[test]
fn maximize_then_restore_returns_exact_geometry() {
    let mut c = canvas_with_font(13.0);
    let now = Instant::now();
    let id = spawn_bound(&mut c, "a", Point::new(123.4, 56.7), Size::new(611.1, 333.3), now);
    let before = c.window(&id).unwrap().geometry();

    c.toggle_maximize(&id, now).unwrap();
    assert_eq!(c.window(&id).unwrap().mode_kind(), ModeKind::Maximized);
    c.set_viewport(Size::new(1000.0, 700.0), now);
    c.toggle_maximize(&id, now).unwrap();

    assert_eq!(c.window(&id).unwrap().mode_kind(), ModeKind::Floating);
    assert_eq!(c.window(&id).unwrap().geometry(), before);
}

#[test]
fn corrected_events_are_not_corrected_twice() {
    let mut c = canvas_with_font(13.0);
    let now = Instant::now();
    let id = spawn_bound(&mut c, "a", Point::new(100.0, 100.0), Size::new(600.0, 400.0), now);
    c.set_zoom(0.5);
    let mut surfaces = BTreeMap::new();
    surfaces.insert(id.clone(), Recorder::default());

    let down = PointerEvent::new(PointerKind::Down, Point::new(60.0, 68.0))
        .with_button(PointerButton::Primary);
    c.handle_pointer(down, now, &mut surfaces);
    let corrected = surfaces[&id].seen[0];
    assert!(corrected.is_corrected());
    assert_eq!(corrected.client, Point::new(70.0, 78.0));

    let route = c.handle_pointer(corrected, now, &mut surfaces);
    assert_eq!(
        route,
        PointerRoute::Surface {
            id: id.clone(),
            dispatch: Dispatch::Delivered
        }
    );
    assert_eq!(surfaces[&id].seen[1].client, Point::new(70.0, 78.0));
    assert_eq!(c.window(&id).unwrap().corrector().corrections(), 1);
}

#[test]
fn unscaled_surface_receives_events_untouched() {
    let mut c = canvas_with_font(13.0);
    let now = Instant::now();
    let id = spawn_bound(&mut c, "a", Point::new(100.0, 100.0), Size::new(600.0, 400.0), now);
    let mut surfaces = BTreeMap::new();
    surfaces.insert(id.clone(), Recorder::default());

    let down = PointerEvent::new(PointerKind::Down, Point::new(300.0, 300.0))
        .with_button(PointerButton::Primary);
    let route = c.handle_pointer(down, now, &mut surfaces);
    assert_eq!(
        route,
        PointerRoute::Surface {
            id: id.clone(),
            dispatch: Dispatch::Delivered
        }
    );
    assert_eq!(surfaces[&id].seen[0], down);
}

#[test]
fn spawn_message_announces_fitted_grid() {
    let mut c = canvas_with_font(15.0);
    let now = Instant::now();
    let id = c
        .spawn_window(
            SpawnRequest {
                id: Some("a".into()),
                position: Some(Point::new(0.0, 0.0)),
                size: Some(Size::new(802.0, 497.0)),
                command: Some("htop".into()),
                ..SpawnRequest::default()
            },
            now,
        )
        .unwrap();
    assert_eq!(
        c.bridge().sent(),
        &[OutboundMessage::Spawn {
            terminal_id: id.clone(),
            cols: 89,
            rows: 26,
            command: Some("htop".into()),
        }]
    );
    // Offline until the manager answers: no negotiation yet.
    assert!(c.window(&id).unwrap().is_offline());
    assert_eq!(c.next_deadline(), None);
}
