//! Where windows go: spawn placement on the canvas, dock slots, the maximized
//! overlay, and the frame handles used by move/resize drags.

use crate::constants::{
    DOCK_WIDTH_FRACTION, MAXIMIZED_MARGIN, MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH,
    SPAWN_CASCADE_STEP, SPAWN_MAX_ATTEMPTS,
};
use crate::geometry::{Geometry, Point, Rect, Size};

/// Picks a world position for a new window of `size`.
///
/// Candidates start centred in the visible world area and cascade down/right
/// by a fixed step; the first one that overlaps nothing in `occupied` wins.
/// When every attempt collides the first candidate is used anyway.
pub fn spawn_position(visible: Rect, size: Size, occupied: &[Rect]) -> Point {
    let start = Point::new(
        visible.x + (visible.width - size.width) / 2.0,
        visible.y + (visible.height - size.height) / 2.0,
    );
    let first = Geometry::new(start, size).clamped();
    for attempt in 0..SPAWN_MAX_ATTEMPTS {
        let step = SPAWN_CASCADE_STEP * attempt as f64;
        let candidate = Geometry::new(start.offset(step, step), size).clamped();
        let rect = candidate.rect();
        if !occupied.iter().any(|other| other.intersects(&rect)) {
            return candidate.position;
        }
    }
    tracing::debug!(attempts = SPAWN_MAX_ATTEMPTS, "no free spot, stacking on the first");
    first.position
}

/// The dock container: a strip along the right edge of the viewport.
pub fn dock_area(viewport: Size) -> Rect {
    let width = (viewport.width * DOCK_WIDTH_FRACTION).floor();
    Rect::new(viewport.width - width, 0.0, width, viewport.height)
}

/// Splits the dock into `count` equal slots stacked top to bottom. The last
/// slot absorbs the rounding remainder.
pub fn dock_slots(viewport: Size, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let area = dock_area(viewport);
    let each = (area.height / count as f64).floor();
    (0..count)
        .map(|i| {
            let y = area.y + each * i as f64;
            let height = if i + 1 == count {
                area.bottom() - y
            } else {
                each
            };
            Rect::new(area.x, y, area.width, height)
        })
        .collect()
}

/// Fullscreen overlay container for maximized windows.
pub fn overlay_rect(viewport: Size) -> Rect {
    Rect::from_parts(Point::ORIGIN, viewport).inset(MAXIMIZED_MARGIN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEdge {
    Left,
    Right,
    Bottom,
    BottomLeft,
    BottomRight,
}

impl ResizeEdge {
    fn moves_left(self) -> bool {
        matches!(self, ResizeEdge::Left | ResizeEdge::BottomLeft)
    }

    fn moves_right(self) -> bool {
        matches!(self, ResizeEdge::Right | ResizeEdge::BottomRight)
    }

    fn moves_bottom(self) -> bool {
        matches!(
            self,
            ResizeEdge::Bottom | ResizeEdge::BottomLeft | ResizeEdge::BottomRight
        )
    }
}

/// Which part of a window frame a screen point landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHit {
    Title,
    Edge(ResizeEdge),
    Surface,
}

/// Classifies `point` against a window's on-screen frame. `grip` is the
/// thickness of the resize borders; the title bar band wins over the side
/// borders it overlaps.
pub fn hit_frame(frame: Rect, title: Rect, grip: Size, point: Point) -> Option<FrameHit> {
    if !frame.contains(point) {
        return None;
    }
    if title.contains(point) {
        return Some(FrameHit::Title);
    }
    let left = point.x < frame.x + grip.width;
    let right = point.x >= frame.right() - grip.width;
    let bottom = point.y >= frame.bottom() - grip.height;
    let edge = match (left, right, bottom) {
        (true, _, true) => Some(ResizeEdge::BottomLeft),
        (_, true, true) => Some(ResizeEdge::BottomRight),
        (_, _, true) => Some(ResizeEdge::Bottom),
        (true, _, _) => Some(ResizeEdge::Left),
        (_, true, _) => Some(ResizeEdge::Right),
        _ => None,
    };
    Some(edge.map_or(FrameHit::Surface, FrameHit::Edge))
}

/// Applies a world-space drag delta to the geometry captured when the resize
/// started. Left-edge drags keep the right edge fixed, including when the
/// minimum size stops the shrink.
pub fn apply_resize(start: Geometry, edge: ResizeEdge, dx: f64, dy: f64) -> Geometry {
    let mut x = start.position.x;
    let mut width = start.size.width;
    let mut height = start.size.height;
    if edge.moves_left() {
        let right = x + width;
        width = (width - dx).max(MIN_WINDOW_WIDTH);
        x = right - width;
    }
    if edge.moves_right() {
        width = (width + dx).max(MIN_WINDOW_WIDTH);
    }
    if edge.moves_bottom() {
        height = (height + dy).max(MIN_WINDOW_HEIGHT);
    }
    Geometry::new(
        Point::new(x, start.position.y),
        Size::new(width, height),
    )
    .clamped()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WORLD_BOUND;

    #[test]
    fn first_spawn_is_centred() {
        let visible = Rect::new(0.0, 0.0, 1280.0, 800.0);
        let p = spawn_position(visible, Size::new(640.0, 400.0), &[]);
        assert_eq!(p, Point::new(320.0, 200.0));
    }

    #[test]
    fn spawns_cascade_past_occupied_space() {
        let visible = Rect::new(0.0, 0.0, 1280.0, 800.0);
        let size = Size::new(200.0, 100.0);
        let mut occupied = Vec::new();
        for _ in 0..3 {
            let p = spawn_position(visible, size, &occupied);
            let rect = Rect::from_parts(p, size);
            assert!(occupied.iter().all(|o: &Rect| !o.intersects(&rect)));
            occupied.push(rect);
        }
        assert_eq!(occupied[1].origin(), occupied[0].origin().offset(120.0, 120.0));
    }

    #[test]
    fn spawn_stays_inside_world() {
        let visible = Rect::new(WORLD_BOUND - 100.0, WORLD_BOUND - 100.0, 400.0, 400.0);
        let size = Size::new(640.0, 400.0);
        let p = spawn_position(visible, size, &[]);
        assert!(p.x + size.width <= WORLD_BOUND);
        assert!(p.y + size.height <= WORLD_BOUND);
    }

    #[test]
    fn dock_slots_tile_the_strip() {
        let slots = dock_slots(Size::new(1000.0, 601.0), 3);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0], Rect::new(660.0, 0.0, 340.0, 200.0));
        assert_eq!(slots[2].bottom(), 601.0);
        assert!(dock_slots(Size::new(1000.0, 600.0), 0).is_empty());
    }

    #[test]
    fn overlay_is_inset_and_centred() {
        let r = overlay_rect(Size::new(1280.0, 800.0));
        assert_eq!(r, Rect::new(16.0, 16.0, 1248.0, 768.0));
    }

    #[test]
    fn frame_hits() {
        let frame = Rect::new(0.0, 0.0, 400.0, 300.0);
        let title = Rect::new(0.0, 0.0, 400.0, 16.0);
        let grip = Size::new(8.0, 16.0);
        let hit = |x, y| hit_frame(frame, title, grip, Point::new(x, y));
        assert_eq!(hit(3.0, 3.0), Some(FrameHit::Title));
        assert_eq!(hit(396.0, 296.0), Some(FrameHit::Edge(ResizeEdge::BottomRight)));
        assert_eq!(hit(2.0, 100.0), Some(FrameHit::Edge(ResizeEdge::Left)));
        assert_eq!(hit(200.0, 150.0), Some(FrameHit::Surface));
        assert_eq!(hit(500.0, 150.0), None);
    }

    #[test]
    fn left_resize_keeps_right_edge_at_minimum() {
        let start = Geometry::new(Point::new(100.0, 100.0), Size::new(300.0, 200.0));
        let g = apply_resize(start, ResizeEdge::Left, 500.0, 0.0);
        assert_eq!(g.size.width, MIN_WINDOW_WIDTH);
        assert_eq!(g.position.x + g.size.width, 400.0);

        let g = apply_resize(start, ResizeEdge::BottomRight, 40.0, -500.0);
        assert_eq!(g.size, Size::new(340.0, MIN_WINDOW_HEIGHT));
        assert_eq!(g.position, start.position);
    }
}
