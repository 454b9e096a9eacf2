//! World <-> screen coordinate math and the shared canvas view state.

use crate::constants::{MAX_ZOOM, MIN_ZOOM};
use crate::geometry::{Point, Rect, Size};

/// Pure mapping between world space and screen space for one pan/zoom pair.
///
/// `screen = world * zoom + pan` and `world = (screen - pan) / zoom`. Zoom is
/// always positive; [`ViewportTransform::new`] falls back to `1.0` for
/// anything else so that the inverse is always defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pan: Point,
    zoom: f64,
}

impl ViewportTransform {
    pub fn new(pan: Point, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() && zoom > 0.0 {
            zoom
        } else {
            1.0
        };
        Self { pan, zoom }
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.pan.x) / self.zoom,
            (screen.y - self.pan.y) / self.zoom,
        )
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        Point::new(
            world.x * self.zoom + self.pan.x,
            world.y * self.zoom + self.pan.y,
        )
    }

    pub fn world_rect_to_screen(&self, world: Rect) -> Rect {
        Rect::from_parts(
            self.world_to_screen(world.origin()),
            world.size().scaled(self.zoom),
        )
    }

    pub fn screen_rect_to_world(&self, screen: Rect) -> Rect {
        Rect::from_parts(
            self.screen_to_world(screen.origin()),
            screen.size().scaled(1.0 / self.zoom),
        )
    }
}

/// Process-wide pan/zoom of the canvas plus the host display facts every
/// window needs to place itself. Owned by [`crate::canvas::Canvas`]; windows
/// only ever read it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasView {
    pan: Point,
    zoom: f64,
    display_scale: f64,
    viewport: Size,
    visible: bool,
}

impl Default for CanvasView {
    fn default() -> Self {
        Self {
            pan: Point::ORIGIN,
            zoom: 1.0,
            display_scale: 1.0,
            viewport: Size::default(),
            visible: true,
        }
    }
}

impl CanvasView {
    pub fn new(display_scale: f64) -> Self {
        let mut view = Self::default();
        view.set_display_scale(display_scale);
        view
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn display_scale(&self) -> f64 {
        self.display_scale
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Transform used for world-space content. The display scale (the
    /// browser/OS zoom analogue) multiplies into the canvas zoom.
    pub fn transform(&self) -> ViewportTransform {
        ViewportTransform::new(self.pan, self.zoom * self.display_scale)
    }

    pub fn set_pan(&mut self, pan: Point) {
        self.pan = pan;
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan = self.pan.offset(dx, dy);
    }

    /// Returns true when the stored zoom changed.
    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        let next = clamp_zoom(zoom);
        if next == self.zoom {
            return false;
        }
        self.zoom = next;
        true
    }

    /// Zoom by `factor` while keeping the world point under `anchor` fixed on
    /// screen.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) -> bool {
        let world = self.transform().screen_to_world(anchor);
        if !self.set_zoom(self.zoom * factor) {
            return false;
        }
        let scale = self.zoom * self.display_scale;
        self.pan = Point::new(anchor.x - world.x * scale, anchor.y - world.y * scale);
        true
    }

    pub fn set_display_scale(&mut self, scale: f64) {
        if scale.is_finite() && scale > 0.0 {
            self.display_scale = scale;
        }
    }

    /// Returns true when the size changed.
    pub fn set_viewport(&mut self, viewport: Size) -> bool {
        if self.viewport == viewport {
            return false;
        }
        self.viewport = viewport;
        true
    }

    /// Returns true on a hidden -> visible edge.
    pub fn set_visible(&mut self, visible: bool) -> bool {
        let became_visible = visible && !self.visible;
        self.visible = visible;
        became_visible
    }

    pub fn visible_world_rect(&self) -> Rect {
        self.transform().screen_rect_to_world(Rect::from_parts(Point::ORIGIN, self.viewport))
    }
}

fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}
