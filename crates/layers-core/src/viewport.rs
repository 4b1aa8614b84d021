//! Mapping between pointer coordinates and the logical canvas.
//!
//! Three spaces are involved:
//! - client: CSS pixels relative to the page, as delivered by pointer events
//! - element: CSS pixels relative to the canvas element's top-left corner
//! - canvas: logical annotation coordinates, the space layers live in
//!
//! `offset` is the pan in element pixels and `zoom` the scale from canvas to
//! element pixels. `pixel_ratio` only affects the backing store transform.

use crate::input::{touch_centroid, touch_spread, TouchPoint};
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 8.0;

/// Pan/zoom state of the visible canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Pan, in element pixels.
    pub offset: Vec2,
    /// Canvas units to element pixels.
    pub zoom: f64,
    /// Device pixels per CSS pixel.
    pub pixel_ratio: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            pixel_ratio: 1.0,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        self
    }

    /// Canvas to element pixels.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Element pixels to canvas.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    /// Canvas to backing-store device pixels, for renderers.
    pub fn device_transform(&self) -> Affine {
        Affine::scale(self.pixel_ratio) * self.transform()
    }

    /// Map a pointer position to canvas coordinates.
    ///
    /// `element_origin` is the client position of the canvas element's
    /// top-left corner (its bounding client rect).
    pub fn client_to_canvas(&self, client: Point, element_origin: Point) -> Point {
        self.inverse_transform() * (client - element_origin.to_vec2())
    }

    /// Inverse of [`Viewport::client_to_canvas`].
    pub fn canvas_to_client(&self, canvas: Point, element_origin: Point) -> Point {
        self.transform() * canvas + element_origin.to_vec2()
    }

    /// Convert a length in screen pixels to canvas units.
    pub fn screen_len(&self, pixels: f64) -> f64 {
        pixels / self.zoom
    }

    /// Pan by a delta in element pixels.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom by `factor`, keeping the given element point fixed.
    pub fn zoom_at(&mut self, element_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let anchor = self.inverse_transform() * element_point;
        self.zoom = new_zoom;
        self.offset += element_point - self.transform() * anchor;
    }

    /// Set an absolute zoom, keeping the given element point fixed.
    pub fn set_zoom_at(&mut self, element_point: Point, zoom: f64) {
        self.zoom_at(element_point, zoom / self.zoom);
    }

    /// Reset pan and zoom.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// Fit `bounds` (canvas units) into an element of size `viewport`.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            return;
        }
        let available = Size::new(
            (viewport.width - padding * 2.0).max(1.0),
            (viewport.height - padding * 2.0).max(1.0),
        );
        let scale_x = available.width / bounds.width();
        let scale_y = available.height / bounds.height();
        self.zoom = scale_x.min(scale_y).clamp(self.min_zoom, self.max_zoom);

        let center = bounds.center();
        self.offset = Vec2::new(
            viewport.width / 2.0 - center.x * self.zoom,
            viewport.height / 2.0 - center.y * self.zoom,
        );
    }

    /// Canvas position of a single touch.
    pub fn touch_to_canvas(&self, touch: &TouchPoint, element_origin: Point) -> Point {
        self.client_to_canvas(touch.position, element_origin)
    }
}

/// In-progress two-finger pinch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pinch {
    start_spread: f64,
    start_zoom: f64,
    last_centroid: Point,
}

impl Pinch {
    /// Begin a pinch, or `None` with fewer than two touches.
    pub fn start(viewport: &Viewport, touches: &[TouchPoint], element_origin: Point) -> Option<Self> {
        let spread = touch_spread(touches)?;
        let centroid = touch_centroid(touches)?;
        Some(Self {
            start_spread: spread.max(1.0),
            start_zoom: viewport.zoom,
            last_centroid: centroid - element_origin.to_vec2(),
        })
    }

    /// Apply the current touches: zoom by spread ratio around the centroid,
    /// pan by centroid movement.
    pub fn update(&mut self, viewport: &mut Viewport, touches: &[TouchPoint], element_origin: Point) {
        let (Some(spread), Some(centroid)) = (touch_spread(touches), touch_centroid(touches)) else {
            return;
        };
        let centroid = centroid - element_origin.to_vec2();
        viewport.pan(centroid - self.last_centroid);
        let target = self.start_zoom * spread / self.start_spread;
        viewport.set_zoom_at(centroid, target);
        self.last_centroid = centroid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a - b).hypot() < 1e-9
    }

    #[test]
    fn test_identity_mapping_subtracts_element_origin() {
        let vp = Viewport::new();
        let p = vp.client_to_canvas(Point::new(110.0, 220.0), Point::new(10.0, 20.0));
        assert!(close(p, Point::new(100.0, 200.0)));
    }

    #[test]
    fn test_mapping_with_pan_and_zoom() {
        let mut vp = Viewport::new();
        vp.offset = Vec2::new(50.0, 100.0);
        vp.zoom = 2.0;
        let p = vp.client_to_canvas(Point::new(150.0, 300.0), Point::ZERO);
        assert!(close(p, Point::new(50.0, 100.0)));
    }

    #[test]
    fn test_mapping_round_trips() {
        let mut vp = Viewport::new().with_pixel_ratio(2.0);
        vp.offset = Vec2::new(30.0, -20.0);
        vp.zoom = 1.5;
        let origin = Point::new(8.0, 64.0);
        let client = Point::new(123.0, 456.0);
        let canvas = vp.client_to_canvas(client, origin);
        assert!(close(vp.canvas_to_client(canvas, origin), client));
        // Mapping is a pure function of its inputs.
        assert!(close(vp.client_to_canvas(client, origin), canvas));
    }

    #[test]
    fn test_pixel_ratio_only_affects_device_transform() {
        let vp = Viewport::new().with_pixel_ratio(2.0);
        assert!(close(vp.client_to_canvas(Point::new(10.0, 10.0), Point::ZERO), Point::new(10.0, 10.0)));
        assert!(close(vp.device_transform() * Point::new(10.0, 10.0), Point::new(20.0, 20.0)));
        assert_eq!(Viewport::new().with_pixel_ratio(0.0).pixel_ratio, 1.0);
    }

    #[test]
    fn test_zoom_at_keeps_point_fixed_and_clamps() {
        let mut vp = Viewport::new();
        let anchor = Point::new(200.0, 100.0);
        let before = vp.inverse_transform() * anchor;
        vp.zoom_at(anchor, 2.0);
        assert!(close(vp.inverse_transform() * anchor, before));

        vp.zoom_at(anchor, 1000.0);
        assert_eq!(vp.zoom, MAX_ZOOM);
        vp.zoom_at(anchor, 0.0001);
        assert_eq!(vp.zoom, MIN_ZOOM);
    }

    #[test]
    fn test_fit_to_bounds_centers() {
        let mut vp = Viewport::new();
        vp.fit_to_bounds(Rect::new(0.0, 0.0, 200.0, 100.0), Size::new(400.0, 400.0), 0.0);
        assert_eq!(vp.zoom, 2.0);
        assert!(close(vp.transform() * Point::new(100.0, 50.0), Point::new(200.0, 200.0)));
    }

    #[test]
    fn test_pinch_zooms_around_centroid() {
        let mut vp = Viewport::new();
        let start = [TouchPoint::new(1, 100.0, 100.0), TouchPoint::new(2, 200.0, 100.0)];
        let mut pinch = Pinch::start(&vp, &start, Point::ZERO).unwrap();
        let moved = [TouchPoint::new(1, 50.0, 100.0), TouchPoint::new(2, 250.0, 100.0)];
        pinch.update(&mut vp, &moved, Point::ZERO);
        assert!((vp.zoom - 2.0).abs() < 1e-9);
        // The centroid stays over the same canvas point.
        assert!(close(vp.inverse_transform() * Point::new(150.0, 100.0), Point::new(150.0, 100.0)));
        assert!(Pinch::start(&vp, &start[..1], Point::ZERO).is_none());
    }
}
