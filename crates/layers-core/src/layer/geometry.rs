//! Bounds, hit-testing and resize math for layers.
//!
//! All geometry lives in the layer's unrotated local frame; `rotation` is
//! applied around the bounds center at render time.

use super::{GeometryKind, Layer, LayerPoints, LayerType};
use kurbo::{Point, Rect, Vec2};

/// Average glyph advance relative to font size, used when a text layer has
/// no measured box.
const TEXT_ADVANCE_RATIO: f64 = 0.6;
/// Line height relative to font size.
const TEXT_LINE_HEIGHT: f64 = 1.2;
const DEFAULT_FONT_SIZE: f64 = 16.0;
const DEFAULT_MARKER_RADIUS: f64 = 12.0;

/// Rotate `point` around `center` by `radians` (clockwise in y-down space).
pub fn rotate_point(point: Point, center: Point, radians: f64) -> Point {
    let (sin_r, cos_r) = radians.sin_cos();
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    Point::new(
        center.x + dx * cos_r - dy * sin_r,
        center.y + dx * sin_r + dy * cos_r,
    )
}

/// Union of the rotated bounding boxes of `layers`.
pub fn union_bounds<'a>(layers: impl IntoIterator<Item = &'a Layer>) -> Option<Rect> {
    layers
        .into_iter()
        .map(Layer::rotated_bounds)
        .reduce(|acc, r| acc.union(r))
}

fn points_bounds(points: &[Point]) -> Rect {
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return Rect::ZERO;
    };
    iter.fold(Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p))
}

impl Layer {
    /// Axis-aligned bounds in the layer's unrotated frame.
    pub fn bounds(&self) -> Rect {
        let x = self.x.unwrap_or(0.0);
        let y = self.y.unwrap_or(0.0);
        match self.kind.geometry() {
            GeometryKind::Box => {
                let (width, height) = if self.kind == LayerType::Text {
                    self.text_box_size()
                } else {
                    (self.width.unwrap_or(0.0), self.height.unwrap_or(0.0))
                };
                Rect::new(x, y, x + width, y + height).abs()
            }
            GeometryKind::Circle => {
                let default = if self.kind == LayerType::Marker {
                    DEFAULT_MARKER_RADIUS
                } else {
                    0.0
                };
                let r = self.radius.unwrap_or(default).abs();
                Rect::new(x - r, y - r, x + r, y + r)
            }
            GeometryKind::Ellipse => {
                let rx = self.radius_x.or(self.radius).unwrap_or(0.0).abs();
                let ry = self.radius_y.or(self.radius).unwrap_or(0.0).abs();
                Rect::new(x - rx, y - ry, x + rx, y + ry)
            }
            GeometryKind::Radial => match self.point_list() {
                Some(points) if !points.is_empty() => points_bounds(points),
                _ => {
                    let r = self.radius.unwrap_or(0.0).abs();
                    Rect::new(x - r, y - r, x + r, y + r)
                }
            },
            GeometryKind::Segment => Rect::from_points(
                Point::new(self.x1.unwrap_or(0.0), self.y1.unwrap_or(0.0)),
                Point::new(self.x2.unwrap_or(0.0), self.y2.unwrap_or(0.0)),
            ),
            GeometryKind::Points => self.point_list().map(points_bounds).unwrap_or(Rect::ZERO),
        }
    }

    fn text_box_size(&self) -> (f64, f64) {
        let font_size = self.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        let text = self.text.as_deref().unwrap_or("");
        let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        let lines = text.lines().count().max(1);
        let width = self
            .width
            .unwrap_or(longest as f64 * font_size * TEXT_ADVANCE_RATIO);
        let height = self
            .height
            .unwrap_or(lines as f64 * font_size * TEXT_LINE_HEIGHT);
        (width, height)
    }

    /// Rotation pivot.
    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Rotation in radians.
    pub fn rotation_radians(&self) -> f64 {
        self.rotation.to_radians()
    }

    /// Axis-aligned bounds of the rotated layer.
    pub fn rotated_bounds(&self) -> Rect {
        let bounds = self.bounds();
        if self.rotation == 0.0 {
            return bounds;
        }
        let center = bounds.center();
        let angle = self.rotation_radians();
        let corners = [
            Point::new(bounds.x0, bounds.y0),
            Point::new(bounds.x1, bounds.y0),
            Point::new(bounds.x1, bounds.y1),
            Point::new(bounds.x0, bounds.y1),
        ];
        let rotated: Vec<Point> = corners
            .iter()
            .map(|p| rotate_point(*p, center, angle))
            .collect();
        points_bounds(&rotated)
    }

    /// Map a canvas point into this layer's unrotated frame.
    pub fn to_local(&self, point: Point) -> Point {
        if self.rotation == 0.0 {
            return point;
        }
        rotate_point(point, self.center(), -self.rotation_radians())
    }

    /// Whether `point` falls on the layer, allowing `tolerance` canvas units.
    ///
    /// The point is inverse-rotated into the local frame and tested against
    /// the inflated bounds, so rotated shapes need no per-type polygon test.
    pub fn contains_point(&self, point: Point, tolerance: f64) -> bool {
        let pad = tolerance + self.stroke_half_width();
        self.bounds().inflate(pad, pad).contains(self.to_local(point))
    }

    /// Move the layer by `delta` without changing its size.
    pub fn translate(&mut self, delta: Vec2) {
        let shift = |v: &mut Option<f64>, d: f64| {
            if let Some(v) = v {
                *v += d;
            }
        };
        shift(&mut self.x, delta.x);
        shift(&mut self.y, delta.y);
        shift(&mut self.x1, delta.x);
        shift(&mut self.y1, delta.y);
        shift(&mut self.x2, delta.x);
        shift(&mut self.y2, delta.y);
        if let Some(LayerPoints::List(points)) = &mut self.points {
            for p in points.iter_mut() {
                *p += delta;
            }
        }
    }

    /// Move the layer so its bounds center lands on `center`.
    pub fn set_center(&mut self, center: Point) {
        let delta = center - self.center();
        self.translate(delta);
    }

    /// Remap the geometry so that `from` (the current bounds) becomes `to`.
    ///
    /// Both rectangles are in the unrotated local frame. Zero-sized axes keep
    /// a scale of one so degenerate lines stay degenerate.
    pub fn resize_to(&mut self, from: Rect, to: Rect) {
        let sx = if from.width() > f64::EPSILON {
            to.width() / from.width()
        } else {
            1.0
        };
        let sy = if from.height() > f64::EPSILON {
            to.height() / from.height()
        } else {
            1.0
        };
        let map = |p: Point| {
            Point::new(
                to.x0 + (p.x - from.x0) * sx,
                to.y0 + (p.y - from.y0) * sy,
            )
        };

        match self.kind.geometry() {
            GeometryKind::Box => {
                self.x = Some(to.x0);
                self.y = Some(to.y0);
                if self.kind == LayerType::Text {
                    if let Some(size) = self.font_size {
                        self.font_size = Some(size * sy);
                    }
                    if self.width.is_some() {
                        self.width = Some(to.width());
                    }
                    if self.height.is_some() {
                        self.height = Some(to.height());
                    }
                } else {
                    self.width = Some(to.width());
                    self.height = Some(to.height());
                }
            }
            GeometryKind::Circle => {
                let c = to.center();
                self.x = Some(c.x);
                self.y = Some(c.y);
                self.radius = Some(to.width().min(to.height()) / 2.0);
            }
            GeometryKind::Ellipse => {
                let c = to.center();
                self.x = Some(c.x);
                self.y = Some(c.y);
                self.radius_x = Some(to.width() / 2.0);
                self.radius_y = Some(to.height() / 2.0);
            }
            GeometryKind::Radial => {
                if let Some(LayerPoints::List(points)) = &mut self.points {
                    for p in points.iter_mut() {
                        *p = map(*p);
                    }
                } else {
                    let c = to.center();
                    self.x = Some(c.x);
                    self.y = Some(c.y);
                    let scale = sx.min(sy);
                    if let Some(r) = self.radius {
                        self.radius = Some(r * scale);
                    }
                    if let Some(r) = self.inner_radius {
                        self.inner_radius = Some(r * scale);
                    }
                }
            }
            GeometryKind::Segment => {
                let start = map(Point::new(self.x1.unwrap_or(0.0), self.y1.unwrap_or(0.0)));
                let end = map(Point::new(self.x2.unwrap_or(0.0), self.y2.unwrap_or(0.0)));
                self.x1 = Some(start.x);
                self.y1 = Some(start.y);
                self.x2 = Some(end.x);
                self.y2 = Some(end.y);
            }
            GeometryKind::Points => {
                if let Some(LayerPoints::List(points)) = &mut self.points {
                    for p in points.iter_mut() {
                        *p = map(*p);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_box_bounds_normalizes_negative_size() {
        let layer = Layer::rectangle(100.0, 100.0, -40.0, -20.0);
        assert_eq!(layer.bounds(), Rect::new(60.0, 80.0, 100.0, 100.0));
    }

    #[test]
    fn test_circle_and_ellipse_bounds() {
        assert_eq!(
            Layer::circle(10.0, 10.0, 5.0).bounds(),
            Rect::new(5.0, 5.0, 15.0, 15.0)
        );
        assert_eq!(
            Layer::ellipse(0.0, 0.0, 4.0, 2.0).bounds(),
            Rect::new(-4.0, -2.0, 4.0, 2.0)
        );
    }

    #[test]
    fn test_text_bounds_estimated_from_font_size() {
        let mut text = Layer::new(LayerType::Text);
        text.x = Some(0.0);
        text.y = Some(0.0);
        text.text = Some("abcd\nxy".to_string());
        text.font_size = Some(10.0);
        let b = text.bounds();
        assert!(approx(b.width(), 24.0));
        assert!(approx(b.height(), 24.0));
    }

    #[test]
    fn test_rotated_point_hits_rotated_layer() {
        // 100x20 bar centered at (150, 150), rotated upright.
        let layer = Layer::rectangle(100.0, 140.0, 100.0, 20.0).with_rotation(90.0);
        assert!(layer.contains_point(Point::new(150.0, 195.0), 0.0));
        assert!(!layer.contains_point(Point::new(195.0, 150.0), 0.0));
    }

    #[test]
    fn test_rotated_bounds_of_quarter_turn() {
        let layer = Layer::rectangle(0.0, 0.0, 100.0, 20.0).with_rotation(90.0);
        let b = layer.rotated_bounds();
        assert!(approx(b.width(), 20.0));
        assert!(approx(b.height(), 100.0));
        assert!(approx(b.center().x, 50.0));
    }

    #[test]
    fn test_translate_moves_every_geometry_family() {
        let mut line = Layer::segment(LayerType::Line, Point::new(0.0, 0.0), Point::new(5.0, 5.0));
        line.translate(Vec2::new(1.0, 2.0));
        assert_eq!(line.x2, Some(6.0));
        assert_eq!(line.y1, Some(2.0));

        let mut path = Layer::path(vec![Point::new(1.0, 1.0)]);
        path.translate(Vec2::new(-1.0, -1.0));
        assert_eq!(path.point_list().unwrap()[0], Point::ZERO);
    }

    #[test]
    fn test_resize_to_box_and_ellipse() {
        let mut rect = Layer::rectangle(0.0, 0.0, 10.0, 10.0);
        rect.resize_to(rect.bounds(), Rect::new(5.0, 5.0, 25.0, 15.0));
        assert_eq!(rect.x, Some(5.0));
        assert_eq!(rect.width, Some(20.0));
        assert_eq!(rect.height, Some(10.0));

        let mut ellipse = Layer::ellipse(0.0, 0.0, 5.0, 5.0);
        ellipse.resize_to(ellipse.bounds(), Rect::new(-10.0, -5.0, 10.0, 5.0));
        assert_eq!(ellipse.radius_x, Some(10.0));
        assert_eq!(ellipse.radius_y, Some(5.0));
    }

    #[test]
    fn test_resize_to_scales_segment_and_path() {
        let mut arrow = Layer::segment(LayerType::Arrow, Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        arrow.resize_to(arrow.bounds(), Rect::new(0.0, 0.0, 20.0, 0.0));
        assert_eq!(arrow.x2, Some(20.0));
        assert_eq!(arrow.y2, Some(0.0));

        let mut path = Layer::path(vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)]);
        path.resize_to(path.bounds(), Rect::new(0.0, 0.0, 5.0, 20.0));
        assert_eq!(path.point_list().unwrap()[1], Point::new(5.0, 20.0));
    }

    #[test]
    fn test_union_bounds() {
        let layers = [
            Layer::rectangle(0.0, 0.0, 10.0, 10.0),
            Layer::rectangle(20.0, 20.0, 10.0, 10.0),
        ];
        assert_eq!(union_bounds(&layers), Some(Rect::new(0.0, 0.0, 30.0, 30.0)));
        assert_eq!(union_bounds(&Vec::<Layer>::new()), None);
    }
}
