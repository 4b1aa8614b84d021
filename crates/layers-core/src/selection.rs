//! Selection handles and hit-testing.
//!
//! Handles are derived from the current selection on every call and never
//! stored, so they cannot go stale when geometry changes underneath them.

use crate::layer::{rotate_point, union_bounds, Layer};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 10.0;
/// Extra pick slack around a handle, in screen pixels.
pub const HANDLE_HIT_SLOP: f64 = 4.0;
/// Distance from the frame's top edge to the rotation handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET: f64 = 25.0;
/// Body hit tolerance in screen pixels.
pub const HIT_TOLERANCE: f64 = 4.0;

/// One of the eight resize handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    Nw,
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::Nw,
        ResizeHandle::N,
        ResizeHandle::Ne,
        ResizeHandle::E,
        ResizeHandle::Se,
        ResizeHandle::S,
        ResizeHandle::Sw,
        ResizeHandle::W,
    ];

    /// Horizontal direction: -1 moves the left edge, 1 the right, 0 neither.
    pub fn dir_x(self) -> f64 {
        match self {
            ResizeHandle::Nw | ResizeHandle::W | ResizeHandle::Sw => -1.0,
            ResizeHandle::Ne | ResizeHandle::E | ResizeHandle::Se => 1.0,
            ResizeHandle::N | ResizeHandle::S => 0.0,
        }
    }

    /// Vertical direction: -1 moves the top edge, 1 the bottom, 0 neither.
    pub fn dir_y(self) -> f64 {
        match self {
            ResizeHandle::Nw | ResizeHandle::N | ResizeHandle::Ne => -1.0,
            ResizeHandle::Sw | ResizeHandle::S | ResizeHandle::Se => 1.0,
            ResizeHandle::E | ResizeHandle::W => 0.0,
        }
    }

    pub fn is_corner(self) -> bool {
        self.dir_x() != 0.0 && self.dir_y() != 0.0
    }

    /// Handle position on `bounds`, before rotation.
    pub fn anchor_on(self, bounds: Rect) -> Point {
        let c = bounds.center();
        Point::new(
            c.x + self.dir_x() * bounds.width() / 2.0,
            c.y + self.dir_y() * bounds.height() / 2.0,
        )
    }

    /// Screen direction of this handle in degrees, clockwise from north.
    fn base_angle(self) -> f64 {
        match self {
            ResizeHandle::N => 0.0,
            ResizeHandle::Ne => 45.0,
            ResizeHandle::E => 90.0,
            ResizeHandle::Se => 135.0,
            ResizeHandle::S => 180.0,
            ResizeHandle::Sw => 225.0,
            ResizeHandle::W => 270.0,
            ResizeHandle::Nw => 315.0,
        }
    }

    /// CSS cursor for this handle on a frame rotated by `rotation` degrees.
    pub fn cursor(self, rotation: f64) -> &'static str {
        let angle = (self.base_angle() + rotation).rem_euclid(180.0);
        match ((angle + 22.5) / 45.0).floor() as i64 % 4 {
            0 => "ns-resize",
            1 => "nesw-resize",
            2 => "ew-resize",
            _ => "nwse-resize",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResizeHandle::Nw => "nw",
            ResizeHandle::N => "n",
            ResizeHandle::Ne => "ne",
            ResizeHandle::E => "e",
            ResizeHandle::Se => "se",
            ResizeHandle::S => "s",
            ResizeHandle::Sw => "sw",
            ResizeHandle::W => "w",
        }
    }
}

/// Type of selection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    Resize(ResizeHandle),
    Rotate,
}

/// A selection handle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub kind: HandleKind,
    /// Handle center.
    pub position: Point,
    /// Axis-aligned hit rectangle around `position`.
    pub rect: Rect,
    /// CSS cursor hint.
    pub cursor: &'static str,
}

impl Handle {
    fn new(kind: HandleKind, position: Point, half: f64, cursor: &'static str) -> Self {
        Self {
            kind,
            position,
            rect: Rect::new(
                position.x - half,
                position.y - half,
                position.x + half,
                position.y + half,
            ),
            cursor,
        }
    }

    pub fn hit_test(&self, point: Point) -> bool {
        self.rect.contains(point)
    }
}

/// The box handles are laid out on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionFrame {
    /// Unrotated bounds.
    pub bounds: Rect,
    /// Degrees around the bounds center.
    pub rotation: f64,
}

impl SelectionFrame {
    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    /// Frame for the selected, interactive layers.
    ///
    /// A single layer keeps its own rotation; several layers share their
    /// axis-aligned union.
    pub fn of(layers: &[Layer], selected: &BTreeSet<String>) -> Option<Self> {
        let targets: Vec<&Layer> = layers
            .iter()
            .filter(|l| selected.contains(&l.id) && l.is_interactive())
            .collect();
        match targets.as_slice() {
            [] => None,
            [single] => Some(Self {
                bounds: single.bounds(),
                rotation: single.rotation,
            }),
            many => union_bounds(many.iter().copied()).map(|bounds| Self {
                bounds,
                rotation: 0.0,
            }),
        }
    }

    /// Map a frame-local point to canvas space.
    pub fn to_world(&self, local: Point) -> Point {
        if self.rotation == 0.0 {
            return local;
        }
        rotate_point(local, self.center(), self.rotation.to_radians())
    }

    /// Handles for this frame at the given zoom, rotate handle first.
    pub fn handles(&self, zoom: f64) -> Vec<Handle> {
        let zoom = if zoom > 0.0 { zoom } else { 1.0 };
        let half = (HANDLE_SIZE / 2.0 + HANDLE_HIT_SLOP) / zoom;
        let top_center = Point::new(
            self.bounds.center().x,
            self.bounds.y0 - ROTATE_HANDLE_OFFSET / zoom,
        );

        let mut handles = Vec::with_capacity(9);
        handles.push(Handle::new(
            HandleKind::Rotate,
            self.to_world(top_center),
            half,
            "grab",
        ));
        for handle in ResizeHandle::ALL {
            handles.push(Handle::new(
                HandleKind::Resize(handle),
                self.to_world(handle.anchor_on(self.bounds)),
                half,
                handle.cursor(self.rotation),
            ));
        }
        handles
    }
}

/// Handles for the current selection.
pub fn selection_handles(layers: &[Layer], selected: &BTreeSet<String>, zoom: f64) -> Vec<Handle> {
    SelectionFrame::of(layers, selected)
        .map(|frame| frame.handles(zoom))
        .unwrap_or_default()
}

/// What a canvas point resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum HitTarget {
    Handle(Handle),
    Layer(String),
    Empty,
}

/// Resolve `point` (canvas space) against the selection and layers.
///
/// Handles win over bodies, the rotate handle over resize handles, and
/// upper layers over lower ones. Hidden and locked layers are skipped.
pub fn hit_test(layers: &[Layer], selected: &BTreeSet<String>, point: Point, zoom: f64) -> HitTarget {
    if let Some(handle) = selection_handles(layers, selected, zoom)
        .into_iter()
        .find(|h| h.hit_test(point))
    {
        return HitTarget::Handle(handle);
    }

    let tolerance = HIT_TOLERANCE / if zoom > 0.0 { zoom } else { 1.0 };
    layers
        .iter()
        .rev()
        .filter(|l| l.is_interactive())
        .find(|l| l.contains_point(point, tolerance))
        .map_or(HitTarget::Empty, |l| HitTarget::Layer(l.id.clone()))
}

/// Ids of interactive layers whose rotated bounds intersect `rect`.
pub fn layers_in_rect(layers: &[Layer], rect: Rect) -> BTreeSet<String> {
    let rect = rect.abs();
    layers
        .iter()
        .filter(|l| l.is_interactive())
        .filter(|l| {
            let b = l.rotated_bounds();
            b.x0 <= rect.x1 && b.x1 >= rect.x0 && b.y0 <= rect.y1 && b.y1 >= rect.y0
        })
        .map(|l| l.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerType;

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn rect_layer(id: &str, x: f64, y: f64, w: f64, h: f64) -> Layer {
        let mut layer = Layer::rectangle(x, y, w, h);
        layer.id = id.to_string();
        layer
    }

    #[test]
    fn test_single_selection_has_nine_handles() {
        let layers = vec![rect_layer("a", 0.0, 0.0, 100.0, 50.0)];
        let handles = selection_handles(&layers, &ids(&["a"]), 1.0);
        assert_eq!(handles.len(), 9);
        assert_eq!(handles[0].kind, HandleKind::Rotate);
        let se = handles
            .iter()
            .find(|h| h.kind == HandleKind::Resize(ResizeHandle::Se))
            .unwrap();
        assert_eq!(se.position, Point::new(100.0, 50.0));
        assert_eq!(se.cursor, "nwse-resize");
    }

    #[test]
    fn test_handles_follow_rotation() {
        let layers = vec![rect_layer("a", 0.0, 0.0, 100.0, 100.0).with_rotation(90.0)];
        let handles = selection_handles(&layers, &ids(&["a"]), 1.0);
        // Rotate handle swings from above the frame to its right.
        let rotate = handles[0].position;
        assert!((rotate.x - 125.0).abs() < 1e-9);
        assert!((rotate.y - 50.0).abs() < 1e-9);
        let n = handles
            .iter()
            .find(|h| h.kind == HandleKind::Resize(ResizeHandle::N))
            .unwrap();
        assert_eq!(n.cursor, "ew-resize");
    }

    #[test]
    fn test_handle_size_scales_with_zoom() {
        let layers = vec![rect_layer("a", 0.0, 0.0, 100.0, 100.0)];
        let near = selection_handles(&layers, &ids(&["a"]), 1.0)[1].rect.width();
        let far = selection_handles(&layers, &ids(&["a"]), 2.0)[1].rect.width();
        assert!((near - 2.0 * far).abs() < 1e-9);
    }

    #[test]
    fn test_multi_selection_uses_union_unrotated() {
        let layers = vec![
            rect_layer("a", 0.0, 0.0, 10.0, 10.0).with_rotation(30.0),
            rect_layer("b", 50.0, 50.0, 10.0, 10.0),
        ];
        let frame = SelectionFrame::of(&layers, &ids(&["a", "b"])).unwrap();
        assert_eq!(frame.rotation, 0.0);
        assert!(frame.bounds.x0 < 0.0);
        assert_eq!(frame.bounds.x1, 60.0);
    }

    #[test]
    fn test_locked_selection_has_no_handles() {
        let mut layer = rect_layer("a", 0.0, 0.0, 10.0, 10.0);
        layer.locked = true;
        assert!(selection_handles(&[layer], &ids(&["a"]), 1.0).is_empty());
    }

    #[test]
    fn test_rotate_handle_wins_over_body() {
        // A second layer sits exactly under the rotate handle.
        let layers = vec![
            rect_layer("a", 100.0, 100.0, 100.0, 100.0),
            rect_layer("b", 140.0, 60.0, 20.0, 20.0),
        ];
        let hit = hit_test(&layers, &ids(&["a"]), Point::new(150.0, 75.0), 1.0);
        assert!(matches!(hit, HitTarget::Handle(h) if h.kind == HandleKind::Rotate));
    }

    #[test]
    fn test_topmost_body_wins() {
        let layers = vec![
            rect_layer("bottom", 0.0, 0.0, 100.0, 100.0),
            rect_layer("top", 25.0, 25.0, 50.0, 50.0),
        ];
        assert_eq!(
            hit_test(&layers, &BTreeSet::new(), Point::new(50.0, 50.0), 1.0),
            HitTarget::Layer("top".to_string())
        );
        assert_eq!(
            hit_test(&layers, &BTreeSet::new(), Point::new(300.0, 300.0), 1.0),
            HitTarget::Empty
        );
    }

    #[test]
    fn test_hidden_and_locked_layers_are_skipped() {
        let mut hidden = rect_layer("hidden", 0.0, 0.0, 100.0, 100.0);
        hidden.visible = false;
        let mut locked = rect_layer("locked", 0.0, 0.0, 100.0, 100.0);
        locked.locked = true;
        let layers = vec![rect_layer("under", 0.0, 0.0, 100.0, 100.0), hidden, locked];
        assert_eq!(
            hit_test(&layers, &BTreeSet::new(), Point::new(50.0, 50.0), 1.0),
            HitTarget::Layer("under".to_string())
        );
    }

    #[test]
    fn test_rotated_body_hit() {
        let layers = vec![rect_layer("bar", 100.0, 140.0, 100.0, 20.0).with_rotation(90.0)];
        let none = BTreeSet::new();
        assert_eq!(
            hit_test(&layers, &none, Point::new(150.0, 190.0), 1.0),
            HitTarget::Layer("bar".to_string())
        );
        assert_eq!(hit_test(&layers, &none, Point::new(190.0, 150.0), 1.0), HitTarget::Empty);
    }

    #[test]
    fn test_layers_in_rect() {
        let layers = vec![
            rect_layer("a", 0.0, 0.0, 10.0, 10.0),
            rect_layer("b", 100.0, 100.0, 10.0, 10.0),
            Layer::segment(LayerType::Line, Point::new(5.0, 50.0), Point::new(5.0, 60.0)),
        ];
        let hits = layers_in_rect(&layers, Rect::new(20.0, 20.0, -5.0, -5.0));
        assert_eq!(hits, ids(&["a"]));
    }
}
