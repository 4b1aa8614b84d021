//! Pointer and touch input as delivered by the host page.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Shift held: keep aspect ratio while resizing, snap while rotating.
    pub fn constrain(&self) -> bool {
        self.shift
    }

    /// Ctrl (or Cmd on macOS) held: toggle membership in the selection.
    pub fn toggle_selection(&self) -> bool {
        self.ctrl || self.meta
    }

    /// Shift held on click: extend the selection.
    pub fn extend_selection(&self) -> bool {
        self.shift
    }
}

/// One active touch contact, in client (CSS pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: i64,
    pub position: Point,
}

impl TouchPoint {
    pub fn new(id: i64, x: f64, y: f64) -> Self {
        Self {
            id,
            position: Point::new(x, y),
        }
    }
}

/// Centroid of the active touches.
pub fn touch_centroid(touches: &[TouchPoint]) -> Option<Point> {
    if touches.is_empty() {
        return None;
    }
    let n = touches.len() as f64;
    let (sx, sy) = touches
        .iter()
        .fold((0.0, 0.0), |(sx, sy), t| (sx + t.position.x, sy + t.position.y));
    Some(Point::new(sx / n, sy / n))
}

/// Distance between the first two touches, for pinch zoom.
pub fn touch_spread(touches: &[TouchPoint]) -> Option<f64> {
    match touches {
        [a, b, ..] => Some(a.position.distance(b.position)),
        _ => None,
    }
}
