//! Resize, rotate and move gestures.
//!
//! A gesture captures the selected layers when it starts and derives every
//! intermediate result from that capture plus the pointer delta, so moving
//! the pointer back to where it started restores the original geometry
//! exactly.

use crate::input::Modifiers;
use crate::layer::{rotate_point, Layer};
use crate::selection::{ResizeHandle, SelectionFrame};
use crate::store::{StateKey, StateSnapshot, StateValue, Store, StoreError};
use kurbo::{Point, Rect, Size, Vec2};

/// Smallest width or height a resize can produce, in canvas units.
pub const MIN_SIZE: f64 = 1.0;
/// Rotation step with the constrain modifier held, in degrees.
pub const ROTATION_SNAP_DEGREES: f64 = 15.0;

/// Kind of gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Resize,
    Rotate,
    Move,
}

/// Pre-gesture capture.
#[derive(Debug, Clone)]
struct Capture {
    frame: SelectionFrame,
    originals: Vec<Layer>,
    before: StateSnapshot,
    was_dirty: bool,
    anchor: Point,
}

impl Capture {
    fn take(store: &Store, anchor: Point) -> Option<Self> {
        let selected = store.selected_layer_ids();
        let (frame, originals) = store.with_layers(|layers| {
            let frame = SelectionFrame::of(layers, &selected)?;
            let originals: Vec<Layer> = layers
                .iter()
                .filter(|l| selected.contains(&l.id) && l.is_interactive())
                .cloned()
                .collect();
            (!originals.is_empty()).then_some((frame, originals))
        })?;
        Some(Self {
            frame,
            originals,
            before: store.snapshot(),
            was_dirty: store.is_dirty(),
            anchor,
        })
    }
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    Resizing {
        handle: ResizeHandle,
        capture: Capture,
    },
    Rotating {
        initial_angle: f64,
        capture: Capture,
    },
    Moving {
        capture: Capture,
    },
}

/// Result of ending a gesture.
#[derive(Debug, Clone)]
pub struct GestureOutcome {
    pub gesture: Gesture,
    /// Whether any geometry was written during the gesture.
    pub changed: bool,
    /// State before the gesture, for the undo stack.
    pub before: StateSnapshot,
}

/// Drives resize/rotate/move gestures against the store.
#[derive(Debug)]
pub struct TransformController {
    state: State,
    wrote: bool,
}

impl Default for TransformController {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformController {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            wrote: false,
        }
    }

    /// The active gesture, if any.
    pub fn active(&self) -> Option<Gesture> {
        match self.state {
            State::Idle => None,
            State::Resizing { .. } => Some(Gesture::Resize),
            State::Rotating { .. } => Some(Gesture::Rotate),
            State::Moving { .. } => Some(Gesture::Move),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    fn begin(&mut self, store: &Store, point: Point, gesture: Gesture) -> Option<Capture> {
        if let Some(active) = self.active() {
            log::warn!("Ignoring {:?} start while {:?} is in progress", gesture, active);
            return None;
        }
        let capture = Capture::take(store, point);
        if capture.is_none() {
            log::debug!("Nothing transformable selected for {:?}", gesture);
        }
        self.wrote = false;
        capture
    }

    /// Begin resizing the selection from `handle`.
    pub fn start_resize(&mut self, store: &Store, handle: ResizeHandle, point: Point) -> bool {
        let Some(capture) = self.begin(store, point, Gesture::Resize) else {
            return false;
        };
        self.state = State::Resizing { handle, capture };
        true
    }

    /// Begin rotating the selection around its frame center.
    pub fn start_rotation(&mut self, store: &Store, point: Point) -> bool {
        let Some(capture) = self.begin(store, point, Gesture::Rotate) else {
            return false;
        };
        let center = capture.frame.center();
        let initial_angle = (point.y - center.y).atan2(point.x - center.x);
        self.state = State::Rotating {
            initial_angle,
            capture,
        };
        true
    }

    /// Begin dragging the selection.
    pub fn start_move(&mut self, store: &Store, point: Point) -> bool {
        let Some(capture) = self.begin(store, point, Gesture::Move) else {
            return false;
        };
        self.state = State::Moving { capture };
        true
    }

    /// Apply the pointer position to an active resize.
    pub fn handle_resize(&mut self, store: &Store, point: Point, modifiers: Modifiers) -> Result<bool, StoreError> {
        let State::Resizing { handle, capture } = &self.state else {
            return Ok(false);
        };
        let changed = resize_layers(capture, *handle, point, modifiers.constrain());
        store.apply_layer_changes(&changed, true)?;
        self.wrote = true;
        Ok(true)
    }

    /// Apply the pointer position to an active rotation.
    pub fn handle_rotation(&mut self, store: &Store, point: Point, modifiers: Modifiers) -> Result<bool, StoreError> {
        let State::Rotating {
            initial_angle,
            capture,
        } = &self.state
        else {
            return Ok(false);
        };
        let changed = rotate_layers(capture, *initial_angle, point, modifiers.constrain());
        store.apply_layer_changes(&changed, true)?;
        self.wrote = true;
        Ok(true)
    }

    /// Apply the pointer position to an active move.
    pub fn handle_move(&mut self, store: &Store, point: Point, modifiers: Modifiers) -> Result<bool, StoreError> {
        let State::Moving { capture } = &self.state else {
            return Ok(false);
        };
        let mut delta = point - capture.anchor;
        if modifiers.constrain() {
            // Lock to the dominant axis.
            if delta.x.abs() >= delta.y.abs() {
                delta.y = 0.0;
            } else {
                delta.x = 0.0;
            }
        }
        let changed: Vec<Layer> = capture
            .originals
            .iter()
            .map(|l| {
                let mut moved = l.clone();
                moved.translate(delta);
                moved
            })
            .collect();
        store.apply_layer_changes(&changed, true)?;
        self.wrote = true;
        Ok(true)
    }

    /// Dispatch to the handler of the active gesture.
    pub fn handle_pointer(&mut self, store: &Store, point: Point, modifiers: Modifiers) -> Result<bool, StoreError> {
        match self.active() {
            Some(Gesture::Resize) => self.handle_resize(store, point, modifiers),
            Some(Gesture::Rotate) => self.handle_rotation(store, point, modifiers),
            Some(Gesture::Move) => self.handle_move(store, point, modifiers),
            None => Ok(false),
        }
    }

    /// End the active gesture, keeping what was written.
    pub fn finish(&mut self) -> Option<GestureOutcome> {
        let gesture = self.active()?;
        let state = std::mem::replace(&mut self.state, State::Idle);
        let capture = match state {
            State::Resizing { capture, .. }
            | State::Rotating { capture, .. }
            | State::Moving { capture } => capture,
            State::Idle => return None,
        };
        let changed = std::mem::take(&mut self.wrote);
        Some(GestureOutcome {
            gesture,
            changed,
            before: capture.before,
        })
    }

    /// Abort the active gesture, restoring the captured geometry if anything
    /// was written. Returns whether a gesture was active.
    pub fn cancel(&mut self, store: &Store) -> Result<bool, StoreError> {
        let state = std::mem::replace(&mut self.state, State::Idle);
        let capture = match state {
            State::Resizing { capture, .. }
            | State::Rotating { capture, .. }
            | State::Moving { capture } => capture,
            State::Idle => return Ok(false),
        };
        if std::mem::take(&mut self.wrote) {
            let mut layers = store.layers();
            for layer in layers.iter_mut() {
                if let Some(original) = capture.originals.iter().find(|o| o.id == layer.id) {
                    *layer = original.clone();
                }
            }
            store.update(vec![
                (StateKey::Layers, StateValue::Layers(layers)),
                (StateKey::IsDirty, StateValue::Bool(capture.was_dirty)),
            ])?;
        }
        Ok(true)
    }
}

/// Normalize degrees into [0, 360).
pub fn normalize_degrees(degrees: f64) -> f64 {
    let d = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if d >= 360.0 { 0.0 } else { d }
}

fn snap_degrees(degrees: f64) -> f64 {
    (degrees / ROTATION_SNAP_DEGREES).round() * ROTATION_SNAP_DEGREES
}

fn rotate_vec(v: Vec2, radians: f64) -> Vec2 {
    let (sin_r, cos_r) = radians.sin_cos();
    Vec2::new(v.x * cos_r - v.y * sin_r, v.x * sin_r + v.y * cos_r)
}

/// New frame size for a handle drag, before the position is fixed.
fn resized_extent(frame: Rect, handle: ResizeHandle, local_delta: Vec2, keep_aspect: bool) -> Size {
    let w0 = frame.width();
    let h0 = frame.height();
    let resizable_x = w0 > f64::EPSILON && handle.dir_x() != 0.0;
    let resizable_y = h0 > f64::EPSILON && handle.dir_y() != 0.0;

    let mut w = if resizable_x {
        (w0 + handle.dir_x() * local_delta.x).max(MIN_SIZE)
    } else {
        w0
    };
    let mut h = if resizable_y {
        (h0 + handle.dir_y() * local_delta.y).max(MIN_SIZE)
    } else {
        h0
    };

    if keep_aspect && w0 > f64::EPSILON && h0 > f64::EPSILON {
        let ratio = w0 / h0;
        if handle.is_corner() {
            let scale = (w / w0).max(h / h0);
            w = w0 * scale;
            h = h0 * scale;
        } else if handle.dir_y() == 0.0 {
            h = w / ratio;
        } else {
            w = h * ratio;
        }
        if w < MIN_SIZE || h < MIN_SIZE {
            let grow = (MIN_SIZE / w).max(MIN_SIZE / h);
            w *= grow;
            h *= grow;
        }
    }
    Size::new(w, h)
}

fn resize_layers(capture: &Capture, handle: ResizeHandle, point: Point, constrain: bool) -> Vec<Layer> {
    let frame = capture.frame;
    let bounds = frame.bounds;
    let angle = frame.rotation.to_radians();
    let local_delta = rotate_vec(point - capture.anchor, -angle);
    let keep_aspect = constrain || capture.originals.iter().any(Layer::keeps_aspect_ratio);
    let size = resized_extent(bounds, handle, local_delta, keep_aspect);

    // Keep the opposite edge fixed in the frame's local space.
    let x0 = match handle.dir_x() {
        d if d > 0.0 => bounds.x0,
        d if d < 0.0 => bounds.x1 - size.width,
        _ => bounds.center().x - size.width / 2.0,
    };
    let y0 = match handle.dir_y() {
        d if d > 0.0 => bounds.y0,
        d if d < 0.0 => bounds.y1 - size.height,
        _ => bounds.center().y - size.height / 2.0,
    };
    let local_rect = Rect::new(x0, y0, x0 + size.width, y0 + size.height);

    // The frame pivots around its center, so a shifted local center moves
    // the world center along the rotated offset.
    let old_center = bounds.center();
    let new_center = old_center + rotate_vec(local_rect.center() - old_center, angle);

    let sx = if bounds.width() > f64::EPSILON {
        size.width / bounds.width()
    } else {
        1.0
    };
    let sy = if bounds.height() > f64::EPSILON {
        size.height / bounds.height()
    } else {
        1.0
    };

    capture
        .originals
        .iter()
        .map(|original| {
            let from = original.bounds();
            let offset = original.center() - old_center;
            let center = new_center + Vec2::new(offset.x * sx, offset.y * sy);
            let to = Rect::from_center_size(center, Size::new(from.width() * sx, from.height() * sy));
            let mut layer = original.clone();
            layer.resize_to(from, to);
            layer
        })
        .collect()
}

fn rotate_layers(capture: &Capture, initial_angle: f64, point: Point, constrain: bool) -> Vec<Layer> {
    let center = capture.frame.center();
    let angle = (point.y - center.y).atan2(point.x - center.x);
    let mut delta = (angle - initial_angle).to_degrees();

    if let [single] = capture.originals.as_slice() {
        let mut rotation = single.rotation + delta;
        if constrain {
            rotation = snap_degrees(rotation);
        }
        let mut layer = single.clone();
        layer.rotation = normalize_degrees(rotation);
        return vec![layer];
    }

    if constrain {
        delta = snap_degrees(delta);
    }
    capture
        .originals
        .iter()
        .map(|original| {
            let mut layer = original.clone();
            let orbit = rotate_point(original.center(), center, delta.to_radians());
            layer.set_center(orbit);
            layer.rotation = normalize_degrees(original.rotation + delta);
            layer
        })
        .collect()
}
