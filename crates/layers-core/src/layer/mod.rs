//! Annotation layer definitions.
//!
//! A [`Layer`] is a loosely typed record: every layer shares one struct and
//! only the fields meaningful for its [`LayerType`] are populated. This
//! mirrors the JSON stored by the host platform, so layers written by newer
//! editors round-trip through the `extra` map untouched.

mod geometry;
mod normalize;

pub use geometry::{rotate_point, union_bounds};
pub use normalize::{normalize_layer_value, normalize_layers, LayerError};

use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Fill/stroke sentinel meaning "paint nothing".
pub const PAINT_NONE: &str = "none";
/// Fill/stroke sentinel meaning "fully transparent".
pub const PAINT_TRANSPARENT: &str = "transparent";

/// The closed set of layer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerType {
    Rectangle,
    Circle,
    Ellipse,
    Polygon,
    Star,
    Arrow,
    Line,
    Path,
    Text,
    Image,
    Highlight,
    Blur,
    Marker,
    Dimension,
    CustomShape,
}

impl LayerType {
    /// Geometry family used for bounds and resize math.
    pub fn geometry(self) -> GeometryKind {
        match self {
            LayerType::Rectangle
            | LayerType::Text
            | LayerType::Image
            | LayerType::Highlight
            | LayerType::Blur
            | LayerType::CustomShape => GeometryKind::Box,
            LayerType::Circle | LayerType::Marker => GeometryKind::Circle,
            LayerType::Ellipse => GeometryKind::Ellipse,
            LayerType::Polygon | LayerType::Star => GeometryKind::Radial,
            LayerType::Arrow | LayerType::Line | LayerType::Dimension => GeometryKind::Segment,
            LayerType::Path => GeometryKind::Points,
        }
    }

    /// Whether resizing always keeps the width/height ratio.
    pub fn locks_aspect_ratio(self) -> bool {
        matches!(
            self,
            LayerType::Circle | LayerType::Polygon | LayerType::Star | LayerType::Marker
        )
    }
}

/// How a layer stores its geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    /// `x`, `y` top-left plus `width`, `height`.
    Box,
    /// `x`, `y` center plus `radius`.
    Circle,
    /// `x`, `y` center plus `radiusX`, `radiusY`.
    Ellipse,
    /// `x`, `y` center plus `radius`, or an explicit point list.
    Radial,
    /// `x1`, `y1` to `x2`, `y2`.
    Segment,
    /// Free point list.
    Points,
}

/// The `points` field is overloaded: a vertex list for paths and polygons,
/// a spike count for stars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerPoints {
    List(Vec<Point>),
    Count(f64),
}

fn default_true() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

/// One drawable annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,

    // Geometry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<LayerPoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sides: Option<f64>,
    /// Rotation in degrees, clockwise, around the layer center.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rotation: f64,

    // Style
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_blur: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_offset_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_offset_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_spread: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_shadow: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_shadow_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_shadow_blur: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_shadow_offset_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_shadow_offset_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_radius: Option<f64>,

    // Text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,

    // Image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(rename = "_srcStripped", default, skip_serializing_if = "Option::is_none")]
    pub src_stripped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_aspect_ratio: Option<bool>,

    /// Attributes this editor does not interpret, kept for round-trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Layer {
    /// Create an empty layer of the given kind with a fresh id.
    pub fn new(kind: LayerType) -> Self {
        Self::with_id(format!("layer_{}", Uuid::new_v4().simple()), kind)
    }

    /// Create an empty layer with a specific id.
    pub fn with_id(id: impl Into<String>, kind: LayerType) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            visible: true,
            locked: false,
            x: None,
            y: None,
            width: None,
            height: None,
            radius: None,
            radius_x: None,
            radius_y: None,
            inner_radius: None,
            x1: None,
            y1: None,
            x2: None,
            y2: None,
            points: None,
            sides: None,
            rotation: 0.0,
            stroke: None,
            fill: None,
            stroke_width: None,
            opacity: None,
            fill_opacity: None,
            stroke_opacity: None,
            shadow: None,
            shadow_color: None,
            shadow_blur: None,
            shadow_offset_x: None,
            shadow_offset_y: None,
            shadow_spread: None,
            text_shadow: None,
            text_shadow_color: None,
            text_shadow_blur: None,
            text_shadow_offset_x: None,
            text_shadow_offset_y: None,
            blur_radius: None,
            text: None,
            font_size: None,
            font_family: None,
            src: None,
            src_stripped: None,
            preserve_aspect_ratio: None,
            extra: Map::new(),
        }
    }

    /// Box-shaped layer (rectangle, text, image, highlight, blur, custom shape).
    pub fn boxed(kind: LayerType, x: f64, y: f64, width: f64, height: f64) -> Self {
        let mut layer = Self::new(kind);
        layer.x = Some(x);
        layer.y = Some(y);
        layer.width = Some(width);
        layer.height = Some(height);
        layer
    }

    /// Rectangle at the given position and size.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::boxed(LayerType::Rectangle, x, y, width, height)
    }

    /// Circle centered at `(cx, cy)`.
    pub fn circle(cx: f64, cy: f64, radius: f64) -> Self {
        let mut layer = Self::new(LayerType::Circle);
        layer.x = Some(cx);
        layer.y = Some(cy);
        layer.radius = Some(radius);
        layer
    }

    /// Ellipse centered at `(cx, cy)`.
    pub fn ellipse(cx: f64, cy: f64, radius_x: f64, radius_y: f64) -> Self {
        let mut layer = Self::new(LayerType::Ellipse);
        layer.x = Some(cx);
        layer.y = Some(cy);
        layer.radius_x = Some(radius_x);
        layer.radius_y = Some(radius_y);
        layer
    }

    /// Line-like layer (line, arrow, dimension) between two points.
    pub fn segment(kind: LayerType, start: Point, end: Point) -> Self {
        let mut layer = Self::new(kind);
        layer.x1 = Some(start.x);
        layer.y1 = Some(start.y);
        layer.x2 = Some(end.x);
        layer.y2 = Some(end.y);
        layer
    }

    /// Freehand path through the given points.
    pub fn path(points: Vec<Point>) -> Self {
        let mut layer = Self::new(LayerType::Path);
        layer.points = Some(LayerPoints::List(points));
        layer
    }

    /// Image layer carrying an inline data URL.
    pub fn image(x: f64, y: f64, width: f64, height: f64, src: impl Into<String>) -> Self {
        let mut layer = Self::boxed(LayerType::Image, x, y, width, height);
        layer.src = Some(src.into());
        layer
    }

    /// Set the rotation in degrees.
    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    /// Vertex list, if this layer carries one.
    pub fn point_list(&self) -> Option<&[Point]> {
        match &self.points {
            Some(LayerPoints::List(points)) => Some(points),
            _ => None,
        }
    }

    /// Whether the layer can be picked and transformed on the canvas.
    pub fn is_interactive(&self) -> bool {
        self.visible && !self.locked
    }

    /// Whether resizing this layer should keep its aspect ratio.
    pub fn keeps_aspect_ratio(&self) -> bool {
        self.kind.locks_aspect_ratio() || self.preserve_aspect_ratio == Some(true)
    }

    /// Inline pixel payload length in characters, for image layers.
    pub fn inline_payload_len(&self) -> usize {
        match (self.kind, &self.src) {
            (LayerType::Image, Some(src)) => src.len(),
            _ => 0,
        }
    }

    /// Whether a paint value actually paints something.
    pub fn paints(value: Option<&str>) -> bool {
        match value {
            None => false,
            Some(v) => {
                let v = v.trim();
                !v.is_empty()
                    && !v.eq_ignore_ascii_case(PAINT_NONE)
                    && !v.eq_ignore_ascii_case(PAINT_TRANSPARENT)
            }
        }
    }

    /// Half the stroke width, or zero when the stroke does not paint.
    pub fn stroke_half_width(&self) -> f64 {
        if Self::paints(self.stroke.as_deref()) {
            self.stroke_width.unwrap_or(1.0).max(0.0) / 2.0
        } else {
            0.0
        }
    }
}
