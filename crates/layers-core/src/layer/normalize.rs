//! Normalization of loosely typed layer JSON.
//!
//! Layer data arrives from several places (server API, imports, drafts
//! written by older editors) and numeric or boolean attributes are not
//! always typed correctly. After normalization numbers are JSON numbers and
//! flags are JSON booleans.

use super::Layer;
use serde_json::Value;
use thiserror::Error;

/// Layer decoding errors.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("Layer is not a JSON object")]
    NotAnObject,
    #[error("Invalid layer: {0}")]
    Invalid(#[from] serde_json::Error),
}

const NUMERIC_FIELDS: &[&str] = &[
    "x",
    "y",
    "width",
    "height",
    "radius",
    "radiusX",
    "radiusY",
    "innerRadius",
    "x1",
    "y1",
    "x2",
    "y2",
    "sides",
    "rotation",
    "strokeWidth",
    "opacity",
    "fillOpacity",
    "strokeOpacity",
    "shadowBlur",
    "shadowOffsetX",
    "shadowOffsetY",
    "shadowSpread",
    "textShadowBlur",
    "textShadowOffsetX",
    "textShadowOffsetY",
    "blurRadius",
    "fontSize",
];

const BOOLEAN_FIELDS: &[&str] = &[
    "visible",
    "locked",
    "shadow",
    "textShadow",
    "preserveAspectRatio",
    "_srcStripped",
];

fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

/// Boolean coercion.
///
/// The empty string maps to `true`: legacy exports wrote bare attributes
/// (`visible=""`) to mean "set". This is a compatibility quirk.
fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "true" | "1" | "" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn normalize_point_list(points: &mut Value) {
    match points {
        Value::Array(items) => {
            for item in items.iter_mut() {
                if let Value::Object(map) = item {
                    for key in ["x", "y"] {
                        if let Some(v) = map.get(key) {
                            match to_number(v) {
                                Some(n) => {
                                    map.insert(key.to_string(), n);
                                }
                                None => {
                                    map.insert(key.to_string(), Value::from(0.0));
                                }
                            }
                        }
                    }
                }
            }
        }
        Value::String(_) => {
            if let Some(n) = to_number(points) {
                *points = n;
            }
        }
        _ => {}
    }
}

/// Coerce numeric and boolean attributes of a raw layer object in place.
///
/// Values that cannot be coerced are removed so that they read as absent.
pub fn normalize_layer_value(value: &mut Value) -> Result<(), LayerError> {
    let map = value.as_object_mut().ok_or(LayerError::NotAnObject)?;

    for key in NUMERIC_FIELDS {
        if let Some(v) = map.get(*key) {
            match to_number(v) {
                Some(n) => {
                    map.insert((*key).to_string(), n);
                }
                None => {
                    map.remove(*key);
                }
            }
        }
    }

    for key in BOOLEAN_FIELDS {
        if let Some(v) = map.get(*key) {
            match to_bool(v) {
                Some(b) => {
                    map.insert((*key).to_string(), Value::Bool(b));
                }
                None => {
                    map.remove(*key);
                }
            }
        }
    }

    if let Some(points) = map.get_mut("points") {
        normalize_point_list(points);
    }

    if let Some(Value::Number(n)) = map.get("id") {
        let id = n.to_string();
        map.insert("id".to_string(), Value::String(id));
    }

    Ok(())
}

impl Layer {
    /// Decode a layer from raw JSON, normalizing it first.
    pub fn from_value(mut value: Value) -> Result<Self, LayerError> {
        normalize_layer_value(&mut value)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Decode a list of raw layers, dropping entries that cannot be decoded.
pub fn normalize_layers(values: Vec<Value>) -> Vec<Layer> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match Layer::from_value(value) {
            Ok(layer) => Some(layer),
            Err(e) => {
                log::warn!("Dropping layer {}: {}", index, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerType;
    use serde_json::json;

    #[test]
    fn test_numeric_strings_become_numbers() {
        let layer = Layer::from_value(json!({
            "id": "a", "type": "rectangle",
            "x": "10", "y": " 20.5 ", "width": 30, "height": "abc"
        }))
        .unwrap();
        assert_eq!(layer.x, Some(10.0));
        assert_eq!(layer.y, Some(20.5));
        assert_eq!(layer.width, Some(30.0));
        assert_eq!(layer.height, None);
    }

    #[test]
    fn test_boolean_coercion() {
        let layer = Layer::from_value(json!({
            "id": "a", "type": "text",
            "visible": "false", "locked": 1, "shadow": "0", "textShadow": "true"
        }))
        .unwrap();
        assert!(!layer.visible);
        assert!(layer.locked);
        assert_eq!(layer.shadow, Some(false));
        assert_eq!(layer.text_shadow, Some(true));
    }

    #[test]
    fn test_empty_string_boolean_is_true() {
        let layer = Layer::from_value(json!({
            "id": "a", "type": "rectangle", "visible": "", "shadow": ""
        }))
        .unwrap();
        assert!(layer.visible);
        assert_eq!(layer.shadow, Some(true));
    }

    #[test]
    fn test_garbage_boolean_is_dropped() {
        let layer = Layer::from_value(json!({
            "id": "a", "type": "rectangle", "visible": "maybe"
        }))
        .unwrap();
        // absent visible defaults to shown
        assert!(layer.visible);
    }

    #[test]
    fn test_point_lists_and_star_counts() {
        let path = Layer::from_value(json!({
            "id": "p", "type": "path",
            "points": [{"x": "1", "y": 2}, {"x": "bad", "y": "3"}]
        }))
        .unwrap();
        let points = path.point_list().unwrap();
        assert_eq!(points[0].x, 1.0);
        assert_eq!(points[1].x, 0.0);
        assert_eq!(points[1].y, 3.0);

        let star = Layer::from_value(json!({
            "id": "s", "type": "star", "points": "5"
        }))
        .unwrap();
        assert_eq!(star.points, Some(crate::layer::LayerPoints::Count(5.0)));
    }

    #[test]
    fn test_numeric_id_becomes_string() {
        let layer = Layer::from_value(json!({ "id": 42, "type": "line" })).unwrap();
        assert_eq!(layer.id, "42");
        assert_eq!(layer.kind, LayerType::Line);
    }

    #[test]
    fn test_normalize_layers_drops_invalid_entries() {
        let layers = normalize_layers(vec![
            json!({ "id": "ok", "type": "circle", "radius": "3" }),
            json!({ "id": "bad", "type": "hologram" }),
            json!("not an object"),
        ]);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].radius, Some(3.0));
    }
}
