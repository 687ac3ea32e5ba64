//! Normalizes heterogeneous response bodies into [`PredictionResult`]s.

use crate::endpoint::descriptor::ResponseShape;
use crate::error::EndpointError;
use crate::models::{PredictionResult, PredictionValue};
use serde_json::Value;

/// Walks a dotted path (`result.items.0.value`). Numeric segments index
/// arrays. An empty path returns the root.
pub fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(body);
    }

    path.split('.').try_fold(body, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn field_name(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

/// Extracts the prediction declared by `shape` from a decoded body.
pub fn extract(shape: &ResponseShape, body: &Value) -> Result<PredictionResult, EndpointError> {
    let path = shape.field();
    let node = match lookup(body, path) {
        Some(Value::Null) | None => return Err(EndpointError::MissingField(field_name(path))),
        Some(node) => node,
    };

    match shape {
        ResponseShape::Prediction { .. } => {
            let value = match node {
                Value::Number(n) => n.as_f64().map(PredictionValue::Number),
                Value::String(s) => Some(PredictionValue::Text(s.clone())),
                _ => None,
            };
            value
                .map(|value| PredictionResult::Prediction { value })
                .ok_or_else(|| EndpointError::UnexpectedType {
                    field: field_name(path),
                    expected: "number or string",
                })
        }
        ResponseShape::Graph { .. } => {
            let Value::String(serialized) = node else {
                return Err(EndpointError::UnexpectedType {
                    field: field_name(path),
                    expected: "serialized chart string",
                });
            };
            let chart: Value =
                serde_json::from_str(serialized).map_err(|e| EndpointError::InvalidChart {
                    field: field_name(path),
                    reason: e.to_string(),
                })?;
            Ok(PredictionResult::Graph { value: chart })
        }
    }
}
