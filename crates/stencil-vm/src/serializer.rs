//! Converts a runtime [`Value`] to the text `RENDER` appends to output.

use stencil_util::TemplateError;

use crate::value::Value;

/// Turns a defined value into its rendered string form. `RENDER` never
/// calls this for `Undefined` -- that case is intercepted by the
/// [`crate::UndefinedPolicy`] first.
pub trait Serializer {
    fn serialize(&self, value: &Value) -> Result<String, TemplateError>;
}

/// The serializer used when none is configured explicitly.
///
/// Scalars render as their natural text form; containers (`Array`,
/// `Object`) render as compact JSON via `serde_json`, since the value
/// model already mirrors JSON's shape one-for-one.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSerializer;

impl Serializer for DefaultSerializer {
    fn serialize(&self, value: &Value) -> Result<String, TemplateError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Float(f) => Ok(format_float(*f)),
            Value::String(s) => Ok(s.to_string()),
            Value::Array(_) | Value::Object(_) => serde_json::to_string(&to_json(value))
                .map_err(|e| TemplateError::internal(format!("serialization failed: {e}"))),
            Value::Undefined(_) => Ok(String::new()),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null | Value::Undefined(_) => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Object(map) => {
            let mut obj = serde_json::Map::with_capacity(map.len());
            for (k, v) in map.iter() {
                obj.insert(k.clone(), to_json(v));
            }
            serde_json::Value::Object(obj)
        }
    }
}
