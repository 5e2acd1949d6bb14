//! The root data binding a template renders against.
//!
//! `Bindings` is a thin wrapper around an object-shaped [`Value`]: `GLOBAL`
//! always looks a name up on this root, so it is convenient to keep it a
//! distinct type from the general `Value` even though it stores one.

use indexmap::IndexMap;

use crate::value::Value;

/// The root binding supplied to a render call. Always object-shaped: a
/// template's top-level names (`{{ user }}`, `{{ items }}`) are its keys.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    root: IndexMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self { root: IndexMap::new() }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.root.insert(name.into(), value);
        self
    }

    /// Looks up `name`, returning `None` when it is absent -- the VM turns
    /// that into `Value::Undefined(name)` at the `GLOBAL` instruction.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }

    /// Builds bindings from a JSON object. Errors if the top-level value
    /// is not an object, since a template's global names only make sense
    /// against a keyed root.
    pub fn from_json(json: serde_json::Value) -> Result<Self, String> {
        match json {
            serde_json::Value::Object(map) => {
                let mut root = IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    root.insert(k, Value::from(v));
                }
                Ok(Self { root })
            }
            other => Err(format!("bindings root must be a JSON object, got {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_is_none() {
        let bindings = Bindings::new();
        assert!(bindings.get("x").is_none());
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut bindings = Bindings::new();
        bindings.insert("name", Value::string("ok"));
        match bindings.get("name") {
            Some(Value::String(s)) => assert_eq!(s.as_ref(), "ok"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn from_json_rejects_non_object_root() {
        let json = serde_json::Value::Array(vec![]);
        assert!(Bindings::from_json(json).is_err());
    }

    #[test]
    fn from_json_builds_nested_values() {
        let json: serde_json::Value = serde_json::from_str(r#"{"a": {"b": 1}}"#).unwrap();
        let bindings = Bindings::from_json(json).unwrap();
        match bindings.get("a") {
            Some(Value::Object(_)) => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
