//! The runtime value model shared by template bindings and rendered
//! expressions.

use std::rc::Rc;

use indexmap::IndexMap;
use stencil_util::Span;

/// A runtime template value.
///
/// Container variants (`String`, `Array`, `Object`) hold `Rc` so that
/// `SELECTOR` can cheaply clone a reference to a nested value off the
/// binding tree without deep-copying it onto the operand stack.
///
/// `Object` uses [`IndexMap`] rather than a `HashMap` because `ITER_INIT`
/// over an object must yield keys in insertion order (§4.4 of the design).
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    Object(Rc<IndexMap<String, Value>>),
    /// A first-class marker for an unresolved lookup. Carries the name and
    /// source span of the path that produced it so a strict
    /// [`crate::UndefinedPolicy`] can raise a precise
    /// `TemplateError::UndefinedVariable`.
    Undefined(Rc<UndefinedInfo>),
}

/// The name and source span behind an [`Value::Undefined`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndefinedInfo {
    pub name: String,
    pub span: Span,
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(items))
    }

    pub fn object(map: IndexMap<String, Value>) -> Value {
        Value::Object(Rc::new(map))
    }

    pub fn undefined(name: impl Into<String>, span: Span) -> Value {
        Value::Undefined(Rc::new(UndefinedInfo { name: name.into(), span }))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined(_))
    }

    /// Truthiness per §4.4: `Null`, `Undefined`, `Bool(false)`, `Int(0)`,
    /// `Float(0.0)`, empty string, empty array, empty object are falsy;
    /// everything else is truthy. Never raises, even under a strict
    /// undefined policy -- conditionals never consult the policy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::Undefined(_) => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }

    /// Looks up `key` on a container value. Non-containers, `Undefined`,
    /// and missing keys all propagate an `Undefined(key)` rather than
    /// erroring -- the strict/permissive distinction is made later, by the
    /// [`crate::UndefinedPolicy`], not here.
    pub fn select(&self, key: &str, span: Span) -> Value {
        match self {
            Value::Object(map) => map.get(key).cloned().unwrap_or_else(|| Value::undefined(key, span)),
            Value::Array(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx).cloned())
                .unwrap_or_else(|| Value::undefined(key, span)),
            _ => Value::undefined(key, span),
        }
    }

    /// Selects by a dynamically computed key value (`a[b.c]`). Non-string,
    /// non-int keys and any other failure mode fall back to `Undefined`.
    pub fn select_dynamic(&self, key: &Value, span: Span) -> Value {
        match key {
            Value::String(s) => self.select(s, span),
            Value::Int(n) => self.select(&n.to_string(), span),
            _ => Value::undefined("<dynamic key>", span),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, Value::from(v));
                }
                Value::object(out)
            }
        }
    }
}
