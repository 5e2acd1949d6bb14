//! Pluggable behavior for what happens when a path lookup resolves to
//! [`crate::Value::Undefined`].
//!
//! The VM consults a policy at exactly three points: `RENDER` (via
//! `stringify`), `ITER_INIT` (via `iterate`), and truthiness checks (via
//! `truthy`) -- the policy never sees the operand stack itself.

use stencil_util::TemplateError;

use crate::value::{UndefinedInfo, Value};

pub trait UndefinedPolicy {
    /// Called at `RENDER` when the value about to be written is undefined.
    fn stringify(&self, info: &UndefinedInfo) -> Result<String, TemplateError>;

    /// Truthiness of an undefined value in a conditional. Every policy
    /// shipped here returns `false` -- undefined is never raised on by a
    /// condition check, only on an actual render.
    fn truthy(&self, info: &UndefinedInfo) -> bool;

    /// Elements yielded when an undefined value is the subject of
    /// `{% for %}`. Always empty here, which is how `{% for … else %}`
    /// fires on a missing binding.
    fn iterate(&self, info: &UndefinedInfo) -> Vec<Value>;
}

/// Renders undefined values as an empty string. The default policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct Permissive;

impl UndefinedPolicy for Permissive {
    fn stringify(&self, _info: &UndefinedInfo) -> Result<String, TemplateError> {
        Ok(String::new())
    }

    fn truthy(&self, _info: &UndefinedInfo) -> bool {
        false
    }

    fn iterate(&self, _info: &UndefinedInfo) -> Vec<Value> {
        Vec::new()
    }
}

/// Aborts rendering with `TemplateError::UndefinedVariable` the first time
/// an undefined value reaches `RENDER`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Strict;

impl UndefinedPolicy for Strict {
    fn stringify(&self, info: &UndefinedInfo) -> Result<String, TemplateError> {
        Err(TemplateError::undefined(info.name.clone(), info.span))
    }

    fn truthy(&self, _info: &UndefinedInfo) -> bool {
        false
    }

    fn iterate(&self, _info: &UndefinedInfo) -> Vec<Value> {
        Vec::new()
    }
}

/// Renders undefined values as a fixed placeholder string.
#[derive(Clone, Debug)]
pub struct Sentinel(pub String);

impl UndefinedPolicy for Sentinel {
    fn stringify(&self, _info: &UndefinedInfo) -> Result<String, TemplateError> {
        Ok(self.0.clone())
    }

    fn truthy(&self, _info: &UndefinedInfo) -> bool {
        false
    }

    fn iterate(&self, _info: &UndefinedInfo) -> Vec<Value> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_util::Span;

    fn info() -> UndefinedInfo {
        UndefinedInfo { name: "missing".to_string(), span: Span::DUMMY }
    }

    #[test]
    fn permissive_renders_empty() {
        assert_eq!(Permissive.stringify(&info()).unwrap(), "");
        assert!(!Permissive.truthy(&info()));
        assert!(Permissive.iterate(&info()).is_empty());
    }

    #[test]
    fn strict_errors_on_stringify_but_not_on_truthy_or_iterate() {
        assert!(Strict.stringify(&info()).is_err());
        assert!(!Strict.truthy(&info()));
        assert!(Strict.iterate(&info()).is_empty());
    }

    #[test]
    fn sentinel_renders_fixed_text() {
        let policy = Sentinel("<MISSING>".to_string());
        assert_eq!(policy.stringify(&info()).unwrap(), "<MISSING>");
    }
}
