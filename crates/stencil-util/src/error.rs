//! Error taxonomy shared across every stage of the pipeline.
//!
//! The lexer and parser raise [`TemplateError::Syntax`]; the virtual machine
//! raises [`TemplateError::UndefinedVariable`] (strict policy only) and
//! [`TemplateError::Internal`] for corrupted bytecode. There is no recovery
//! at any layer -- the first error halts the call that produced it.

use thiserror::Error;

use crate::Span;

/// The single error type returned by every public `stencil` operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Raised by the lexer or parser on malformed source.
    #[error("syntax error at {start}..{stop}: {message}")]
    Syntax {
        message: String,
        start: usize,
        stop: usize,
    },

    /// Raised by the VM under a strict undefined-value policy.
    #[error("undefined variable '{name}' at {start}..{stop}")]
    UndefinedVariable {
        name: String,
        start: usize,
        stop: usize,
    },

    /// A programmer error: corrupted bytecode, an out-of-range jump, an
    /// operand-stack underflow. Never raised by well-formed input; a
    /// conforming compiler never produces a program that trips this.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TemplateError {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        TemplateError::Syntax {
            message: message.into(),
            start: span.start,
            stop: span.end,
        }
    }

    pub fn undefined(name: impl Into<String>, span: Span) -> Self {
        TemplateError::UndefinedVariable {
            name: name.into(),
            start: span.start,
            stop: span.end,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        TemplateError::Internal(message.into())
    }
}

/// Result alias used throughout the `stencil` workspace.
pub type Result<T> = std::result::Result<T, TemplateError>;
