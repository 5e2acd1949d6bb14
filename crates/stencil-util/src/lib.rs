//! Shared foundation types for the `stencil` template engine.
//!
//! This crate is deliberately tiny: a [`Span`] for byte-offset source
//! locations and a [`TemplateError`] taxonomy that every later stage of the
//! pipeline (lexer, parser, compiler, VM) returns through `Result<_,
//! TemplateError>`.

mod error;
mod opcode;
mod span;

pub use error::{Result, TemplateError};
pub use opcode::OpCode;
pub use span::Span;
