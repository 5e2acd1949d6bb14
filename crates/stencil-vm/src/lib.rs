//! Runtime value model, host policies, and the stack virtual machine that
//! executes a [`stencil_compile::Program`].
//!
//! `stencil-vm` is the last stage of the pipeline: given a compiled
//! program and a [`Bindings`] root, [`run`]/[`run_with`] produce the
//! rendered output string.

mod bindings;
mod serializer;
mod undefined;
mod value;
mod vm;

pub use bindings::Bindings;
pub use serializer::{DefaultSerializer, Serializer};
pub use undefined::{Permissive, Sentinel, Strict, UndefinedPolicy};
pub use value::{UndefinedInfo, Value};
pub use vm::{run, run_with};
