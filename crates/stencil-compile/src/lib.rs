//! Bytecode compiler: lowers a [`stencil_par`] AST into a [`Program`].
//!
//! See [`compiler`] for the single-pass lowering walk and [`crate::OpCode`]
//! (re-exported from `stencil-util`) for the instruction set both this
//! crate and `stencil-vm` agree on.

mod compiler;
mod constant;
mod program;

pub use compiler::compile;
pub use constant::Constant;
pub use program::Program;
pub use stencil_util::OpCode;
