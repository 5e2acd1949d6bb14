//! `stencil`: a small Liquid/Jinja-style text-template engine.
//!
//! This crate is the facade over the pipeline that lives in the workspace's
//! other members -- lexer ([`stencil_lex`]), parser ([`stencil_par`]),
//! bytecode compiler ([`stencil_compile`]), and stack VM ([`stencil_vm`]) --
//! plus the `stencil` CLI binary. Most callers only need [`render`] or a
//! [`Template`]/[`CompiledTemplate`] handle; the staged `tokenize`/`parse`/
//! `compile` functions exist for tooling (the `tokens`/`ast`/`disasm`
//! debug subcommands) and tests.

use std::sync::Arc;

pub use stencil_compile::Program;
pub use stencil_lex::{Token, TokenKind};
pub use stencil_par::{BinaryOp, Expr, IndexKey, Node, Segment, UnaryOp};
pub use stencil_util::{Span, TemplateError};
pub use stencil_vm::{
    Bindings, DefaultSerializer, Permissive, Sentinel, Serializer, Strict, UndefinedInfo,
    UndefinedPolicy, Value,
};

/// Lexes `source` into its token stream. Exposed for the `tokens` debug
/// subcommand and for tests that assert on lexical boundaries directly.
pub fn tokenize(source: &str) -> Result<Vec<Token>, TemplateError> {
    stencil_lex::tokenize(source)
}

/// Parses `source` into a [`Template`] (an owned AST).
pub fn parse(source: &str) -> Result<Template, TemplateError> {
    let nodes = stencil_par::parse(source)?;
    Ok(Template { source: source.to_string(), nodes })
}

/// Compiles `source` straight through to a [`CompiledTemplate`].
pub fn compile(source: &str) -> Result<CompiledTemplate, TemplateError> {
    let program = stencil_compile::compile(source)?;
    Ok(CompiledTemplate { program: Arc::new(program) })
}

/// Compiles and renders `source` against `data` in one call, using the
/// default serializer and the permissive undefined-value policy. Prefer
/// [`compile`] plus [`CompiledTemplate::render`] when the same template is
/// rendered more than once -- this recompiles from scratch every call.
pub fn render(source: &str, data: &Bindings) -> Result<String, TemplateError> {
    compile(source)?.render(data)
}

/// Compiles and renders `source` with an explicit serializer and
/// undefined-value policy.
pub fn render_with(
    source: &str,
    data: &Bindings,
    serializer: &dyn Serializer,
    policy: &dyn UndefinedPolicy,
) -> Result<String, TemplateError> {
    compile(source)?.render_with(data, serializer, policy)
}

/// A parsed template: an owned AST, not yet lowered to bytecode.
///
/// Kept distinct from [`CompiledTemplate`] so the `ast` debug subcommand
/// can stop at this stage without paying for compilation.
#[derive(Clone, Debug)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Compiles and renders this template. Recompiles on every call --
    /// callers that render the same template repeatedly should go through
    /// [`compile`] instead and reuse the resulting [`CompiledTemplate`].
    pub fn render(&self, data: &Bindings) -> Result<String, TemplateError> {
        compile(&self.source)?.render(data)
    }
}

/// A compiled template: an immutable [`Program`] ready to render.
///
/// Cheap to clone (the `Program` is `Arc`-shared) and safe to render
/// concurrently from multiple threads -- each [`CompiledTemplate::render`]
/// call constructs its own VM state.
#[derive(Clone, Debug)]
pub struct CompiledTemplate {
    program: Arc<Program>,
}

impl CompiledTemplate {
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Renders against `data` using the default serializer and the
    /// permissive undefined-value policy.
    pub fn render(&self, data: &Bindings) -> Result<String, TemplateError> {
        stencil_vm::run(&self.program, data)
    }

    /// Renders against `data` with an explicit serializer and
    /// undefined-value policy.
    pub fn render_with(
        &self,
        data: &Bindings,
        serializer: &dyn Serializer,
        policy: &dyn UndefinedPolicy,
    ) -> Result<String, TemplateError> {
        stencil_vm::run_with(&self.program, data, serializer, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_plain_text() {
        let mut data = Bindings::new();
        data.insert("name", Value::string("world"));
        assert_eq!(render("hello {{ name }}", &data).unwrap(), "hello world");
    }

    #[test]
    fn tokenize_reports_eof() {
        let tokens = tokenize("hi").unwrap();
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn parse_then_render_matches_one_shot_render() {
        let data = Bindings::new();
        let template = parse("static text").unwrap();
        assert_eq!(template.render(&data).unwrap(), "static text");
    }

    #[test]
    fn compiled_template_is_reusable_across_renders() {
        let compiled = compile("{{ a }}").unwrap();
        let mut data_one = Bindings::new();
        data_one.insert("a", Value::Int(1));
        let mut data_two = Bindings::new();
        data_two.insert("a", Value::Int(2));
        assert_eq!(compiled.render(&data_one).unwrap(), "1");
        assert_eq!(compiled.render(&data_two).unwrap(), "2");
    }

    #[test]
    fn strict_policy_surfaces_undefined_variable() {
        let data = Bindings::new();
        let err = render_with("{{ missing }}", &data, &DefaultSerializer, &Strict).unwrap_err();
        assert!(matches!(err, TemplateError::UndefinedVariable { .. }));
    }
}
