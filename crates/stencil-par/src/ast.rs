//! Abstract syntax tree produced by the parser and consumed by the compiler.

use stencil_util::Span;

/// A template node.
///
/// `Text` owns its (already whitespace-trimmed) content rather than
/// borrowing a span into the source: tilde-trimming can collapse a run of
/// whitespace to a single space, which a plain `&str` slice of the original
/// source cannot represent.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Text(String),
    /// `wc_left`/`wc_right` record whether a `-`/`~` marker trimmed the
    /// adjacent text at parse time; trimming itself has already happened by
    /// the time this node exists, these flags are descriptive only (used by
    /// the `ast` CLI subcommand to echo back what the source asked for).
    Output {
        expr: Expr,
        wc_left: bool,
        wc_right: bool,
    },
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        else_body: Option<Vec<Node>>,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Node>,
        else_body: Option<Vec<Node>>,
    },
}

/// A path segment following the head identifier: `.name` or `[key]`.
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    DotName(String),
    Index(IndexKey),
}

/// The key inside a `[ ... ]` index segment.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexKey {
    String(String),
    Int(i64),
    Path(Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// `head_span` is the byte span of the head identifier token. It is
    /// parsed and kept on the AST for a future diagnostics pass, but
    /// `stencil-compile` does not thread it into the bytecode: `GLOBAL`'s
    /// operand is a constant-pool index only, so a VM-raised
    /// `UndefinedVariable` currently reports `Span::DUMMY` rather than this
    /// span (see DESIGN.md's Open Questions).
    Path {
        head: String,
        head_span: Span,
        segments: Vec<Segment>,
    },
    StringLit(String),
    IntLit(i64),
    BoolLit(bool),
    Null,
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
}
