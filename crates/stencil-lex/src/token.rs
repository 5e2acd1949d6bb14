use stencil_util::Span;

/// The closed set of token kinds the lexer can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Literal text outside of `{{ }}` / `{% %}`.
    Other,
    OutStart,
    OutEnd,
    TagStart,
    TagEnd,
    /// `-` adjacent to a delimiter.
    WcHyphen,
    /// `~` adjacent to a delimiter.
    WcTilde,
    Word,
    Dot,
    LBracket,
    RBracket,
    SingleQuoteString,
    DoubleQuoteString,
    Int,
    And,
    Or,
    Not,
    In,
    IfTag,
    ElifTag,
    ElseTag,
    EndifTag,
    ForTag,
    EndforTag,
    True,
    False,
    Null,
    Eof,
}

/// A single lexical token.
///
/// `start`/`end` are byte offsets into the original source; token text is
/// not copied (consumers borrow `&source[start..end]`) *except* for string
/// literals, whose `payload` carries the decoded, escape-free text, since
/// escape decoding can change the byte length.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Decoded payload for string literals; `None` for every other kind
    /// (other token text is recovered by slicing the source with `span`).
    pub payload: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span, payload: None }
    }

    pub fn with_payload(kind: TokenKind, span: Span, payload: String) -> Self {
        Self { kind, span, payload: Some(payload) }
    }

    pub fn start(&self) -> usize {
        self.span.start
    }

    pub fn end(&self) -> usize {
        self.span.end
    }
}
