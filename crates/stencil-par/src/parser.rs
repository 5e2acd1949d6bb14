//! Recursive-descent parser with Pratt-style precedence climbing for the
//! logical operators `or`/`and`/`not`.

use stencil_lex::{Token, TokenKind};
use stencil_util::{Span, TemplateError};

use crate::ast::{BinaryOp, Expr, IndexKey, Node, Segment, UnaryOp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Trim {
    Hyphen,
    Tilde,
}

/// Parses a complete template source string into its node list.
pub fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let tokens = stencil_lex::tokenize(source)?;
    let mut parser = Parser::new(tokens, source);
    let mut nodes = Vec::new();
    let terminator = parser.parse_nodes(&mut nodes, &[], None)?;
    debug_assert_eq!(terminator, TokenKind::Eof);
    Ok(nodes)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
    /// Trim to apply to the leading edge of the next `Text` node created,
    /// set by a trailing `-`/`~` consumed in [`Parser::close_delim`].
    pending_trim: Option<Trim>,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, source: &'a str) -> Self {
        Self { tokens, pos: 0, source, pending_trim: None }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Result<Token, TemplateError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(TemplateError::syntax(
                format!("expected {kind:?}, found {:?}", self.peek_kind()),
                self.peek().span,
            ))
        }
    }

    fn slice(&self, span: Span) -> &'a str {
        &self.source[span.start..span.end]
    }

    /// Consumes `kind` (`OutStart`/`TagStart`) and an optional immediately
    /// following `-`/`~`, trimming the trailing edge of `nodes`' last `Text`
    /// entry if one follows. Returns whether a marker was present.
    fn open_delim(&mut self, nodes: &mut Vec<Node>, kind: TokenKind) -> Result<bool, TemplateError> {
        self.expect_kind(kind)?;
        match self.peek_kind() {
            TokenKind::WcHyphen => {
                self.advance();
                trim_trailing_of(nodes, Trim::Hyphen);
                Ok(true)
            }
            TokenKind::WcTilde => {
                self.advance();
                trim_trailing_of(nodes, Trim::Tilde);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Consumes an optional `-`/`~` immediately before `kind`
    /// (`OutEnd`/`TagEnd`), then `kind` itself. A marker here schedules a
    /// trim of the leading edge of whatever `Text` node comes next.
    fn close_delim(&mut self, kind: TokenKind) -> Result<bool, TemplateError> {
        let wc = match self.peek_kind() {
            TokenKind::WcHyphen => {
                self.advance();
                self.pending_trim = Some(Trim::Hyphen);
                true
            }
            TokenKind::WcTilde => {
                self.advance();
                self.pending_trim = Some(Trim::Tilde);
                true
            }
            _ => false,
        };
        self.expect_kind(kind)?;
        Ok(wc)
    }

    fn push_text(&mut self, nodes: &mut Vec<Node>) {
        let tok = self.advance();
        let mut content = self.slice(tok.span).to_string();
        if let Some(trim) = self.pending_trim.take() {
            apply_trim_left(&mut content, trim);
        }
        nodes.push(Node::Text(content));
    }

    /// Parses nodes into `nodes` until EOF or one of `terminators` is seen
    /// as a tag keyword; returns the terminator hit (`Eof` for the
    /// top-level call, which passes an empty `terminators`). `open_span` is
    /// the opening tag's span, used to report an unterminated block.
    fn parse_nodes(
        &mut self,
        nodes: &mut Vec<Node>,
        terminators: &[TokenKind],
        open_span: Option<Span>,
    ) -> Result<TokenKind, TemplateError> {
        loop {
            match self.peek_kind() {
                TokenKind::Eof => {
                    if terminators.is_empty() {
                        return Ok(TokenKind::Eof);
                    }
                    return Err(TemplateError::syntax(
                        "unterminated block: missing closing tag",
                        open_span.unwrap_or_else(|| self.peek().span),
                    ));
                }
                TokenKind::Other => self.push_text(nodes),
                TokenKind::OutStart => self.parse_output(nodes)?,
                TokenKind::TagStart => {
                    self.open_delim(nodes, TokenKind::TagStart)?;
                    let kind = self.peek_kind();
                    if terminators.contains(&kind) {
                        self.advance();
                        return Ok(kind);
                    }
                    match kind {
                        TokenKind::IfTag => {
                            let node = self.parse_if()?;
                            nodes.push(node);
                        }
                        TokenKind::ForTag => {
                            let node = self.parse_for()?;
                            nodes.push(node);
                        }
                        TokenKind::ElifTag
                        | TokenKind::ElseTag
                        | TokenKind::EndifTag
                        | TokenKind::EndforTag => {
                            return Err(TemplateError::syntax(
                                format!("'{}' with no matching opening tag", tag_name(kind)),
                                self.peek().span,
                            ));
                        }
                        TokenKind::Word => {
                            let tok = self.peek().clone();
                            return Err(TemplateError::syntax(
                                format!("unknown tag '{}'", self.slice(tok.span)),
                                tok.span,
                            ));
                        }
                        _ => {
                            return Err(TemplateError::syntax(
                                "expected a tag keyword after '{%'",
                                self.peek().span,
                            ))
                        }
                    }
                }
                _ => {
                    return Err(TemplateError::internal(
                        "parser reached an unexpected token kind at template level",
                    ))
                }
            }
        }
    }

    fn parse_output(&mut self, nodes: &mut Vec<Node>) -> Result<(), TemplateError> {
        let wc_left = self.open_delim(nodes, TokenKind::OutStart)?;
        let expr = self.parse_expr()?;
        let wc_right = self.close_delim(TokenKind::OutEnd)?;
        nodes.push(Node::Output { expr, wc_left, wc_right });
        Ok(())
    }

    fn parse_if(&mut self) -> Result<Node, TemplateError> {
        let if_span = self.expect_kind(TokenKind::IfTag)?.span;
        let mut cond = self.parse_expr()?;
        let mut branches = Vec::new();
        loop {
            self.close_delim(TokenKind::TagEnd)?;
            let mut body = Vec::new();
            let terminator = self.parse_nodes(
                &mut body,
                &[TokenKind::ElifTag, TokenKind::ElseTag, TokenKind::EndifTag],
                Some(if_span),
            )?;
            branches.push((cond, body));
            match terminator {
                TokenKind::ElifTag => {
                    cond = self.parse_expr()?;
                }
                TokenKind::ElseTag => {
                    self.close_delim(TokenKind::TagEnd)?;
                    let mut else_body = Vec::new();
                    let t2 = self.parse_nodes(&mut else_body, &[TokenKind::EndifTag], Some(if_span))?;
                    debug_assert_eq!(t2, TokenKind::EndifTag);
                    self.close_delim(TokenKind::TagEnd)?;
                    return Ok(Node::If { branches, else_body: Some(else_body) });
                }
                TokenKind::EndifTag => {
                    self.close_delim(TokenKind::TagEnd)?;
                    return Ok(Node::If { branches, else_body: None });
                }
                _ => unreachable!("parse_nodes only returns a requested terminator"),
            }
        }
    }

    fn parse_for(&mut self) -> Result<Node, TemplateError> {
        let for_span = self.expect_kind(TokenKind::ForTag)?.span;
        let var_tok = self.expect_kind(TokenKind::Word)?;
        let var = self.slice(var_tok.span).to_string();
        self.expect_kind(TokenKind::In)?;
        let iter = self.parse_expr()?;
        self.close_delim(TokenKind::TagEnd)?;

        let mut body = Vec::new();
        let terminator = self.parse_nodes(
            &mut body,
            &[TokenKind::ElseTag, TokenKind::EndforTag],
            Some(for_span),
        )?;
        match terminator {
            TokenKind::EndforTag => {
                self.close_delim(TokenKind::TagEnd)?;
                Ok(Node::For { var, iter, body, else_body: None })
            }
            TokenKind::ElseTag => {
                self.close_delim(TokenKind::TagEnd)?;
                let mut else_body = Vec::new();
                let t2 = self.parse_nodes(&mut else_body, &[TokenKind::EndforTag], Some(for_span))?;
                debug_assert_eq!(t2, TokenKind::EndforTag);
                self.close_delim(TokenKind::TagEnd)?;
                Ok(Node::For { var, iter, body, else_body: Some(else_body) })
            }
            _ => unreachable!("parse_nodes only returns a requested terminator"),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, TemplateError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.parse_and()?;
        while self.peek_kind() == TokenKind::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary { op: BinaryOp::Or, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.parse_not()?;
        while self.peek_kind() == TokenKind::And {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::Binary { op: BinaryOp::And, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, TemplateError> {
        if self.peek_kind() == TokenKind::Not {
            self.advance();
            let inner = self.parse_not()?;
            Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(inner) })
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, TemplateError> {
        match self.peek_kind() {
            TokenKind::Int => {
                let tok = self.advance();
                let text = self.slice(tok.span);
                let n: i64 = text
                    .parse()
                    .map_err(|_| TemplateError::syntax("malformed integer literal", tok.span))?;
                Ok(Expr::IntLit(n))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::BoolLit(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::BoolLit(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::SingleQuoteString | TokenKind::DoubleQuoteString => {
                let tok = self.advance();
                Ok(Expr::StringLit(tok.payload.expect("string token always carries a payload")))
            }
            TokenKind::Word => self.parse_path(),
            _ => Err(TemplateError::syntax(
                format!("expected an expression, found {:?}", self.peek_kind()),
                self.peek().span,
            )),
        }
    }

    fn parse_path(&mut self) -> Result<Expr, TemplateError> {
        let head_tok = self.expect_kind(TokenKind::Word)?;
        let head = self.slice(head_tok.span).to_string();
        let head_span = head_tok.span;
        let mut segments = Vec::new();

        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name_tok = self.expect_kind(TokenKind::Word)?;
                    segments.push(Segment::DotName(self.slice(name_tok.span).to_string()));
                }
                TokenKind::LBracket => {
                    self.advance();
                    let key = match self.peek_kind() {
                        TokenKind::SingleQuoteString | TokenKind::DoubleQuoteString => {
                            let tok = self.advance();
                            IndexKey::String(tok.payload.expect("string token always carries a payload"))
                        }
                        TokenKind::Int => {
                            let tok = self.advance();
                            let text = self.slice(tok.span);
                            let n: i64 = text.parse().map_err(|_| {
                                TemplateError::syntax("malformed integer literal", tok.span)
                            })?;
                            IndexKey::Int(n)
                        }
                        TokenKind::Word => IndexKey::Path(Box::new(self.parse_path()?)),
                        _ => {
                            return Err(TemplateError::syntax(
                                "expected a string, integer, or path inside '[...]'",
                                self.peek().span,
                            ))
                        }
                    };
                    self.expect_kind(TokenKind::RBracket)?;
                    segments.push(Segment::Index(key));
                }
                _ => break,
            }
        }

        Ok(Expr::Path { head, head_span, segments })
    }
}

fn tag_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::ElifTag => "elif",
        TokenKind::ElseTag => "else",
        TokenKind::EndifTag => "endif",
        TokenKind::EndforTag => "endfor",
        _ => "tag",
    }
}

fn trim_trailing_of(nodes: &mut [Node], trim: Trim) {
    if let Some(Node::Text(s)) = nodes.last_mut() {
        apply_trim_right(s, trim);
    }
}

fn leading_ws_run_end(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i] as char).is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn trailing_ws_run_start(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut i = bytes.len();
    while i > 0 && (bytes[i - 1] as char).is_ascii_whitespace() {
        i -= 1;
    }
    i
}

fn apply_trim_left(text: &mut String, trim: Trim) {
    let end = leading_ws_run_end(text);
    if end == 0 {
        return;
    }
    let run = &text[..end];
    match trim {
        Trim::Hyphen => {
            *text = text[end..].to_string();
        }
        Trim::Tilde => {
            *text = if run.contains('\n') {
                text[end..].to_string()
            } else {
                format!(" {}", &text[end..])
            };
        }
    }
}

fn apply_trim_right(text: &mut String, trim: Trim) {
    let start = trailing_ws_run_start(text);
    if start == text.len() {
        return;
    }
    let run = &text[start..];
    match trim {
        Trim::Hyphen => {
            text.truncate(start);
        }
        Trim::Tilde => {
            *text = if run.contains('\n') {
                text[..start].to_string()
            } else {
                format!("{} ", &text[..start])
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_of(expr: &Expr) -> (&str, &[Segment]) {
        match expr {
            Expr::Path { head, segments, .. } => (head.as_str(), segments.as_slice()),
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_round_trips() {
        let nodes = parse("hello world").unwrap();
        assert_eq!(nodes, vec![Node::Text("hello world".to_string())]);
    }

    #[test]
    fn simple_output_path() {
        let nodes = parse("{{ a.b }}").unwrap();
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            Node::Output { expr, wc_left, wc_right } => {
                assert!(!wc_left && !wc_right);
                let (head, segs) = path_of(expr);
                assert_eq!(head, "a");
                assert_eq!(segs, &[Segment::DotName("b".to_string())]);
            }
            other => panic!("expected Output, got {other:?}"),
        }
    }

    #[test]
    fn bracket_string_index() {
        let nodes = parse("{{ a['x'] }}").unwrap();
        match &nodes[0] {
            Node::Output { expr, .. } => {
                let (_, segs) = path_of(expr);
                assert_eq!(segs, &[Segment::Index(IndexKey::String("x".to_string()))]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_path_index() {
        let nodes = parse("{{ a[b.c] }}").unwrap();
        match &nodes[0] {
            Node::Output { expr, .. } => {
                let (_, segs) = path_of(expr);
                match &segs[0] {
                    Segment::Index(IndexKey::Path(inner)) => {
                        let (head, _) = path_of(inner);
                        assert_eq!(head, "b");
                    }
                    other => panic!("expected Index(Path(..)), got {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn and_or_not_precedence() {
        // `a or b and not c` parses as `a or (b and (not c))`
        let nodes = parse("{{ a or b and not c }}").unwrap();
        match &nodes[0] {
            Node::Output { expr: Expr::Binary { op: BinaryOp::Or, left, right }, .. } => {
                assert!(matches!(**left, Expr::Path { .. }));
                match &**right {
                    Expr::Binary { op: BinaryOp::And, right: inner_right, .. } => {
                        assert!(matches!(**inner_right, Expr::Unary { op: UnaryOp::Not, .. }));
                    }
                    other => panic!("expected And on the right of Or, got {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn not_binds_tighter_than_and() {
        let nodes = parse("{{ not a and b }}").unwrap();
        match &nodes[0] {
            Node::Output { expr: Expr::Binary { op: BinaryOp::And, left, .. }, .. } => {
                assert!(matches!(**left, Expr::Unary { op: UnaryOp::Not, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn if_elif_else_endif() {
        let nodes = parse("{% if a %}A{% elif b %}B{% else %}C{% endif %}").unwrap();
        match &nodes[0] {
            Node::If { branches, else_body } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[0].1, vec![Node::Text("A".to_string())]);
                assert_eq!(branches[1].1, vec![Node::Text("B".to_string())]);
                assert_eq!(else_body, &Some(vec![Node::Text("C".to_string())]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn for_loop_with_else() {
        let nodes = parse("{% for x in xs %}{{ x }}{% else %}empty{% endfor %}").unwrap();
        match &nodes[0] {
            Node::For { var, else_body, .. } => {
                assert_eq!(var, "x");
                assert_eq!(else_body, &Some(vec![Node::Text("empty".to_string())]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn hyphen_trims_all_adjacent_whitespace() {
        let nodes = parse("a   {{- b -}}   c").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Text("a".to_string()),
                Node::Output {
                    expr: Expr::Path {
                        head: "b".to_string(),
                        head_span: Span::new(8, 9),
                        segments: vec![],
                    },
                    wc_left: true,
                    wc_right: true,
                },
                Node::Text("c".to_string()),
            ]
        );
    }

    #[test]
    fn tilde_collapses_space_run_but_strips_newline_run() {
        let nodes = parse("a   {{~ b ~}}\n\nc").unwrap();
        assert_eq!(nodes[0], Node::Text("a ".to_string()));
        assert_eq!(nodes[2], Node::Text("c".to_string()));
    }

    #[test]
    fn unterminated_if_is_syntax_error() {
        assert!(parse("{% if a %}no endif").is_err());
    }

    #[test]
    fn elif_without_if_is_syntax_error() {
        assert!(parse("{% elif a %}{% endif %}").is_err());
    }

    #[test]
    fn unknown_tag_is_syntax_error() {
        assert!(parse("{% bogus %}").is_err());
    }

    #[test]
    fn nested_if_inside_for() {
        let nodes = parse("{% for x in xs %}{% if x %}Y{% endif %}{% endfor %}").unwrap();
        match &nodes[0] {
            Node::For { body, .. } => {
                assert_eq!(body.len(), 1);
                assert!(matches!(body[0], Node::If { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
