use stencil_util::{Span, TemplateError};

use crate::cursor::Cursor;
use crate::string::decode_escapes;
use crate::token::{Token, TokenKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Text,
    Expr,
}

/// Tokenizes a single template source string.
///
/// The lexer is a single state machine (mirroring the "one `next_token`
/// method, mode field instead of separate types" shape of a hand-rolled
/// recursive-descent lexer): [`Mode::Text`] absorbs literal text up to the
/// next delimiter, [`Mode::Expr`] tokenizes the content inside `{{ }}` /
/// `{% %}`.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    mode: Mode,
    /// Set when entering `Expr` mode, cleared after the first token of that
    /// mode is produced. Lets us recognise a *leading* whitespace-control
    /// marker (`{{-`, `{%-`) before any whitespace skipping happens.
    just_entered_expr: bool,
    /// `"}}"` or `"%}"`, set when entering `Expr` mode.
    closing: &'static str,
    /// True only for the first `Word`-shaped token right after `{%`, so we
    /// can recognise `if`/`elif`/`else`/`endif`/`for`/`endfor` as tag
    /// keywords rather than ordinary identifiers.
    expect_tag_keyword: bool,
    /// Byte offset of the opening `{{`/`{%`, used to report unterminated
    /// delimiters with a useful span.
    delim_start: usize,
    emitted_eof: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
            mode: Mode::Text,
            just_entered_expr: false,
            closing: "",
            expect_tag_keyword: false,
            delim_start: 0,
            emitted_eof: false,
        }
    }

    /// Produces the next token. Returns `Ok(Token { kind: Eof, .. })` exactly
    /// once, at the end of the stream; callers should stop after receiving
    /// it (see [`tokenize`]).
    pub fn next_token(&mut self) -> Result<Token, TemplateError> {
        let token = match self.mode {
            Mode::Text => self.lex_text(),
            Mode::Expr => self.lex_expr(),
        }?;
        tracing::trace!(kind = ?token.kind, start = token.start(), end = token.end(), "token");
        Ok(token)
    }

    fn lex_text(&mut self) -> Result<Token, TemplateError> {
        let start = self.cursor.position();

        while !self.cursor.is_eof()
            && !self.cursor.starts_with("{{")
            && !self.cursor.starts_with("{%")
        {
            self.cursor.advance();
        }

        if self.cursor.position() > start {
            return Ok(Token::new(TokenKind::Other, Span::new(start, self.cursor.position())));
        }

        if self.cursor.is_eof() {
            if self.emitted_eof {
                return Err(TemplateError::internal("next_token called after Eof"));
            }
            self.emitted_eof = true;
            return Ok(Token::new(TokenKind::Eof, Span::point(start)));
        }

        if self.cursor.eat_str("{{") {
            self.delim_start = start;
            self.mode = Mode::Expr;
            self.closing = "}}";
            self.just_entered_expr = true;
            self.expect_tag_keyword = false;
            return Ok(Token::new(TokenKind::OutStart, Span::new(start, self.cursor.position())));
        }

        debug_assert!(self.cursor.starts_with("{%"));
        self.cursor.eat_str("{%");
        self.delim_start = start;
        self.mode = Mode::Expr;
        self.closing = "%}";
        self.just_entered_expr = true;
        self.expect_tag_keyword = true;
        Ok(Token::new(TokenKind::TagStart, Span::new(start, self.cursor.position())))
    }

    fn lex_expr(&mut self) -> Result<Token, TemplateError> {
        if self.just_entered_expr {
            self.just_entered_expr = false;
            if let Some(tok) = self.try_wc_marker() {
                return Ok(tok);
            }
        }

        self.cursor.eat_while(|c| c.is_ascii_whitespace());

        if self.cursor.is_eof() {
            return Err(TemplateError::syntax(
                "unterminated '{{' or '{%' -- missing closing delimiter",
                Span::point(self.delim_start),
            ));
        }

        if self.cursor.starts_with(self.closing) {
            let start = self.cursor.position();
            self.cursor.eat_str(self.closing);
            self.mode = Mode::Text;
            let kind = if self.closing == "}}" { TokenKind::OutEnd } else { TokenKind::TagEnd };
            self.closing = "";
            return Ok(Token::new(kind, Span::new(start, self.cursor.position())));
        }

        if let Some(tok) = self.try_wc_marker() {
            return Ok(tok);
        }

        let start = self.cursor.position();
        let c = self.cursor.current();

        match c {
            '.' => {
                self.cursor.advance();
                Ok(Token::new(TokenKind::Dot, Span::new(start, self.cursor.position())))
            }
            '[' => {
                self.cursor.advance();
                Ok(Token::new(TokenKind::LBracket, Span::new(start, self.cursor.position())))
            }
            ']' => {
                self.cursor.advance();
                Ok(Token::new(TokenKind::RBracket, Span::new(start, self.cursor.position())))
            }
            '\'' | '"' => self.lex_string(c),
            c if c.is_ascii_digit() => self.lex_number(),
            c if is_ident_start(c) => self.lex_word(),
            other => Err(TemplateError::syntax(
                format!("unexpected character '{other}' in expression"),
                Span::point(start),
            )),
        }
    }

    /// If the cursor sits on a `-`/`~` that is immediately adjacent to the
    /// expected closing delimiter (a *trailing* marker) or we've just
    /// entered expression mode (a *leading* marker), consume and emit it.
    fn try_wc_marker(&mut self) -> Option<Token> {
        let c = self.cursor.current();
        if c != '-' && c != '~' {
            return None;
        }
        // Leading marker: always adjacent to the delimiter we just consumed.
        // Trailing marker: only a marker if the closer follows immediately.
        let is_leading_position = self.delim_start + 2 == self.cursor.position();
        let next_is_closer = self.cursor.slice(
            self.cursor.position() + c.len_utf8(),
            (self.cursor.position() + c.len_utf8() + self.closing.len()).min(self.cursor.len()),
        ) == self.closing;

        if !is_leading_position && !next_is_closer {
            return None;
        }

        let start = self.cursor.position();
        self.cursor.advance();
        let kind = if c == '-' { TokenKind::WcHyphen } else { TokenKind::WcTilde };
        Some(Token::new(kind, Span::new(start, self.cursor.position())))
    }

    fn lex_word(&mut self) -> Result<Token, TemplateError> {
        let start = self.cursor.position();
        self.cursor.eat_while(is_ident_continue);
        let span = Span::new(start, self.cursor.position());
        let text = self.cursor.slice(start, self.cursor.position());

        let was_expecting_tag_keyword = self.expect_tag_keyword;
        self.expect_tag_keyword = false;

        if was_expecting_tag_keyword {
            let tag_kind = match text {
                "if" => Some(TokenKind::IfTag),
                "elif" => Some(TokenKind::ElifTag),
                "else" => Some(TokenKind::ElseTag),
                "endif" => Some(TokenKind::EndifTag),
                "for" => Some(TokenKind::ForTag),
                "endfor" => Some(TokenKind::EndforTag),
                _ => None,
            };
            if let Some(kind) = tag_kind {
                return Ok(Token::new(kind, span));
            }
        }

        let kind = match text {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Word,
        };
        Ok(Token::new(kind, span))
    }

    fn lex_number(&mut self) -> Result<Token, TemplateError> {
        let start = self.cursor.position();
        self.cursor.eat_while(|c| c.is_ascii_digit());
        Ok(Token::new(TokenKind::Int, Span::new(start, self.cursor.position())))
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, TemplateError> {
        let start = self.cursor.position();
        self.cursor.advance(); // opening quote
        let body_start = self.cursor.position();

        loop {
            if self.cursor.is_eof() {
                return Err(TemplateError::syntax(
                    "unterminated string literal",
                    Span::new(start, self.cursor.position()),
                ));
            }
            let c = self.cursor.current();
            if c == quote {
                break;
            }
            if c == '\\' {
                self.cursor.advance();
                if self.cursor.is_eof() {
                    return Err(TemplateError::syntax(
                        "unterminated string literal",
                        Span::new(start, self.cursor.position()),
                    ));
                }
            }
            self.cursor.advance();
        }

        let body_end = self.cursor.position();
        let raw = self.cursor.slice(body_start, body_end);
        self.cursor.advance(); // closing quote

        let decoded = decode_escapes(raw, body_start)?;
        let kind = if quote == '\'' { TokenKind::SingleQuoteString } else { TokenKind::DoubleQuoteString };
        Ok(Token::with_payload(kind, Span::new(start, self.cursor.position()), decoded))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenizes `source` in full, returning every token up to and including a
/// single trailing `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
