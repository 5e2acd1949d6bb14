//! Escape decoding for single- and double-quoted string literals.

use std::iter::Peekable;
use std::str::CharIndices;

use stencil_util::{Span, TemplateError};

/// Decodes the escape sequences inside a string literal body (the text
/// between, but not including, the surrounding quotes).
///
/// `body_start` is the byte offset of the first character of `body` in the
/// original source, used to report precise error spans.
pub fn decode_escapes(body: &str, body_start: usize) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let escape_start = body_start + idx;
        let (_, esc) = chars.next().ok_or_else(|| {
            TemplateError::syntax("unterminated escape sequence", Span::point(escape_start))
        })?;

        match esc {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '/' => out.push('/'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'u' => {
                let first = read_hex4(&mut chars, escape_start)?;
                if (0xD800..=0xDBFF).contains(&first) {
                    // High surrogate: must be followed by a \uDCxx low surrogate.
                    let low_escape_start =
                        body_start + chars.peek().map(|(i, _)| *i).unwrap_or(body.len());
                    if chars.next().map(|(_, c)| c) != Some('\\')
                        || chars.next().map(|(_, c)| c) != Some('u')
                    {
                        return Err(TemplateError::syntax(
                            "expected low surrogate after high surrogate escape",
                            Span::point(low_escape_start),
                        ));
                    }
                    let second = read_hex4(&mut chars, low_escape_start)?;
                    if !(0xDC00..=0xDFFF).contains(&second) {
                        return Err(TemplateError::syntax(
                            "invalid low surrogate in \\u escape pair",
                            Span::point(low_escape_start),
                        ));
                    }
                    let code = 0x10000u32 + (first - 0xD800) * 0x400 + (second - 0xDC00);
                    let ch = char::from_u32(code).ok_or_else(|| {
                        TemplateError::syntax(
                            "surrogate pair decodes to an invalid code point",
                            Span::point(escape_start),
                        )
                    })?;
                    out.push(ch);
                } else {
                    let ch = char::from_u32(first).ok_or_else(|| {
                        TemplateError::syntax(
                            "\\u escape decodes to an invalid code point",
                            Span::point(escape_start),
                        )
                    })?;
                    out.push(ch);
                }
            }
            other => {
                return Err(TemplateError::syntax(
                    format!("unknown escape sequence '\\{other}'"),
                    Span::point(escape_start),
                ))
            }
        }
    }

    Ok(out)
}

fn read_hex4(
    chars: &mut Peekable<CharIndices<'_>>,
    escape_start: usize,
) -> Result<u32, TemplateError> {
    let mut value = 0u32;
    for _ in 0..4 {
        let (_, c) = chars.next().ok_or_else(|| {
            TemplateError::syntax("truncated \\u escape sequence", Span::point(escape_start))
        })?;
        let digit = c.to_digit(16).ok_or_else(|| {
            TemplateError::syntax("invalid hex digit in \\u escape", Span::point(escape_start))
        })?;
        value = value * 16 + digit;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_escapes() {
        assert_eq!(decode_escapes(r"a\nb\tc", 0).unwrap(), "a\nb\tc");
        assert_eq!(decode_escapes(r#"\"quoted\""#, 0).unwrap(), "\"quoted\"");
    }

    #[test]
    fn decodes_basic_unicode_escape() {
        assert_eq!(decode_escapes("\\u0041", 0).unwrap(), "A");
    }

    #[test]
    fn decodes_surrogate_pair() {
        // 𝄞 decodes to U+1D11E MUSICAL SYMBOL G CLEF.
        assert_eq!(decode_escapes("\\uD834\\uDD1E", 0).unwrap(), "\u{1D11E}");
    }

    #[test]
    fn rejects_lone_low_surrogate_escape() {
        // A lone low surrogate with no preceding high surrogate is not a
        // valid standalone code point.
        assert!(decode_escapes(r"\uDD1E", 0).is_err());
    }

    #[test]
    fn rejects_unknown_escape() {
        assert!(decode_escapes(r"\q", 0).is_err());
    }
}
