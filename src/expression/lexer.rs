//! lexer.rs
//! Splits an expression string into spanned tokens.

use super::ExpressionError;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte range in the source string.
    pub span: Range<usize>,
}

#[inline]
pub(crate) fn is_ident_start(c: char) -> bool { c.is_ascii_alphabetic() || c == '_' }

#[inline]
pub(crate) fn is_ident_char(c: char) -> bool { c.is_ascii_alphanumeric() || c == '_' }

pub fn tokenize(src: &str) -> Result<Vec<Token>, ExpressionError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let kind = match c {
            '+' => { pos += 1; TokenKind::Plus }
            '-' => { pos += 1; TokenKind::Minus }
            '*' => { pos += 1; TokenKind::Star }
            '/' => { pos += 1; TokenKind::Slash }
            '^' => { pos += 1; TokenKind::Caret }
            '(' => { pos += 1; TokenKind::LParen }
            ')' => { pos += 1; TokenKind::RParen }
            ',' => { pos += 1; TokenKind::Comma }
            c if c.is_ascii_digit() || c == '.' => {
                pos = scan_number(bytes, pos);
                let text = &src[start..pos];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::InvalidNumber { pos: start, text: text.to_string() })?;
                TokenKind::Number(value)
            }
            c if is_ident_start(c) => {
                while pos < bytes.len() && is_ident_char(bytes[pos] as char) {
                    pos += 1;
                }
                TokenKind::Ident(src[start..pos].to_string())
            }
            _ => {
                // Report the full (possibly multi-byte) character.
                let ch = src[start..].chars().next().unwrap_or(c);
                return Err(ExpressionError::UnexpectedChar { pos: start, ch });
            }
        };
        tokens.push(Token { kind, span: start..pos });
    }

    Ok(tokens)
}

/// Digits, an optional fraction and an optional exponent.
fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    let digits = |mut p: usize| {
        while p < bytes.len() && bytes[p].is_ascii_digit() {
            p += 1;
        }
        p
    };

    pos = digits(pos);
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos = digits(pos + 1);
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut p = pos + 1;
        if p < bytes.len() && (bytes[p] == b'+' || bytes[p] == b'-') {
            p += 1;
        }
        if p < bytes.len() && bytes[p].is_ascii_digit() {
            pos = digits(p);
        }
    }
    pos
}
