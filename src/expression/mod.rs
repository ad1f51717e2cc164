//! Scalar arithmetic expressions over named Variables.
//!
//! Supports `+ - * / ^`, parentheses, unary sign, numeric literals,
//! identifiers and single-argument functions (`sin`, `cos`, `sqrt`, ...).

pub mod eval;
pub mod lexer;
pub mod parser;

pub use self::error::ExpressionError;
pub use parser::{BinOp, Expr, Function};

use lexer::{is_ident_char, is_ident_start};
use smallvec::SmallVec;
use std::str::FromStr;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum ExpressionError {
        #[error("Unexpected character '{ch}' at {pos}")]
        UnexpectedChar { pos: usize, ch: char },
        #[error("Invalid number '{text}' at {pos}")]
        InvalidNumber { pos: usize, text: String },
        #[error("Unexpected token {found} at {pos}")]
        UnexpectedToken { pos: usize, found: String },
        #[error("Unexpected end of expression")]
        UnexpectedEnd,
        #[error("Unknown function '{0}'")]
        UnknownFunction(String),
        #[error("Function '{name}' takes {expected} argument(s)")]
        ArityMismatch { name: String, expected: usize },
        #[error("Expression nests deeper than {0} levels")]
        TooDeep(usize),
        #[error("Unresolved identifier '{0}'")]
        UnresolvedIdentifier(String),
        #[error("Expression does not evaluate to a finite number")]
        NonFinite,
    }
}

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    pub fn parse(src: &str) -> Result<Self, ExpressionError> {
        Self::parse_with_depth(src, DEFAULT_MAX_DEPTH)
    }

    pub fn parse_with_depth(src: &str, max_depth: usize) -> Result<Self, ExpressionError> {
        let tokens = lexer::tokenize(src)?;
        let ast = parser::Parser::new(&tokens, max_depth).parse()?;
        Ok(Self { source: src.to_string(), ast })
    }

    pub fn source(&self) -> &str { &self.source }
    pub fn ast(&self) -> &Expr { &self.ast }

    /// Variable names in order of first appearance.
    pub fn variables(&self) -> SmallVec<[&str; 4]> { self.ast.variables() }

    pub fn evaluate(&self, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, ExpressionError> {
        eval::evaluate(&self.ast, lookup)
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if is_ident_start(c)) && chars.all(is_ident_char)
}

pub fn is_builtin_function(name: &str) -> bool {
    Function::from_name(name).is_some()
}

/// Byte ranges of every whole-word occurrence of `name` in `src`.
///
/// Words are maximal runs of ASCII alphanumerics and underscores, so `rX`
/// never matches inside `rX_KAPPA` or `2rX`. Works on text that does not
/// parse as well.
fn word_ranges<'a>(src: &'a str, name: &'a str) -> impl Iterator<Item = (usize, usize)> + 'a {
    let bytes = src.as_bytes();
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos < bytes.len() {
            if !is_ident_char(bytes[pos] as char) {
                pos += 1;
                continue;
            }
            let start = pos;
            while pos < bytes.len() && is_ident_char(bytes[pos] as char) {
                pos += 1;
            }
            if &src[start..pos] == name {
                return Some((start, pos));
            }
        }
        None
    })
}

/// True if `src` mentions `name` as a whole identifier.
pub fn mentions(src: &str, name: &str) -> bool {
    word_ranges(src, name).next().is_some()
}

/// Replaces every whole-identifier occurrence of `old` with `new`.
/// Returns `None` when `src` does not mention `old`.
pub fn rename_identifier(src: &str, old: &str, new: &str) -> Option<String> {
    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    for (start, end) in word_ranges(src, old) {
        out.push_str(&src[last..start]);
        out.push_str(new);
        last = end;
    }
    if last == 0 {
        return None;
    }
    out.push_str(&src[last..]);
    Some(out)
}
