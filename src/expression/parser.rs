//! parser.rs
//! Recursive-descent parser producing an `Expr` tree.
//!
//! Precedence, lowest first: `+ -`, `* /`, unary sign, `^` (right associative).
//! `-2^2` therefore parses as `-(2^2)`.

use super::lexer::{Token, TokenKind};
use super::ExpressionError;
use serde::{Serialize, Deserialize};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sqrt,
    Abs,
    Exp,
    Ln,
    Log10,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            "exp" => Function::Exp,
            "ln" => Function::Ln,
            "log10" => Function::Log10,
            _ => return None,
        };
        Some(f)
    }

    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Asin => x.asin(),
            Function::Acos => x.acos(),
            Function::Atan => x.atan(),
            Function::Sqrt => x.sqrt(),
            Function::Abs => x.abs(),
            Function::Exp => x.exp(),
            Function::Ln => x.ln(),
            Function::Log10 => x.log10(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { func: Function, arg: Box<Expr> },
}

impl Expr {
    /// Variable names in order of first appearance.
    pub fn variables(&self) -> SmallVec<[&str; 4]> {
        let mut out = SmallVec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut SmallVec<[&'a str; 4]>) {
        match self {
            Expr::Number(_) => {}
            Expr::Var(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name.as_str());
                }
            }
            Expr::Neg(inner) => inner.collect_variables(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            Expr::Call { arg, .. } => arg.collect_variables(out),
        }
    }
}

/// An AST node with the height of the tree below it.
type Subtree = (Expr, usize);

pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token], max_depth: usize) -> Self {
        Self { tokens, pos: 0, depth: 0, max_depth }
    }

    /// Parses the whole token stream; trailing tokens are an error.
    pub fn parse(mut self) -> Result<Expr, ExpressionError> {
        let (expr, _) = self.expr()?;
        match self.tokens.get(self.pos) {
            None => Ok(expr),
            Some(tok) => Err(unexpected(tok)),
        }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ExpressionError::TooDeep(self.max_depth));
        }
        Ok(())
    }

    // Operator chains loop instead of recursing, so the tree height is
    // checked separately from the parser's own recursion.
    fn grow(&self, height: usize) -> Result<usize, ExpressionError> {
        if height > self.max_depth {
            return Err(ExpressionError::TooDeep(self.max_depth));
        }
        Ok(height)
    }

    fn binary(&self, op: BinOp, lhs: Subtree, rhs: Subtree) -> Result<Subtree, ExpressionError> {
        let height = self.grow(lhs.1.max(rhs.1) + 1)?;
        Ok((Expr::Binary { op, lhs: Box::new(lhs.0), rhs: Box::new(rhs.0) }, height))
    }

    fn expr(&mut self) -> Result<Subtree, ExpressionError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
    }

    fn term(&mut self) -> Result<Subtree, ExpressionError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
    }

    fn unary(&mut self) -> Result<Subtree, ExpressionError> {
        self.descend()?;
        let result = match self.peek() {
            Some(TokenKind::Minus) => {
                self.pos += 1;
                self.unary()
                    .and_then(|(inner, h)| Ok((Expr::Neg(Box::new(inner)), self.grow(h + 1)?)))
            }
            Some(TokenKind::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        };
        self.depth -= 1;
        result
    }

    fn power(&mut self) -> Result<Subtree, ExpressionError> {
        let base = self.primary()?;
        if let Some(TokenKind::Caret) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return self.binary(BinOp::Pow, base, exponent);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Subtree, ExpressionError> {
        let tok = self.next().ok_or(ExpressionError::UnexpectedEnd)?;
        match &tok.kind {
            TokenKind::Number(v) => Ok((Expr::Number(*v), 1)),
            TokenKind::Ident(name) => {
                if let Some(TokenKind::LParen) = self.peek() {
                    let func = Function::from_name(name)
                        .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
                    self.pos += 1;
                    let (arg, h) = self.expr()?;
                    if let Some(TokenKind::Comma) = self.peek() {
                        return Err(ExpressionError::ArityMismatch { name: name.clone(), expected: 1 });
                    }
                    self.expect_rparen()?;
                    Ok((Expr::Call { func, arg: Box::new(arg) }, self.grow(h + 1)?))
                } else {
                    Ok((Expr::Var(name.clone()), 1))
                }
            }
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            _ => Err(unexpected(tok)),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ExpressionError> {
        match self.next() {
            Some(Token { kind: TokenKind::RParen, .. }) => Ok(()),
            Some(tok) => Err(unexpected(tok)),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

fn unexpected(tok: &Token) -> ExpressionError {
    ExpressionError::UnexpectedToken { pos: tok.span.start, found: format!("{:?}", tok.kind) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::lexer::tokenize;

    fn parse(src: &str) -> Result<Expr, ExpressionError> {
        let tokens = tokenize(src)?;
        Parser::new(&tokens, 64).parse()
    }

    #[test]
    fn test_unary_minus_binds_looser_than_power() {
        let expr = parse("-2^2").unwrap();
        assert!(matches!(expr, Expr::Neg(_)));
    }

    #[test]
    fn test_variables_in_first_appearance_order() {
        let expr = parse("2.0 * rY + iX - rY / sqrt(iX) + zeta").unwrap();
        assert_eq!(expr.variables().as_slice(), &["rY", "iX", "zeta"]);
    }

    #[test]
    fn test_function_names_are_not_variables() {
        let expr = parse("sin(rX) + cos(1)").unwrap();
        assert_eq!(expr.variables().as_slice(), &["rX"]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("1 +"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(parse("foo(1)"), Err(ExpressionError::UnknownFunction("foo".into())));
        assert!(matches!(parse("(1 + 2"), Err(ExpressionError::UnexpectedEnd)));
        assert!(matches!(parse("1 2"), Err(ExpressionError::UnexpectedToken { pos: 2, .. })));
        assert!(matches!(parse("sin(1, 2)"), Err(ExpressionError::ArityMismatch { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1", "-".repeat(100));
        let tokens = tokenize(&deep).unwrap();
        assert_eq!(Parser::new(&tokens, 64).parse(), Err(ExpressionError::TooDeep(64)));
    }

    #[test]
    fn test_flat_operator_chain_counts_toward_depth() {
        let long = vec!["x"; 20_000].join("+");
        let tokens = tokenize(&long).unwrap();
        assert_eq!(Parser::new(&tokens, 64).parse(), Err(ExpressionError::TooDeep(64)));

        let short = vec!["x"; 60].join("*");
        assert!(parse(&short).is_ok());
    }
}
