use super::parser::{BinOp, Expr};
use super::ExpressionError;

/// Evaluates `expr`, asking `lookup` for the value of every variable.
pub fn evaluate(expr: &Expr, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, ExpressionError> {
    let value = eval_node(expr, lookup)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExpressionError::NonFinite)
    }
}

fn eval_node(expr: &Expr, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, ExpressionError> {
    Ok(match expr {
        Expr::Number(v) => *v,
        Expr::Var(name) => lookup(name).ok_or_else(|| ExpressionError::UnresolvedIdentifier(name.clone()))?,
        Expr::Neg(inner) => -eval_node(inner, lookup)?,
        Expr::Binary { op, lhs, rhs } => {
            let a = eval_node(lhs, lookup)?;
            let b = eval_node(rhs, lookup)?;
            match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Pow => a.powf(b),
            }
        }
        Expr::Call { func, arg } => func.apply(eval_node(arg, lookup)?),
    })
}
