//! Pure tree-walking evaluator.
//!
//! Reads nothing but the tree and the bindings it is handed. Every numeric
//! impossibility is reported as [`EvalError::DomainError`] instead of leaking
//! a NaN or an infinity into the caller.

use super::ast::{BinaryOp, Expr, Func, UnaryOp};
use super::error::{DomainKind, EvalError};

/// A variable name bound to a value for one evaluation.
pub type Binding<'a> = (&'a str, f64);

/// `cos(x)` smaller than this is treated as a pole of `tan`.
const TAN_POLE_EPSILON: f64 = 1e-12;

/// Evaluate `expr` against `bindings`.
pub fn evaluate(expr: &Expr, bindings: &[Binding<'_>]) -> Result<f64, EvalError> {
    let value = match expr {
        Expr::Number(n) => *n,
        Expr::Variable(name) => bindings
            .iter()
            .find(|(n, _)| *n == name.as_str())
            .map(|(_, v)| *v)
            .ok_or_else(|| EvalError::UnboundVariable(name.clone()))?,
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => -evaluate(operand, bindings)?,
        Expr::Binary { op, lhs, rhs } => {
            let a = evaluate(lhs, bindings)?;
            let b = evaluate(rhs, bindings)?;
            apply_binary(*op, a, b)?
        }
        Expr::Call { func, arg } => apply_func(*func, evaluate(arg, bindings)?)?,
    };

    finite(value)
}

fn apply_binary(op: BinaryOp, a: f64, b: f64) -> Result<f64, EvalError> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Sub => Ok(a - b),
        BinaryOp::Mul => Ok(a * b),
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DomainError(DomainKind::DivisionByZero));
            }
            Ok(a / b)
        }
        BinaryOp::Pow => {
            if a < 0.0 && b.fract() != 0.0 {
                return Err(EvalError::DomainError(DomainKind::Power));
            }
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::DomainError(DomainKind::Power));
            }
            Ok(a.powf(b))
        }
    }
}

fn apply_func(func: Func, v: f64) -> Result<f64, EvalError> {
    match func {
        Func::Sin => Ok(v.sin()),
        Func::Cos => Ok(v.cos()),
        Func::Tan => {
            if v.cos().abs() < TAN_POLE_EPSILON {
                return Err(EvalError::DomainError(DomainKind::TanPole));
            }
            Ok(v.tan())
        }
        Func::Exp => Ok(v.exp()),
        Func::Log => {
            if v <= 0.0 {
                return Err(EvalError::DomainError(DomainKind::LogNonPositive));
            }
            Ok(v.ln())
        }
        Func::Sqrt => {
            if v < 0.0 {
                return Err(EvalError::DomainError(DomainKind::SqrtNegative));
            }
            Ok(v.sqrt())
        }
        Func::Abs => Ok(v.abs()),
        Func::Floor => Ok(v.floor()),
        Func::Ceil => Ok(v.ceil()),
    }
}

fn finite(v: f64) -> Result<f64, EvalError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(EvalError::DomainError(DomainKind::NonFinite))
    }
}
