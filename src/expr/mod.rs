//! Expression engine: text → token stream → immutable tree → pure evaluation.
//!
//! An [`Expression`] is compiled once from user text and can then be sampled
//! any number of times. There is no path from the text to anything other than
//! the closed node set in [`ast`].

pub mod ast;
pub mod derivative;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{BinaryOp, Expr, Func, UnaryOp, MAX_DEPTH};
pub use derivative::{first_derivative, second_derivative, DerivativeEstimator, Estimate};
pub use error::{DomainKind, EvalError, ParseError, ParseErrorKind};
pub use eval::{evaluate, Binding};

use lexer::Lexer;
use parser::Parser;

/// Expressions that ship with the tool, known to parse against `{x}`.
pub const PRESETS: [&str; 6] = [
    "sin(x)",
    "cos(x)",
    "sin(x) + cos(2*x)",
    "exp(-abs(x)) * sin(5*x)",
    "sqrt(abs(x)) * sin(2*x)",
    "tan(x)",
];

/// A function of one real variable that may fail at some points.
///
/// Implemented by compiled expressions and by derived functions such as a
/// morph between two expressions, so derivative estimation and mapping work
/// over either.
pub trait RealFn {
    fn at(&self, x: f64) -> Result<f64, EvalError>;
}

impl<F: RealFn + ?Sized> RealFn for &F {
    fn at(&self, x: f64) -> Result<f64, EvalError> {
        (**self).at(x)
    }
}

/// A compiled expression: the source text, the declared variables and the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    variables: Vec<String>,
    tree: Expr,
}

impl Expression {
    /// Compile an expression over the single variable `x`.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        Self::parse_with_vars(source, &["x"])
    }

    /// Compile an expression over the given declared variables.
    pub fn parse_with_vars(source: &str, variables: &[&str]) -> Result<Self, ParseError> {
        let variables: Vec<String> = variables.iter().map(|v| v.to_string()).collect();
        let tokens = Lexer::new(source).tokenize()?;
        let tree = Parser::new(tokens, &variables).parse()?;
        Ok(Self {
            source: source.to_string(),
            variables,
            tree,
        })
    }

    /// Wrap an already-built tree. Used for trees assembled in code, such as
    /// the harmonic partials of an additive voice.
    pub fn from_tree(tree: Expr, variables: &[&str]) -> Self {
        Self {
            source: tree.to_string(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
            tree,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn tree(&self) -> &Expr {
        &self.tree
    }

    /// Evaluate with explicit bindings.
    pub fn eval(&self, bindings: &[Binding<'_>]) -> Result<f64, EvalError> {
        evaluate(&self.tree, bindings)
    }

    /// Evaluate with the first declared variable bound to `value`.
    pub fn eval_at(&self, value: f64) -> Result<f64, EvalError> {
        match self.variables.first() {
            Some(name) => evaluate(&self.tree, &[(name.as_str(), value)]),
            None => evaluate(&self.tree, &[]),
        }
    }
}

impl RealFn for Expression {
    fn at(&self, x: f64) -> Result<f64, EvalError> {
        self.eval_at(x)
    }
}
