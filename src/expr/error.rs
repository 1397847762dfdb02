//! Error types for expression parsing and evaluation.

use thiserror::Error;

/// An error that occurred while turning expression text into a tree.
///
/// Always fatal for the compile step: nothing is generated from an
/// expression that fails to parse.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind:?} at position {pos}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// 0-based character offset into the source text.
    pub pos: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedChar,
    InvalidNumber,
    UnexpectedToken,
    UnmatchedParen,
    UnknownIdentifier,
    UnknownFunction,
    WrongArgCount,
    DepthExceeded,
    Empty,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, pos: usize) -> Self {
        Self {
            kind,
            pos,
            message: message.into(),
        }
    }

    pub fn unexpected_char(ch: char, pos: usize) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedChar,
            format!("unexpected character: '{ch}'"),
            pos,
        )
    }

    pub fn unexpected_token(message: impl Into<String>, pos: usize) -> Self {
        Self::new(ParseErrorKind::UnexpectedToken, message, pos)
    }

    pub fn unmatched_paren(pos: usize) -> Self {
        Self::new(
            ParseErrorKind::UnmatchedParen,
            "unmatched parenthesis",
            pos,
        )
    }
}

/// Which numeric operation had no defined result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    DivisionByZero,
    /// Negative base raised to a non-integer power, or zero to a negative power.
    Power,
    LogNonPositive,
    SqrtNegative,
    TanPole,
    /// The operation produced an infinite or NaN result.
    NonFinite,
}

impl std::fmt::Display for DomainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DomainKind::DivisionByZero => "division by zero",
            DomainKind::Power => "undefined power",
            DomainKind::LogNonPositive => "log of a non-positive number",
            DomainKind::SqrtNegative => "sqrt of a negative number",
            DomainKind::TanPole => "tan at an odd multiple of pi/2",
            DomainKind::NonFinite => "non-finite result",
        };
        f.write_str(s)
    }
}

/// An error raised while evaluating a tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Per-sample numeric impossibility. Callers that sample many points
    /// recover from this with a fallback value.
    #[error("domain error: {0}")]
    DomainError(DomainKind),
    /// The bindings did not supply a variable the tree references.
    #[error("unbound variable '{0}'")]
    UnboundVariable(String),
}

impl EvalError {
    pub fn is_domain(&self) -> bool {
        matches!(self, EvalError::DomainError(_))
    }
}
