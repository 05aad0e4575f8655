//! Interpreter error types.
//!
//! The taxonomy is a closed set: every failure a combiner or the reader can
//! produce is one of these variants. Errors flow through the evaluator as
//! the failing arm of a step; there is no in-language catch, so they surface
//! to the host unchanged.

use std::fmt;

use crate::language::Value;
use crate::symbol::Symbol;

/// Categories of reader (parse-level) failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderErrorKind {
    /// Input ended mid-form.
    UnexpectedEof,
    /// Unknown escape sequence in a string literal.
    BadEscape,
    /// Stray or mismatched delimiter, or a misplaced dot.
    UnbalancedDelimiter,
    /// Integer literal that does not fit in a signed 64-bit value.
    InvalidNumber,
}

impl fmt::Display for ReaderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReaderErrorKind::UnexpectedEof => "unexpected end of input",
            ReaderErrorKind::BadEscape => "bad string escape",
            ReaderErrorKind::UnbalancedDelimiter => "unbalanced delimiter",
            ReaderErrorKind::InvalidNumber => "invalid number",
        };
        write!(f, "{name}")
    }
}

/// Every failure the interpreter can report.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Symbol lookup failed in the current scope chain.
    UnboundSymbol(Symbol),
    /// The head of a combination evaluated to a non-combiner.
    NotCombiner(Value),
    /// Destructuring failed; both subtrees at the point of failure.
    BindMismatch { need: Value, have: Value },
    /// A built-in was called with the wrong number of arguments.
    Arity {
        op: String,
        expected: String,
        got: usize,
    },
    /// A built-in was called with an argument of the wrong kind.
    Type {
        op: String,
        expected: &'static str,
        got: Value,
    },
    /// Parse-level failure, with source position.
    Reader {
        kind: ReaderErrorKind,
        line: usize,
        col: usize,
    },
    /// An opaque value could not satisfy the requested shape.
    Decode { from: String, to: &'static str },
    /// A collaborator (runtime, memo store) failed across the boundary.
    Runtime(String),
    /// The evaluation context was cancelled.
    Cancelled,
}

impl Error {
    /// Wrong-kind argument to `op`.
    pub fn typed(op: impl Into<String>, expected: &'static str, got: &Value) -> Self {
        Error::Type {
            op: op.into(),
            expected,
            got: got.clone(),
        }
    }

    /// Exactly `expected` arguments were required.
    pub fn arity_exact(op: impl Into<String>, expected: usize, got: usize) -> Self {
        Error::Arity {
            op: op.into(),
            expected: expected.to_string(),
            got,
        }
    }

    /// At least `min` arguments were required.
    pub fn arity_min(op: impl Into<String>, min: usize, got: usize) -> Self {
        Error::Arity {
            op: op.into(),
            expected: format!("at least {min}"),
            got,
        }
    }

    /// An opaque value failed to decode into the requested shape.
    pub fn decode(from: &Value, to: &'static str) -> Self {
        Error::Decode {
            from: from.to_string(),
            to,
        }
    }

    pub fn reader(kind: ReaderErrorKind, line: usize, col: usize) -> Self {
        Error::Reader { kind, line, col }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnboundSymbol(sym) => write!(f, "unbound symbol: {sym}"),
            Error::NotCombiner(value) => write!(f, "not a combiner: {value}"),
            Error::BindMismatch { need, have } => {
                write!(f, "bind mismatch: need {need}, have {have}")
            }
            Error::Arity { op, expected, got } => {
                write!(f, "{op}: expected {expected} arguments, got {got}")
            }
            Error::Type { op, expected, got } => {
                write!(f, "{op}: expected {expected}, got {got}")
            }
            Error::Reader { kind, line, col } => write!(f, "{line}:{col}: {kind}"),
            Error::Decode { from, to } => write!(f, "cannot decode {from} into {to}"),
            Error::Runtime(msg) => write!(f, "runtime: {msg}"),
            Error::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for Error {}
