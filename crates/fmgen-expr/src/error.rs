//! Evaluation errors
//!
//! Every failure of a template ends up as an [`EvalError`]. Its `Display`
//! is the short message shown to users; `source()` holds the underlying
//! cause when there is one.

use std::fmt;

use thiserror::Error;

use crate::span::LineCol;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message} at {location}")]
pub struct SyntaxError {
    pub message: String,
    pub location: LineCol,
    /// Byte offset into the expression source.
    pub offset: usize,
}

/// JavaScript-style error class of a runtime failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    TypeError,
    ReferenceError,
    RangeError,
    Error,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TypeError => "TypeError",
            Self::ReferenceError => "ReferenceError",
            Self::RangeError => "RangeError",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            kind: RuntimeErrorKind::TypeError,
            message: message.into(),
        }
    }

    pub fn reference_error(name: &str) -> Self {
        Self {
            kind: RuntimeErrorKind::ReferenceError,
            message: format!("{name} is not defined"),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self {
            kind: RuntimeErrorKind::RangeError,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: RuntimeErrorKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LimitError {
    #[error("step budget of {0} exhausted")]
    Steps(u64),
    #[error("call depth exceeds {0}")]
    CallDepth(usize),
    #[error("string longer than {0} bytes")]
    StringLength(usize),
    #[error("list longer than {0} items")]
    ListLength(usize),
    #[error("value nested deeper than {0} levels")]
    ValueDepth(usize),
}

/// Produced value violates the frontmatter schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Key path of the offending value, e.g. `links[2].target`.
    pub path: String,
    pub reason: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "result: {}", self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("{0}")]
    Runtime(#[source] RuntimeError),

    #[error("The expression must return an object")]
    NotAnObject { found: &'static str },

    #[error("Invalid value in template result: {0}")]
    Schema(#[from] SchemaError),

    #[error("Evaluation limit exceeded: {0}")]
    Limit(#[from] LimitError),
}

impl From<RuntimeError> for EvalError {
    fn from(err: RuntimeError) -> Self {
        Self::Runtime(err)
    }
}

impl EvalError {
    pub fn is_limit(&self) -> bool {
        matches!(self, Self::Limit(_))
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
