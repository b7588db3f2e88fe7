//! Expression sandbox
//!
//! Templates are single JavaScript-flavoured expressions that build the
//! frontmatter object, e.g.
//!
//! ```text
//! { title: file.basename, folder: file.parent.name, count: file.tags.length }
//! ```
//!
//! Expressions are parsed into an AST and run by a tree-walking
//! interpreter that only knows pure built-ins. The only outside data a
//! template sees is its [`EvaluationContext`]. Evaluation is bounded by
//! [`SandboxLimits`], and the result is checked by [`sanitize`] before it
//! becomes [`Metadata`].

pub mod ast;
mod builtins;
pub mod context;
pub mod error;
mod interpreter;
mod lexer;
pub mod limits;
pub mod parser;
pub mod sanitize;
pub mod span;
pub mod tokens;
pub mod value;

use tracing::debug;

use fmgen_core::Metadata;

pub use context::EvaluationContext;
pub use error::{EvalError, EvalResult, LimitError, RuntimeError, RuntimeErrorKind, SchemaError, SyntaxError};
pub use limits::SandboxLimits;
pub use sanitize::sanitize;
pub use value::RtValue;

use interpreter::Interpreter;

/// Evaluates templates under fixed limits.
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    limits: SandboxLimits,
}

impl Sandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Parse without evaluating.
    pub fn check(&self, expression: &str) -> Result<(), SyntaxError> {
        parser::parse(expression, self.limits.max_nesting).map(|_| ())
    }

    /// Evaluate `expression` and return the sanitized object it builds.
    ///
    /// Primitives, `undefined` and functions fail with
    /// [`EvalError::NotAnObject`]. Other object-typed results (`null`,
    /// arrays, dates) reach the sanitizer and fail there.
    pub fn evaluate(&self, expression: &str, ctx: &EvaluationContext) -> EvalResult<Metadata> {
        let ast = parser::parse(expression, self.limits.max_nesting)?;
        let mut interp = Interpreter::new(ctx, self.limits);
        let raw = interp.run(&ast)?;
        debug!(steps = interp.steps(), result = raw.describe(), "template evaluated");
        match raw {
            RtValue::Undefined
            | RtValue::Bool(_)
            | RtValue::Int(_)
            | RtValue::Float(_)
            | RtValue::Str(_)
            | RtValue::Closure(_)
            | RtValue::Native(_)
            | RtValue::Method(_) => Err(EvalError::NotAnObject {
                found: raw.describe(),
            }),
            _ => Ok(sanitize(&raw)?),
        }
    }
}

/// [`Sandbox::evaluate`] with default limits.
pub fn evaluate(expression: &str, ctx: &EvaluationContext) -> EvalResult<Metadata> {
    Sandbox::default().evaluate(expression, ctx)
}
