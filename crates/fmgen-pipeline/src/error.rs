use thiserror::Error;

use fmgen_core::{PatchError, StoreError};
use fmgen_expr::EvalError;
use fmgen_parser::ParseError;

use crate::outcome::SkipReason;

/// Failure of one document sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The existing metadata block could not be read
    #[error("Invalid frontmatter: {0}")]
    Parse(#[from] ParseError),

    /// The template failed or produced unusable data
    #[error("Invalid template: {0}")]
    Evaluation(#[from] EvalError),

    /// Reading or writing the document failed
    #[error("{0}")]
    Store(#[from] StoreError),

    /// The live buffer could not be patched
    #[error("{0}")]
    Patch(#[from] PatchError),
}

impl SyncError {
    /// Errors that are expected during normal editing and must not reach
    /// the user.
    pub fn is_silent(&self) -> bool {
        self.skip_reason().is_some()
    }

    /// The skip a silent error stands for.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Patch(PatchError::StaleBuffer) => Some(SkipReason::BufferChanged),
            _ => None,
        }
    }

    pub fn is_evaluation(&self) -> bool {
        matches!(self, Self::Evaluation(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use fmgen_expr::SchemaError;

    #[test]
    fn test_stale_buffer_is_silent() {
        let stale = SyncError::from(PatchError::StaleBuffer);
        assert!(stale.is_silent());
        assert_eq!(stale.skip_reason(), Some(SkipReason::BufferChanged));
        let missing = SyncError::from(StoreError::NotFound("a.md".into()));
        assert!(!missing.is_silent());
        assert_eq!(missing.skip_reason(), None);
    }

    #[test]
    fn test_schema_error_is_an_evaluation_failure() {
        let err = SyncError::from(EvalError::from(SchemaError {
            path: "f".into(),
            reason: "functions cannot be stored in frontmatter".into(),
        }));
        assert!(err.is_evaluation());
        assert!(err.to_string().starts_with("Invalid template: "));
    }
}
