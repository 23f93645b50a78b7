//! Error types for codec operations.

use thiserror::Error;

/// Errors that can occur while decoding or inspecting values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Corrupt escape sequence, unbalanced quote or bracket, stray token
    #[error("malformed input at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    /// Decoded value is not of the type the caller asked for
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl CodecError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        CodecError::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<CodecError> for tr_common::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Malformed { .. } => tr_common::Error::Malformed(err.to_string()),
            CodecError::TypeMismatch { expected, found } => tr_common::Error::TypeMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            },
        }
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
