//! Errors raised while reading track descriptions (thiserror-based).

use thiserror::Error;

/// A `MediaFormat` lookup or conversion failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("Missing format key: {0}")]
    Missing(String),

    #[error("Format key {key} is not of type {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("Unknown output format code: {0}")]
    UnknownOutputFormat(i32),
}

/// Convenience Result type for format lookups.
pub type FormatResult<T> = Result<T, FormatError>;
