//! Muxer error types.

use mm_common::FormatError;
use thiserror::Error;

/// Errors that can occur while muxing.
///
/// Each variant maps to a stable small integer via [`MuxError::code`];
/// `0` is reserved for success.
#[derive(Error, Debug)]
pub enum MuxError {
    /// Malformed caller input (bad sink, out-of-range index, empty payload).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Required data missing or self-contradicting.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A format key was present with the wrong type.
    #[error("Mismatched type: {0}")]
    MismatchedType(FormatError),

    /// Call made in a phase that disallows it.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Mime type or container/codec combination not supported.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Allocation failure in the backend.
    #[error("Out of memory: {0}")]
    NoMemory(String),

    /// Track queue full under the `Fail` push policy.
    #[error("Buffer full: {0}")]
    BufferFull(String),

    /// Generic backend failure.
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// I/O error on the output sink.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MuxError {
    /// Integer status code for the flat API surface.
    pub fn code(&self) -> i32 {
        match self {
            Self::NoMemory(_) => 1,
            Self::InvalidParameter(_) => 2,
            Self::InvalidData(_) => 3,
            Self::MismatchedType(_) => 4,
            Self::InvalidOperation(_) => 5,
            Self::UnsupportedFormat(_) => 6,
            Self::BufferFull(_) => 7,
            Self::Unknown(_) | Self::IoError(_) => 8,
        }
    }

    pub(crate) fn wrong_state(op: &str, phase: impl std::fmt::Debug) -> Self {
        Self::InvalidOperation(format!("{op} is not allowed in phase {phase:?}"))
    }
}

impl From<FormatError> for MuxError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::UnknownOutputFormat(code) => {
                Self::UnsupportedFormat(format!("output format code {code}"))
            }
            other => Self::MismatchedType(other),
        }
    }
}

/// Convenience Result type for mux operations.
pub type MuxResult<T> = Result<T, MuxError>;
