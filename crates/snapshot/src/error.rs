//! Snapshot stream error types

use std::io;
use tablesnap_core::{CodecError, Error, ValidationError};
use thiserror::Error;

/// Errors raised while writing or reading a snapshot stream
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A detail line could not be encoded or decoded
    #[error("Codec error at line {line}: {source}")]
    Codec {
        /// 1-based line number
        line: u64,
        /// Underlying codec failure
        #[source]
        source: CodecError,
    },

    /// Framing or count check failed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Header or footer line could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SnapshotError {
    /// Create a codec error for a line
    pub fn codec(line: u64, source: CodecError) -> Self {
        Self::Codec { line, source }
    }

    /// The validation failure, if this is one
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SnapshotError> for Error {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::Codec { line, source } => Error::Codec {
                line: Some(line),
                source,
            },
            SnapshotError::Validation(e) => Error::Validation(e),
            SnapshotError::Io(e) => Error::Io(e),
            SnapshotError::Json(e) => Error::Json(e),
        }
    }
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;
