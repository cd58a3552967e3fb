//! Error types for tablesnap
//!
//! This module defines the error taxonomy shared by every layer:
//!
//! - [`Error`]: top-level outcome of a backup or restore call
//! - [`CodecError`]: a row could not be encoded or decoded
//! - [`ValidationError`]: snapshot framing or record counts are inconsistent
//! - [`StoreError`]: a table or object store collaborator failed
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::value::{EdmType, ParseEdmTypeError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tablesnap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for store collaborators
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Top-level error for backup and restore operations
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid argument; raised before any I/O
    #[error("Invalid parameter: {0}")]
    Parameter(String),

    /// The store could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// A row could not be encoded or decoded
    #[error("Codec error{}: {source}", at_line(.line))]
    Codec {
        /// 1-based snapshot line, when the row came from or was bound for one
        line: Option<u64>,
        /// Underlying codec failure
        #[source]
        source: CodecError,
    },

    /// Snapshot framing or counts are inconsistent
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The destination rejected a transaction
    #[error("Batch submission to table '{table}' failed (partition '{partition_key}', {rows} rows): {source}")]
    BatchSubmission {
        /// Destination table
        table: String,
        /// Partition key of the rejected batch
        partition_key: String,
        /// Rows in the rejected batch
        rows: usize,
        /// Store error
        #[source]
        source: StoreError,
    },

    /// Any other failure during backup or restore
    #[error("{message}")]
    OperationFailed {
        /// Human-readable summary, e.g. "Table 'X' restore failed."
        message: String,
        /// Original cause
        #[source]
        source: Box<Error>,
    },

    /// Cancellation or deadline observed
    #[error("Operation cancelled")]
    Cancelled,

    /// A temporary artifact could not be removed
    #[error("Error cleaning up '{}': {source}", path.display())]
    Cleanup {
        /// Artifact that was left behind
        path: PathBuf,
        /// Removal failure
        #[source]
        source: io::Error,
    },

    /// Store failure that is not a connection problem
    #[error("Store error: {0}")]
    Store(StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON error outside row decoding
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a parameter error
    pub fn parameter(msg: impl Into<String>) -> Self {
        Error::Parameter(msg.into())
    }

    /// Wrap into `OperationFailed` unless the error already carries a
    /// caller-actionable classification.
    pub fn into_operation_failed(self, message: impl Into<String>) -> Self {
        match self {
            Error::Parameter(_)
            | Error::Connection(_)
            | Error::Codec { .. }
            | Error::Validation(_)
            | Error::BatchSubmission { .. }
            | Error::OperationFailed { .. }
            | Error::Cancelled => self,
            other => Error::OperationFailed {
                message: message.into(),
                source: Box::new(other),
            },
        }
    }

    /// True for `Cancelled`, looking through `OperationFailed`
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::OperationFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl From<CodecError> for Error {
    fn from(source: CodecError) -> Self {
        Error::Codec { line: None, source }
    }
}

fn at_line(line: &Option<u64>) -> String {
    line.map(|n| format!(" at line {}", n)).unwrap_or_default()
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Connection(msg) => Error::Connection(msg),
            other => Error::Store(other),
        }
    }
}

/// Row encode/decode failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Property object has no `EdmType` tag
    #[error("property '{property}' has no EdmType")]
    MissingEdmType {
        /// Property name
        property: String,
    },

    /// `EdmType` tag is not one of the eight kinds
    #[error("property '{property}': {source}")]
    UnknownEdmType {
        /// Property name
        property: String,
        /// Parse failure
        source: ParseEdmTypeError,
    },

    /// Value text does not parse at the declared kind
    #[error("property '{property}': cannot parse '{value}' as {kind}: {reason}")]
    InvalidValue {
        /// Property name
        property: String,
        /// Declared kind
        kind: EdmType,
        /// Raw wire text
        value: String,
        /// Parser message
        reason: String,
    },

    /// Property object lacks the value keyed by its own name
    #[error("property '{0}' has no value")]
    MissingValue(String),

    /// `PartitionKey` or `RowKey` absent or null
    #[error("missing required field '{0}'")]
    MissingKey(&'static str),

    /// Same property name twice in one row
    #[error("duplicate property '{0}'")]
    DuplicateProperty(String),

    /// Reserved name used as a property
    #[error("'{0}' is reserved and cannot be used as a property name")]
    ReservedProperty(String),

    /// Line is not a JSON object of the expected shape
    #[error("malformed entity: {0}")]
    Malformed(String),
}

/// Snapshot framing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// First record is not a header
    #[error("missing header")]
    MissingHeader,

    /// Stream ended without a footer
    #[error("missing footer")]
    MissingFooter,

    /// Footer count disagrees with what was observed
    #[error("count mismatch: expected {expected}, actual {actual}")]
    CountMismatch {
        /// Count claimed by the footer
        expected: i64,
        /// Count observed
        actual: i64,
    },

    /// Table names in header/footer (or the caller's expectation) disagree
    #[error("table name mismatch: expected '{expected}', actual '{actual}'")]
    TableNameMismatch {
        /// Expected name
        expected: String,
        /// Name found
        actual: String,
    },

    /// Record in a position the framing does not allow
    #[error("unexpected record at line {line}: {reason}")]
    UnexpectedRecord {
        /// 1-based line number
        line: u64,
        /// What was wrong
        reason: String,
    },
}

/// Failures reported by table and object store collaborators
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport failure reaching the store
    #[error("cannot connect: {0}")]
    Connection(String),

    /// Table does not exist
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// Object or container does not exist
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The store refused the request
    #[error("rejected: {0}")]
    Rejected(String),

    /// Local I/O failure inside the store
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Create a rejection
    pub fn rejected(msg: impl Into<String>) -> Self {
        StoreError::Rejected(msg.into())
    }
}
