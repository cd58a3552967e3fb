//! Core types and traits for tablesnap
//!
//! This crate defines the foundational types shared by the snapshot codec and
//! the backup/restore engine:
//! - Row, Properties, Batch: the unit of storage and of transactional writes
//! - TypedValue, EdmType: explicitly tagged property values
//! - Filter: row filters applied during backup
//! - Error: error type hierarchy
//! - Traits: store collaborators (TableSource, TableStore, ObjectStore)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod filter;
pub mod row;
pub mod traits;
pub mod value;

pub use error::{CodecError, Error, Result, StoreError, StoreResult, ValidationError};
pub use filter::{filter_expression, matches_all, validate_filters, Comparison, Filter, Join};
pub use row::{is_reserved, Batch, Properties, Row, ETAG, PARTITION_KEY, ROW_KEY, TIMESTAMP};
pub use traits::{Continuation, ObjectStore, ObjectWrite, TablePage, TableSource, TableStore};
pub use value::{format_timestamp, parse_timestamp, EdmType, ParseEdmTypeError, TypedValue};
