//! Snapshot record types
//!
//! A well-formed stream is one header, any number of detail rows and one
//! footer, one JSON value per line:
//!
//! ```text
//! {"TableName":"orders","ProcessingMetaData":"Header"}
//! {"PartitionKey":"p","RowKey":"r",...}
//! {"TableName":"orders","RecordCount":1,"ProcessingMetaData":"Footer"}
//! ```
//!
//! Header and footer carry `ProcessingMetaData` as a top-level string. Detail
//! properties are always objects, so a row can never be mistaken for framing.

use serde::{Deserialize, Serialize};
use tablesnap_core::Row;

/// Top-level key that marks a framing line
pub const PROCESSING_METADATA: &str = "ProcessingMetaData";

/// Framing marker value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Marker {
    /// First line
    Header,
    /// Last line
    Footer,
}

/// Header or footer line as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Source table
    #[serde(rename = "TableName")]
    pub table_name: String,
    /// Detail count, footer only
    #[serde(rename = "RecordCount", default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<i64>,
    /// Header or footer
    #[serde(rename = "ProcessingMetaData")]
    pub marker: Marker,
}

impl TableSpec {
    /// Header for `table_name`
    pub fn header(table_name: impl Into<String>) -> Self {
        TableSpec {
            table_name: table_name.into(),
            record_count: None,
            marker: Marker::Header,
        }
    }

    /// Footer for `table_name` claiming `record_count` details
    pub fn footer(table_name: impl Into<String>, record_count: i64) -> Self {
        TableSpec {
            table_name: table_name.into(),
            record_count: Some(record_count),
            marker: Marker::Footer,
        }
    }
}

/// One line of a snapshot stream
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotRecord {
    /// Opens the stream
    Header {
        /// Source table
        table_name: String,
    },
    /// One row
    Detail(Row),
    /// Closes the stream
    Footer {
        /// Source table
        table_name: String,
        /// Number of details written
        record_count: i64,
    },
}

impl SnapshotRecord {
    /// True for `Detail`
    pub fn is_detail(&self) -> bool {
        matches!(self, SnapshotRecord::Detail(_))
    }
}
