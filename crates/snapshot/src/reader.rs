//! Snapshot stream reader and validator
//!
//! [`SnapshotReader`] is a single forward pass over a stream, yielding one
//! [`SnapshotRecord`] per non-blank line. Framing is checked as it goes:
//!
//! - the first record must be a header
//! - the footer must name the header's table and carry the observed detail count
//! - nothing but blank lines may follow the footer
//! - the stream must not end before the footer
//!
//! The first framing or decode failure is yielded as an error and ends the
//! iteration.

use crate::codec::EntityCodec;
use crate::error::{SnapshotError, SnapshotResult};
use crate::record::{Marker, SnapshotRecord, TableSpec, PROCESSING_METADATA};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::io::{BufRead, Lines};
use tablesnap_core::{CodecError, ValidationError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    AwaitingHeader,
    InBody,
    AfterFooter,
    Finished,
}

/// Summary of a fully validated stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    /// Table named by the header and footer
    pub table_name: String,
    /// Detail records observed (equal to the footer's count)
    pub record_count: i64,
}

/// Reads a snapshot stream record by record
pub struct SnapshotReader<R: BufRead> {
    lines: Lines<R>,
    codec: EntityCodec,
    expected_table: Option<String>,
    header_table: Option<String>,
    line_no: u64,
    details: i64,
    state: ReadState,
}

impl<R: BufRead> SnapshotReader<R> {
    /// Reader over `source`
    pub fn new(source: R) -> Self {
        SnapshotReader {
            lines: source.lines(),
            codec: EntityCodec::new(),
            expected_table: None,
            header_table: None,
            line_no: 0,
            details: 0,
            state: ReadState::AwaitingHeader,
        }
    }

    /// Require the header to name this table
    pub fn with_expected_table(mut self, table_name: impl Into<String>) -> Self {
        self.expected_table = Some(table_name.into());
        self
    }

    /// Detail records yielded so far
    pub fn detail_count(&self) -> i64 {
        self.details
    }

    /// Table named by the header, once it has been read
    pub fn table_name(&self) -> Option<&str> {
        self.header_table.as_deref()
    }

    /// Drain the stream, checking framing without keeping any rows
    pub fn validate(mut self) -> SnapshotResult<SnapshotSummary> {
        let mut footer = None;
        for record in self.by_ref() {
            if let SnapshotRecord::Footer {
                table_name,
                record_count,
            } = record?
            {
                footer = Some(SnapshotSummary {
                    table_name,
                    record_count,
                });
            }
        }
        footer.ok_or(SnapshotError::Validation(ValidationError::MissingFooter))
    }

    fn next_line(&mut self) -> Option<SnapshotResult<String>> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if !line.trim().is_empty() {
                return Some(Ok(line));
            }
        }
    }

    fn unexpected(&self, reason: impl Into<String>) -> SnapshotError {
        ValidationError::UnexpectedRecord {
            line: self.line_no,
            reason: reason.into(),
        }
        .into()
    }

    fn read_record(&mut self) -> Option<SnapshotResult<SnapshotRecord>> {
        let line = match self.next_line() {
            Some(Ok(line)) => line,
            Some(Err(e)) => return Some(Err(e)),
            None => {
                return match self.state {
                    ReadState::AwaitingHeader => Some(Err(ValidationError::MissingHeader.into())),
                    ReadState::InBody => Some(Err(ValidationError::MissingFooter.into())),
                    ReadState::AfterFooter | ReadState::Finished => None,
                };
            }
        };

        if self.state == ReadState::AfterFooter {
            return Some(Err(self.unexpected("record after footer")));
        }

        Some(self.classify(&line))
    }

    fn classify(&mut self, line: &str) -> SnapshotResult<SnapshotRecord> {
        match framing_marker(line).map_err(|e| SnapshotError::codec(self.line_no, e))? {
            Some(Marker::Header) => {
                if self.state != ReadState::AwaitingHeader {
                    return Err(self.unexpected("second header"));
                }
                let spec: TableSpec = serde_json::from_str(line)?;
                if let Some(expected) = &self.expected_table {
                    if *expected != spec.table_name {
                        return Err(ValidationError::TableNameMismatch {
                            expected: expected.clone(),
                            actual: spec.table_name,
                        }
                        .into());
                    }
                }
                debug!(target: "tablesnap::restore", table = %spec.table_name, "Header {}", line);
                self.header_table = Some(spec.table_name.clone());
                self.state = ReadState::InBody;
                Ok(SnapshotRecord::Header {
                    table_name: spec.table_name,
                })
            }
            Some(Marker::Footer) => {
                let Some(header_table) = self.header_table.clone() else {
                    return Err(ValidationError::MissingHeader.into());
                };
                let spec: TableSpec = serde_json::from_str(line)?;
                debug!(target: "tablesnap::restore", table = %spec.table_name, "Footer {}", line);
                if spec.table_name != header_table {
                    return Err(ValidationError::TableNameMismatch {
                        expected: header_table,
                        actual: spec.table_name,
                    }
                    .into());
                }
                let expected = spec
                    .record_count
                    .ok_or_else(|| self.unexpected("footer without RecordCount"))?;
                if expected != self.details {
                    return Err(ValidationError::CountMismatch {
                        expected,
                        actual: self.details,
                    }
                    .into());
                }
                self.state = ReadState::AfterFooter;
                Ok(SnapshotRecord::Footer {
                    table_name: spec.table_name,
                    record_count: expected,
                })
            }
            None => {
                if self.state == ReadState::AwaitingHeader {
                    return Err(ValidationError::MissingHeader.into());
                }
                let row = self
                    .codec
                    .decode(line)
                    .map_err(|e| SnapshotError::codec(self.line_no, e))?;
                self.details += 1;
                Ok(SnapshotRecord::Detail(row))
            }
        }
    }
}

impl<R: BufRead> Iterator for SnapshotReader<R> {
    type Item = SnapshotResult<SnapshotRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ReadState::Finished {
            return None;
        }
        let item = self.read_record();
        match &item {
            Some(Err(_)) | None => self.state = ReadState::Finished,
            Some(Ok(_)) => {}
        }
        item
    }
}

/// Read only the top-level `ProcessingMetaData` field of a line
fn framing_marker(line: &str) -> Result<Option<Marker>, CodecError> {
    #[derive(Deserialize)]
    struct MarkerOnly {
        #[serde(rename = "ProcessingMetaData", default)]
        marker: Option<JsonValue>,
    }

    let head: MarkerOnly =
        serde_json::from_str(line).map_err(|e| CodecError::Malformed(e.to_string()))?;
    let marker = match head.marker {
        Some(JsonValue::String(s)) => s,
        _ => return Ok(None),
    };
    match marker.as_str() {
        "Header" => Ok(Some(Marker::Header)),
        "Footer" => Ok(Some(Marker::Footer)),
        other => Err(CodecError::Malformed(format!(
            "unknown {} '{}'",
            PROCESSING_METADATA, other
        ))),
    }
}
