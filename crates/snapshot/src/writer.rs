//! Snapshot stream writer
//!
//! Frames encoded rows between a header and a count-bearing footer. Every
//! row is written as one complete line as soon as it arrives, so memory use
//! does not depend on table size and a truncated stream is still readable up
//! to its last full line.

use crate::codec::EntityCodec;
use crate::error::{SnapshotError, SnapshotResult};
use crate::record::TableSpec;
use std::io::Write;
use tablesnap_core::Row;
use tracing::trace;

const LINE_TERMINATOR: &[u8] = b"\n";

/// Writer for one snapshot stream
///
/// Wrap the sink in a `BufWriter` (and, optionally, a gzip encoder) before
/// handing it over; the writer never buffers whole rows itself.
pub struct SnapshotWriter<W: Write> {
    sink: W,
    codec: EntityCodec,
    table_name: String,
    record_count: i64,
}

impl<W: Write> SnapshotWriter<W> {
    /// Write the header and flush it
    pub fn open(mut sink: W, table_name: impl Into<String>, codec: EntityCodec) -> SnapshotResult<Self> {
        let table_name = table_name.into();
        serde_json::to_writer(&mut sink, &TableSpec::header(&table_name))?;
        sink.write_all(LINE_TERMINATOR)?;
        sink.flush()?;
        Ok(SnapshotWriter {
            sink,
            codec,
            table_name,
            record_count: 0,
        })
    }

    /// Append one row
    pub fn write_row(&mut self, row: &Row) -> SnapshotResult<()> {
        let line_number = self.next_line();
        let line = self
            .codec
            .encode(row)
            .map_err(|e| SnapshotError::codec(line_number, e))?;
        self.sink.write_all(line.as_bytes())?;
        self.sink.write_all(LINE_TERMINATOR)?;
        self.record_count += 1;
        trace!(target: "tablesnap::backup", table = %self.table_name, count = self.record_count, "Row written");
        Ok(())
    }

    /// 1-based line the next row lands on; the header is line 1
    fn next_line(&self) -> u64 {
        self.record_count as u64 + 2
    }

    /// Rows written so far
    pub fn record_count(&self) -> i64 {
        self.record_count
    }

    /// Table named in the header
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Write the footer, flush, and hand back the count and the sink.
    ///
    /// Compressing sinks still need their own `finish`.
    pub fn finish(mut self) -> SnapshotResult<(i64, W)> {
        serde_json::to_writer(
            &mut self.sink,
            &TableSpec::footer(&self.table_name, self.record_count),
        )?;
        self.sink.write_all(LINE_TERMINATOR)?;
        self.sink.flush()?;
        Ok((self.record_count, self.sink))
    }
}
