//! Snapshot stream format for tablesnap
//!
//! A snapshot is UTF-8 text, one JSON value per line: a header naming the
//! table, one detail line per row, and a footer carrying the row count.
//!
//! ## Usage
//!
//! ```ignore
//! let mut writer = SnapshotWriter::open(sink, "orders", EntityCodec::new())?;
//! for row in rows {
//!     writer.write_row(&row)?;
//! }
//! let (count, sink) = writer.finish()?;
//!
//! for record in SnapshotReader::new(source) {
//!     match record? {
//!         SnapshotRecord::Detail(row) => { /* ... */ }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - `codec`: row <-> type-tagged JSON line
//! - `record`: header/detail/footer records
//! - `writer`: framed, streaming writer
//! - `reader`: framed, validating reader
//! - `compression`: optional gzip wrapping

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod compression;
pub mod error;
pub mod reader;
pub mod record;
pub mod writer;

pub use codec::EntityCodec;
pub use compression::{is_compressed_name, open_source, SnapshotSink, COMPRESSED_SUFFIX, PLAIN_SUFFIX};
pub use error::{SnapshotError, SnapshotResult};
pub use reader::{SnapshotReader, SnapshotSummary};
pub use record::{SnapshotRecord, TableSpec};
pub use writer::SnapshotWriter;
