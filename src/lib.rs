//! tablesnap - snapshot and restore partitioned key-value tables
//!
//! A table is backed up as a line-oriented snapshot: a header naming the
//! table, one type-tagged JSON line per row, and a footer carrying the row
//! count. Snapshots can be written to any `Write` sink, a local file, or an
//! object store, optionally gzip-compressed. Restores replay a snapshot into
//! a table store in transactions that never mix partition keys.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tablesnap::{BackupOptions, BackupService, MemoryTableStore, RestoreOptions, RestoreService};
//!
//! let source = Arc::new(MemoryTableStore::new());
//! let (count, bytes) = BackupService::new(source)
//!     .backup_table_to_writer("orders", Vec::new(), &BackupOptions::default())?;
//!
//! let dest = Arc::new(MemoryTableStore::new());
//! let summary = RestoreService::new(dest)
//!     .restore_from_reader("orders_copy", &bytes[..], &RestoreOptions::default())?;
//! ```
//!
//! # Crates
//!
//! - `tablesnap-core`: rows, typed values, filters, errors, store traits
//! - `tablesnap-snapshot`: entity codec and snapshot framing
//! - `tablesnap-engine`: batching, backup/restore services, local stores

pub use tablesnap_core::*;
pub use tablesnap_engine::*;
pub use tablesnap_snapshot::{
    is_compressed_name, open_source, EntityCodec, SnapshotError, SnapshotReader, SnapshotRecord,
    SnapshotResult, SnapshotSink, SnapshotSummary, SnapshotWriter, TableSpec,
};
