//! Backup and restore engine for tablesnap
//!
//! This crate drives the snapshot format against table and object stores:
//! - Backup: page a source table into a framed snapshot (stream, file, object)
//! - Restore: replay a snapshot into a table in partition-aware batches
//! - Batching: the pure partition/cap state machine behind restore
//! - Local stores: in-memory, directory-backed and filesystem object stores
//!
//! The engine owns no shared mutable state of its own. Concurrent operations
//! share only the store handles passed to the services.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backup;
pub mod batcher;
pub mod cancel;
mod cleanup;
pub mod config;
pub mod options;
pub mod paths;
pub mod restore;
pub mod store;

pub use backup::{backup_table_to_writer, BackupService};
pub use batcher::{batch_rows, transition, BatchIter, BatchState, PartitionBatcher};
pub use cancel::CancellationToken;
pub use config::{TablesnapConfig, CONFIG_FILE_NAME};
pub use options::{
    BackupOptions, RestoreOptions, DEFAULT_PAGE_SIZE, DIRECT_BATCH_SIZE, FILE_BATCH_SIZE,
    MAX_BATCH_SIZE,
};
pub use restore::{restore_from_reader, RestoreService};
pub use store::{DirTableStore, FsObjectStore, MemoryTableStore, SubmittedBatch};
