//! Local store implementations
//!
//! - `memory`: in-memory table store with transaction checks and failure injection
//! - `dir`: table store persisted as one append-only JSON-lines log per table
//! - `fs_object`: object store backed by a directory tree

pub mod dir;
pub mod fs_object;
pub mod memory;

pub use dir::DirTableStore;
pub use fs_object::FsObjectStore;
pub use memory::{MemoryTableStore, SubmittedBatch};
