//! End-to-end backup and restore scenarios across the whole stack.

#[path = "../common/mod.rs"]
mod common;

mod batching;
mod cancellation;
mod local_files;
mod object_store;
mod roundtrip;
mod validation;
