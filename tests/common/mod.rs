//! Shared fixtures for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::io::BufRead;
use std::sync::Arc;
use tablesnap::{FsObjectStore, MemoryTableStore, Row};
use tempfile::TempDir;
use uuid::Uuid;

/// A row carrying one property of every value kind
pub fn typed_row(pk: &str, rk: &str, n: i32) -> Row {
    Row::new(pk, rk)
        .with_timestamp(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        .with_etag(format!("W/\"datetime'{}'\"", n))
        .with_property("Name", format!("item {}", n))
        .unwrap()
        .with_property("Payload", vec![n as u8, 0xff, 0x00])
        .unwrap()
        .with_property("Active", n % 2 == 0)
        .unwrap()
        .with_property("Due", Utc.with_ymd_and_hms(2025, 6, 7, 8, 9, 10).unwrap())
        .unwrap()
        .with_property("Price", n as f64 * 1.25)
        .unwrap()
        .with_property("Ref", Uuid::from_u128(n as u128))
        .unwrap()
        .with_property("Qty", n)
        .unwrap()
        .with_property("Total", i64::from(n) * 10_000_000_000)
        .unwrap()
}

/// `n` typed rows under one partition key
pub fn partition(pk: &str, n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| typed_row(pk, &format!("{:05}", i), i as i32))
        .collect()
}

/// The three-row table of the basic round-trip scenario: two rows in `a`, one in `b`
pub fn three_rows() -> Vec<Row> {
    vec![typed_row("a", "1", 1), typed_row("a", "2", 2), typed_row("b", "1", 3)]
}

/// In-memory store holding `rows` in `table`
pub fn store_with(table: &str, rows: Vec<Row>) -> Arc<MemoryTableStore> {
    let store = Arc::new(MemoryTableStore::new());
    store.insert_rows(table, rows);
    store
}

/// Filesystem object store rooted in a fresh temp dir
pub fn object_store() -> (TempDir, Arc<FsObjectStore>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FsObjectStore::open(dir.path()).unwrap());
    (dir, store)
}

/// Non-empty lines of a plain snapshot
pub fn lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .lines()
        .map(|l| l.unwrap())
        .filter(|l| !l.is_empty())
        .collect()
}
