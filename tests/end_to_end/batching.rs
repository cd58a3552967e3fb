//! Restore batching against the store's transaction rules.

use crate::common::*;
use std::sync::Arc;
use tablesnap::{
    batch_rows, BackupOptions, BackupService, Error, MemoryTableStore, RestoreOptions,
    RestoreService, StoreError,
};

fn snapshot_of(rows: Vec<tablesnap::Row>) -> Vec<u8> {
    let source = store_with("orders", rows);
    BackupService::new(source)
        .backup_table_to_writer("orders", Vec::new(), &BackupOptions::default())
        .unwrap()
        .1
}

#[test]
fn test_250_rows_single_partition() {
    let rows = partition("p", 250);
    let sizes: Vec<usize> = batch_rows(rows.clone(), 100).iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![100, 100, 50]);

    let dest = Arc::new(MemoryTableStore::new());
    RestoreService::new(dest.clone())
        .restore_from_reader("orders", &snapshot_of(rows)[..], &RestoreOptions::default())
        .unwrap();
    let submitted: Vec<usize> = dest.submitted_batches().iter().map(|b| b.len).collect();
    assert_eq!(submitted, vec![100, 100, 50]);
}

#[test]
fn test_custom_batch_size() {
    let dest = Arc::new(MemoryTableStore::new());
    let options = RestoreOptions::default().with_batch_size(10);
    RestoreService::new(dest.clone())
        .restore_from_reader("orders", &snapshot_of(partition("p", 25))[..], &options)
        .unwrap();
    let submitted: Vec<usize> = dest.submitted_batches().iter().map(|b| b.len).collect();
    assert_eq!(submitted, vec![10, 10, 5]);
}

#[test]
fn test_every_batch_has_one_partition() {
    let mut rows = partition("a", 120);
    rows.extend(partition("b", 3));
    rows.extend(partition("c", 101));
    let dest = Arc::new(MemoryTableStore::new());
    RestoreService::new(dest.clone())
        .restore_from_reader("orders", &snapshot_of(rows)[..], &RestoreOptions::default())
        .unwrap();

    let batches = dest.submitted_batches();
    let shape: Vec<(&str, usize)> = batches
        .iter()
        .map(|b| (b.partition_key.as_str(), b.len))
        .collect();
    assert_eq!(
        shape,
        vec![("a", 100), ("a", 20), ("b", 3), ("c", 100), ("c", 1)]
    );
    assert_eq!(dest.rows("orders").len(), 224);
}

#[test]
fn test_failed_batch_leaves_partial_table() {
    let dest = Arc::new(MemoryTableStore::new());
    dest.fail_transactions_after(2);
    let outcome = RestoreService::new(dest.clone()).restore_from_reader(
        "orders",
        &snapshot_of(partition("p", 250))[..],
        &RestoreOptions::default(),
    );
    match outcome {
        Err(Error::BatchSubmission { table, rows, source, .. }) => {
            assert_eq!(table, "orders");
            assert_eq!(rows, 50);
            assert!(matches!(source, StoreError::Rejected(_)));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(dest.rows("orders").len(), 200);
}
