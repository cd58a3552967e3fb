//! Backups through the filesystem object store.

use crate::common::*;
use std::fs;
use std::sync::Arc;
use tablesnap::{
    BackupOptions, BackupService, MemoryTableStore, ObjectStore, RestoreOptions, RestoreService,
};
use tempfile::TempDir;

fn many_tables() -> Arc<MemoryTableStore> {
    let store = Arc::new(MemoryTableStore::new());
    for (i, table) in ["alpha", "beta", "gamma", "delta", "epsilon"].iter().enumerate() {
        store.insert_rows(table, partition("p", 20 * (i + 1)));
    }
    store
}

#[test]
fn test_backup_all_then_restore_all() {
    let (_blobs, objects) = object_store();
    let source = many_tables();
    let summary = BackupService::new(source.clone())
        .with_object_store(objects.clone())
        .backup_all_tables_to_blob("Nightly", Some("full"), &BackupOptions::default().with_compress(true))
        .unwrap();
    assert_eq!(summary.split('|').count(), 5);
    assert_eq!(objects.list("nightly", "full").unwrap().len(), 5);

    let dest = Arc::new(MemoryTableStore::new());
    let summary = RestoreService::new(dest.clone())
        .with_object_store(objects)
        .restore_all_tables_from_blob("Nightly", "full", &RestoreOptions::default())
        .unwrap();
    assert_eq!(summary.lines().count(), 5);
    for table in ["alpha", "beta", "gamma", "delta", "epsilon"] {
        assert_eq!(dest.rows(table), source.rows(table), "table {}", table);
    }
}

#[test]
fn test_blob_backup_then_blob_restore() {
    let (_blobs, objects) = object_store();
    let out = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let rows = three_rows();

    let summary = BackupService::new(store_with("orders", rows.clone()))
        .with_object_store(objects.clone())
        .backup_table_to_blob("orders", "nightly", out.path(), &BackupOptions::default())
        .unwrap();
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);

    let file = summary
        .split('\'')
        .nth(3)
        .unwrap()
        .to_string();
    assert!(file.starts_with("orders_Backup_"));

    let dest = Arc::new(MemoryTableStore::new());
    let service = RestoreService::new(dest.clone()).with_object_store(objects);
    service
        .restore_table_from_blob("copy", "orders", "nightly", work.path(), &file, &RestoreOptions::default())
        .unwrap();
    assert_eq!(dest.rows("copy"), rows);
    assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);

    service
        .restore_table_from_blob_direct("direct", "orders", "nightly", &file, &RestoreOptions::default())
        .unwrap();
    assert_eq!(dest.rows("direct"), rows);
}

#[test]
fn test_direct_backup_default_names() {
    let (_blobs, objects) = object_store();
    let summary = BackupService::new(store_with("Orders", three_rows()))
        .with_object_store(objects.clone())
        .backup_table_to_blob_direct("Orders", "Nightly", None, None, &BackupOptions::default())
        .unwrap();
    assert!(summary.starts_with("Table 'Orders' backed up as 'nightly-table-orders/Orders_Backup_"));
    assert!(summary.ends_with(".txt' under blob 'Nightly'."));
    assert_eq!(objects.list("nightly", "nightly-table-orders").unwrap().len(), 1);
}
