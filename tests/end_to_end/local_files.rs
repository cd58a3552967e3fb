//! File backups and the directory-backed table store.

use crate::common::*;
use std::sync::Arc;
use tablesnap::{
    BackupOptions, BackupService, DirTableStore, Error, MemoryTableStore, RestoreOptions,
    RestoreService, TableSource, TableStore,
};
use tempfile::TempDir;

#[test]
fn test_compressed_file_roundtrip() {
    let out = TempDir::new().unwrap();
    let rows = partition("p", 150);
    let source = store_with("orders", rows.clone());
    let options = BackupOptions::default().with_compress(true).with_validate(true);
    let file = BackupService::new(source)
        .backup_table_to_file("orders", out.path(), &options)
        .unwrap();
    assert!(file.starts_with("orders_Backup_"));
    assert!(file.ends_with(".7z"));

    let dest = Arc::new(MemoryTableStore::new());
    let summary = RestoreService::new(dest.clone())
        .restore_table_from_file("orders", &out.path().join(&file), &RestoreOptions::default())
        .unwrap();
    assert_eq!(summary, "Restore to table 'orders' successful; 150 entries.");
    assert_eq!(dest.rows("orders"), rows);

    let submitted: Vec<usize> = dest.submitted_batches().iter().map(|b| b.len).collect();
    assert_eq!(submitted, vec![98, 52]);
}

#[test]
fn test_missing_snapshot_file() {
    let out = TempDir::new().unwrap();
    let path = out.path().join("absent.txt");
    let err = RestoreService::new(Arc::new(MemoryTableStore::new()))
        .restore_table_from_file("orders", &path, &RestoreOptions::default())
        .unwrap_err();
    match err {
        Error::Parameter(msg) => assert_eq!(msg, format!("File '{}' does not exist.", path.display())),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_directory_store_roundtrip() {
    let src_dir = TempDir::new().unwrap();
    let dst_dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let source = Arc::new(DirTableStore::open(src_dir.path()).unwrap());
    source.create_table_if_not_exists("orders").unwrap();
    for batch in tablesnap::batch_rows(three_rows(), 100) {
        source.submit_transaction("orders", &batch).unwrap();
    }

    let file = BackupService::new(source)
        .backup_table_to_file("orders", out.path(), &BackupOptions::default())
        .unwrap();

    let dest = Arc::new(DirTableStore::open(dst_dir.path()).unwrap());
    RestoreService::new(dest.clone())
        .restore_table_from_file("copy", &out.path().join(file), &RestoreOptions::default())
        .unwrap();

    let reopened = DirTableStore::open(dst_dir.path()).unwrap();
    let page = reopened.query_page("copy", &[], 100, None).unwrap();
    assert_eq!(page.rows, three_rows());
    assert!(page.continuation.is_none());
}
