//! Backup then restore reproduces the source table.

use crate::common::*;
use std::sync::Arc;
use tablesnap::{
    BackupOptions, BackupService, Comparison, Filter, Join, MemoryTableStore, RestoreOptions,
    RestoreService, Row,
};

#[test]
fn test_three_rows_two_partitions() {
    let source = store_with("orders", three_rows());
    let (count, bytes) = BackupService::new(source)
        .backup_table_to_writer("orders", Vec::new(), &BackupOptions::default())
        .unwrap();
    assert_eq!(count, 3);

    let lines = lines(&bytes);
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], r#"{"TableName":"orders","ProcessingMetaData":"Header"}"#);
    assert_eq!(
        lines[4],
        r#"{"TableName":"orders","RecordCount":3,"ProcessingMetaData":"Footer"}"#
    );
    assert!(lines[1].contains(r#""Qty":{"Qty":"1","EdmType":"Int32"}"#));
    assert!(lines[1].contains(r#""EdmType":"GUID""#));

    let dest = Arc::new(MemoryTableStore::new());
    let summary = RestoreService::new(dest.clone())
        .restore_from_reader("orders", &bytes[..], &RestoreOptions::default())
        .unwrap();
    assert_eq!(summary, "Restore to table 'orders' successful; 3 entries.");
    assert_eq!(dest.rows("orders"), three_rows());

    let sizes: Vec<usize> = dest.submitted_batches().iter().map(|b| b.len).collect();
    assert_eq!(sizes, vec![2, 1]);
}

#[test]
fn test_compressed_roundtrip() {
    let rows = partition("p", 40);
    let source = store_with("orders", rows.clone());
    let options = BackupOptions::default().with_compress(true).with_page_size(7);
    let (count, bytes) = BackupService::new(source)
        .backup_table_to_writer("orders", Vec::new(), &options)
        .unwrap();
    assert_eq!(count, 40);
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

    let dest = Arc::new(MemoryTableStore::new());
    let source = tablesnap::open_source(&bytes[..], true);
    RestoreService::new(dest.clone())
        .restore_from_reader("orders", source, &RestoreOptions::default())
        .unwrap();
    assert_eq!(dest.rows("orders"), rows);
}

#[test]
fn test_restore_twice_converges() {
    let source = store_with("orders", partition("p", 30));
    let (_, bytes) = BackupService::new(source)
        .backup_table_to_writer("orders", Vec::new(), &BackupOptions::default())
        .unwrap();

    let dest = Arc::new(MemoryTableStore::new());
    let service = RestoreService::new(dest.clone());
    service
        .restore_from_reader("orders", &bytes[..], &RestoreOptions::default())
        .unwrap();
    let first = dest.rows("orders");
    service
        .restore_from_reader("orders", &bytes[..], &RestoreOptions::default())
        .unwrap();
    assert_eq!(dest.rows("orders"), first);
    assert_eq!(first.len(), 30);
}

#[test]
fn test_filtered_backup_keeps_matching_rows() {
    let source = store_with("orders", partition("p", 20));
    let options = BackupOptions::default()
        .with_filter(Filter::new("Qty", Comparison::LessThan, "3"))
        .with_filter(Filter::new("Qty", Comparison::GreaterThanOrEqual, "18").with_join(Join::Or));
    let (count, bytes) = BackupService::new(source)
        .backup_table_to_writer("orders", Vec::new(), &options)
        .unwrap();
    assert_eq!(count, 5);

    let dest = Arc::new(MemoryTableStore::new());
    RestoreService::new(dest.clone())
        .restore_from_reader("orders", &bytes[..], &RestoreOptions::default())
        .unwrap();
    let keys: Vec<String> = dest.rows("orders").into_iter().map(|r: Row| r.row_key).collect();
    assert_eq!(keys, vec!["00000", "00001", "00002", "00018", "00019"]);
}

#[test]
fn test_excluded_properties_are_not_restored() {
    let source = store_with("orders", three_rows());
    let options = BackupOptions::default()
        .with_excluded_property("Payload")
        .with_excluded_property("Ref");
    let (_, bytes) = BackupService::new(source)
        .backup_table_to_writer("orders", Vec::new(), &options)
        .unwrap();

    let dest = Arc::new(MemoryTableStore::new());
    RestoreService::new(dest.clone())
        .restore_from_reader("orders", &bytes[..], &RestoreOptions::default())
        .unwrap();
    for row in dest.rows("orders") {
        assert!(!row.properties.contains("Payload"));
        assert!(!row.properties.contains("Ref"));
        assert!(row.properties.contains("Qty"));
    }
}
