//! Malformed and inconsistent snapshots are rejected.

use crate::common::*;
use std::sync::Arc;
use tablesnap::{
    BackupOptions, BackupService, CodecError, Error, MemoryTableStore, RestoreOptions,
    RestoreService, ValidationError,
};

fn snapshot_text(rows: usize) -> String {
    let source = store_with("orders", partition("p", rows));
    let (_, bytes) = BackupService::new(source)
        .backup_table_to_writer("orders", Vec::new(), &BackupOptions::default())
        .unwrap();
    String::from_utf8(bytes).unwrap()
}

fn restore(text: &str) -> (Arc<MemoryTableStore>, tablesnap::Result<String>) {
    let dest = Arc::new(MemoryTableStore::new());
    let outcome = RestoreService::new(dest.clone()).restore_from_reader(
        "orders",
        text.as_bytes(),
        &RestoreOptions::default(),
    );
    (dest, outcome)
}

#[test]
fn test_footer_claims_more_rows_than_present() {
    let text = snapshot_text(4).replace(r#""RecordCount":4"#, r#""RecordCount":5"#);
    let (_, outcome) = restore(&text);
    assert!(matches!(
        outcome,
        Err(Error::Validation(ValidationError::CountMismatch { expected: 5, actual: 4 }))
    ));
}

#[test]
fn test_truncated_snapshot_is_missing_footer() {
    let text = snapshot_text(3);
    let truncated: String = text.lines().take(3).map(|l| format!("{}\n", l)).collect();
    let (dest, outcome) = restore(&truncated);
    assert!(matches!(outcome, Err(Error::Validation(ValidationError::MissingFooter))));
    // Rows still buffered in the open batch are never submitted
    assert!(dest.rows("orders").is_empty());
}

#[test]
fn test_snapshot_without_header() {
    let text = snapshot_text(2);
    let headless: String = text.lines().skip(1).map(|l| format!("{}\n", l)).collect();
    let (_, outcome) = restore(&headless);
    assert!(matches!(outcome, Err(Error::Validation(ValidationError::MissingHeader))));
}

#[test]
fn test_untyped_property_is_codec_error() {
    let text = snapshot_text(1).replace(r#","EdmType":"Int32""#, "");
    let (_, outcome) = restore(&text);
    match outcome {
        Err(Error::Codec {
            line,
            source: CodecError::MissingEdmType { property },
        }) => {
            assert_eq!(property, "Qty");
            assert_eq!(line, Some(2));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_marker_text_inside_row_data_is_not_a_frame() {
    let source = store_with(
        "orders",
        vec![tablesnap::Row::new("p", "1")
            .with_property("Note", r#"{"ProcessingMetaData":"Footer"}"#)
            .unwrap()],
    );
    let (_, bytes) = BackupService::new(source)
        .backup_table_to_writer("orders", Vec::new(), &BackupOptions::default())
        .unwrap();
    let (dest, outcome) = restore(std::str::from_utf8(&bytes).unwrap());
    assert!(outcome.is_ok());
    assert_eq!(dest.rows("orders").len(), 1);
}
