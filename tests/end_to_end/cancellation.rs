//! Cancellation stops an operation with a distinguishable outcome.

use crate::common::*;
use std::sync::Arc;
use std::time::Duration;
use tablesnap::{
    BackupOptions, BackupService, CancellationToken, MemoryTableStore, RestoreOptions,
    RestoreService,
};

#[test]
fn test_expired_deadline_cancels_backup() {
    let source = store_with("orders", partition("p", 10));
    let options = BackupOptions::default().with_cancellation(CancellationToken::with_timeout(Duration::ZERO));
    let err = BackupService::new(source)
        .backup_table_to_writer("orders", Vec::new(), &options)
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn test_cancelled_restore_submits_nothing() {
    let source = store_with("orders", partition("p", 10));
    let (_, bytes) = BackupService::new(source)
        .backup_table_to_writer("orders", Vec::new(), &BackupOptions::default())
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let dest = Arc::new(MemoryTableStore::new());
    let err = RestoreService::new(dest.clone())
        .restore_from_reader("orders", &bytes[..], &RestoreOptions::default().with_cancellation(token))
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(dest.submitted_batches().is_empty());
}

#[test]
fn test_clones_share_cancellation() {
    let token = CancellationToken::new();
    let clone = token.clone();
    clone.cancel();
    assert!(token.is_cancelled());
}
