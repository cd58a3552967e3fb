//! Restore orchestration
//!
//! [`restore_from_reader`] drives a snapshot stream through a
//! [`PartitionBatcher`] into a table store. Each batch is one store
//! transaction, so a restore is atomic per batch only: when a later batch
//! fails, the batches before it stay committed and the destination table is
//! left partially populated.
//!
//! Rows are upserts keyed by `(PartitionKey, RowKey)`, so replaying the same
//! snapshot converges to the same table contents.

use crate::batcher::PartitionBatcher;
use crate::cleanup::{remove_scratch, with_cleanup};
use crate::options::{RestoreOptions, DIRECT_BATCH_SIZE, FILE_BATCH_SIZE};
use crate::paths;
use std::fs::File;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tablesnap_core::{Batch, Error, ObjectStore, Result, StoreError, TableStore, ValidationError};
use tablesnap_snapshot::{is_compressed_name, open_source, SnapshotReader, SnapshotRecord};
use tracing::{debug, info};

/// Restore a snapshot stream into `table`, returning the number of rows written.
///
/// The destination table is created if absent. The batch cap is
/// `options.batch_size`, or [`DIRECT_BATCH_SIZE`] when unset.
pub fn restore_from_reader<R: BufRead>(
    store: &dyn TableStore,
    table: &str,
    source: R,
    options: &RestoreOptions,
) -> Result<i64> {
    restore_stream(store, table, source, options, DIRECT_BATCH_SIZE)
}

fn restore_stream<R: BufRead>(
    store: &dyn TableStore,
    table: &str,
    source: R,
    options: &RestoreOptions,
    default_batch_size: usize,
) -> Result<i64> {
    if table.trim().is_empty() {
        return Err(Error::parameter("DestinationTableName is missing."));
    }
    let batch_size = options.batch_size_or(default_batch_size)?;
    let cancel = &options.cancellation;
    cancel.check()?;

    store.create_table_if_not_exists(table)?;

    let mut reader = SnapshotReader::new(source);
    if let Some(expected) = &options.expected_table {
        reader = reader.with_expected_table(expected.clone());
    }

    let mut batcher = PartitionBatcher::new(batch_size, |batch: Batch| -> Result<()> {
        cancel.check()?;
        debug!(target: "tablesnap::batch", table, partition_key = batch.partition_key(), rows = batch.len(), "Submitting batch");
        store
            .submit_transaction(table, &batch)
            .map_err(|source| submission_error(table, &batch, source))
    });

    let mut footer_count = None;
    for record in reader {
        match record? {
            SnapshotRecord::Header { table_name } => {
                info!(target: "tablesnap::restore", source_table = %table_name, table, "Restoring snapshot");
            }
            SnapshotRecord::Detail(row) => {
                cancel.check()?;
                batcher.push(row)?;
            }
            SnapshotRecord::Footer { record_count, .. } => {
                footer_count = Some(record_count);
            }
        }
    }

    let submitted = batcher.finish()? as i64;
    let expected = footer_count.ok_or(ValidationError::MissingFooter)?;
    if submitted != expected {
        return Err(ValidationError::CountMismatch {
            expected,
            actual: submitted,
        }
        .into());
    }
    info!(target: "tablesnap::restore", table, count = submitted, "Restore complete");
    Ok(submitted)
}

/// Transport failures keep their classification; anything else is a rejected batch
fn submission_error(table: &str, batch: &Batch, source: StoreError) -> Error {
    match source {
        StoreError::Connection(msg) => Error::Connection(msg),
        source => Error::BatchSubmission {
            table: table.to_string(),
            partition_key: batch.partition_key().to_string(),
            rows: batch.len(),
            source,
        },
    }
}

fn summary(table: &str, count: i64) -> String {
    format!("Restore to table '{}' successful; {} entries.", table, count)
}

/// Restore entry points bound to a destination table store and an optional object store
pub struct RestoreService {
    store: Arc<dyn TableStore>,
    objects: Option<Arc<dyn ObjectStore>>,
}

impl RestoreService {
    /// Service writing into `store`
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        RestoreService { store, objects: None }
    }

    /// Enable the object-store operations
    pub fn with_object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    /// Restore a snapshot stream; see [`restore_from_reader`]
    pub fn restore_from_reader<R: BufRead>(
        &self,
        table: &str,
        source: R,
        options: &RestoreOptions,
    ) -> Result<String> {
        restore_from_reader(self.store.as_ref(), table, source, options)
            .map(|count| summary(table, count))
            .map_err(|e| e.into_operation_failed(restore_failed(table)))
    }

    /// Restore from a local snapshot file.
    ///
    /// `path` must be absolute and exist. Names ending in `.7z` are
    /// gunzipped. The default batch cap is [`FILE_BATCH_SIZE`].
    pub fn restore_table_from_file(
        &self,
        table: &str,
        path: &Path,
        options: &RestoreOptions,
    ) -> Result<String> {
        check_destination(table)?;
        check_snapshot_file(path)?;
        options.batch_size_or(FILE_BATCH_SIZE)?;

        self.restore_file(table, path, options)
            .map(|count| summary(table, count))
            .map_err(|e| e.into_operation_failed(restore_failed(table)))
    }

    /// Download `{blobroot}-table-{original}/{blob_file}` into `working_dir`,
    /// restore it into `table`, and delete the downloaded copy.
    ///
    /// The downloaded copy is removed whether or not the restore succeeds.
    pub fn restore_table_from_blob(
        &self,
        table: &str,
        original_table: &str,
        blob_root: &str,
        working_dir: &Path,
        blob_file: &str,
        options: &RestoreOptions,
    ) -> Result<String> {
        check_destination(table)?;
        check_original(original_table)?;
        check_blob_root(blob_root)?;
        check_blob_file(blob_file)?;
        if !working_dir.is_absolute() || !working_dir.is_dir() {
            return Err(Error::parameter(format!(
                "Working directory '{}' does not exist.",
                working_dir.display()
            )));
        }
        options.batch_size_or(FILE_BATCH_SIZE)?;
        let objects = self.objects()?;

        let container = paths::container_name(blob_root);
        let object = paths::table_object_name(blob_root, original_table, blob_file);
        let base = blob_file.rsplit('/').next().unwrap_or(blob_file);
        let scratch = working_dir.join(format!(".{}-{}", uuid::Uuid::new_v4(), base));

        let restored = objects
            .download_to(&container, &object, &scratch)
            .map_err(Error::from)
            .and_then(|()| {
                debug!(target: "tablesnap::restore", object = %object, path = %scratch.display(), "Snapshot downloaded");
                self.restore_file(table, &scratch, options)
            });
        let cleanup = remove_scratch(&scratch);
        with_cleanup(restored, cleanup, &scratch)
            .map(|count| summary(table, count))
            .map_err(|e| e.into_operation_failed(restore_failed(table)))
    }

    /// Stream `{blobroot}-table-{original}/{blob_file}` straight into `table`,
    /// gunzipping on the fly when the name ends in `.7z`.
    pub fn restore_table_from_blob_direct(
        &self,
        table: &str,
        original_table: &str,
        blob_root: &str,
        blob_file: &str,
        options: &RestoreOptions,
    ) -> Result<String> {
        check_destination(table)?;
        check_original(original_table)?;
        check_blob_root(blob_root)?;
        check_blob_file(blob_file)?;
        options.batch_size_or(DIRECT_BATCH_SIZE)?;
        let objects = self.objects()?;

        let container = paths::container_name(blob_root);
        let object = paths::table_object_name(blob_root, original_table, blob_file);
        self.restore_object(objects, &container, &object, table, options)
            .map(|count| summary(table, count))
            .map_err(|e| e.into_operation_failed(restore_failed(table)))
    }

    /// Restore every snapshot directly under `folder` of container
    /// `blob_root`, each into the table named by its file stem.
    ///
    /// Snapshots are restored one after another; per-table summaries are
    /// joined with newlines.
    pub fn restore_all_tables_from_blob(
        &self,
        blob_root: &str,
        folder: &str,
        options: &RestoreOptions,
    ) -> Result<String> {
        check_blob_root(blob_root)?;
        options.batch_size_or(DIRECT_BATCH_SIZE)?;
        let objects = self.objects()?;
        let container = paths::container_name(blob_root);

        let outcome = (|| -> Result<String> {
            if !objects.container_exists(&container)? {
                return Err(Error::OperationFailed {
                    message: format!("Blob container '{}' does not exist.", container),
                    source: Box::new(Error::Store(StoreError::ObjectNotFound(container.clone()))),
                });
            }
            let mut results = Vec::new();
            for object in objects.list(&container, folder)? {
                let table = paths::table_name_from_object(&object);
                let count = self
                    .restore_object(objects, &container, &object, table, options)
                    .map_err(|e| e.into_operation_failed(restore_failed(table)))?;
                results.push(summary(table, count));
            }
            Ok(results.join("\n"))
        })();
        outcome.map_err(|e| {
            e.into_operation_failed(format!("Restore of all tables from blob '{}' failed.", blob_root))
        })
    }

    fn objects(&self) -> Result<&dyn ObjectStore> {
        self.objects
            .as_deref()
            .ok_or_else(|| Error::parameter("No object store configured."))
    }

    fn restore_file(&self, table: &str, path: &Path, options: &RestoreOptions) -> Result<i64> {
        let compressed = is_compressed_name(&path.to_string_lossy());
        let source = open_source(File::open(path)?, compressed);
        restore_stream(self.store.as_ref(), table, source, options, FILE_BATCH_SIZE)
    }

    fn restore_object(
        &self,
        objects: &dyn ObjectStore,
        container: &str,
        object: &str,
        table: &str,
        options: &RestoreOptions,
    ) -> Result<i64> {
        let source = open_source(objects.open_read(container, object)?, is_compressed_name(object));
        debug!(target: "tablesnap::restore", container, object, table, "Streaming snapshot object");
        restore_stream(self.store.as_ref(), table, source, options, DIRECT_BATCH_SIZE)
    }
}

fn restore_failed(table: &str) -> String {
    format!("Table '{}' restore failed.", table)
}

fn check_destination(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        return Err(Error::parameter("DestinationTableName is missing."));
    }
    Ok(())
}

fn check_original(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        return Err(Error::parameter("OriginalTableName is missing."));
    }
    Ok(())
}

fn check_blob_root(blob_root: &str) -> Result<()> {
    if blob_root.trim().is_empty() {
        return Err(Error::parameter("BlobRoot is missing."));
    }
    Ok(())
}

fn check_blob_file(blob_file: &str) -> Result<()> {
    if blob_file.trim().is_empty() {
        return Err(Error::parameter("BlobFileName is missing."));
    }
    Ok(())
}

fn check_snapshot_file(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::parameter(format!(
            "Invalid file name/path '{}' specified.",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(Error::parameter(format!(
            "File '{}' does not exist.",
            path.display()
        )));
    }
    Ok(())
}
