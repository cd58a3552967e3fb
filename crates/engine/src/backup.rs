//! Backup orchestration
//!
//! [`backup_table_to_writer`] is the core loop: page through a source table
//! and stream every row into a framed snapshot. [`BackupService`] builds the
//! file and object-store variants on top of it.
//!
//! Failures abort the current backup immediately. Output already written is
//! not rolled back, but file backups go through a temp file that is only
//! renamed into place once the snapshot is complete.

use crate::cleanup::{remove_scratch, with_cleanup};
use crate::options::BackupOptions;
use crate::paths;
use chrono::Local;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tablesnap_core::{filter_expression, Error, ObjectStore, Result, TableSource, ValidationError};
use tablesnap_snapshot::{open_source, EntityCodec, SnapshotReader, SnapshotSink, SnapshotWriter};
use tracing::{debug, info, warn};

/// Stream one table into `sink` as a snapshot.
///
/// Compression follows `options.compress`. Returns the number of rows
/// written together with the sink, flushed and (if compressed) with the gzip
/// trailer written.
pub fn backup_table_to_writer<W: Write>(
    source: &dyn TableSource,
    table: &str,
    sink: W,
    options: &BackupOptions,
) -> Result<(i64, W)> {
    if table.trim().is_empty() {
        return Err(Error::parameter("TableName is missing."));
    }
    options.validate()?;
    let cancel = &options.cancellation;
    cancel.check()?;

    if let Some(expr) = filter_expression(&options.filters) {
        debug!(target: "tablesnap::backup", table, filter = %expr, "Querying with filter");
    }
    let codec = EntityCodec::with_excluded(options.excluded_properties.iter().cloned());
    let mut writer = SnapshotWriter::open(SnapshotSink::new(sink, options.compress), table, codec)?;

    let mut continuation: Option<String> = None;
    let mut pages = 0u64;
    loop {
        cancel.check()?;
        let page = source.query_page(
            table,
            &options.filters,
            options.page_size,
            continuation.as_deref(),
        )?;
        pages += 1;
        debug!(target: "tablesnap::backup", table, page = pages, rows = page.rows.len(), "Fetched page");
        for row in &page.rows {
            cancel.check()?;
            writer.write_row(row)?;
        }
        match page.continuation {
            Some(next) => continuation = Some(next),
            None => break,
        }
    }

    let (count, sink) = writer.finish()?;
    let sink = sink.finish()?;
    info!(target: "tablesnap::backup", table, count, "Table streamed");
    Ok((count, sink))
}

/// Backup entry points bound to a source table store and an optional object store
pub struct BackupService {
    source: Arc<dyn TableSource>,
    objects: Option<Arc<dyn ObjectStore>>,
}

impl BackupService {
    /// Service reading from `source`
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        BackupService {
            source,
            objects: None,
        }
    }

    /// Enable the object-store operations
    pub fn with_object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    /// Stream one table into `sink`; see [`backup_table_to_writer`]
    pub fn backup_table_to_writer<W: Write>(
        &self,
        table: &str,
        sink: W,
        options: &BackupOptions,
    ) -> Result<(i64, W)> {
        backup_table_to_writer(self.source.as_ref(), table, sink, options)
            .map_err(|e| e.into_operation_failed(format!("Table '{}' backup failed.", table)))
    }

    /// Back up a table into `{Table}_Backup_{timestamp}.txt` (or `.7z`) in
    /// `out_dir` and return the file name.
    ///
    /// `out_dir` must be an existing absolute directory. With
    /// `options.validate` the finished file is read back and its footer
    /// checked against the number of rows written.
    pub fn backup_table_to_file(
        &self,
        table: &str,
        out_dir: &Path,
        options: &BackupOptions,
    ) -> Result<String> {
        check_table(table)?;
        check_out_dir(out_dir)?;
        options.validate()?;

        self.write_file(table, out_dir, options)
            .map_err(|e| e.into_operation_failed(format!("Table '{}' backup failed.", table)))
    }

    /// Back up a table to a local file, upload it to
    /// `{blobroot}-table-{table}/{file}` in container `blob_root`, then delete
    /// the local file.
    pub fn backup_table_to_blob(
        &self,
        table: &str,
        blob_root: &str,
        out_dir: &Path,
        options: &BackupOptions,
    ) -> Result<String> {
        check_table(table)?;
        check_blob_root(blob_root)?;
        check_out_dir(out_dir)?;
        options.validate()?;
        let objects = self.objects()?;

        let outcome = (|| -> Result<String> {
            let file_name = self.write_file(table, out_dir, options)?;
            let local = out_dir.join(&file_name);
            let container = paths::container_name(blob_root);
            let object = paths::table_object_name(blob_root, table, &file_name);

            let uploaded = objects
                .create_container_if_not_exists(&container)
                .and_then(|()| objects.upload_file(&container, &object, &local))
                .map_err(Error::from);
            let cleanup = remove_scratch(&local);
            with_cleanup(uploaded, cleanup, &local)?;

            info!(target: "tablesnap::backup", table, container = %container, object = %object, "Snapshot uploaded");
            Ok(format!(
                "Table '{}' backed up as '{}' under blob '{}/{}'.",
                table,
                file_name,
                blob_root,
                paths::table_folder(blob_root, table)
            ))
        })();
        outcome.map_err(|e| e.into_operation_failed(format!("Table '{}' backup failed.", table)))
    }

    /// Stream a table straight into an object.
    ///
    /// The object is `{folder}/{file_name}.txt` (plus `.7z` when compressed)
    /// in container `blob_root`. `folder` defaults to
    /// `{blobroot}-table-{table}` and `file_name` to
    /// `{Table}_Backup_{timestamp}`. Nothing is visible until the whole
    /// snapshot has been written.
    ///
    /// With `options.validate` the committed object is read back and its
    /// footer checked against the rows written; an object that fails the
    /// check is deleted before the error is returned.
    pub fn backup_table_to_blob_direct(
        &self,
        table: &str,
        blob_root: &str,
        folder: Option<&str>,
        file_name: Option<&str>,
        options: &BackupOptions,
    ) -> Result<String> {
        check_table(table)?;
        check_blob_root(blob_root)?;
        options.validate()?;
        let objects = self.objects()?;

        let folder = folder
            .map(str::to_string)
            .unwrap_or_else(|| paths::table_folder(blob_root, table));
        let file_name = file_name
            .map(str::to_string)
            .unwrap_or_else(|| paths::backup_base_name(table, &Local::now()));
        let object = paths::direct_object_name(&folder, &file_name, options.compress);
        let container = paths::container_name(blob_root);

        let outcome = (|| -> Result<String> {
            objects.create_container_if_not_exists(&container)?;
            let out = objects.open_write(&container, &object)?;
            let (count, out) = backup_table_to_writer(self.source.as_ref(), table, out, options)?;
            out.finish()?;
            if options.validate {
                let checked = objects
                    .open_read(&container, &object)
                    .map_err(Error::from)
                    .and_then(|reader| validate_snapshot(reader, table, count, options.compress));
                if let Err(e) = checked {
                    if let Err(cleanup) = objects.delete_if_exists(&container, &object) {
                        warn!(target: "tablesnap::backup", object = %object, error = %cleanup, "Could not delete unvalidated snapshot");
                    }
                    return Err(e);
                }
            }
            info!(target: "tablesnap::backup", table, count, container = %container, object = %object, "Snapshot written to object store");
            Ok(format!(
                "Table '{}' backed up as '{}' under blob '{}'.",
                table, object, blob_root
            ))
        })();
        outcome.map_err(|e| e.into_operation_failed(format!("Table '{}' backup failed.", table)))
    }

    /// Back up every table straight into the object store.
    ///
    /// Tables are backed up concurrently, each with its own writer. With a
    /// `folder`, each object is `{folder}/{Table}.txt`; without one, the
    /// per-table defaults of [`Self::backup_table_to_blob_direct`] apply.
    /// Per-table summaries are joined with `|`.
    pub fn backup_all_tables_to_blob(
        &self,
        blob_root: &str,
        folder: Option<&str>,
        options: &BackupOptions,
    ) -> Result<String> {
        check_blob_root(blob_root)?;
        options.validate()?;
        self.objects()?;

        let outcome = (|| -> Result<String> {
            let mut tables = self.source.list_tables()?;
            if tables.is_empty() {
                return Ok("No Tables found.".to_string());
            }
            tables.sort();
            info!(target: "tablesnap::backup", tables = tables.len(), blob_root, "Backing up all tables");

            let results = tables
                .par_iter()
                .map(|table| {
                    let file_name = folder.map(|_| table.as_str());
                    self.backup_table_to_blob_direct(table, blob_root, folder, file_name, options)
                })
                .collect::<Result<Vec<String>>>()?;
            Ok(results.join("|"))
        })();
        outcome.map_err(|e| {
            e.into_operation_failed(format!("Backup of all tables to blob '{}' failed.", blob_root))
        })
    }

    fn objects(&self) -> Result<&dyn ObjectStore> {
        self.objects
            .as_deref()
            .ok_or_else(|| Error::parameter("No object store configured."))
    }

    /// Write the snapshot file through a temp name, validating if asked
    fn write_file(&self, table: &str, out_dir: &Path, options: &BackupOptions) -> Result<String> {
        let file_name = paths::backup_file_name(table, &Local::now(), options.compress);
        let final_path = out_dir.join(&file_name);
        let temp_path = out_dir.join(format!(".{}.tmp", file_name));

        let written = (|| -> Result<i64> {
            let file = BufWriter::new(File::create(&temp_path)?);
            let (count, file) = backup_table_to_writer(self.source.as_ref(), table, file, options)?;
            file.into_inner()
                .map_err(|e| Error::Io(e.into_error()))?
                .sync_all()?;
            if options.validate {
                validate_snapshot(File::open(&temp_path)?, table, count, options.compress)?;
            }
            fs::rename(&temp_path, &final_path)?;
            Ok(count)
        })();

        match written {
            Ok(count) => {
                info!(target: "tablesnap::backup", table, count, path = %final_path.display(), "Snapshot file written");
                Ok(file_name)
            }
            Err(e) => {
                let cleanup = remove_scratch(&temp_path);
                with_cleanup(Err(e), cleanup, &temp_path)
            }
        }
    }
}

/// Re-read a finished snapshot and compare its footer with what was written
fn validate_snapshot<R: Read>(raw: R, table: &str, written: i64, compressed: bool) -> Result<()> {
    let summary = SnapshotReader::new(open_source(raw, compressed))
        .with_expected_table(table)
        .validate()?;
    if summary.record_count != written {
        return Err(ValidationError::CountMismatch {
            expected: written,
            actual: summary.record_count,
        }
        .into());
    }
    debug!(target: "tablesnap::backup", table, count = written, "Snapshot validated");
    Ok(())
}

fn check_table(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        return Err(Error::parameter("TableName is missing."));
    }
    Ok(())
}

fn check_blob_root(blob_root: &str) -> Result<()> {
    if blob_root.trim().is_empty() {
        return Err(Error::parameter("BlobRoot is missing."));
    }
    Ok(())
}

fn check_out_dir(out_dir: &Path) -> Result<()> {
    if out_dir.as_os_str().is_empty() {
        return Err(Error::parameter("OutFileDirectory is missing."));
    }
    if !out_dir.is_absolute() {
        return Err(Error::parameter(format!(
            "Invalid output directory '{}' specified.",
            out_dir.display()
        )));
    }
    if !out_dir.is_dir() {
        return Err(Error::parameter("OutFileDirectory does not exist."));
    }
    Ok(())
}
