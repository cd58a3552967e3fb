//! Directory-backed table store
//!
//! Each table is one append-only log, `{root}/{table}.jsonl`. A transaction
//! appends its codec-encoded rows followed by a commit line
//! `{"Commit":<rows>}` in a single write, then syncs. Rows after the last
//! commit line belong to a write that never finished; they are ignored and
//! cut off before the next append.
//!
//! The first access to a table scans its log once into a key index mapping
//! `(PartitionKey, RowKey)` to the byte offset of the newest version of that
//! row. After that, a transaction costs one append and a page query reads
//! only the rows it returns (plus any the filters reject).

use super::memory::{check_transaction, decode_continuation, encode_continuation, key_of};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tablesnap_core::{
    matches_all, Batch, Filter, Row, StoreError, StoreResult, TablePage, TableSource, TableStore,
};
use tablesnap_snapshot::EntityCodec;
use tracing::{debug, warn};

const TABLE_EXTENSION: &str = "jsonl";

/// Closes a transaction in the log
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Commit {
    #[serde(rename = "Commit")]
    rows: usize,
}

/// Just the key of a logged row
#[derive(Deserialize)]
struct LoggedKey {
    #[serde(rename = "PartitionKey")]
    partition_key: String,
    #[serde(rename = "RowKey")]
    row_key: String,
}

/// Where each live row sits in a table's log
#[derive(Default)]
struct TableIndex {
    offsets: BTreeMap<(String, String), u64>,
    /// Length of the log up to and including the last commit line
    committed_len: u64,
}

/// Table store rooted at a directory
pub struct DirTableStore {
    root: PathBuf,
    codec: EntityCodec,
    indexes: Mutex<HashMap<String, Arc<RwLock<TableIndex>>>>,
}

impl DirTableStore {
    /// Open a store; the directory must exist
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::Connection(format!(
                "table store directory '{}' does not exist",
                root.display()
            )));
        }
        Ok(DirTableStore {
            root,
            codec: EntityCodec::new(),
            indexes: Mutex::new(HashMap::new()),
        })
    }

    /// Store directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, table: &str) -> StoreResult<PathBuf> {
        check_table_name(table)?;
        Ok(self.root.join(format!("{}.{}", table, TABLE_EXTENSION)))
    }

    /// The table's index, scanning its log on first use
    fn index(&self, table: &str) -> StoreResult<Arc<RwLock<TableIndex>>> {
        let path = self.table_path(table)?;
        let mut indexes = self.indexes.lock();
        if let Some(index) = indexes.get(table) {
            return Ok(index.clone());
        }
        let index = Arc::new(RwLock::new(scan_log(table, &path)?));
        indexes.insert(table.to_string(), index.clone());
        Ok(index)
    }

    fn read_row(&self, reader: &mut BufReader<File>, table: &str, offset: u64) -> StoreResult<Row> {
        reader.seek(SeekFrom::Start(offset))?;
        let mut line = String::new();
        reader.read_line(&mut line)?;
        self.codec
            .decode(line.trim_end())
            .map_err(|e| corrupt(table, offset, e))
    }
}

/// Build the index of a table's log, skipping an unfinished tail
fn scan_log(table: &str, path: &Path) -> StoreResult<TableIndex> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::TableNotFound(table.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);
    let mut index = TableIndex::default();
    let mut pending = Vec::new();
    let mut offset = 0u64;
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        let start = offset;
        offset += read as u64;
        if !line.ends_with('\n') {
            // torn final write
            break;
        }
        if let Ok(commit) = serde_json::from_str::<Commit>(&line) {
            if commit.rows != pending.len() {
                return Err(corrupt(
                    table,
                    start,
                    format!("commit of {} rows follows {}", commit.rows, pending.len()),
                ));
            }
            index.offsets.extend(pending.drain(..));
            index.committed_len = offset;
            continue;
        }
        let key: LoggedKey = serde_json::from_str(&line).map_err(|e| corrupt(table, start, e))?;
        pending.push(((key.partition_key, key.row_key), start));
    }
    if offset > index.committed_len {
        warn!(target: "tablesnap::store", table, bytes = offset - index.committed_len, "Ignoring uncommitted log tail");
    }
    debug!(target: "tablesnap::store", table, rows = index.offsets.len(), "Indexed table log");
    Ok(index)
}

fn corrupt(table: &str, offset: u64, reason: impl std::fmt::Display) -> StoreError {
    StoreError::rejected(format!(
        "table '{}' is corrupt at byte {}: {}",
        table, offset, reason
    ))
}

/// Table names: a letter followed by letters or digits
fn check_table_name(table: &str) -> StoreResult<()> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(StoreError::rejected(format!("invalid table name '{}'", table)))
    }
}

impl TableSource for DirTableStore {
    fn list_tables(&self) -> StoreResult<Vec<String>> {
        let mut tables = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tables.push(stem.to_string());
            }
        }
        tables.sort();
        Ok(tables)
    }

    fn query_page(
        &self,
        table: &str,
        filters: &[Filter],
        page_size: usize,
        continuation: Option<&str>,
    ) -> StoreResult<TablePage> {
        if page_size == 0 {
            return Err(StoreError::rejected("page size must be at least 1"));
        }
        let lower = match continuation {
            Some(token) => Bound::Excluded(decode_continuation(token)?),
            None => Bound::Unbounded,
        };
        let index = self.index(table)?;
        let index = index.read();
        let mut reader = BufReader::new(File::open(self.table_path(table)?)?);

        let mut rows = Vec::new();
        let mut more = false;
        for (_, &offset) in index.offsets.range((lower, Bound::Unbounded)) {
            let row = self.read_row(&mut reader, table, offset)?;
            if !matches_all(filters, &row) {
                continue;
            }
            if rows.len() == page_size {
                more = true;
                break;
            }
            rows.push(row);
        }
        let continuation = match rows.last() {
            Some(last) if more => Some(encode_continuation(&key_of(last))),
            _ => None,
        };
        Ok(TablePage { rows, continuation })
    }
}

impl TableStore for DirTableStore {
    fn create_table_if_not_exists(&self, table: &str) -> StoreResult<()> {
        let path = self.table_path(table)?;
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                file.sync_all()?;
                debug!(target: "tablesnap::store", table, "Created table");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn submit_transaction(&self, table: &str, batch: &Batch) -> StoreResult<()> {
        check_transaction(batch)?;
        let index = self.index(table)?;
        let mut index = index.write();

        let mut buf = Vec::new();
        let mut written = Vec::with_capacity(batch.len());
        for row in batch.rows() {
            let line = self
                .codec
                .encode(row)
                .map_err(|e| StoreError::rejected(e.to_string()))?;
            written.push((key_of(row), index.committed_len + buf.len() as u64));
            buf.extend_from_slice(line.as_bytes());
            buf.push(b'\n');
        }
        serde_json::to_writer(&mut buf, &Commit { rows: batch.len() })
            .map_err(|e| StoreError::Io(e.into()))?;
        buf.push(b'\n');

        let mut file = OpenOptions::new().write(true).open(self.table_path(table)?)?;
        file.set_len(index.committed_len)?;
        file.seek(SeekFrom::Start(index.committed_len))?;
        file.write_all(&buf)?;
        file.sync_data()?;

        index.committed_len += buf.len() as u64;
        index.offsets.extend(written);
        Ok(())
    }
}
