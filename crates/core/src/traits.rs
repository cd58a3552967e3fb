//! Collaborator traits for table and object stores
//!
//! The backup and restore services never talk to a concrete store. They are
//! written against these traits so the same code drives the in-memory store
//! used in tests, the directory-backed store used by the CLI, or a remote
//! service client.
//!
//! Thread safety: every implementation must be `Send + Sync`. Backing up all
//! tables runs one backup per table on separate threads sharing one store.

use crate::error::StoreResult;
use crate::filter::Filter;
use crate::row::{Batch, Row};
use std::io::{Read, Write};
use std::path::Path;

/// Opaque token for the next page of a query
pub type Continuation = String;

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct TablePage {
    /// Rows in `(PartitionKey, RowKey)` order
    pub rows: Vec<Row>,
    /// Present when more rows remain
    pub continuation: Option<Continuation>,
}

/// Read side of a table store
pub trait TableSource: Send + Sync {
    /// Names of all tables
    fn list_tables(&self) -> StoreResult<Vec<String>>;

    /// Fetch up to `page_size` rows matching `filters`.
    ///
    /// Pass `None` to start, then the returned continuation until it is
    /// `None`. Filters are left-associated as described in
    /// [`crate::filter`].
    ///
    /// # Errors
    ///
    /// `TableNotFound` if the table does not exist.
    fn query_page(
        &self,
        table: &str,
        filters: &[Filter],
        page_size: usize,
        continuation: Option<&str>,
    ) -> StoreResult<TablePage>;
}

/// Write side of a table store
pub trait TableStore: TableSource {
    /// Create the table unless it already exists
    fn create_table_if_not_exists(&self, table: &str) -> StoreResult<()>;

    /// Upsert every row of the batch in one atomic transaction.
    ///
    /// Rows replace any existing row with the same key. Either all rows are
    /// written or none are.
    fn submit_transaction(&self, table: &str, batch: &Batch) -> StoreResult<()>;
}

/// An object being written; nothing is visible until `finish` succeeds
pub trait ObjectWrite: Write + Send {
    /// Commit the object
    fn finish(self: Box<Self>) -> StoreResult<()>;
}

/// Blob container store
pub trait ObjectStore: Send + Sync {
    /// Create the container unless it already exists
    fn create_container_if_not_exists(&self, container: &str) -> StoreResult<()>;

    /// True if the container exists
    fn container_exists(&self, container: &str) -> StoreResult<bool>;

    /// Stream an object's bytes
    fn open_read(&self, container: &str, name: &str) -> StoreResult<Box<dyn Read + Send>>;

    /// Start writing an object, replacing any existing one on `finish`
    fn open_write(&self, container: &str, name: &str) -> StoreResult<Box<dyn ObjectWrite>>;

    /// Upload a local file as an object
    fn upload_file(&self, container: &str, name: &str, path: &Path) -> StoreResult<()> {
        let mut file = std::fs::File::open(path)?;
        let mut writer = self.open_write(container, name)?;
        std::io::copy(&mut file, &mut writer)?;
        writer.finish()
    }

    /// Download an object to a local file
    fn download_to(&self, container: &str, name: &str, path: &Path) -> StoreResult<()> {
        let mut reader = self.open_read(container, name)?;
        let mut file = std::fs::File::create(path)?;
        std::io::copy(&mut reader, &mut file)?;
        file.sync_all()?;
        Ok(())
    }

    /// Delete an object; returns whether it existed
    fn delete_if_exists(&self, container: &str, name: &str) -> StoreResult<bool>;

    /// Object names directly under `prefix` (not recursive)
    fn list(&self, container: &str, prefix: &str) -> StoreResult<Vec<String>>;
}
