//! In-memory table store
//!
//! Enforces the same transaction rules as a real table service (one
//! partition key, at most [`MAX_BATCH_SIZE`] rows, existing table) so tests
//! exercise the batching constraints. Every accepted transaction is recorded,
//! and failures can be injected.

use crate::options::MAX_BATCH_SIZE;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tablesnap_core::{
    matches_all, Batch, Filter, Row, StoreError, StoreResult, TablePage, TableSource, TableStore,
};

type RowKey = (String, String);

/// Rows of one table in `(PartitionKey, RowKey)` order
pub(crate) type TableRows = BTreeMap<RowKey, Row>;

/// Accepted transaction, as recorded by [`MemoryTableStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedBatch {
    /// Destination table
    pub table: String,
    /// Shared partition key
    pub partition_key: String,
    /// Number of rows
    pub len: usize,
}

#[derive(Default)]
struct Inner {
    tables: BTreeMap<String, TableRows>,
    submitted: Vec<SubmittedBatch>,
    accept_transactions: Option<usize>,
    unreachable: bool,
}

/// Thread-safe in-memory table store
#[derive(Default)]
pub struct MemoryTableStore {
    inner: RwLock<Inner>,
}

impl MemoryTableStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `table` (if needed) and upsert `rows` without transaction checks
    pub fn insert_rows(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        let mut inner = self.inner.write();
        let entries = inner.tables.entry(table.to_string()).or_default();
        for row in rows {
            entries.insert(key_of(&row), row);
        }
    }

    /// All rows of a table in key order; empty if it does not exist
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner
            .read()
            .tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// True if the table exists
    pub fn has_table(&self, table: &str) -> bool {
        self.inner.read().tables.contains_key(table)
    }

    /// Accepted transactions in submission order
    pub fn submitted_batches(&self) -> Vec<SubmittedBatch> {
        self.inner.read().submitted.clone()
    }

    /// Accept `n` more transactions, then reject every one after
    pub fn fail_transactions_after(&self, n: usize) {
        self.inner.write().accept_transactions = Some(n);
    }

    /// Make every call fail with a connection error
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.write().unreachable = unreachable;
    }

    fn check_reachable(inner: &Inner) -> StoreResult<()> {
        if inner.unreachable {
            return Err(StoreError::Connection(
                "table store is unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn key_of(row: &Row) -> RowKey {
    (row.partition_key.clone(), row.row_key.clone())
}

pub(crate) fn encode_continuation(key: &RowKey) -> String {
    serde_json::to_string(key).unwrap_or_default()
}

pub(crate) fn decode_continuation(token: &str) -> StoreResult<RowKey> {
    serde_json::from_str(token)
        .map_err(|e| StoreError::rejected(format!("invalid continuation token: {}", e)))
}

/// One page of matching rows strictly after `continuation`
pub(crate) fn page_of(
    rows: &TableRows,
    filters: &[Filter],
    page_size: usize,
    continuation: Option<&str>,
) -> StoreResult<TablePage> {
    use std::ops::Bound;

    if page_size == 0 {
        return Err(StoreError::rejected("page size must be at least 1"));
    }
    let lower = match continuation {
        Some(token) => Bound::Excluded(decode_continuation(token)?),
        None => Bound::Unbounded,
    };
    let mut matching = rows
        .range((lower, Bound::Unbounded))
        .map(|(_, row)| row)
        .filter(|row| matches_all(filters, row))
        .peekable();

    let mut page = Vec::with_capacity(page_size.min(rows.len()));
    while page.len() < page_size {
        match matching.next() {
            Some(row) => page.push(row.clone()),
            None => break,
        }
    }
    let continuation = match (matching.peek(), page.last()) {
        (Some(_), Some(last)) => Some(encode_continuation(&key_of(last))),
        _ => None,
    };
    Ok(TablePage {
        rows: page,
        continuation,
    })
}

/// Transaction rules shared by the local stores
pub(crate) fn check_transaction(batch: &Batch) -> StoreResult<()> {
    if batch.is_empty() {
        return Err(StoreError::rejected("transaction is empty"));
    }
    if batch.len() > MAX_BATCH_SIZE {
        return Err(StoreError::rejected(format!(
            "transaction has {} rows; the limit is {}",
            batch.len(),
            MAX_BATCH_SIZE
        )));
    }
    if batch
        .rows()
        .iter()
        .any(|row| row.partition_key != batch.partition_key())
    {
        return Err(StoreError::rejected(
            "all rows in a transaction must share one partition key",
        ));
    }
    Ok(())
}

impl TableSource for MemoryTableStore {
    fn list_tables(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.read();
        Self::check_reachable(&inner)?;
        Ok(inner.tables.keys().cloned().collect())
    }

    fn query_page(
        &self,
        table: &str,
        filters: &[Filter],
        page_size: usize,
        continuation: Option<&str>,
    ) -> StoreResult<TablePage> {
        let inner = self.inner.read();
        Self::check_reachable(&inner)?;
        let rows = inner
            .tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        page_of(rows, filters, page_size, continuation)
    }
}

impl TableStore for MemoryTableStore {
    fn create_table_if_not_exists(&self, table: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        Self::check_reachable(&inner)?;
        inner.tables.entry(table.to_string()).or_default();
        Ok(())
    }

    fn submit_transaction(&self, table: &str, batch: &Batch) -> StoreResult<()> {
        let mut inner = self.inner.write();
        Self::check_reachable(&inner)?;
        check_transaction(batch)?;
        match inner.accept_transactions {
            Some(0) => return Err(StoreError::rejected("injected transaction failure")),
            Some(ref mut n) => *n -= 1,
            None => {}
        }
        let rows = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        for row in batch.rows() {
            rows.insert(key_of(row), row.clone());
        }
        inner.submitted.push(SubmittedBatch {
            table: table.to_string(),
            partition_key: batch.partition_key().to_string(),
            len: batch.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesnap_core::Comparison;

    fn seeded(n: usize) -> MemoryTableStore {
        let store = MemoryTableStore::new();
        store.insert_rows(
            "t",
            (0..n).map(|i| {
                Row::new(format!("p{}", i % 3), format!("{:04}", i))
                    .with_property("n", i as i64)
                    .unwrap()
            }),
        );
        store
    }

    fn drain(store: &MemoryTableStore, filters: &[Filter], page_size: usize) -> (Vec<Row>, usize) {
        let mut rows = Vec::new();
        let mut pages = 0;
        let mut token: Option<String> = None;
        loop {
            let page = store
                .query_page("t", filters, page_size, token.as_deref())
                .unwrap();
            pages += 1;
            rows.extend(page.rows);
            token = page.continuation;
            if token.is_none() {
                break;
            }
        }
        (rows, pages)
    }

    #[test]
    fn test_paging_visits_every_row_once() {
        let store = seeded(25);
        let (rows, pages) = drain(&store, &[], 10);
        assert_eq!(rows.len(), 25);
        assert_eq!(pages, 3);
        assert_eq!(rows, store.rows("t"));
    }

    #[test]
    fn test_exact_page_boundary_has_no_trailing_page() {
        let store = seeded(20);
        let (rows, pages) = drain(&store, &[], 10);
        assert_eq!(rows.len(), 20);
        assert_eq!(pages, 2);
    }

    #[test]
    fn test_filters_are_applied() {
        let store = seeded(30);
        let filters = vec![
            Filter::new("n", Comparison::GreaterThanOrEqual, "10"),
            Filter::new("n", Comparison::LessThan, "20"),
        ];
        let (rows, _) = drain(&store, &filters, 4);
        assert_eq!(rows.len(), 10);
    }

    #[test]
    fn test_unknown_table() {
        let store = MemoryTableStore::new();
        assert!(matches!(
            store.query_page("nope", &[], 10, None),
            Err(StoreError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_transaction_rules() {
        let store = MemoryTableStore::new();
        store.create_table_if_not_exists("t").unwrap();

        let mut batch = Batch::new(Row::new("p", "0"));
        for i in 1..=MAX_BATCH_SIZE {
            batch.try_push(Row::new("p", format!("{}", i))).unwrap();
        }
        assert!(matches!(
            store.submit_transaction("t", &batch),
            Err(StoreError::Rejected(_))
        ));
        assert!(store.rows("t").is_empty());

        let batch = Batch::new(Row::new("p", "0"));
        store.submit_transaction("t", &batch).unwrap();
        assert_eq!(store.submitted_batches().len(), 1);
    }

    #[test]
    fn test_upsert_replaces() {
        let store = MemoryTableStore::new();
        store.create_table_if_not_exists("t").unwrap();
        let first = Row::new("p", "r").with_property("v", 1i32).unwrap();
        let second = Row::new("p", "r").with_property("w", 2i32).unwrap();
        store.submit_transaction("t", &Batch::new(first)).unwrap();
        store.submit_transaction("t", &Batch::new(second.clone())).unwrap();
        assert_eq!(store.rows("t"), vec![second]);
    }

    #[test]
    fn test_injected_failure() {
        let store = MemoryTableStore::new();
        store.create_table_if_not_exists("t").unwrap();
        store.fail_transactions_after(1);
        assert!(store.submit_transaction("t", &Batch::new(Row::new("p", "1"))).is_ok());
        assert!(store.submit_transaction("t", &Batch::new(Row::new("p", "2"))).is_err());
        assert_eq!(store.rows("t").len(), 1);
    }

    #[test]
    fn test_unreachable() {
        let store = MemoryTableStore::new();
        store.set_unreachable(true);
        assert!(matches!(store.list_tables(), Err(StoreError::Connection(_))));
    }
}
