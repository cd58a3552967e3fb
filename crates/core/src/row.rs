//! Rows and transactional batches
//!
//! A [`Row`] is addressed by `(PartitionKey, RowKey)` and carries an ordered
//! set of typed properties. A [`Batch`] is a non-empty run of rows sharing one
//! partition key; it is the unit of atomic submission to a table store.

use crate::error::CodecError;
use crate::value::TypedValue;
use chrono::{DateTime, Utc};

/// Reserved field: partition key
pub const PARTITION_KEY: &str = "PartitionKey";
/// Reserved field: row key
pub const ROW_KEY: &str = "RowKey";
/// Reserved field: server timestamp
pub const TIMESTAMP: &str = "Timestamp";
/// Reserved field: opaque version token
pub const ETAG: &str = "ETag";

/// Names that can never be used for a property
pub const RESERVED_FIELDS: [&str; 4] = [PARTITION_KEY, ROW_KEY, TIMESTAMP, ETAG];

/// True if `name` is one of the four reserved fields
pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Ordered property map with unique names.
///
/// Insertion order is kept so that a decoded row compares equal to the row
/// that was encoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, TypedValue)>,
}

impl Properties {
    /// Empty property map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no properties
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a property by name
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// True if a property with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace a property, returning the previous value.
    ///
    /// A replaced property keeps its original position.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<TypedValue>,
    ) -> Result<Option<TypedValue>, CodecError> {
        let name = name.into();
        if is_reserved(&name) {
            return Err(CodecError::ReservedProperty(name));
        }
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            return Ok(Some(std::mem::replace(&mut slot.1, value)));
        }
        self.entries.push((name, value));
        Ok(None)
    }

    /// Remove a property by name
    pub fn remove(&mut self, name: &str) -> Option<TypedValue> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a str, &'a TypedValue);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, TypedValue)>,
        fn(&'a (String, TypedValue)) -> (&'a str, &'a TypedValue),
    >;

    fn into_iter(self) -> Self::IntoIter {
        let split: fn(&'a (String, TypedValue)) -> (&'a str, &'a TypedValue) =
            |(n, v)| (n.as_str(), v);
        self.entries.iter().map(split)
    }
}

/// One table row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Partition key (never null)
    pub partition_key: String,
    /// Row key (never null)
    pub row_key: String,
    /// Last-modified time assigned by the store
    pub timestamp: Option<DateTime<Utc>>,
    /// Opaque version token
    pub etag: Option<String>,
    /// Typed properties
    pub properties: Properties,
}

impl Row {
    /// Row with no timestamp, etag or properties
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Row {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            timestamp: None,
            etag: None,
            properties: Properties::new(),
        }
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the etag
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Add a property; fails on a reserved name
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<TypedValue>,
    ) -> Result<Self, CodecError> {
        self.properties.insert(name, value)?;
        Ok(self)
    }

    /// `(PartitionKey, RowKey)`
    pub fn key(&self) -> (&str, &str) {
        (&self.partition_key, &self.row_key)
    }
}

/// Rows sharing one partition key, submitted as a single transaction.
///
/// Never empty. The size cap is enforced by whoever builds the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    partition_key: String,
    rows: Vec<Row>,
}

impl Batch {
    /// Start a batch with its first row
    pub fn new(first: Row) -> Self {
        Batch {
            partition_key: first.partition_key.clone(),
            rows: vec![first],
        }
    }

    /// Append a row; hands the row back if its partition key differs
    pub fn try_push(&mut self, row: Row) -> Result<(), Row> {
        if row.partition_key != self.partition_key {
            return Err(row);
        }
        self.rows.push(row);
        Ok(())
    }

    /// Shared partition key
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Rows in submission order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows (always >= 1)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Take the rows out
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}
