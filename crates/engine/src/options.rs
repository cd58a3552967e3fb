//! Per-call options for backup and restore

use crate::cancel::CancellationToken;
use tablesnap_core::{Error, Filter, Result};

/// Rows fetched per source query page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Batch cap for restores that stream from an object or reader
pub const DIRECT_BATCH_SIZE: usize = 100;

/// Batch cap for restores from a local snapshot file
pub const FILE_BATCH_SIZE: usize = 98;

/// Largest transaction a table store accepts
pub const MAX_BATCH_SIZE: usize = 100;

/// Options for a backup
#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Gzip the snapshot
    pub compress: bool,
    /// Re-read a file backup and check its footer
    pub validate: bool,
    /// Rows per source query page
    pub page_size: usize,
    /// Row filters passed to the source query
    pub filters: Vec<Filter>,
    /// Properties left out of every encoded row
    pub excluded_properties: Vec<String>,
    /// Cancellation signal
    pub cancellation: CancellationToken,
}

impl Default for BackupOptions {
    fn default() -> Self {
        BackupOptions {
            compress: false,
            validate: false,
            page_size: DEFAULT_PAGE_SIZE,
            filters: Vec::new(),
            excluded_properties: Vec::new(),
            cancellation: CancellationToken::new(),
        }
    }
}

impl BackupOptions {
    /// Set compression
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set validate-on-backup
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Set the page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Add a filter
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Replace the filters
    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    /// Exclude a property from the snapshot
    pub fn with_excluded_property(mut self, name: impl Into<String>) -> Self {
        self.excluded_properties.push(name.into());
        self
    }

    /// Set the cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Check option values
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::parameter("Page size must be at least 1."));
        }
        tablesnap_core::validate_filters(&self.filters)
    }
}

/// Options for a restore
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Batch cap; `None` picks the per-operation default
    pub batch_size: Option<usize>,
    /// Table the snapshot header must name
    pub expected_table: Option<String>,
    /// Cancellation signal
    pub cancellation: CancellationToken,
}

impl RestoreOptions {
    /// Set the batch cap
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Require the snapshot to come from this table
    pub fn with_expected_table(mut self, table: impl Into<String>) -> Self {
        self.expected_table = Some(table.into());
        self
    }

    /// Set the cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Batch cap to use, falling back to `default`
    pub fn batch_size_or(&self, default: usize) -> Result<usize> {
        let size = self.batch_size.unwrap_or(default);
        check_batch_size(size)?;
        Ok(size)
    }
}

/// `1..=MAX_BATCH_SIZE`
pub fn check_batch_size(size: usize) -> Result<()> {
    if size == 0 || size > MAX_BATCH_SIZE {
        return Err(Error::parameter(format!(
            "Batch size {} is out of range (1..={}).",
            size, MAX_BATCH_SIZE
        )));
    }
    Ok(())
}
