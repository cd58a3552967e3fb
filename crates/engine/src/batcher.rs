//! Partition-aware transactional batching
//!
//! A table store only accepts transactions whose rows share one partition key
//! and whose size is capped. The batcher turns an ordered row stream into the
//! fewest such batches that keep input order:
//!
//! - a change of partition key always closes the open batch
//! - reaching the cap always closes the open batch, even mid-partition
//! - whatever is open when the input ends is the final batch
//!
//! The rules live in the pure [`transition`] function over [`BatchState`].
//! [`PartitionBatcher`] drives it against a submit callback and
//! [`BatchIter`] drives it as an iterator adapter.

use tablesnap_core::{Batch, Row};

/// Open-batch state
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BatchState {
    /// Nothing buffered
    #[default]
    Empty,
    /// Rows buffered for one partition key, fewer than the cap
    Accumulating(Batch),
}

impl BatchState {
    /// Rows currently buffered
    pub fn len(&self) -> usize {
        match self {
            BatchState::Empty => 0,
            BatchState::Accumulating(batch) => batch.len(),
        }
    }

    /// True when nothing is buffered
    pub fn is_empty(&self) -> bool {
        matches!(self, BatchState::Empty)
    }

    /// Close the open batch, if any
    pub fn finish(self) -> Option<Batch> {
        match self {
            BatchState::Empty => None,
            BatchState::Accumulating(batch) => Some(batch),
        }
    }
}

/// Feed one row; returns the next state and a batch that must be flushed now.
///
/// `state` must come from earlier calls with the same `cap`. At most one
/// batch is ever returned per row: a full batch is flushed as
/// soon as it fills, so the open batch is always below `cap`.
///
/// # Panics
///
/// Panics if `cap` is zero.
pub fn transition(state: BatchState, row: Row, cap: usize) -> (BatchState, Option<Batch>) {
    assert!(cap > 0, "batch cap must be at least 1");
    let (open, flushed) = match state {
        BatchState::Empty => (Batch::new(row), None),
        BatchState::Accumulating(mut batch) => match batch.try_push(row) {
            Ok(()) => (batch, None),
            Err(row) => (Batch::new(row), Some(batch)),
        },
    };
    if open.len() >= cap {
        // An open batch is always below cap, so `flushed` is None here.
        debug_assert!(flushed.is_none());
        return (BatchState::Empty, Some(open));
    }
    (BatchState::Accumulating(open), flushed)
}

/// Push-style batcher bound to a submit callback
pub struct PartitionBatcher<F> {
    cap: usize,
    state: BatchState,
    submit: F,
    rows_submitted: u64,
    batches_submitted: u64,
}

impl<F, E> PartitionBatcher<F>
where
    F: FnMut(Batch) -> Result<(), E>,
{
    /// Batcher that calls `submit` for every completed batch
    ///
    /// # Panics
    ///
    /// Panics if `cap` is zero.
    pub fn new(cap: usize, submit: F) -> Self {
        assert!(cap > 0, "batch cap must be at least 1");
        PartitionBatcher {
            cap,
            state: BatchState::Empty,
            submit,
            rows_submitted: 0,
            batches_submitted: 0,
        }
    }

    /// Add a row, submitting a batch if this row closes one
    pub fn push(&mut self, row: Row) -> Result<(), E> {
        let state = std::mem::take(&mut self.state);
        let (state, ready) = transition(state, row, self.cap);
        self.state = state;
        match ready {
            Some(batch) => self.flush(batch),
            None => Ok(()),
        }
    }

    /// Submit the open batch, if any, and return the number of rows submitted
    pub fn finish(mut self) -> Result<u64, E> {
        if let Some(batch) = std::mem::take(&mut self.state).finish() {
            self.flush(batch)?;
        }
        Ok(self.rows_submitted)
    }

    /// Rows handed to `submit` that it accepted
    pub fn rows_submitted(&self) -> u64 {
        self.rows_submitted
    }

    /// Batches handed to `submit` that it accepted
    pub fn batches_submitted(&self) -> u64 {
        self.batches_submitted
    }

    /// Rows buffered but not yet submitted
    pub fn pending(&self) -> usize {
        self.state.len()
    }

    fn flush(&mut self, batch: Batch) -> Result<(), E> {
        let rows = batch.len() as u64;
        (self.submit)(batch)?;
        self.rows_submitted += rows;
        self.batches_submitted += 1;
        Ok(())
    }
}

/// Iterator adapter yielding batches from a row iterator
pub struct BatchIter<I> {
    rows: I,
    cap: usize,
    state: BatchState,
}

impl<I: Iterator<Item = Row>> BatchIter<I> {
    /// Batch `rows` with the given cap
    ///
    /// # Panics
    ///
    /// Panics if `cap` is zero.
    pub fn new(rows: I, cap: usize) -> Self {
        assert!(cap > 0, "batch cap must be at least 1");
        BatchIter {
            rows,
            cap,
            state: BatchState::Empty,
        }
    }
}

impl<I: Iterator<Item = Row>> Iterator for BatchIter<I> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        for row in self.rows.by_ref() {
            let state = std::mem::take(&mut self.state);
            let (state, ready) = transition(state, row, self.cap);
            self.state = state;
            if ready.is_some() {
                return ready;
            }
        }
        std::mem::take(&mut self.state).finish()
    }
}

/// Batch a row sequence into a vector
pub fn batch_rows<I: IntoIterator<Item = Row>>(rows: I, cap: usize) -> Vec<Batch> {
    BatchIter::new(rows.into_iter(), cap).collect()
}
