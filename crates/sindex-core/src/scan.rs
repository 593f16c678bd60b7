//! Paginated column-range scanning.
//!
//! These scanners know nothing about indexes or entities; they operate on
//! row/column byte keys and stitch page boundaries so callers see each cell
//! exactly once. A full page is re-requested from its last key (re-included
//! by the store's inclusive bounds, then skipped once re-received); a short
//! page terminates the scan.

use crate::{
    error::{EngineError, ErrorClass, ErrorOrigin},
    store::{Column, ColumnKey, ColumnStore, RowKey},
};
use std::collections::VecDeque;
use tracing::trace;

// A page size of 1 cannot make progress once the boundary column is
// re-included, so scanners clamp below this.
const MIN_PAGE_SIZE: usize = 2;

///
/// ColumnRangeScan
///
/// Lazy scan over one row's `[start, end]` column range, re-paging
/// transparently. Yields columns in ascending key order.
///

pub struct ColumnRangeScan<'a> {
    store: &'a dyn ColumnStore,
    row: RowKey,
    end: Option<ColumnKey>,
    page_size: usize,
    cursor: Option<ColumnKey>,
    skip: Option<ColumnKey>,
    buffer: VecDeque<Column>,
    done: bool,
    failed: bool,
}

impl<'a> ColumnRangeScan<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn ColumnStore,
        row: RowKey,
        start: Option<ColumnKey>,
        end: Option<ColumnKey>,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            row,
            end,
            page_size: page_size.max(MIN_PAGE_SIZE),
            cursor: start,
            skip: None,
            buffer: VecDeque::new(),
            done: false,
            failed: false,
        }
    }

    /// Continue a scan whose previous page ended at `boundary`. The boundary
    /// column is re-requested and skipped once re-received.
    #[must_use]
    pub fn resume_after(
        store: &'a dyn ColumnStore,
        row: RowKey,
        boundary: ColumnKey,
        end: Option<ColumnKey>,
        page_size: usize,
    ) -> Self {
        let mut scan = Self::new(store, row, Some(boundary.clone()), end, page_size);
        scan.skip = Some(boundary);
        scan
    }

    fn fill_page(&mut self) -> Result<(), EngineError> {
        let columns = self.store.get_slice(
            &self.row,
            self.cursor.as_ref(),
            self.end.as_ref(),
            self.page_size,
        )?;

        let full = columns.len() == self.page_size;
        trace!(row = %self.row, returned = columns.len(), full, "column page");

        for column in columns {
            if self.skip.take().is_some_and(|skip| skip == column.key) {
                continue;
            }
            self.buffer.push_back(column);
        }

        if full {
            // The boundary column becomes the next start and is skipped when
            // it comes back. At least one new column was buffered because the
            // page size is >= 2 and only the boundary can repeat.
            let boundary = self.buffer.back().map(|c| c.key.clone()).ok_or_else(|| {
                EngineError::new(
                    ErrorClass::Internal,
                    ErrorOrigin::Scan,
                    "full page produced no new columns",
                )
            })?;
            self.cursor = Some(boundary.clone());
            self.skip = Some(boundary);
        } else {
            self.done = true;
        }

        Ok(())
    }
}

impl Iterator for ColumnRangeScan<'_> {
    type Item = Result<Column, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(column) = self.buffer.pop_front() {
                return Some(Ok(column));
            }
            if self.done || self.failed {
                return None;
            }
            if let Err(err) = self.fill_page() {
                self.failed = true;
                return Some(Err(err));
            }
        }
    }
}

///
/// EqualityRowScan
///
/// Lazy scan over the store's native equality lookup, paging by row count.
/// A page boundary can return the same row key in two consecutive pages;
/// the repeated boundary key is detected and skipped rather than yielded
/// twice.
///

pub struct EqualityRowScan<'a> {
    store: &'a dyn ColumnStore,
    column: ColumnKey,
    value: Vec<u8>,
    page_size: usize,
    cursor: Option<RowKey>,
    skip: Option<RowKey>,
    buffer: VecDeque<(RowKey, u64)>,
    done: bool,
    failed: bool,
}

impl<'a> EqualityRowScan<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn ColumnStore,
        column: ColumnKey,
        value: Vec<u8>,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            column,
            value,
            page_size: page_size.max(MIN_PAGE_SIZE),
            cursor: None,
            skip: None,
            buffer: VecDeque::new(),
            done: false,
            failed: false,
        }
    }

    fn fill_page(&mut self) -> Result<(), EngineError> {
        let rows = self.store.equality_lookup(
            &self.column,
            &self.value,
            self.page_size,
            self.cursor.as_ref(),
        )?;

        let full = rows.len() == self.page_size;
        trace!(returned = rows.len(), full, "equality page");

        for (row, timestamp) in rows {
            if self.skip.take().is_some_and(|skip| skip == row) {
                continue;
            }
            self.buffer.push_back((row, timestamp));
        }

        if full {
            let boundary = self.buffer.back().map(|(row, _)| row.clone());
            match boundary {
                Some(boundary) => {
                    self.cursor = Some(boundary.clone());
                    self.skip = Some(boundary);
                }
                None => self.done = true,
            }
        } else {
            self.done = true;
        }

        Ok(())
    }
}

impl Iterator for EqualityRowScan<'_> {
    type Item = Result<(RowKey, u64), EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(Ok(entry));
            }
            if self.done || self.failed {
                return None;
            }
            if let Err(err) = self.fill_page() {
                self.failed = true;
                return Some(Err(err));
            }
        }
    }
}

///
/// RowSetScan
///
/// Bulk load of full column sets for a set of rows: pages the key set by
/// the row-count page size, and continues any row whose batch slice filled
/// the column page with a per-row `ColumnRangeScan`. Rows with no columns in
/// range are omitted (the store may elide them).
///

pub struct RowSetScan<'a> {
    store: &'a dyn ColumnStore,
    rows: Vec<RowKey>,
    start: Option<ColumnKey>,
    end: Option<ColumnKey>,
    row_page_size: usize,
    column_page_size: usize,
    next_row: usize,
    ready: VecDeque<(RowKey, Vec<Column>)>,
    failed: bool,
}

impl<'a> RowSetScan<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn ColumnStore,
        rows: Vec<RowKey>,
        start: Option<ColumnKey>,
        end: Option<ColumnKey>,
        row_page_size: usize,
        column_page_size: usize,
    ) -> Self {
        Self {
            store,
            rows,
            start,
            end,
            row_page_size: row_page_size.max(1),
            column_page_size: column_page_size.max(MIN_PAGE_SIZE),
            next_row: 0,
            ready: VecDeque::new(),
            failed: false,
        }
    }

    fn load_batch(&mut self) -> Result<(), EngineError> {
        let upper = (self.next_row + self.row_page_size).min(self.rows.len());
        let batch = &self.rows[self.next_row..upper];
        self.next_row = upper;

        let sliced = self.store.multi_get_slice(
            batch,
            self.start.as_ref(),
            self.end.as_ref(),
            self.column_page_size,
        )?;

        for (row, mut columns) in sliced {
            if columns.is_empty() {
                continue;
            }

            // A filled slice may have been truncated mid-row; finish the row
            // with a width-paged scan resumed from its boundary column.
            if columns.len() == self.column_page_size {
                let boundary = columns[columns.len() - 1].key.clone();
                let rest = ColumnRangeScan::resume_after(
                    self.store,
                    row.clone(),
                    boundary,
                    self.end.clone(),
                    self.column_page_size,
                );
                for column in rest {
                    columns.push(column?);
                }
            }

            self.ready.push_back((row, columns));
        }

        Ok(())
    }
}

impl Iterator for RowSetScan<'_> {
    type Item = Result<(RowKey, Vec<Column>), EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.ready.pop_front() {
                return Some(Ok(entry));
            }
            if self.failed || self.next_row >= self.rows.len() {
                return None;
            }
            if let Err(err) = self.load_batch() {
                self.failed = true;
                return Some(Err(err));
            }
        }
    }
}

///
/// TESTS
///
