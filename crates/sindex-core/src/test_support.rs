//! Shared test fixtures: an in-memory `ColumnStore` with last-write-wins
//! timestamp semantics and the schemas the integration-style tests share.

use crate::{
    error::EngineError,
    model::entity::EntitySchema,
    store::{Column, ColumnKey, ColumnStore, RowKey},
    value::ValueKind,
};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

type Cells = BTreeMap<ColumnKey, (Vec<u8>, u64)>;

///
/// MemoryStore
///
/// Reference `ColumnStore` over nested ordered maps. `delete` honors the
/// timestamp scope: a cell written at T2 survives a delete scoped to T1 < T2.
///

pub(crate) struct MemoryStore {
    rows: Mutex<BTreeMap<RowKey, Cells>>,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Make every subsequent read fail with a store I/O error.
    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn cell(&self, row: &RowKey, column: &ColumnKey) -> Option<(Vec<u8>, u64)> {
        self.rows.lock().get(row)?.get(column).cloned()
    }

    pub(crate) fn column_count(&self, row: &RowKey) -> usize {
        self.rows.lock().get(row).map_or(0, BTreeMap::len)
    }

    fn check_reads(&self) -> Result<(), EngineError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(EngineError::store_io("injected read failure"));
        }
        Ok(())
    }

    fn slice(cells: &Cells, start: Option<&ColumnKey>, end: Option<&ColumnKey>, limit: usize) -> Vec<Column> {
        let lower = start.map_or(Bound::Unbounded, |k| Bound::Included(k.clone()));
        let upper = end.map_or(Bound::Unbounded, |k| Bound::Included(k.clone()));

        cells
            .range((lower, upper))
            .take(limit)
            .map(|(key, (value, timestamp))| Column {
                key: key.clone(),
                value: value.clone(),
                timestamp: *timestamp,
            })
            .collect()
    }
}

impl ColumnStore for MemoryStore {
    fn get_slice(
        &self,
        row: &RowKey,
        start: Option<&ColumnKey>,
        end: Option<&ColumnKey>,
        limit: usize,
    ) -> Result<Vec<Column>, EngineError> {
        self.check_reads()?;

        let rows = self.rows.lock();
        Ok(rows
            .get(row)
            .map_or_else(Vec::new, |cells| Self::slice(cells, start, end, limit)))
    }

    fn multi_get_slice(
        &self,
        keys: &[RowKey],
        start: Option<&ColumnKey>,
        end: Option<&ColumnKey>,
        limit: usize,
    ) -> Result<Vec<(RowKey, Vec<Column>)>, EngineError> {
        self.check_reads()?;

        let rows = self.rows.lock();
        Ok(keys
            .iter()
            .filter_map(|key| {
                rows.get(key)
                    .map(|cells| (key.clone(), Self::slice(cells, start, end, limit)))
            })
            .filter(|(_, columns)| !columns.is_empty())
            .collect())
    }

    fn equality_lookup(
        &self,
        column: &ColumnKey,
        value: &[u8],
        limit: usize,
        start_row: Option<&RowKey>,
    ) -> Result<Vec<(RowKey, u64)>, EngineError> {
        self.check_reads()?;

        let rows = self.rows.lock();
        let lower = start_row.map_or(Bound::Unbounded, |k| Bound::Included(k.clone()));

        Ok(rows
            .range((lower, Bound::Unbounded))
            .filter_map(|(row, cells)| {
                cells
                    .get(column)
                    .filter(|(stored, _)| stored == value)
                    .map(|(_, timestamp)| (row.clone(), *timestamp))
            })
            .take(limit)
            .collect())
    }

    fn put(
        &self,
        row: &RowKey,
        column: &ColumnKey,
        value: &[u8],
        timestamp: u64,
    ) -> Result<(), EngineError> {
        let mut rows = self.rows.lock();
        let cells = rows.entry(row.clone()).or_default();

        // Last write wins: an older write never clobbers a newer cell.
        match cells.get(column) {
            Some((_, existing)) if *existing > timestamp => {}
            _ => {
                cells.insert(column.clone(), (value.to_vec(), timestamp));
            }
        }

        Ok(())
    }

    fn delete(
        &self,
        row: &RowKey,
        column: &ColumnKey,
        at_timestamp: u64,
    ) -> Result<(), EngineError> {
        let mut rows = self.rows.lock();
        if let Some(cells) = rows.get_mut(row) {
            // Scoped delete: only the write being invalidated is removed.
            if cells
                .get(column)
                .is_some_and(|(_, written)| *written <= at_timestamp)
            {
                cells.remove(column);
            }
            if cells.is_empty() {
                rows.remove(row);
            }
        }

        Ok(())
    }
}

/// Catalog item fixture: ranged category index, hash owner index, and a
/// multi-property range index for prefix-selection tests.
pub(crate) fn item_schema() -> Arc<EntitySchema> {
    EntitySchema::builder("item")
        .property("category", ValueKind::Int)
        .property("name", ValueKind::Text)
        .property("owner", ValueKind::Text)
        .property("stock", ValueKind::Uint)
        .range_index(&["category"])
        .range_index(&["category", "name"])
        .hash_index("owner")
        .build()
        .expect("item schema should build")
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_is_timestamp_scoped() {
        let store = MemoryStore::new();
        let row = RowKey::new(b"r".to_vec());
        let col = ColumnKey::from("c");

        store.put(&row, &col, b"old", 10).unwrap();
        store.put(&row, &col, b"new", 20).unwrap();

        // Scoped to the old write: the newer cell survives.
        store.delete(&row, &col, 10).unwrap();
        assert_eq!(store.cell(&row, &col), Some((b"new".to_vec(), 20)));

        store.delete(&row, &col, 20).unwrap();
        assert_eq!(store.cell(&row, &col), None);
    }

    #[test]
    fn put_is_last_write_wins() {
        let store = MemoryStore::new();
        let row = RowKey::new(b"r".to_vec());
        let col = ColumnKey::from("c");

        store.put(&row, &col, b"new", 20).unwrap();
        store.put(&row, &col, b"stale", 10).unwrap();

        assert_eq!(store.cell(&row, &col), Some((b"new".to_vec(), 20)));
    }
}
