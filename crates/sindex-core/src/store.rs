//! Storage collaborator boundary.
//!
//! The engine only ever issues range/equality reads and timestamp-scoped
//! deletes through this surface. Consistency levels, retries, and per-call
//! timeouts belong to the implementation behind the trait, not to the
//! engine.

use crate::error::EngineError;
use std::fmt;

///
/// RowKey
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RowKey(Vec<u8>);

impl RowKey {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

///
/// ColumnKey
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ColumnKey(Vec<u8>);

impl ColumnKey {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for ColumnKey {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

///
/// Column
///
/// One stored cell: column key, value bytes, and the write timestamp the
/// store recorded for it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Column {
    pub key: ColumnKey,
    pub value: Vec<u8>,
    pub timestamp: u64,
}

///
/// ColumnStore
///
/// Primitive get/range/multi-get operations over a sorted column space
/// keyed by `(row key, column key)`. All slice bounds are inclusive and
/// `None` means unbounded; results ascend by column key (by row key for
/// `equality_lookup`). `delete` is scoped: it removes a cell only when the
/// cell's write timestamp is at or before `at_timestamp`, so a repair racing
/// a newer legitimate write never removes the newer entry.
///

pub trait ColumnStore: Send + Sync {
    fn get_slice(
        &self,
        row: &RowKey,
        start: Option<&ColumnKey>,
        end: Option<&ColumnKey>,
        limit: usize,
    ) -> Result<Vec<Column>, EngineError>;

    fn multi_get_slice(
        &self,
        rows: &[RowKey],
        start: Option<&ColumnKey>,
        end: Option<&ColumnKey>,
        limit: usize,
    ) -> Result<Vec<(RowKey, Vec<Column>)>, EngineError>;

    /// Native equality support: rows whose `column` currently holds `value`,
    /// ascending by row key starting at `start_row` (inclusive), paired with
    /// the matched column's write timestamp.
    fn equality_lookup(
        &self,
        column: &ColumnKey,
        value: &[u8],
        limit: usize,
        start_row: Option<&RowKey>,
    ) -> Result<Vec<(RowKey, u64)>, EngineError>;

    fn put(
        &self,
        row: &RowKey,
        column: &ColumnKey,
        value: &[u8],
        timestamp: u64,
    ) -> Result<(), EngineError>;

    fn delete(
        &self,
        row: &RowKey,
        column: &ColumnKey,
        at_timestamp: u64,
    ) -> Result<(), EngineError>;
}
