use crate::{DEFAULT_COLUMN_PAGE_SIZE, DEFAULT_ROW_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

///
/// RepairMode
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairMode {
    /// Repair deletes run synchronously on the reading thread.
    #[default]
    Inline,
    /// Repair batches are queued to a bounded worker pool; submissions that
    /// find the queue full are dropped and counted.
    Offline,
}

///
/// EngineConfig
///
/// Recognized engine options. Everything has a sensible default; callers
/// override what they need.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Columns requested per slice when paging a wide row.
    pub column_page_size: usize,
    /// Rows requested per batch when paging a row set.
    pub row_page_size: usize,
    pub repair: RepairMode,
    pub offline_workers: usize,
    pub offline_queue_capacity: usize,
    /// Shutdown grace period for the offline repair pool.
    pub offline_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            column_page_size: DEFAULT_COLUMN_PAGE_SIZE,
            row_page_size: DEFAULT_ROW_PAGE_SIZE,
            repair: RepairMode::Inline,
            offline_workers: 1,
            offline_queue_capacity: 1000,
            offline_grace: Duration::from_secs(60),
        }
    }
}

///
/// TESTS
///
