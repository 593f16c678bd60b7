pub mod inline;
pub mod offline;

pub use inline::InlineRepair;
pub use offline::{OfflineRepair, RepairState};

use crate::{
    model::index::IndexMetadata,
    store::{ColumnKey, RowKey},
};
use std::sync::Arc;

///
/// StaleCandidate
///
/// One index column observed during a scan, before the referenced entity is
/// loaded. Discarded if the entity passes filter-on-read; forwarded to a
/// repair strategy if it fails. The observed timestamp scopes the eventual
/// repair delete to the specific write being invalidated.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StaleCandidate {
    pub row: RowKey,
    pub column: ColumnKey,
    pub observed_at: u64,
}

///
/// RepairStrategy
///
/// Consumes detected-stale index entries. Fire-and-forget from the caller's
/// perspective: implementations must never fail or block the read path that
/// forwarded the candidates.
///

pub trait RepairStrategy: Send + Sync {
    fn handle(&self, entity: &str, index: &Arc<IndexMetadata>, candidates: Vec<StaleCandidate>);
}
