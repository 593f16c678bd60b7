use crate::{
    model::index::IndexMetadata,
    repair::{RepairStrategy, StaleCandidate},
    store::ColumnStore,
};
use std::sync::Arc;
use tracing::{debug, warn};

///
/// InlineRepair
///
/// Synchronously deletes each stale entry, scoping every delete to the
/// candidate's observed timestamp so a racing newer index write survives.
/// Failures are logged and discarded; they never reach the read path.
///

pub struct InlineRepair {
    store: Arc<dyn ColumnStore>,
}

impl InlineRepair {
    #[must_use]
    pub fn new(store: Arc<dyn ColumnStore>) -> Self {
        Self { store }
    }
}

impl RepairStrategy for InlineRepair {
    fn handle(&self, entity: &str, index: &Arc<IndexMetadata>, candidates: Vec<StaleCandidate>) {
        debug!(entity, index = index.id(), count = candidates.len(), "repairing stale index entries");

        for candidate in candidates {
            if let Err(err) =
                self.store
                    .delete(&candidate.row, &candidate.column, candidate.observed_at)
            {
                warn!(
                    entity,
                    index = index.id(),
                    row = %candidate.row,
                    error = %err,
                    "stale index repair delete failed; entry left for a later read"
                );
            }
        }
    }
}

///
/// TESTS
///
