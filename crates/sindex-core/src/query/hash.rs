use crate::{
    error::EngineError,
    model::{
        entity::{EntityKey, EntitySchema},
        index::IndexMetadata,
        template::QueryTemplate,
    },
    query::KeyStrategy,
    repair::StaleCandidate,
    scan::EqualityRowScan,
    store::{ColumnKey, ColumnStore},
    value::wire,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::trace;

///
/// HashKeyStrategy
///
/// Resolves an exact-value lookup through the store's native equality
/// support. No engine-maintained index row exists for a hash index; the
/// probe runs against the entity column itself, so the stale candidate of
/// each hit references that same cell at its matched write timestamp.
///

pub(crate) struct HashKeyStrategy<'a> {
    pub store: &'a dyn ColumnStore,
    pub schema: &'a Arc<EntitySchema>,
    pub row_page_size: usize,
}

impl KeyStrategy for HashKeyStrategy<'_> {
    fn find_keys(
        &self,
        start: &QueryTemplate,
        end: Option<&QueryTemplate>,
        index: &Arc<IndexMetadata>,
    ) -> Result<BTreeMap<EntityKey, StaleCandidate>, EngineError> {
        if end.is_some() {
            return Err(EngineError::index_invariant(format!(
                "hash index '{}' cannot serve a range lookup",
                index.id()
            )));
        }

        let property = &index.properties()[0];
        let value = start
            .value_at(property.position)
            .filter(|v| !v.is_null())
            .ok_or_else(|| {
                EngineError::query_unsupported(format!(
                    "hash lookup on '{}' requires a non-null value for '{}'",
                    index.id(),
                    property.name
                ))
            })?;

        let probe = wire::encode_column(property.kind, value)?;
        let column = ColumnKey::new(property.column.clone().into_bytes());

        let mut candidates = BTreeMap::new();
        for entry in EqualityRowScan::new(self.store, column.clone(), probe, self.row_page_size) {
            let (row, timestamp) = entry?;

            // The store's column space is shared; rows outside this entity's
            // namespace can legitimately carry the same column name.
            let Some(key) = self.schema.entity_key_of_row(&row) else {
                trace!(%row, "equality hit outside the entity namespace, skipped");
                continue;
            };

            candidates.insert(
                key,
                StaleCandidate {
                    row,
                    column: column.clone(),
                    observed_at: timestamp,
                },
            );
        }

        Ok(candidates)
    }
}

///
/// TESTS
///
