use crate::{
    error::EngineError,
    key::CompositeKey,
    model::{
        entity::{EntityKey, EntitySchema},
        index::IndexMetadata,
        template::QueryTemplate,
    },
    query::KeyStrategy,
    repair::StaleCandidate,
    scan::ColumnRangeScan,
    store::{ColumnKey, ColumnStore},
    value::Value,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::trace;

///
/// RangeKeyStrategy
///
/// Resolves point and range lookups against engine-maintained index rows.
/// The assigned leading run of indexed properties becomes the scan bounds
/// (`scan_start`/`scan_end` composite encodings); the partitioner decides
/// which physical partitions must be unioned. Entity keys recovered from the
/// trailing composite component de-duplicate across partitions, last write
/// wins.
///

pub(crate) struct RangeKeyStrategy<'a> {
    pub store: &'a dyn ColumnStore,
    pub schema: &'a Arc<EntitySchema>,
    pub column_page_size: usize,
}

impl KeyStrategy for RangeKeyStrategy<'_> {
    fn find_keys(
        &self,
        start: &QueryTemplate,
        end: Option<&QueryTemplate>,
        index: &Arc<IndexMetadata>,
    ) -> Result<BTreeMap<EntityKey, StaleCandidate>, EngineError> {
        let start_tuple = indexed_tuple(start, index)?;
        let end_tuple = match end {
            Some(template) => indexed_tuple(template, index)?,
            None => start_tuple.clone(),
        };

        let start_bound = CompositeKey::scan_start(start_tuple.iter().cloned()).encode()?;
        let end_bound = CompositeKey::scan_end(end_tuple.iter().cloned()).encode()?;

        let partitions = if end.is_some() {
            index.partitioner().partition_range(&start_tuple, &end_tuple)
        } else {
            index.partitioner().partition_value(&start_tuple)
        };

        let mut candidates = BTreeMap::new();
        for partition in partitions {
            let row = self.schema.index_row_key(index, &partition);
            trace!(%row, index = %index, "scanning index partition");

            let scan = ColumnRangeScan::new(
                self.store,
                row.clone(),
                Some(ColumnKey::new(start_bound.clone())),
                Some(ColumnKey::new(end_bound.clone())),
                self.column_page_size,
            );

            for column in scan {
                let column = column?;
                let key = CompositeKey::decode(column.key.as_bytes())?.entity_key()?;

                candidates.insert(
                    key,
                    StaleCandidate {
                        row: row.clone(),
                        column: column.key,
                        observed_at: column.timestamp,
                    },
                );
            }
        }

        Ok(candidates)
    }
}

/// Leading run of indexed properties assigned in the template, as the value
/// tuple used for bounds and partitioning. Null assertions cannot be encoded
/// into an ordered key and fail fast.
fn indexed_tuple(
    template: &QueryTemplate,
    index: &IndexMetadata,
) -> Result<Vec<Value>, EngineError> {
    let mut tuple = Vec::new();
    for property in index.properties() {
        if !template.is_assigned(property.position) {
            break;
        }

        let value = template
            .value_at(property.position)
            .cloned()
            .unwrap_or(Value::Null);
        if value.is_null() {
            return Err(EngineError::query_unsupported(format!(
                "indexed property '{}' cannot be asserted null in a range lookup",
                property.name
            )));
        }

        tuple.push(value);
    }

    if tuple.is_empty() {
        return Err(EngineError::query_invariant(format!(
            "index '{}' shares no leading assigned property with the query",
            index.id()
        )));
    }

    Ok(tuple)
}

///
/// TESTS
///
