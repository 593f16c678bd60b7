use crate::{
    error::EngineError,
    model::{
        entity::EntitySchema,
        index::{IndexMetadata, IndexType},
    },
};
use std::sync::Arc;
use tracing::debug;

/// Pick the index serving a query, from the assigned-position bitmask alone.
///
/// An index covering exactly the assigned set wins outright. Otherwise the
/// index with the longest leading run of assigned properties wins, with
/// fewer total indexed properties as the tiebreak (a narrower index scans
/// tighter). `range_only` excludes hash indexes, which cannot answer range
/// or ordered queries.
pub(crate) fn choose_index(
    schema: &EntitySchema,
    assigned: u64,
    range_only: bool,
) -> Result<Arc<IndexMetadata>, EngineError> {
    if assigned == 0 {
        return Err(EngineError::query_unsupported(format!(
            "query on entity '{}' has no properties set",
            schema.name()
        )));
    }

    let candidates: Vec<&Arc<IndexMetadata>> = schema
        .indexes()
        .iter()
        .filter(|index| !(range_only && index.index_type() == IndexType::Hash))
        .collect();

    if let Some(exact) = candidates.iter().find(|i| i.matches_exactly(assigned)) {
        debug!(entity = schema.name(), index = %exact, "exact index match");
        return Ok(Arc::clone(exact));
    }

    let mut best: Option<(&Arc<IndexMetadata>, usize)> = None;
    for index in candidates {
        let run = index.prefix_len(assigned);
        if run == 0 {
            continue;
        }

        let better = match best {
            None => true,
            Some((current, current_run)) => {
                run > current_run
                    || (run == current_run
                        && index.properties().len() < current.properties().len())
            }
        };
        if better {
            best = Some((index, run));
        }
    }

    match best {
        Some((index, run)) => {
            debug!(entity = schema.name(), index = %index, run, "prefix index match");
            Ok(Arc::clone(index))
        }
        None => Err(EngineError::query_unsupported(format!(
            "no applicable index on entity '{}' for the assigned properties",
            schema.name()
        ))),
    }
}

///
/// TESTS
///
