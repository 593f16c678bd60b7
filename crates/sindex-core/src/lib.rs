//! Core runtime for sindex: composite key codec, entity/index metadata,
//! paginated scanners, the index query engine, filter-on-read, and the
//! repair strategies. The ergonomics are exported via the `prelude`.

pub mod config;
pub mod error;
pub mod key;
pub mod model;
pub mod partition;
pub mod query;
pub mod repair;
pub mod scan;
pub mod store;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Default number of columns requested per slice when paging a wide row.
pub const DEFAULT_COLUMN_PAGE_SIZE: usize = 100;

/// Default number of rows requested per batch when paging a row set.
pub const DEFAULT_ROW_PAGE_SIZE: usize = 100;

/// Maximum number of properties allowed on an entity schema.
///
/// The query template tracks assigned properties in a positional bitmask,
/// so schemas are capped at the mask width.
pub const MAX_PROPERTIES: usize = 64;

/// Maximum number of indexed properties allowed on a single index.
pub const MAX_INDEX_PROPERTIES: usize = 8;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No scanners, strategies, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        config::{EngineConfig, RepairMode},
        error::EngineError,
        key::{Boundary, CompositeKey},
        model::{
            entity::{Entity, EntityKey, EntitySchema, EntitySchemaBuilder, PropertyModel},
            index::{IndexMetadata, IndexType},
            template::QueryTemplate,
        },
        partition::{HashBucketPartitioner, Partitioner, SinglePartitioner},
        query::{QueryEngine, SortOrder},
        repair::{InlineRepair, OfflineRepair, RepairStrategy, StaleCandidate},
        store::{Column, ColumnKey, ColumnStore, RowKey},
        value::{Value, ValueKind},
    };
}
