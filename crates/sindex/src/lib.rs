//! sindex — client-side secondary indexing over sorted column-family stores
//!
//! This is the public meta-crate. Downstream users depend on **sindex** only.
//!
//! It re-exports the stable public API from:
//!   - `sindex-core` (codec, schema model, scanners, query engine, repair)

pub use sindex_core as core;

pub use sindex_core::{
    config::{EngineConfig, RepairMode},
    error::EngineError,
    model::{
        entity::{Entity, EntityKey, EntitySchema},
        template::QueryTemplate,
    },
    query::{QueryEngine, SortOrder},
    store::ColumnStore,
};

//
// Prelude
//

pub mod prelude {
    pub use sindex_core::prelude::*;
}
