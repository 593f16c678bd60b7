//! Index query engine.
//!
//! A caller supplies partially-populated `QueryTemplate`s; the engine picks
//! an index, resolves entity keys through the matching key strategy,
//! bulk-loads the entities, runs filter-on-read, and forwards rejected
//! candidates to the configured repair strategy without blocking on it.

mod choose;
mod filter;
mod hash;
mod range;

use crate::{
    config::{EngineConfig, RepairMode},
    error::EngineError,
    key::CompositeKey,
    model::{
        entity::{Entity, EntityKey, EntitySchema},
        index::{IndexMetadata, IndexType},
        template::QueryTemplate,
    },
    query::{
        choose::choose_index,
        filter::{EqualityFilter, RangeFilter, ReadFilter},
        hash::HashKeyStrategy,
        range::RangeKeyStrategy,
    },
    repair::{InlineRepair, OfflineRepair, RepairStrategy, StaleCandidate},
    scan::{ColumnRangeScan, RowSetScan},
    store::{ColumnKey, ColumnStore, RowKey},
    value::{Value, wire},
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::{debug, trace};

///
/// SortOrder
///
/// Explicit ordering for `mfind_between_ordered`. Unsorted output is the
/// default everywhere else; results then follow entity-key order within the
/// candidate set.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

///
/// KeyStrategy
///
/// Shared contract of the two index lookup strategies: resolve the
/// templates into entity keys plus the stale candidate recorded for each
/// observed index entry. Last write wins when the same entity key appears
/// twice (overlapping partitions).
///

pub(crate) trait KeyStrategy {
    fn find_keys(
        &self,
        start: &QueryTemplate,
        end: Option<&QueryTemplate>,
        index: &Arc<IndexMetadata>,
    ) -> Result<BTreeMap<EntityKey, StaleCandidate>, EngineError>;
}

///
/// QueryEngine
///
/// One engine per entity schema. Immutable after construction and safe to
/// share across threads; reads run synchronously on the calling thread.
///

pub struct QueryEngine {
    store: Arc<dyn ColumnStore>,
    schema: Arc<EntitySchema>,
    config: EngineConfig,
    repair: Arc<dyn RepairStrategy>,
}

impl QueryEngine {
    /// Build an engine with the repair strategy the config selects.
    #[must_use]
    pub fn new(store: Arc<dyn ColumnStore>, schema: Arc<EntitySchema>, config: EngineConfig) -> Self {
        let inline = Arc::new(InlineRepair::new(Arc::clone(&store)));
        let repair: Arc<dyn RepairStrategy> = match config.repair {
            RepairMode::Inline => inline,
            RepairMode::Offline => Arc::new(OfflineRepair::new(
                inline,
                config.offline_workers,
                config.offline_queue_capacity,
                config.offline_grace,
            )),
        };

        Self::with_repair(store, schema, config, repair)
    }

    /// Build an engine around a caller-supplied repair strategy.
    #[must_use]
    pub fn with_repair(
        store: Arc<dyn ColumnStore>,
        schema: Arc<EntitySchema>,
        config: EngineConfig,
        repair: Arc<dyn RepairStrategy>,
    ) -> Self {
        Self {
            store,
            schema,
            config,
            repair,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn repair(&self) -> &Arc<dyn RepairStrategy> {
        &self.repair
    }

    /// Point lookup returning the first matching entity.
    pub fn find(&self, template: &QueryTemplate) -> Result<Option<Entity>, EngineError> {
        Ok(self.run(template, None, None)?.into_iter().next())
    }

    /// Point lookup returning every matching entity.
    pub fn mfind(&self, template: &QueryTemplate) -> Result<Vec<Entity>, EngineError> {
        self.run(template, None, None)
    }

    /// Inclusive range lookup between two bound templates.
    pub fn mfind_between(
        &self,
        start: &QueryTemplate,
        end: &QueryTemplate,
    ) -> Result<Vec<Entity>, EngineError> {
        self.run(start, Some(end), None)
    }

    /// Inclusive range lookup with buffered output ordered by indexed-tuple
    /// byte order.
    pub fn mfind_between_ordered(
        &self,
        start: &QueryTemplate,
        end: &QueryTemplate,
        order: SortOrder,
    ) -> Result<Vec<Entity>, EngineError> {
        self.run(start, Some(end), Some(order))
    }

    /// Plain load of one entity, bypassing the indexes.
    pub fn get(&self, key: &EntityKey) -> Result<Option<Entity>, EngineError> {
        let mut loaded = self.load(std::slice::from_ref(key))?;
        Ok(loaded.remove(key))
    }

    /// Plain load of a key set, in input order; missing keys are omitted.
    pub fn mget(&self, keys: &[EntityKey]) -> Result<Vec<Entity>, EngineError> {
        let mut loaded = self.load(keys)?;
        Ok(keys.iter().filter_map(|key| loaded.remove(key)).collect())
    }

    /// Plain load reading only the named properties. The projection is
    /// pushed to the store as one exact-column slice per property; other
    /// columns are never fetched. Returns `None` when no projected column
    /// exists.
    pub fn get_projected(
        &self,
        key: &EntityKey,
        properties: &[&str],
    ) -> Result<Option<Entity>, EngineError> {
        let row = self.schema.entity_row_key(key);
        let mut entity = Entity::new(&self.schema, key.clone());
        let mut found = false;

        for name in properties {
            let property = self.schema.property(name).ok_or_else(|| {
                EngineError::query_unsupported(format!(
                    "unknown property '{name}' on entity '{}'",
                    self.schema.name()
                ))
            })?;

            let column = ColumnKey::new(property.column.clone().into_bytes());
            let cells = self.store.get_slice(&row, Some(&column), Some(&column), 1)?;
            if let Some(cell) = cells.into_iter().next() {
                let value = wire::decode_column(property.kind, &cell.value)?;
                entity.set_at(property.position, value);
                found = true;
            }
        }

        Ok(found.then_some(entity))
    }

    /// Persist an entity: row columns first, then one empty-valued index
    /// column per range-index partition in a second, non-atomic write. Hash
    /// indexes write nothing extra; the store's native equality lookup
    /// serves them from the entity column itself.
    pub fn save(&self, entity: &Entity, timestamp: u64) -> Result<(), EngineError> {
        self.check_schema(entity.schema())?;
        let row = self.schema.entity_row_key(entity.key());

        for property in self.schema.properties() {
            let Some(value) = entity.value_at(property.position) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            let bytes = wire::encode_column(property.kind, value)?;
            let column = ColumnKey::new(property.column.clone().into_bytes());
            self.store.put(&row, &column, &bytes, timestamp)?;
        }

        for index in self.schema.indexes() {
            if index.index_type() != IndexType::Range {
                continue;
            }
            // An entity missing any indexed value has no entry under this
            // index.
            let Some(tuple) = index_tuple_of(entity, index) else {
                continue;
            };

            let column = CompositeKey::equal(tuple.iter().cloned())
                .with_entity_key(entity.key())
                .encode()?;
            for partition in index.partitioner().partition_value(&tuple) {
                let index_row = self.schema.index_row_key(index, &partition);
                self.store
                    .put(&index_row, &ColumnKey::new(column.clone()), b"", timestamp)?;
            }
        }

        Ok(())
    }

    /// Remove an entity's row columns as of `timestamp`. Index entries are
    /// left behind; filter-on-read detects them and repair removes them.
    pub fn delete_entity(&self, key: &EntityKey, timestamp: u64) -> Result<(), EngineError> {
        let row = self.schema.entity_row_key(key);
        let columns: Vec<ColumnKey> = ColumnRangeScan::new(
            self.store.as_ref(),
            row.clone(),
            None,
            None,
            self.config.column_page_size,
        )
        .map(|column| column.map(|c| c.key))
        .collect::<Result<_, _>>()?;

        for column in columns {
            self.store.delete(&row, &column, timestamp)?;
        }

        Ok(())
    }

    fn run(
        &self,
        start: &QueryTemplate,
        end: Option<&QueryTemplate>,
        order: Option<SortOrder>,
    ) -> Result<Vec<Entity>, EngineError> {
        self.check_schema(start.schema())?;
        if let Some(end) = end {
            self.check_schema(end.schema())?;
        }

        let range_only = end.is_some() || order.is_some();
        let index = choose_index(&self.schema, start.assigned(), range_only)?;

        let candidates = match index.index_type() {
            IndexType::Hash => HashKeyStrategy {
                store: self.store.as_ref(),
                schema: &self.schema,
                row_page_size: self.config.row_page_size,
            }
            .find_keys(start, end, &index)?,
            IndexType::Range => RangeKeyStrategy {
                store: self.store.as_ref(),
                schema: &self.schema,
                column_page_size: self.config.column_page_size,
            }
            .find_keys(start, end, &index)?,
        };
        trace!(entity = self.schema.name(), index = %index, candidates = candidates.len(), "index lookup resolved");

        let keys: Vec<EntityKey> = candidates.keys().cloned().collect();
        let mut loaded = self.load(&keys)?;

        let filter = match end {
            None => ReadFilter::Equality(EqualityFilter::new(start, &index)),
            Some(end) => ReadFilter::Range(RangeFilter::new(start, end, &index)),
        };

        let mut ordered: Vec<(EntityKey, StaleCandidate)> = candidates.into_iter().collect();
        match order {
            Some(SortOrder::Ascending) => {
                ordered.sort_by(|a, b| a.1.column.cmp(&b.1.column));
            }
            Some(SortOrder::Descending) => {
                ordered.sort_by(|a, b| b.1.column.cmp(&a.1.column));
            }
            None => {}
        }

        let mut results = Vec::with_capacity(ordered.len());
        let mut stale = Vec::new();
        for (key, candidate) in ordered {
            match loaded.remove(&key) {
                Some(entity) if filter.evaluate(&entity) => results.push(entity),
                // A hash hit reflects the store's current column value: a
                // loaded entity that fails the residual filter is live, and
                // its candidate references the entity's own data column, not
                // a repairable index entry.
                Some(_) if index.index_type() == IndexType::Hash => {}
                // Missing row, or a range-index entry whose entity no longer
                // matches the template: the index entry is stale.
                _ => stale.push(candidate),
            }
        }

        if !stale.is_empty() {
            debug!(
                entity = self.schema.name(),
                index = %index,
                count = stale.len(),
                "forwarding stale index entries to repair"
            );
            self.repair.handle(self.schema.name(), &index, stale);
        }

        Ok(results)
    }

    fn load(&self, keys: &[EntityKey]) -> Result<HashMap<EntityKey, Entity>, EngineError> {
        let rows: Vec<RowKey> = keys
            .iter()
            .map(|key| self.schema.entity_row_key(key))
            .collect();

        let mut loaded = HashMap::with_capacity(keys.len());
        let scan = RowSetScan::new(
            self.store.as_ref(),
            rows,
            None,
            None,
            self.config.row_page_size,
            self.config.column_page_size,
        );

        for entry in scan {
            let (row, columns) = entry?;
            let key = self.schema.entity_key_of_row(&row).ok_or_else(|| {
                EngineError::index_invariant(format!(
                    "loaded row '{row}' is outside entity '{}'",
                    self.schema.name()
                ))
            })?;

            let mut entity = Entity::new(&self.schema, key.clone());
            for column in columns {
                let property = std::str::from_utf8(column.key.as_bytes())
                    .ok()
                    .and_then(|name| self.schema.property_by_column(name));
                let Some(property) = property else {
                    trace!(%row, "unregistered column skipped");
                    continue;
                };
                let value = wire::decode_column(property.kind, &column.value)?;
                entity.set_at(property.position, value);
            }

            loaded.insert(key, entity);
        }

        Ok(loaded)
    }

    fn check_schema(&self, other: &Arc<EntitySchema>) -> Result<(), EngineError> {
        if Arc::ptr_eq(&self.schema, other) || self.schema.name() == other.name() {
            return Ok(());
        }

        Err(EngineError::query_invariant(format!(
            "engine for entity '{}' received a template for entity '{}'",
            self.schema.name(),
            other.name()
        )))
    }
}

/// Full indexed-value tuple of an entity, or `None` when any indexed
/// property is unset or null.
fn index_tuple_of(entity: &Entity, index: &IndexMetadata) -> Option<Vec<Value>> {
    index
        .properties()
        .iter()
        .map(|p| {
            entity
                .value_at(p.position)
                .filter(|value| !value.is_null())
                .cloned()
        })
        .collect()
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryStore, item_schema};
    use parking_lot::Mutex;

    fn engine(store: &Arc<MemoryStore>) -> QueryEngine {
        QueryEngine::new(
            Arc::clone(store) as Arc<dyn ColumnStore>,
            item_schema(),
            EngineConfig::default(),
        )
    }

    fn item(schema: &Arc<EntitySchema>, key: &str, category: i64, name: &str, owner: &str) -> Entity {
        Entity::new(schema, EntityKey::from(key))
            .set("category", Value::Int(category))
            .and_then(|e| e.set("name", Value::Text(name.to_string())))
            .and_then(|e| e.set("owner", Value::Text(owner.to_string())))
            .expect("fixture entity should build")
    }

    /// Recording strategy for asserting what the engine forwards.
    #[derive(Default)]
    struct RecordingRepair {
        batches: Mutex<Vec<Vec<StaleCandidate>>>,
    }

    impl RepairStrategy for RecordingRepair {
        fn handle(&self, _entity: &str, _index: &Arc<IndexMetadata>, candidates: Vec<StaleCandidate>) {
            self.batches.lock().push(candidates);
        }
    }

    #[test]
    fn save_then_get_round_trips() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let schema = engine.schema().clone();

        let entity = item(&schema, "i1", 5, "anvil", "ada");
        engine.save(&entity, 10).expect("save should succeed");

        let loaded = engine
            .get(&EntityKey::from("i1"))
            .expect("get should succeed")
            .expect("entity exists");
        assert_eq!(loaded.value("category"), Some(&Value::Int(5)));
        assert_eq!(loaded.value("name"), Some(&Value::Text("anvil".to_string())));
        assert!(engine.get(&EntityKey::from("nope")).unwrap().is_none());
    }

    #[test]
    fn projected_get_decodes_only_the_named_properties() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let schema = engine.schema().clone();

        engine
            .save(&item(&schema, "i1", 5, "anvil", "ada"), 10)
            .expect("save should succeed");

        let loaded = engine
            .get_projected(&EntityKey::from("i1"), &["name"])
            .expect("get should succeed")
            .expect("entity exists");
        assert_eq!(loaded.value("name"), Some(&Value::Text("anvil".to_string())));
        assert_eq!(loaded.value("category"), None);

        assert!(engine.get_projected(&EntityKey::from("i1"), &["nope"]).is_err());
    }

    #[test]
    fn hash_lookup_filter_rejection_leaves_live_rows_untouched() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let schema = engine.schema().clone();

        engine
            .save(&item(&schema, "i1", 5, "anvil", "ada"), 10)
            .expect("save should succeed");
        engine
            .save(&item(&schema, "i2", 5, "bolt", "ada"), 10)
            .expect("save should succeed");

        // Both rows match owner=ada; the name assertion rejects i2 in the
        // residual filter. i2 is live, not stale.
        let template = QueryTemplate::of(&schema)
            .set("owner", Value::Text("ada".to_string()))
            .and_then(|t| t.set("name", Value::Text("anvil".to_string())))
            .expect("template should build");
        let found = engine.mfind(&template).expect("mfind should succeed");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), &EntityKey::from("i1"));

        // The default inline repair must not have touched i2's own columns.
        let loaded = engine
            .get(&EntityKey::from("i2"))
            .expect("get should succeed")
            .expect("i2 still exists");
        assert_eq!(loaded.value("owner"), Some(&Value::Text("ada".to_string())));
        assert_eq!(loaded.value("name"), Some(&Value::Text("bolt".to_string())));
    }

    #[test]
    fn gapped_template_rechecks_unenforced_indexed_properties() {
        use crate::value::ValueKind;

        let store = Arc::new(MemoryStore::new());
        let schema = EntitySchema::builder("t")
            .property("a", ValueKind::Int)
            .property("b", ValueKind::Int)
            .property("c", ValueKind::Int)
            .range_index(&["a", "b", "c"])
            .build()
            .expect("schema should build");
        let engine = QueryEngine::new(
            Arc::clone(&store) as Arc<dyn ColumnStore>,
            Arc::clone(&schema),
            EngineConfig::default(),
        );

        let triple = |key: &str, c: i64| {
            Entity::new(&schema, EntityKey::from(key))
                .set("a", Value::Int(1))
                .and_then(|e| e.set("b", Value::Int(2)))
                .and_then(|e| e.set("c", Value::Int(c)))
                .expect("fixture entity should build")
        };
        engine.save(&triple("e1", 3), 1).expect("save should succeed");
        engine.save(&triple("e2", 9), 1).expect("save should succeed");

        // `b` is unassigned: the scan only enforces `a`, so the asserted
        // `c` must be re-checked on the loaded entities.
        let template = QueryTemplate::of(&schema)
            .set("a", Value::Int(1))
            .and_then(|t| t.set("c", Value::Int(3)))
            .expect("template should build");
        let found = engine.mfind(&template).expect("mfind should succeed");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), &EntityKey::from("e1"));
    }

    #[test]
    fn mfind_pages_through_two_hundred_fifty_entities() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let schema = engine.schema().clone();

        // 120 entities under category 5 and 130 under category 7: both the
        // index scan and the bulk load must cross a page boundary at the
        // default page size of 100.
        for n in 0..250 {
            let category = if n < 120 { 5 } else { 7 };
            let entity = item(&schema, &format!("k{n:03}"), category, "x", "ada");
            engine.save(&entity, n).expect("save should succeed");
        }

        let template = QueryTemplate::of(&schema)
            .set("category", Value::Int(5))
            .expect("template should build");
        let found = engine.mfind(&template).expect("mfind should succeed");

        assert_eq!(found.len(), 120);
        assert!(
            found
                .iter()
                .all(|e| e.value("category") == Some(&Value::Int(5)))
        );
    }

    #[test]
    fn stale_entries_are_rejected_and_forwarded_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let repair = Arc::new(RecordingRepair::default());
        let engine = QueryEngine::with_repair(
            Arc::clone(&store) as Arc<dyn ColumnStore>,
            item_schema(),
            EngineConfig::default(),
            Arc::clone(&repair) as Arc<dyn RepairStrategy>,
        );
        let schema = engine.schema().clone();

        engine
            .save(&item(&schema, "i1", 5, "x", "ada"), 10)
            .expect("save should succeed");
        engine
            .save(&item(&schema, "i2", 5, "x", "ada"), 10)
            .expect("save should succeed");
        // i2's owner changes; the category-5 index entry still lists it.
        engine
            .save(
                &item(&schema, "i2", 5, "x", "bob"),
                20,
            )
            .expect("save should succeed");

        let template = QueryTemplate::of(&schema)
            .set("category", Value::Int(5))
            .and_then(|t| t.set("owner", Value::Text("ada".to_string())))
            .expect("template should build");
        let found = engine.mfind(&template).expect("mfind should succeed");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), &EntityKey::from("i1"));

        let batches = repair.batches.lock();
        assert_eq!(batches.len(), 1, "one batch per query");
        assert_eq!(batches[0].len(), 1, "exactly one candidate for i2");
    }

    #[test]
    fn deleted_entity_is_repaired_out_of_the_index() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let schema = engine.schema().clone();

        engine
            .save(&item(&schema, "i1", 5, "x", "ada"), 10)
            .expect("save should succeed");
        engine
            .delete_entity(&EntityKey::from("i1"), 15)
            .expect("delete should succeed");

        let template = QueryTemplate::of(&schema)
            .set("category", Value::Int(5))
            .expect("template should build");

        // First read detects the dangling entry and inline-repairs it.
        assert!(engine.mfind(&template).expect("mfind should succeed").is_empty());

        let index = Arc::clone(
            schema
                .indexes()
                .iter()
                .find(|i| i.id() == "category")
                .expect("category index exists"),
        );
        let index_row = schema.index_row_key(&index, &b"0".to_vec());
        assert_eq!(store.column_count(&index_row), 0, "stale entry removed");
    }

    #[test]
    fn range_query_is_ordered_when_requested() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let schema = engine.schema().clone();

        for (key, category) in [("c", 3), ("a", 1), ("d", 4), ("b", 2)] {
            engine
                .save(&item(&schema, key, category, "x", "ada"), 1)
                .expect("save should succeed");
        }

        let start = QueryTemplate::of(&schema)
            .set("category", Value::Int(1))
            .expect("start template");
        let end = QueryTemplate::of(&schema)
            .set("category", Value::Int(4))
            .expect("end template");

        let ascending: Vec<i64> = engine
            .mfind_between_ordered(&start, &end, SortOrder::Ascending)
            .expect("query should succeed")
            .iter()
            .map(|e| match e.value("category") {
                Some(Value::Int(v)) => *v,
                other => panic!("unexpected category {other:?}"),
            })
            .collect();
        assert_eq!(ascending, vec![1, 2, 3, 4]);

        let descending: Vec<i64> = engine
            .mfind_between_ordered(&start, &end, SortOrder::Descending)
            .expect("query should succeed")
            .iter()
            .map(|e| match e.value("category") {
                Some(Value::Int(v)) => *v,
                other => panic!("unexpected category {other:?}"),
            })
            .collect();
        assert_eq!(descending, vec![4, 3, 2, 1]);
    }

    #[test]
    fn ordered_query_refuses_a_hash_index() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let schema = engine.schema().clone();

        let start = QueryTemplate::of(&schema)
            .set("owner", Value::Text("ada".to_string()))
            .expect("start template");
        let end = start.clone();

        let err = engine
            .mfind_between(&start, &end)
            .expect_err("owner has no range index");
        assert!(err.is_programmer_error());
    }

    #[test]
    fn store_read_failures_propagate_unmodified() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let schema = engine.schema().clone();

        engine
            .save(&item(&schema, "i1", 5, "x", "ada"), 10)
            .expect("save should succeed");
        store.fail_reads(true);

        let template = QueryTemplate::of(&schema)
            .set("category", Value::Int(5))
            .expect("template should build");
        let err = engine.mfind(&template).expect_err("reads are failing");
        assert_eq!(err.class, crate::error::ErrorClass::Io);
    }

    #[test]
    fn template_from_another_schema_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);

        let other = EntitySchema::builder("order")
            .property("category", crate::value::ValueKind::Int)
            .range_index(&["category"])
            .build()
            .expect("schema should build");
        let template = QueryTemplate::of(&other)
            .set("category", Value::Int(1))
            .expect("template should build");

        let err = engine.mfind(&template).expect_err("schema mismatch");
        assert!(err.is_programmer_error());
    }
}
