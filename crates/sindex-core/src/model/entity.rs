use crate::{
    MAX_INDEX_PROPERTIES, MAX_PROPERTIES,
    error::EngineError,
    model::index::{IndexMetadata, IndexType},
    partition::{PartitionValue, Partitioner, SinglePartitioner},
    store::RowKey,
    value::{Value, ValueKind},
};
use std::{collections::HashMap, fmt, sync::Arc};

///
/// EntityKey
///
/// Opaque storage key for one entity row. Also appended as the trailing
/// composite-key component of every engine-maintained index column.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EntityKey(Vec<u8>);

impl EntityKey {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

///
/// PropertyModel
///
/// One registered property: logical name, physical column name, storable
/// kind, and positional slot in the schema's ordered property list.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PropertyModel {
    pub name: String,
    pub column: String,
    pub kind: ValueKind,
    pub position: usize,
}

///
/// EntitySchema
///
/// Immutable runtime model for one entity type: ordered property list and
/// index definitions, produced by the registration builder at startup.
/// Replaces any runtime type introspection.
///

pub struct EntitySchema {
    name: String,
    properties: Vec<PropertyModel>,
    indexes: Vec<Arc<IndexMetadata>>,
    by_name: HashMap<String, usize>,
    by_column: HashMap<String, usize>,
}

impl EntitySchema {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder::new(name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn properties(&self) -> &[PropertyModel] {
        &self.properties
    }

    #[must_use]
    pub fn indexes(&self) -> &[Arc<IndexMetadata>] {
        &self.indexes
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyModel> {
        self.by_name.get(name).map(|pos| &self.properties[*pos])
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn property_by_column(&self, column: &str) -> Option<&PropertyModel> {
        self.by_column.get(column).map(|pos| &self.properties[*pos])
    }

    /// Recover the entity key from a primary row key, if the row belongs to
    /// this entity's namespace.
    #[must_use]
    pub fn entity_key_of_row(&self, row: &RowKey) -> Option<EntityKey> {
        let bytes = row.as_bytes();
        let prefix_len = self.name.len() + 1;

        if bytes.len() <= prefix_len
            || &bytes[..self.name.len()] != self.name.as_bytes()
            || bytes[self.name.len()] != b':'
        {
            return None;
        }

        Some(EntityKey::new(bytes[prefix_len..].to_vec()))
    }

    /// Physical row key of an entity's primary row.
    #[must_use]
    pub fn entity_row_key(&self, key: &EntityKey) -> RowKey {
        let mut bytes = Vec::with_capacity(self.name.len() + 1 + key.as_bytes().len());
        bytes.extend_from_slice(self.name.as_bytes());
        bytes.push(b':');
        bytes.extend_from_slice(key.as_bytes());

        RowKey::new(bytes)
    }

    /// Physical row key of one partition of an index.
    #[must_use]
    pub fn index_row_key(&self, index: &IndexMetadata, partition: &PartitionValue) -> RowKey {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"idx:");
        bytes.extend_from_slice(self.name.as_bytes());
        bytes.push(b':');
        bytes.extend_from_slice(index.id().as_bytes());
        bytes.push(b':');
        bytes.extend_from_slice(partition);

        RowKey::new(bytes)
    }
}

impl fmt::Debug for EntitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("name", &self.name)
            .field("properties", &self.properties.len())
            .field("indexes", &self.indexes.len())
            .finish()
    }
}

///
/// EntitySchemaBuilder
///
/// Explicit schema-registration step. Validation happens in `build`; the
/// fluent setters never fail.
///

pub struct EntitySchemaBuilder {
    name: String,
    properties: Vec<(String, String, ValueKind)>,
    indexes: Vec<IndexDef>,
}

struct IndexDef {
    index_type: IndexType,
    properties: Vec<String>,
    partitioner: Arc<dyn Partitioner>,
}

impl EntitySchemaBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Register a property whose physical column name equals its logical name.
    #[must_use]
    pub fn property(self, name: &str, kind: ValueKind) -> Self {
        self.property_with_column(name, name, kind)
    }

    #[must_use]
    pub fn property_with_column(mut self, name: &str, column: &str, kind: ValueKind) -> Self {
        self.properties
            .push((name.to_string(), column.to_string(), kind));
        self
    }

    #[must_use]
    pub fn hash_index(mut self, property: &str) -> Self {
        self.indexes.push(IndexDef {
            index_type: IndexType::Hash,
            properties: vec![property.to_string()],
            partitioner: Arc::new(SinglePartitioner),
        });
        self
    }

    #[must_use]
    pub fn range_index(self, properties: &[&str]) -> Self {
        self.range_index_partitioned(properties, Arc::new(SinglePartitioner))
    }

    #[must_use]
    pub fn range_index_partitioned(
        mut self,
        properties: &[&str],
        partitioner: Arc<dyn Partitioner>,
    ) -> Self {
        self.indexes.push(IndexDef {
            index_type: IndexType::Range,
            properties: properties.iter().map(|p| (*p).to_string()).collect(),
            partitioner,
        });
        self
    }

    pub fn build(self) -> Result<Arc<EntitySchema>, EngineError> {
        if self.name.is_empty() {
            return Err(EngineError::schema_invariant("entity name must not be empty"));
        }
        if self.properties.is_empty() {
            return Err(EngineError::schema_invariant(format!(
                "entity '{}' must register at least one property",
                self.name
            )));
        }
        if self.properties.len() > MAX_PROPERTIES {
            return Err(EngineError::schema_invariant(format!(
                "entity '{}' has {} properties (max {MAX_PROPERTIES})",
                self.name,
                self.properties.len()
            )));
        }

        let mut by_name = HashMap::new();
        let mut by_column = HashMap::new();
        let mut properties = Vec::with_capacity(self.properties.len());

        for (position, (name, column, kind)) in self.properties.into_iter().enumerate() {
            if by_name.insert(name.clone(), position).is_some() {
                return Err(EngineError::schema_invariant(format!(
                    "duplicate property '{name}' on entity '{}'",
                    self.name
                )));
            }
            if by_column.insert(column.clone(), position).is_some() {
                return Err(EngineError::schema_invariant(format!(
                    "duplicate physical column '{column}' on entity '{}'",
                    self.name
                )));
            }
            properties.push(PropertyModel {
                name,
                column,
                kind,
                position,
            });
        }

        let mut indexes: Vec<Arc<IndexMetadata>> = Vec::with_capacity(self.indexes.len());

        for def in self.indexes {
            if def.properties.is_empty() || def.properties.len() > MAX_INDEX_PROPERTIES {
                return Err(EngineError::schema_invariant(format!(
                    "index on entity '{}' must have 1..={MAX_INDEX_PROPERTIES} properties",
                    self.name
                )));
            }
            if def.index_type == IndexType::Hash && def.properties.len() != 1 {
                return Err(EngineError::schema_invariant(format!(
                    "hash index on entity '{}' must have exactly one property",
                    self.name
                )));
            }

            let mut indexed = Vec::with_capacity(def.properties.len());
            for name in &def.properties {
                let position = by_name.get(name).ok_or_else(|| {
                    EngineError::schema_invariant(format!(
                        "index references unknown property '{name}' on entity '{}'",
                        self.name
                    ))
                })?;
                indexed.push(properties[*position].clone());
            }

            let index = IndexMetadata::new(def.index_type, indexed, def.partitioner);
            if indexes.iter().any(|existing| existing.id() == index.id()) {
                return Err(EngineError::schema_invariant(format!(
                    "duplicate index '{}' on entity '{}'",
                    index.id(),
                    self.name
                )));
            }

            indexes.push(Arc::new(index));
        }

        Ok(Arc::new(EntitySchema {
            name: self.name,
            properties,
            indexes,
            by_name,
            by_column,
        }))
    }
}

///
/// Entity
///
/// One loaded (or to-be-saved) row: storage key plus positional property
/// values aligned with the schema's ordered property list.
///

#[derive(Clone, Debug)]
pub struct Entity {
    schema: Arc<EntitySchema>,
    key: EntityKey,
    values: Vec<Option<Value>>,
}

impl Entity {
    #[must_use]
    pub fn new(schema: &Arc<EntitySchema>, key: EntityKey) -> Self {
        Self {
            schema: Arc::clone(schema),
            key,
            values: vec![None; schema.properties().len()],
        }
    }

    #[must_use]
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn set(mut self, name: &str, value: Value) -> Result<Self, EngineError> {
        let property = self.schema.property(name).ok_or_else(|| {
            EngineError::schema_invariant(format!(
                "unknown property '{name}' on entity '{}'",
                self.schema.name()
            ))
        })?;

        if let Some(kind) = value.kind()
            && kind != property.kind
        {
            return Err(EngineError::schema_invariant(format!(
                "property '{name}' expects kind '{}', got '{}'",
                property.kind.label(),
                kind.label()
            )));
        }

        let position = property.position;
        self.values[position] = Some(value);

        Ok(self)
    }

    #[must_use]
    pub fn value_at(&self, position: usize) -> Option<&Value> {
        self.values.get(position).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.schema
            .position(name)
            .and_then(|pos| self.value_at(pos))
    }

    pub(crate) fn set_at(&mut self, position: usize, value: Value) {
        if position < self.values.len() {
            self.values[position] = Some(value);
        }
    }
}

///
/// TESTS
///
