use crate::{model::entity::PropertyModel, partition::Partitioner};
use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
    sync::Arc,
};

///
/// IndexType
///
/// Hash indexes answer exact-value lookups through the store's native
/// equality support and carry exactly one property. Range indexes are
/// engine-maintained ordered index rows.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexType {
    Hash,
    Range,
}

///
/// IndexMetadata
///
/// Immutable descriptor for one index: type, ordered indexed properties,
/// partitioning policy, and a deterministic id. Constructed once at schema
/// registration and shared across all queries. Identity (equality and
/// hashing) is defined on `id` alone.
///

#[derive(Debug)]
pub struct IndexMetadata {
    index_type: IndexType,
    properties: Vec<PropertyModel>,
    partitioner: Arc<dyn Partitioner>,
    id: String,
}

impl IndexMetadata {
    pub(crate) fn new(
        index_type: IndexType,
        properties: Vec<PropertyModel>,
        partitioner: Arc<dyn Partitioner>,
    ) -> Self {
        let id = properties
            .iter()
            .map(|p| p.column.as_str())
            .collect::<Vec<_>>()
            .join(".");

        Self {
            index_type,
            properties,
            partitioner,
            id,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn index_type(&self) -> IndexType {
        self.index_type
    }

    #[must_use]
    pub fn properties(&self) -> &[PropertyModel] {
        &self.properties
    }

    #[must_use]
    pub fn partitioner(&self) -> &Arc<dyn Partitioner> {
        &self.partitioner
    }

    /// Bitmask of the schema positions this index covers.
    #[must_use]
    pub fn position_mask(&self) -> u64 {
        self.properties
            .iter()
            .fold(0u64, |mask, p| mask | (1u64 << p.position))
    }

    /// Length of the leading run of indexed properties covered by the
    /// assigned-position mask. Matching stops at the first indexed property
    /// the caller did not assign.
    #[must_use]
    pub fn prefix_len(&self, assigned: u64) -> usize {
        self.properties
            .iter()
            .take_while(|p| assigned & (1u64 << p.position) != 0)
            .count()
    }

    /// Whether the assigned-position set equals the indexed-property set.
    #[must_use]
    pub fn matches_exactly(&self, assigned: u64) -> bool {
        assigned != 0 && self.position_mask() == assigned
    }
}

impl PartialEq for IndexMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for IndexMetadata {}

impl Hash for IndexMetadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for IndexMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.index_type {
            IndexType::Hash => "HASH",
            IndexType::Range => "RANGE",
        };

        write!(f, "{kind}({})", self.id)
    }
}

///
/// TESTS
///
