pub mod ordered;

use crate::{
    error::EngineError,
    key::ordered::{OrderedValueDecodeError, OrderedValueEncodeError},
    model::entity::EntityKey,
    value::Value,
};
use thiserror::Error as ThisError;

///
/// Boundary
///
/// Per-component range marker. `Equal` sorts before `GreaterOrEqual` when
/// every preceding component ties, which is what lets a single byte-string
/// comparison implement inclusive multi-column range bounds.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Boundary {
    Equal,
    GreaterOrEqual,
}

impl Boundary {
    const fn to_byte(self) -> u8 {
        match self {
            Self::Equal => 0x00,
            Self::GreaterOrEqual => 0x01,
        }
    }

    const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Equal),
            0x01 => Some(Self::GreaterOrEqual),
            _ => None,
        }
    }
}

///
/// CompositeKeyError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum CompositeKeyError {
    #[error("composite component failed to encode: {0}")]
    Encode(#[from] OrderedValueEncodeError),

    #[error("composite component failed to decode: {0}")]
    Decode(#[from] OrderedValueDecodeError),

    #[error("composite key has an invalid boundary byte {byte:#04x}")]
    InvalidBoundary { byte: u8 },

    #[error("composite key must have at least one component")]
    Empty,

    #[error("composite key has no trailing entity-key component")]
    MissingEntityKey,
}

impl From<CompositeKeyError> for EngineError {
    fn from(err: CompositeKeyError) -> Self {
        match err {
            CompositeKeyError::Encode(_) | CompositeKeyError::Empty => {
                Self::codec_unsupported(err.to_string())
            }
            CompositeKeyError::Decode(_)
            | CompositeKeyError::InvalidBoundary { .. }
            | CompositeKeyError::MissingEntityKey => Self::codec_corruption(err.to_string()),
        }
    }
}

///
/// CompositeKey
///
/// Ordered sequence of `(Value, Boundary)` pairs encoded into a single
/// sortable byte string. The encoding sorts identically to a component-wise
/// comparison of the values with the boundary as tiebreak, so encoded keys
/// serve both as index column keys and as range-scan bounds.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CompositeKey {
    components: Vec<(Value, Boundary)>,
}

impl CompositeKey {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Build a key from values, every component marked `Equal`.
    pub fn equal(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            components: values.into_iter().map(|v| (v, Boundary::Equal)).collect(),
        }
    }

    /// Inclusive lower scan bound for a value tuple: all components `Equal`,
    /// so the bound sorts at or before every stored key sharing the prefix.
    pub fn scan_start(values: impl IntoIterator<Item = Value>) -> Self {
        Self::equal(values)
    }

    /// Inclusive upper scan bound for a value tuple: the last component is
    /// marked `GreaterOrEqual`, so the bound sorts after every stored key
    /// whose components equal the tuple, regardless of trailing entity key.
    pub fn scan_end(values: impl IntoIterator<Item = Value>) -> Self {
        let mut key = Self::equal(values);
        if let Some(last) = key.components.last_mut() {
            last.1 = Boundary::GreaterOrEqual;
        }

        key
    }

    pub fn push(&mut self, value: Value, boundary: Boundary) {
        self.components.push((value, boundary));
    }

    /// Append the trailing entity-key component that disambiguates rows
    /// sharing identical indexed values.
    #[must_use]
    pub fn with_entity_key(mut self, key: &EntityKey) -> Self {
        self.components
            .push((Value::Bytes(key.as_bytes().to_vec()), Boundary::Equal));
        self
    }

    #[must_use]
    pub fn components(&self) -> &[(Value, Boundary)] {
        &self.components
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Extract the trailing entity-key component.
    pub fn entity_key(&self) -> Result<EntityKey, CompositeKeyError> {
        match self.components.last() {
            Some((Value::Bytes(bytes), _)) => Ok(EntityKey::new(bytes.clone())),
            _ => Err(CompositeKeyError::MissingEntityKey),
        }
    }

    /// Indexed-value components, excluding the trailing entity key.
    #[must_use]
    pub fn indexed_values(&self) -> &[(Value, Boundary)] {
        match self.components.split_last() {
            Some((_, head)) => head,
            None => &[],
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CompositeKeyError> {
        if self.components.is_empty() {
            return Err(CompositeKeyError::Empty);
        }

        let mut out = Vec::new();
        for (value, boundary) in &self.components {
            ordered::encode_component(value, &mut out)?;
            out.push(boundary.to_byte());
        }

        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CompositeKeyError> {
        if bytes.is_empty() {
            return Err(CompositeKeyError::Empty);
        }

        let mut components = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            let value = ordered::decode_component(bytes, &mut pos)?;
            let byte = *bytes
                .get(pos)
                .ok_or(CompositeKeyError::Decode(OrderedValueDecodeError::Truncated))?;
            pos += 1;

            let boundary =
                Boundary::from_byte(byte).ok_or(CompositeKeyError::InvalidBoundary { byte })?;
            components.push((value, boundary));
        }

        Ok(Self { components })
    }
}

impl Default for CompositeKey {
    fn default() -> Self {
        Self::new()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cmp::Ordering;

    fn key(values: &[i64]) -> CompositeKey {
        CompositeKey::equal(values.iter().map(|v| Value::Int(*v)))
    }

    #[test]
    fn round_trip_with_entity_key() {
        let original = CompositeKey::equal([
            Value::Int(-12),
            Value::Text("abc".to_string()),
            Value::Uint(7),
        ])
        .with_entity_key(&EntityKey::new(b"user:42".to_vec()));

        let bytes = original.encode().expect("should encode");
        let decoded = CompositeKey::decode(&bytes).expect("should decode");

        assert_eq!(decoded, original);
        assert_eq!(
            decoded.entity_key().expect("trailing entity key"),
            EntityKey::new(b"user:42".to_vec())
        );
    }

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(CompositeKey::new().encode(), Err(CompositeKeyError::Empty));
    }

    #[test]
    fn prefix_sorts_before_extension() {
        let prefix = key(&[3]).encode().unwrap();
        let extended = key(&[3, 1]).encode().unwrap();

        assert_eq!(prefix.cmp(&extended), Ordering::Less);
    }

    #[test]
    fn boundary_orders_equal_before_greater_or_equal() {
        let start = CompositeKey::scan_start([Value::Int(5)]).encode().unwrap();
        let stored = CompositeKey::equal([Value::Int(5)])
            .with_entity_key(&EntityKey::new(b"k".to_vec()))
            .encode()
            .unwrap();
        let end = CompositeKey::scan_end([Value::Int(5)]).encode().unwrap();

        assert!(start <= stored, "start bound must not exclude stored keys");
        assert!(stored < end, "end bound must cover stored keys");
    }

    #[test]
    fn scan_end_marks_only_last_component() {
        let end = CompositeKey::scan_end([Value::Int(1), Value::Int(2)]);
        assert_eq!(
            end.components(),
            &[
                (Value::Int(1), Boundary::Equal),
                (Value::Int(2), Boundary::GreaterOrEqual),
            ]
        );
    }

    fn arbitrary_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<u64>().prop_map(Value::Uint),
            "[a-z]{0,8}".prop_map(Value::Text),
            proptest::collection::vec(any::<u8>(), 0..12).prop_map(Value::Bytes),
        ]
    }

    proptest! {
        #[test]
        fn tuple_round_trips(
            values in proptest::collection::vec(arbitrary_value(), 1..4),
            ge_last in any::<bool>(),
        ) {
            let key = if ge_last {
                CompositeKey::scan_end(values)
            } else {
                CompositeKey::equal(values)
            };

            let bytes = key.encode().expect("should encode");
            prop_assert_eq!(CompositeKey::decode(&bytes).expect("should decode"), key);
        }

        #[test]
        fn same_kind_tuples_sort_component_wise(
            a in proptest::collection::vec(any::<i64>(), 2),
            b in proptest::collection::vec(any::<i64>(), 2),
        ) {
            let left = key(&a).encode().unwrap();
            let right = key(&b).encode().unwrap();
            prop_assert_eq!(left.cmp(&right), a.cmp(&b));
        }
    }
}
