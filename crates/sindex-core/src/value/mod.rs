pub mod wire;

use num_bigint::BigInt;
use std::fmt;

///
/// Value
///
/// Canonical runtime value for one entity property.
/// Variant declaration order is the canonical cross-kind order and must
/// match the tag bytes emitted by the ordered index codec.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Value {
    Bool(bool),
    Int(i64),
    IntBig(BigInt),
    Uint(u64),
    Timestamp(u64),
    Text(String),
    Bytes(Vec<u8>),
    Null,
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Bool(_) => Some(ValueKind::Bool),
            Self::Int(_) => Some(ValueKind::Int),
            Self::IntBig(_) => Some(ValueKind::IntBig),
            Self::Uint(_) => Some(ValueKind::Uint),
            Self::Timestamp(_) => Some(ValueKind::Timestamp),
            Self::Text(_) => Some(ValueKind::Text),
            Self::Bytes(_) => Some(ValueKind::Bytes),
            Self::Null => None,
        }
    }

    /// Canonical tag byte for the ordered index codec.
    /// `Null` has no tag; it is never index-encodable.
    #[must_use]
    pub const fn canonical_tag(&self) -> Option<u8> {
        match self.kind() {
            Some(kind) => Some(kind.tag()),
            None => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self.kind() {
            Some(kind) => kind.label(),
            None => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::IntBig(v) => write!(f, "{v}"),
            Self::Uint(v) | Self::Timestamp(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Null => write!(f, "null"),
        }
    }
}

///
/// ValueKind
///
/// Names the storable kinds for schema registration. Each kind owns one
/// canonical tag byte; tag order equals `Value` declaration order.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueKind {
    Bool,
    Int,
    IntBig,
    Uint,
    Timestamp,
    Text,
    Bytes,
}

impl ValueKind {
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Bool => 0x01,
            Self::Int => 0x02,
            Self::IntBig => 0x03,
            Self::Uint => 0x04,
            Self::Timestamp => 0x05,
            Self::Text => 0x06,
            Self::Bytes => 0x07,
        }
    }

    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::Bool),
            0x02 => Some(Self::Int),
            0x03 => Some(Self::IntBig),
            0x04 => Some(Self::Uint),
            0x05 => Some(Self::Timestamp),
            0x06 => Some(Self::Text),
            0x07 => Some(Self::Bytes),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::IntBig => "int_big",
            Self::Uint => "uint",
            Self::Timestamp => "timestamp",
            Self::Text => "text",
            Self::Bytes => "bytes",
        }
    }
}

///
/// TESTS
///
