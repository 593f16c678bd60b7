//! Column wire codec for entity property values.
//!
//! This is the storage representation of one property inside an entity row
//! (and the probe bytes for native equality lookups). It is deliberately
//! separate from the ordered index codec in `key::ordered`: wire bytes are
//! compact and kind-scoped, not order-preserving.

use crate::{
    error::EngineError,
    value::{Value, ValueKind},
};
use num_bigint::BigInt;
use thiserror::Error as ThisError;

///
/// WireError
///
/// Column codec failures for one property value.
///

#[derive(Debug, ThisError)]
pub enum WireError {
    #[error("cannot encode a null value as a column")]
    NullColumn,

    #[error("value kind '{found}' does not match property kind '{expected}'")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("column payload malformed for kind '{kind}': {reason}")]
    Malformed {
        kind: &'static str,
        reason: &'static str,
    },

    #[error("column payload is not valid utf-8")]
    InvalidUtf8,
}

impl From<WireError> for EngineError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::NullColumn | WireError::KindMismatch { .. } => {
                Self::codec_unsupported(err.to_string())
            }
            WireError::Malformed { .. } | WireError::InvalidUtf8 => {
                Self::codec_corruption(err.to_string())
            }
        }
    }
}

/// Encode one property value into column wire bytes.
pub fn encode_column(kind: ValueKind, value: &Value) -> Result<Vec<u8>, WireError> {
    let found = value.kind().ok_or(WireError::NullColumn)?;
    if found != kind {
        return Err(WireError::KindMismatch {
            expected: kind.label(),
            found: found.label(),
        });
    }

    let bytes = match value {
        Value::Bool(v) => vec![u8::from(*v)],
        Value::Int(v) => v.to_be_bytes().to_vec(),
        Value::IntBig(v) => v.to_signed_bytes_be(),
        Value::Uint(v) | Value::Timestamp(v) => v.to_be_bytes().to_vec(),
        Value::Text(v) => v.as_bytes().to_vec(),
        Value::Bytes(v) => v.clone(),
        Value::Null => unreachable!("null rejected above"),
    };

    Ok(bytes)
}

/// Decode column wire bytes back into a property value.
pub fn decode_column(kind: ValueKind, bytes: &[u8]) -> Result<Value, WireError> {
    let value = match kind {
        ValueKind::Bool => match bytes {
            [0] => Value::Bool(false),
            [1] => Value::Bool(true),
            _ => {
                return Err(WireError::Malformed {
                    kind: kind.label(),
                    reason: "bool column must be a single 0/1 byte",
                });
            }
        },
        ValueKind::Int => Value::Int(i64::from_be_bytes(fixed8(kind, bytes)?)),
        ValueKind::IntBig => Value::IntBig(BigInt::from_signed_bytes_be(bytes)),
        ValueKind::Uint => Value::Uint(u64::from_be_bytes(fixed8(kind, bytes)?)),
        ValueKind::Timestamp => Value::Timestamp(u64::from_be_bytes(fixed8(kind, bytes)?)),
        ValueKind::Text => Value::Text(
            String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)?,
        ),
        ValueKind::Bytes => Value::Bytes(bytes.to_vec()),
    };

    Ok(value)
}

fn fixed8(kind: ValueKind, bytes: &[u8]) -> Result<[u8; 8], WireError> {
    <[u8; 8]>::try_from(bytes).map_err(|_| WireError::Malformed {
        kind: kind.label(),
        reason: "expected an 8-byte big-endian payload",
    })
}

///
/// TESTS
///
