//! Ordered component codec for composite index keys.
//!
//! Each component is encoded as a canonical kind tag followed by a
//! variant-local payload whose lexicographic byte order matches the value's
//! canonical order. Signed integers are promoted to a sign-bucketed,
//! arbitrary-precision decimal-digit form; fixed-width two's complement does
//! not byte-sort across signs.

use crate::value::{Value, ValueKind};
use num_bigint::{BigInt, Sign};
use thiserror::Error as ThisError;

const NEGATIVE_MARKER: u8 = 0x00;
const ZERO_MARKER: u8 = 0x01;
const POSITIVE_MARKER: u8 = 0x02;

const LENGTH_BYTES: usize = 2;
const MAX_SEGMENT_LEN: usize = u16::MAX as usize;

const ESCAPE: u8 = 0x00;
const ESCAPED_ZERO: u8 = 0xFF;
const TERMINATOR: [u8; 2] = [0x00, 0x00];

///
/// OrderedValueEncodeError
///
/// Canonical index-encoding failures for one `Value` component.
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum OrderedValueEncodeError {
    #[error("null values are not indexable")]
    NullNotIndexable,

    #[error("ordered segment exceeds max length: {len} bytes (limit {max})")]
    SegmentTooLarge { len: usize, max: usize },
}

///
/// OrderedValueDecodeError
///
/// Failures while reading one encoded component back out of key bytes.
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum OrderedValueDecodeError {
    #[error("encoded component truncated")]
    Truncated,

    #[error("unknown component tag {tag:#04x}")]
    UnknownTag { tag: u8 },

    #[error("unknown sign marker {marker:#04x}")]
    UnknownSignMarker { marker: u8 },

    #[error("encoded decimal digits are malformed")]
    InvalidDigits,

    #[error("encoded byte segment has an invalid escape sequence")]
    InvalidEscape,

    #[error("decoded integer exceeds the component's native width")]
    IntOutOfRange,

    #[error("encoded text payload is not valid utf-8")]
    InvalidUtf8,
}

/// Encode one component so lexicographic byte order matches canonical
/// `Value` order within the component's kind.
pub fn encode_component(value: &Value, out: &mut Vec<u8>) -> Result<(), OrderedValueEncodeError> {
    let tag = value
        .canonical_tag()
        .ok_or(OrderedValueEncodeError::NullNotIndexable)?;
    out.push(tag);

    match value {
        Value::Bool(v) => out.push(u8::from(*v)),
        Value::Int(v) => push_signed_payload(out, &BigInt::from(*v))?,
        Value::IntBig(v) => push_signed_payload(out, v)?,
        Value::Uint(v) | Value::Timestamp(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::Text(v) => push_terminated_bytes(out, v.as_bytes()),
        Value::Bytes(v) => push_terminated_bytes(out, v),
        Value::Null => unreachable!("null rejected by canonical_tag"),
    }

    Ok(())
}

/// Decode one component starting at `*pos`, advancing `*pos` past it.
pub fn decode_component(bytes: &[u8], pos: &mut usize) -> Result<Value, OrderedValueDecodeError> {
    let tag = take_byte(bytes, pos)?;
    let kind = ValueKind::from_tag(tag).ok_or(OrderedValueDecodeError::UnknownTag { tag })?;

    let value = match kind {
        ValueKind::Bool => Value::Bool(take_byte(bytes, pos)? != 0),
        ValueKind::Int => {
            let big = take_signed_payload(bytes, pos)?;
            let v = i64::try_from(big).map_err(|_| OrderedValueDecodeError::IntOutOfRange)?;
            Value::Int(v)
        }
        ValueKind::IntBig => Value::IntBig(take_signed_payload(bytes, pos)?),
        ValueKind::Uint => Value::Uint(take_u64(bytes, pos)?),
        ValueKind::Timestamp => Value::Timestamp(take_u64(bytes, pos)?),
        ValueKind::Text => {
            let raw = take_terminated_bytes(bytes, pos)?;
            let text =
                String::from_utf8(raw).map_err(|_| OrderedValueDecodeError::InvalidUtf8)?;
            Value::Text(text)
        }
        ValueKind::Bytes => Value::Bytes(take_terminated_bytes(bytes, pos)?),
    };

    Ok(value)
}

// Signed ordering is sign bucket + digit length + decimal digits, with the
// length and digits bitwise-inverted in the negative bucket so larger
// magnitudes sort earlier.
fn push_signed_payload(out: &mut Vec<u8>, value: &BigInt) -> Result<(), OrderedValueEncodeError> {
    match value.sign() {
        Sign::NoSign => {
            out.push(ZERO_MARKER);
            Ok(())
        }
        Sign::Plus => {
            let digits = value.magnitude().to_str_radix(10).into_bytes();
            let len = encode_segment_len(digits.len())?;

            out.push(POSITIVE_MARKER);
            out.extend_from_slice(&len);
            out.extend_from_slice(&digits);
            Ok(())
        }
        Sign::Minus => {
            let digits = value.magnitude().to_str_radix(10).into_bytes();
            let len = encode_segment_len(digits.len())?;

            out.push(NEGATIVE_MARKER);
            push_inverted(out, &len);
            push_inverted(out, &digits);
            Ok(())
        }
    }
}

fn take_signed_payload(bytes: &[u8], pos: &mut usize) -> Result<BigInt, OrderedValueDecodeError> {
    let marker = take_byte(bytes, pos)?;

    let (negative, digits) = match marker {
        ZERO_MARKER => return Ok(BigInt::from(0)),
        POSITIVE_MARKER => {
            let len = take_segment_len(bytes, pos, false)?;
            (false, take_slice(bytes, pos, len)?.to_vec())
        }
        NEGATIVE_MARKER => {
            let len = take_segment_len(bytes, pos, true)?;
            let inverted: Vec<u8> = take_slice(bytes, pos, len)?.iter().map(|b| !b).collect();
            (true, inverted)
        }
        marker => return Err(OrderedValueDecodeError::UnknownSignMarker { marker }),
    };

    let magnitude = BigInt::parse_bytes(&digits, 10).ok_or(OrderedValueDecodeError::InvalidDigits)?;

    Ok(if negative { -magnitude } else { magnitude })
}

// Byte strings are escaped so tuple boundaries remain unambiguous while
// preserving lexicographic order.
fn push_terminated_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    for &byte in bytes {
        if byte == ESCAPE {
            out.extend_from_slice(&[ESCAPE, ESCAPED_ZERO]);
        } else {
            out.push(byte);
        }
    }

    out.extend_from_slice(&TERMINATOR);
}

fn take_terminated_bytes(
    bytes: &[u8],
    pos: &mut usize,
) -> Result<Vec<u8>, OrderedValueDecodeError> {
    let mut out = Vec::new();

    loop {
        let byte = take_byte(bytes, pos)?;
        if byte != ESCAPE {
            out.push(byte);
            continue;
        }

        match take_byte(bytes, pos)? {
            0x00 => return Ok(out),
            ESCAPED_ZERO => out.push(ESCAPE),
            _ => return Err(OrderedValueDecodeError::InvalidEscape),
        }
    }
}

fn push_inverted(out: &mut Vec<u8>, bytes: &[u8]) {
    for &byte in bytes {
        out.push(!byte);
    }
}

fn encode_segment_len(len: usize) -> Result<[u8; LENGTH_BYTES], OrderedValueEncodeError> {
    let len_u16 = u16::try_from(len).map_err(|_| OrderedValueEncodeError::SegmentTooLarge {
        len,
        max: MAX_SEGMENT_LEN,
    })?;

    Ok(len_u16.to_be_bytes())
}

fn take_segment_len(
    bytes: &[u8],
    pos: &mut usize,
    inverted: bool,
) -> Result<usize, OrderedValueDecodeError> {
    let raw = take_slice(bytes, pos, LENGTH_BYTES)?;
    let (hi, lo) = if inverted {
        (!raw[0], !raw[1])
    } else {
        (raw[0], raw[1])
    };

    Ok(usize::from(u16::from_be_bytes([hi, lo])))
}

fn take_u64(bytes: &[u8], pos: &mut usize) -> Result<u64, OrderedValueDecodeError> {
    let raw = take_slice(bytes, pos, 8)?;
    let arr = <[u8; 8]>::try_from(raw).map_err(|_| OrderedValueDecodeError::Truncated)?;

    Ok(u64::from_be_bytes(arr))
}

fn take_byte(bytes: &[u8], pos: &mut usize) -> Result<u8, OrderedValueDecodeError> {
    let byte = *bytes.get(*pos).ok_or(OrderedValueDecodeError::Truncated)?;
    *pos += 1;

    Ok(byte)
}

fn take_slice<'a>(
    bytes: &'a [u8],
    pos: &mut usize,
    len: usize,
) -> Result<&'a [u8], OrderedValueDecodeError> {
    let end = pos
        .checked_add(len)
        .ok_or(OrderedValueDecodeError::Truncated)?;
    let slice = bytes.get(*pos..end).ok_or(OrderedValueDecodeError::Truncated)?;
    *pos = end;

    Ok(slice)
}

///
/// TESTS
///
