//! # Codec
//!
//! The translation layer between `WireValue` and the `helmpack` wire format.
//!
//! ## Invariants
//! - **Round-Trip**: `decode_value(encode_value(v, k), k) == v` for every
//!   value assignable to a kind, including `Null`.
//! - **Recursion Safety**: all recursive operations are bounded by
//!   `MAX_RECURSION_DEPTH`.
//! - **Type Strictness**: typed decoding verifies wire tags against the
//!   expected `WireKind`; map keys must be unique.

use std::collections::HashSet;
use std::net::IpAddr;

use helmpack::Decoder;
use helmpack::Encoder;
use helmpack::Tag;

use uuid::Uuid;

use crate::error::CodecError;
use crate::kind::WireKind;
use crate::value::WireValue;

type Result<T> = std::result::Result<T, CodecError>;

/// The maximum nesting depth for values before giving up.
const MAX_RECURSION_DEPTH: usize = 64;

fn mismatch(kind: &WireKind, val: &WireValue) -> CodecError {
    CodecError::TypeMismatch { expected: kind.signature(), found: val.describe() }
}

/// Encodes a `WireValue` checked against its declared kind.
///
/// `Null` is assignable to every kind and encodes to the explicit absence
/// marker, never to zero bytes.
pub fn encode_value(enc: &mut Encoder, val: &WireValue, kind: &WireKind) -> Result<()> {
    encode_value_impl(enc, val, kind, 0)
}

fn encode_value_impl(enc: &mut Encoder, val: &WireValue, kind: &WireKind, depth: usize) -> Result<()> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(CodecError::RecursionLimitExceeded);
    }

    if let WireKind::Void = kind {
        return Err(CodecError::VoidValue);
    }

    match (kind, val) {
        (_, WireValue::Null) => enc.null()?,
        (WireKind::Bool, WireValue::Bool(v)) => enc.bool(*v)?,
        (WireKind::Byte, WireValue::Byte(v)) => enc.byte(*v)?,
        (WireKind::Int32, WireValue::Int32(v)) => enc.s32(*v)?,
        (WireKind::Int64, WireValue::Int64(v)) => enc.s64(*v)?,
        (WireKind::Float32, WireValue::Float32(v)) => enc.f32(*v)?,
        (WireKind::Float64, WireValue::Float64(v)) => enc.f64(*v)?,
        (WireKind::Text, WireValue::Text(v)) => enc.str(v)?,
        (WireKind::Timestamp, WireValue::Timestamp(v)) => enc.timestamp(*v)?,
        (WireKind::Blob, WireValue::Blob(v)) => enc.bytes(v)?,
        (WireKind::Uuid, WireValue::Uuid(v)) => enc.uuid(v.into_bytes())?,
        (WireKind::Inet, WireValue::Inet(addr)) => match addr {
            IpAddr::V4(v4) => enc.inet(&v4.octets())?,
            IpAddr::V6(v6) => enc.inet(&v6.octets())?,
        },
        (WireKind::List(elem), WireValue::List(items)) => {
            enc.list_begin()?;
            for item in items {
                encode_value_impl(enc, item, elem, depth + 1)?;
            }
            enc.list_end()?;
        }
        (WireKind::Set(elem), WireValue::Set(items)) => {
            enc.set_begin()?;
            for item in items {
                encode_value_impl(enc, item, elem, depth + 1)?;
            }
            enc.set_end()?;
        }
        (WireKind::Map(key_kind, val_kind), WireValue::Map(pairs)) => {
            enc.map_begin()?;
            for (k, v) in pairs {
                encode_value_impl(enc, k, key_kind, depth + 1)?;
                encode_value_impl(enc, v, val_kind, depth + 1)?;
            }
            enc.map_end()?;
        }
        (kind, val) => return Err(mismatch(kind, val)),
    }
    Ok(())
}

/// Decodes a single value checked against the expected `WireKind`.
pub fn decode_value(dec: &mut Decoder, kind: &WireKind) -> Result<WireValue> {
    decode_value_impl(dec, kind, 0)
}

fn decode_value_impl(dec: &mut Decoder, kind: &WireKind, depth: usize) -> Result<WireValue> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(CodecError::RecursionLimitExceeded);
    }

    if dec.peek_null() {
        dec.null()?;
        return Ok(WireValue::Null);
    }

    match kind {
        WireKind::Void => Err(CodecError::VoidValue),
        WireKind::Bool => Ok(WireValue::Bool(dec.bool()?)),
        WireKind::Byte => Ok(WireValue::Byte(dec.byte()?)),
        WireKind::Int32 => Ok(WireValue::Int32(dec.s32()?)),
        WireKind::Int64 => Ok(WireValue::Int64(dec.s64()?)),
        WireKind::Float32 => Ok(WireValue::Float32(dec.f32()?)),
        WireKind::Float64 => Ok(WireValue::Float64(dec.f64()?)),
        WireKind::Text => Ok(WireValue::Text(dec.str()?.to_string())),
        WireKind::Timestamp => Ok(WireValue::Timestamp(dec.timestamp()?)),
        WireKind::Blob => Ok(WireValue::Blob(dec.bytes()?.to_vec())),
        WireKind::Uuid => Ok(WireValue::Uuid(Uuid::from_bytes(dec.uuid()?))),
        WireKind::Inet => decode_inet(dec),
        WireKind::List(elem) => {
            let mut iter = dec.list()?;
            let mut items = Vec::new();
            while let Some(mut item_dec) = iter.next() {
                items.push(decode_value_impl(&mut item_dec, elem, depth + 1)?);
            }
            Ok(WireValue::List(items))
        }
        WireKind::Set(elem) => {
            let mut iter = dec.set()?;
            let mut items = Vec::new();
            while let Some(mut item_dec) = iter.next() {
                items.push(decode_value_impl(&mut item_dec, elem, depth + 1)?);
            }
            Ok(WireValue::Set(items))
        }
        WireKind::Map(key_kind, val_kind) => {
            let mut iter = dec.map()?;
            let mut pairs = Vec::new();
            // Uniqueness over the raw encoded key segments: cheaper than
            // value comparison and exact for a canonical encoding.
            let mut seen: HashSet<&[u8]> = HashSet::new();
            while let Some((mut k_dec, mut v_dec)) = iter.next()? {
                if !seen.insert(k_dec.as_bytes()) {
                    return Err(CodecError::DuplicateMapKey);
                }
                let k = decode_value_impl(&mut k_dec, key_kind, depth + 1)?;
                let v = decode_value_impl(&mut v_dec, val_kind, depth + 1)?;
                pairs.push((k, v));
            }
            Ok(WireValue::Map(pairs))
        }
    }
}

fn decode_inet(dec: &mut Decoder) -> Result<WireValue> {
    let raw = dec.inet()?;
    match raw.len() {
        4 => {
            let octets: [u8; 4] = raw.try_into().unwrap();
            Ok(WireValue::Inet(IpAddr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = raw.try_into().unwrap();
            Ok(WireValue::Inet(IpAddr::from(octets)))
        }
        n => Err(CodecError::InvalidInet(n)),
    }
}

/// Encodes a `WireValue` without a declared kind.
///
/// The wire format is self-describing, so the peer that lacks the schema
/// (the client decoding result rows) can still reconstruct the value.
pub fn encode_value_any(enc: &mut Encoder, val: &WireValue) -> Result<()> {
    encode_any_impl(enc, val, 0)
}

fn encode_any_impl(enc: &mut Encoder, val: &WireValue, depth: usize) -> Result<()> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(CodecError::RecursionLimitExceeded);
    }

    match val {
        WireValue::Null => enc.null()?,
        WireValue::Bool(v) => enc.bool(*v)?,
        WireValue::Byte(v) => enc.byte(*v)?,
        WireValue::Int32(v) => enc.s32(*v)?,
        WireValue::Int64(v) => enc.s64(*v)?,
        WireValue::Float32(v) => enc.f32(*v)?,
        WireValue::Float64(v) => enc.f64(*v)?,
        WireValue::Text(v) => enc.str(v)?,
        WireValue::Timestamp(v) => enc.timestamp(*v)?,
        WireValue::Blob(v) => enc.bytes(v)?,
        WireValue::Uuid(v) => enc.uuid(v.into_bytes())?,
        WireValue::Inet(IpAddr::V4(v4)) => enc.inet(&v4.octets())?,
        WireValue::Inet(IpAddr::V6(v6)) => enc.inet(&v6.octets())?,
        WireValue::List(items) => {
            enc.list_begin()?;
            for item in items {
                encode_any_impl(enc, item, depth + 1)?;
            }
            enc.list_end()?;
        }
        WireValue::Set(items) => {
            enc.set_begin()?;
            for item in items {
                encode_any_impl(enc, item, depth + 1)?;
            }
            enc.set_end()?;
        }
        WireValue::Map(pairs) => {
            enc.map_begin()?;
            for (k, v) in pairs {
                encode_any_impl(enc, k, depth + 1)?;
                encode_any_impl(enc, v, depth + 1)?;
            }
            enc.map_end()?;
        }
    }
    Ok(())
}

/// Decodes a value from its own tags, without a declared kind.
pub fn decode_value_any(dec: &mut Decoder) -> Result<WireValue> {
    decode_any_impl(dec, 0)
}

fn decode_any_impl(dec: &mut Decoder, depth: usize) -> Result<WireValue> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(CodecError::RecursionLimitExceeded);
    }

    let tag = dec.peek_tag().map_err(CodecError::from)?;
    match tag {
        Tag::Null => { dec.null()?; Ok(WireValue::Null) }
        Tag::BoolTrue | Tag::BoolFalse => Ok(WireValue::Bool(dec.bool()?)),
        Tag::Byte => Ok(WireValue::Byte(dec.byte()?)),
        Tag::S32 => Ok(WireValue::Int32(dec.s32()?)),
        Tag::S64 => Ok(WireValue::Int64(dec.s64()?)),
        Tag::F32 => Ok(WireValue::Float32(dec.f32()?)),
        Tag::F64 => Ok(WireValue::Float64(dec.f64()?)),
        Tag::String => Ok(WireValue::Text(dec.str()?.to_string())),
        Tag::Timestamp => Ok(WireValue::Timestamp(dec.timestamp()?)),
        Tag::Bytes => Ok(WireValue::Blob(dec.bytes()?.to_vec())),
        Tag::Uuid => Ok(WireValue::Uuid(Uuid::from_bytes(dec.uuid()?))),
        Tag::Inet => decode_inet(dec),
        Tag::List => {
            let mut iter = dec.list()?;
            let mut items = Vec::new();
            while let Some(mut item_dec) = iter.next() {
                items.push(decode_any_impl(&mut item_dec, depth + 1)?);
            }
            Ok(WireValue::List(items))
        }
        Tag::Set => {
            let mut iter = dec.set()?;
            let mut items = Vec::new();
            while let Some(mut item_dec) = iter.next() {
                items.push(decode_any_impl(&mut item_dec, depth + 1)?);
            }
            Ok(WireValue::Set(items))
        }
        Tag::Map => {
            let mut iter = dec.map()?;
            let mut pairs = Vec::new();
            let mut seen: HashSet<&[u8]> = HashSet::new();
            while let Some((mut k_dec, mut v_dec)) = iter.next()? {
                if !seen.insert(k_dec.as_bytes()) {
                    return Err(CodecError::DuplicateMapKey);
                }
                let k = decode_any_impl(&mut k_dec, depth + 1)?;
                let v = decode_any_impl(&mut v_dec, depth + 1)?;
                pairs.push((k, v));
            }
            Ok(WireValue::Map(pairs))
        }
        other => Err(CodecError::UnsupportedTag(other as u8)),
    }
}
