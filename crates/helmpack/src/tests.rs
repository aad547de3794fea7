use crate::*;

// ============================================================================
//  SCALAR TESTS (Happy Path)
// ============================================================================

#[test]
fn test_bool_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.bool(true)?;
    enc.bool(false)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.bool()?, true);
    assert_eq!(dec.bool()?, false);
    assert_eq!(dec.remaining(), 0);
    Ok(())
}

#[test]
fn test_byte_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.byte(0)?;
    enc.byte(255)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.byte()?, 0);
    assert_eq!(dec.byte()?, 255);
    Ok(())
}

#[test]
fn test_int_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.s32(i32::MAX)?;
    enc.s32(i32::MIN)?;
    enc.s64(i64::MAX)?;
    enc.s64(i64::MIN)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.s32()?, i32::MAX);
    assert_eq!(dec.s32()?, i32::MIN);
    assert_eq!(dec.s64()?, i64::MAX);
    assert_eq!(dec.s64()?, i64::MIN);
    Ok(())
}

#[test]
fn test_float_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.f32(3.14159)?;
    enc.f64(f64::MIN_POSITIVE)?;
    enc.f64(-0.0)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.f32()?, 3.14159);
    assert_eq!(dec.f64()?, f64::MIN_POSITIVE);
    assert_eq!(dec.f64()?.to_bits(), (-0.0f64).to_bits());
    Ok(())
}

#[test]
fn test_timestamp_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.timestamp(1_700_000_000_000)?;
    enc.timestamp(-1)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.timestamp()?, 1_700_000_000_000);
    assert_eq!(dec.timestamp()?, -1);
    Ok(())
}

#[test]
fn test_uuid_roundtrip() -> Result<()> {
    let raw: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
    let mut enc = Encoder::new();
    enc.uuid(raw)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.uuid()?, raw);
    Ok(())
}

#[test]
fn test_inet_roundtrip() -> Result<()> {
    let v4 = [127u8, 0, 0, 1];
    let v6 = [0u8; 16];
    let mut enc = Encoder::new();
    enc.inet(&v4)?;
    enc.inet(&v6)?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.inet()?, &v4);
    assert_eq!(dec.inet()?, &v6);
    Ok(())
}

#[test]
fn test_unit_and_null_are_distinct() -> Result<()> {
    let mut enc = Encoder::new();
    enc.unit()?;
    enc.null()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.peek_tag()?, Tag::Unit);
    dec.unit()?;
    assert!(dec.peek_null());
    dec.null()?;
    Ok(())
}

// ============================================================================
//  BLOB TESTS
// ============================================================================

#[test]
fn test_string_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.str("")?;
    enc.str("pong")?;
    enc.str("日本語")?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.str()?, "");
    assert_eq!(dec.str()?, "pong");
    assert_eq!(dec.str()?, "日本語");
    Ok(())
}

#[test]
fn test_bytes_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.bytes(&[])?;
    enc.bytes(&[0xDE, 0xAD, 0xBE, 0xEF])?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    assert_eq!(dec.bytes()?, &[] as &[u8]);
    assert_eq!(dec.bytes()?, &[0xDE, 0xAD, 0xBE, 0xEF]);
    Ok(())
}

#[test]
fn test_empty_string_is_not_null() -> Result<()> {
    let mut enc = Encoder::new();
    enc.str("")?;
    let bytes = enc.into_bytes()?;

    let dec = Decoder::new(&bytes);
    assert!(!dec.peek_null());
    Ok(())
}

// ============================================================================
//  CONTAINER TESTS
// ============================================================================

#[test]
fn test_list_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.list_begin()?;
    enc.s32(1)?;
    enc.s32(2)?;
    enc.s32(3)?;
    enc.list_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    let mut iter = dec.list()?;
    let mut got = Vec::new();
    while let Some(mut item) = iter.next() {
        got.push(item.s32()?);
    }
    assert_eq!(got, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_empty_list() -> Result<()> {
    let mut enc = Encoder::new();
    enc.list_begin()?;
    enc.list_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);
    let mut iter = dec.list()?;
    assert!(iter.next().is_none());
    Ok(())
}

#[test]
fn test_set_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.set_begin()?;
    enc.str("a")?;
    enc.str("b")?;
    enc.set_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    // A set is not decodable as a list; the tag is distinct.
    assert!(dec.clone().list().is_err());

    let mut iter = dec.set()?;
    assert_eq!(iter.next().unwrap().str()?, "a");
    assert_eq!(iter.next().unwrap().str()?, "b");
    assert!(iter.next().is_none());
    Ok(())
}

#[test]
fn test_map_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.map_begin()?;
    enc.str("one")?;
    enc.s64(1)?;
    enc.str("two")?;
    enc.s64(2)?;
    enc.map_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    let mut iter = dec.map()?;
    let (mut k, mut v) = iter.next()?.unwrap();
    assert_eq!(k.str()?, "one");
    assert_eq!(v.s64()?, 1);
    let (mut k, mut v) = iter.next()?.unwrap();
    assert_eq!(k.str()?, "two");
    assert_eq!(v.s64()?, 2);
    assert!(iter.next()?.is_none());
    Ok(())
}

#[test]
fn test_map_non_string_keys() -> Result<()> {
    let mut enc = Encoder::new();
    enc.map_begin()?;
    enc.uuid([7u8; 16])?;
    enc.str("node-7")?;
    enc.map_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    let mut iter = dec.map()?;
    let (mut k, mut v) = iter.next()?.unwrap();
    assert_eq!(k.uuid()?, [7u8; 16]);
    assert_eq!(v.str()?, "node-7");
    Ok(())
}

#[test]
fn test_record_roundtrip() -> Result<()> {
    let mut enc = Encoder::new();
    enc.record_begin()?;
    enc.variant_begin("result")?;
    enc.str("pong")?;
    enc.variant_end()?;
    enc.variant_begin("count")?;
    enc.s32(1)?;
    enc.variant_end()?;
    enc.record_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    let mut iter = dec.record()?;
    let (name, mut val) = iter.next()?.unwrap();
    assert_eq!(name, "result");
    assert_eq!(val.str()?, "pong");
    let (name, mut val) = iter.next()?.unwrap();
    assert_eq!(name, "count");
    assert_eq!(val.s32()?, 1);
    assert!(iter.next()?.is_none());
    Ok(())
}

#[test]
fn test_deep_nesting() -> Result<()> {
    let mut enc = Encoder::new();
    enc.list_begin()?;
    enc.map_begin()?;
    enc.str("inner")?;
    enc.list_begin()?;
    enc.null()?;
    enc.s32(9)?;
    enc.list_end()?;
    enc.map_end()?;
    enc.list_end()?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    let mut outer = dec.list()?;
    let mut map_dec = outer.next().unwrap();
    let mut map = map_dec.map()?;
    let (mut k, mut v) = map.next()?.unwrap();
    assert_eq!(k.str()?, "inner");
    let mut inner = v.list()?;
    let mut first = inner.next().unwrap();
    assert!(first.peek_null());
    first.null()?;
    let mut second = inner.next().unwrap();
    assert_eq!(second.s32()?, 9);
    assert!(inner.next().is_none());
    Ok(())
}

// ============================================================================
//  STRUCTURAL VIOLATIONS
// ============================================================================

#[test]
fn test_record_rejects_bare_scalar() {
    let mut enc = Encoder::new();
    enc.record_begin().unwrap();
    assert!(matches!(enc.s32(1), Err(Error::InvalidRecordEntry)));
}

#[test]
fn test_variant_rejects_second_payload() {
    let mut enc = Encoder::new();
    enc.variant_begin("x").unwrap();
    enc.s32(1).unwrap();
    assert!(matches!(enc.s32(2), Err(Error::TooManyItems(Scope::Variant))));
}

#[test]
fn test_variant_rejects_empty() {
    let mut enc = Encoder::new();
    enc.variant_begin("x").unwrap();
    assert!(matches!(enc.variant_end(), Err(Error::EmptyVariant)));
}

#[test]
fn test_map_rejects_odd_close() {
    let mut enc = Encoder::new();
    enc.map_begin().unwrap();
    enc.str("dangling-key").unwrap();
    assert!(matches!(enc.map_end(), Err(Error::OddMapEntry)));
}

#[test]
fn test_scope_mismatch() {
    let mut enc = Encoder::new();
    enc.list_begin().unwrap();
    assert!(matches!(
        enc.map_end(),
        Err(Error::ScopeMismatch { expected: Scope::Map, actual: Scope::List })
    ));
}

#[test]
fn test_into_bytes_with_open_scope() {
    let mut enc = Encoder::new();
    enc.list_begin().unwrap();
    assert!(matches!(enc.into_bytes(), Err(Error::ScopeStillOpen)));
}

#[test]
fn test_underflow() {
    let mut enc = Encoder::new();
    assert!(matches!(enc.list_end(), Err(Error::ScopeUnderflow)));
}

// ============================================================================
//  DECODER ROBUSTNESS
// ============================================================================

#[test]
fn test_decode_truncated_buffer() {
    let mut enc = Encoder::new();
    enc.s64(42).unwrap();
    let bytes = enc.into_bytes().unwrap();

    let mut dec = Decoder::new(&bytes[..4]);
    assert!(matches!(dec.s64(), Err(Error::UnexpectedEnd)));
}

#[test]
fn test_decode_invalid_tag() {
    let bytes = [0xFFu8];
    let dec = Decoder::new(&bytes);
    assert!(matches!(dec.peek_tag(), Err(Error::InvalidTag(0xFF))));
}

#[test]
fn test_decode_wrong_tag() {
    let mut enc = Encoder::new();
    enc.str("hello").unwrap();
    let bytes = enc.into_bytes().unwrap();

    let mut dec = Decoder::new(&bytes);
    assert!(dec.s32().is_err());
    // The failed read must not consume the item.
    assert_eq!(dec.str().unwrap(), "hello");
}

#[test]
fn test_skip_over_everything() -> Result<()> {
    let mut enc = Encoder::new();
    enc.null()?;
    enc.uuid([1u8; 16])?;
    enc.inet(&[10, 0, 0, 1])?;
    enc.map_begin()?;
    enc.str("k")?;
    enc.list_begin()?;
    enc.s32(1)?;
    enc.list_end()?;
    enc.map_end()?;
    enc.str("after")?;

    let bytes = enc.into_bytes()?;
    let mut dec = Decoder::new(&bytes);

    dec.skip()?;
    dec.skip()?;
    dec.skip()?;
    dec.skip()?;
    assert_eq!(dec.str()?, "after");
    assert_eq!(dec.remaining(), 0);
    Ok(())
}

#[test]
fn test_map_iter_rejects_dangling_key() -> Result<()> {
    // Hand-build a map body with a lone key by abusing a list.
    let mut enc = Encoder::new();
    enc.map_begin()?;
    enc.str("k")?;
    enc.s32(1)?;
    enc.map_end()?;
    let mut bytes = enc.into_bytes()?;

    // Truncate the value item out of the body and patch the length.
    let value_len = 5; // tag + 4 bytes
    let body_len = bytes.len() - 5 - value_len;
    bytes.truncate(bytes.len() - value_len);
    bytes[1..5].copy_from_slice(&(body_len as u32).to_le_bytes());

    let mut dec = Decoder::new(&bytes);
    let mut iter = dec.map()?;
    assert!(matches!(iter.next(), Err(Error::OddMapEntry)));
    Ok(())
}
