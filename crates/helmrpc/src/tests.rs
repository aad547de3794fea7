// crates/helmrpc/src/tests.rs
use crate::*;
use helmpack::{Decoder, Encoder};
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
//  HELPERS
// ============================================================================

/// Roundtrip a value through the typed codec and assert equality.
fn assert_roundtrip(val: WireValue, kind: &WireKind) {
    let mut enc = Encoder::new();
    encode_value(&mut enc, &val, kind).expect("encoding failed");
    let bytes = enc.into_bytes().expect("scopes open");

    let mut dec = Decoder::new(&bytes);
    let decoded = decode_value(&mut dec, kind).expect("decoding failed");

    assert_eq!(val, decoded);
}

/// Roundtrip a value through the self-describing codec and assert equality.
fn assert_roundtrip_any(val: WireValue) {
    let mut enc = Encoder::new();
    encode_value_any(&mut enc, &val).expect("encoding failed");
    let bytes = enc.into_bytes().expect("scopes open");

    let mut dec = Decoder::new(&bytes);
    let decoded = decode_value_any(&mut dec).expect("decoding failed");

    assert_eq!(val, decoded);
}

fn sample_uuid() -> Uuid {
    Uuid::from_bytes([7; 16])
}

// ============================================================================
//  1. KIND RESOLUTION
// ============================================================================

#[test]
fn test_resolve_scalars() {
    let cache = KindCache::new();
    assert_eq!(cache.resolve(&NativeType::Bool).unwrap(), WireKind::Bool);
    assert_eq!(cache.resolve(&NativeType::Text).unwrap(), WireKind::Text);
    assert_eq!(cache.resolve(&NativeType::Uuid).unwrap(), WireKind::Uuid);
    assert_eq!(cache.resolve(&NativeType::Void).unwrap(), WireKind::Void);
    // Scalars never touch the compound cache.
    assert_eq!(cache.compound_count(), 0);
}

#[test]
fn test_resolve_compound_caches_by_signature() {
    let cache = KindCache::new();
    let ty = NativeType::List(Box::new(NativeType::Text));

    let first = cache.resolve(&ty).unwrap();
    let second = cache.resolve(&ty).unwrap();

    assert_eq!(first, WireKind::List(Arc::new(WireKind::Text)));
    assert_eq!(first, second);
    assert_eq!(cache.compound_count(), 1);

    // Same shape, structurally equal descriptor: same cache entry.
    let again = NativeType::List(Box::new(NativeType::Text));
    cache.resolve(&again).unwrap();
    assert_eq!(cache.compound_count(), 1);
}

#[test]
fn test_resolve_nested_map_registers_inner_shapes() {
    let cache = KindCache::new();
    let ty = NativeType::Map(
        Box::new(NativeType::Uuid),
        Box::new(NativeType::List(Box::new(NativeType::Int64))),
    );

    let kind = cache.resolve(&ty).unwrap();
    assert_eq!(kind.signature(), "map<uuid,list<int64>>");
    // Both the map and its nested list get a cache entry.
    assert_eq!(cache.compound_count(), 2);
}

#[test]
fn test_resolve_opaque_fails_and_names_offender() {
    let cache = KindCache::new();
    let ty = NativeType::List(Box::new(NativeType::Opaque("RuntimeHandle".into())));

    let err = cache.resolve(&ty).unwrap_err();
    let KindError::Unresolvable { requested, offending } = err;
    assert_eq!(requested, "list<RuntimeHandle>");
    assert_eq!(offending, "RuntimeHandle");

    // A failed resolution never publishes a partial entry.
    assert_eq!(cache.compound_count(), 0);
}

#[test]
fn test_signature_formatting() {
    let kind = WireKind::Map(
        Arc::new(WireKind::Text),
        Arc::new(WireKind::Set(Arc::new(WireKind::Int32))),
    );
    assert_eq!(kind.signature(), "map<string,set<int32>>");
    assert_eq!(format!("{}", kind), "map<string,set<int32>>");
}

// ============================================================================
//  2. TYPED CODEC
// ============================================================================

#[test]
fn test_scalar_roundtrips() {
    assert_roundtrip(WireValue::Bool(true), &WireKind::Bool);
    assert_roundtrip(WireValue::Byte(0xAB), &WireKind::Byte);
    assert_roundtrip(WireValue::Int32(i32::MIN), &WireKind::Int32);
    assert_roundtrip(WireValue::Int64(i64::MAX), &WireKind::Int64);
    assert_roundtrip(WireValue::Float64(std::f64::consts::PI), &WireKind::Float64);
    assert_roundtrip(WireValue::Text("hello".into()), &WireKind::Text);
    assert_roundtrip(WireValue::Timestamp(1_700_000_000_000), &WireKind::Timestamp);
    assert_roundtrip(WireValue::Blob(vec![1, 2, 3]), &WireKind::Blob);
    assert_roundtrip(WireValue::Uuid(sample_uuid()), &WireKind::Uuid);
}

#[test]
fn test_inet_roundtrips() {
    let v4: IpAddr = "192.168.0.1".parse().unwrap();
    let v6: IpAddr = "::1".parse().unwrap();
    assert_roundtrip(WireValue::Inet(v4), &WireKind::Inet);
    assert_roundtrip(WireValue::Inet(v6), &WireKind::Inet);
}

#[test]
fn test_null_assignable_to_every_kind() {
    for kind in [
        WireKind::Bool,
        WireKind::Text,
        WireKind::Uuid,
        WireKind::List(Arc::new(WireKind::Int32)),
        WireKind::Map(Arc::new(WireKind::Text), Arc::new(WireKind::Text)),
    ] {
        assert_roundtrip(WireValue::Null, &kind);
    }
}

#[test]
fn test_empty_text_is_not_null() {
    let mut enc = Encoder::new();
    encode_value(&mut enc, &WireValue::Text(String::new()), &WireKind::Text).unwrap();
    let bytes = enc.into_bytes().unwrap();

    let mut dec = Decoder::new(&bytes);
    let decoded = decode_value(&mut dec, &WireKind::Text).unwrap();
    assert_eq!(decoded, WireValue::Text(String::new()));
    assert!(!decoded.is_null());
}

#[test]
fn test_compound_roundtrips() {
    let list_kind = WireKind::List(Arc::new(WireKind::Int32));
    assert_roundtrip(
        WireValue::List(vec![WireValue::Int32(1), WireValue::Null, WireValue::Int32(3)]),
        &list_kind,
    );

    let set_kind = WireKind::Set(Arc::new(WireKind::Text));
    assert_roundtrip(
        WireValue::Set(vec![WireValue::Text("a".into()), WireValue::Text("b".into())]),
        &set_kind,
    );

    let map_kind = WireKind::Map(Arc::new(WireKind::Uuid), Arc::new(WireKind::Int64));
    assert_roundtrip(
        WireValue::Map(vec![(WireValue::Uuid(sample_uuid()), WireValue::Int64(9))]),
        &map_kind,
    );
}

#[test]
fn test_type_mismatch_rejected() {
    let mut enc = Encoder::new();
    let err = encode_value(&mut enc, &WireValue::Int32(7), &WireKind::Text).unwrap_err();
    match err {
        CodecError::TypeMismatch { expected, found } => {
            assert_eq!(expected, "string");
            assert_eq!(found, "int32");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_void_carries_no_value() {
    let mut enc = Encoder::new();
    let err = encode_value(&mut enc, &WireValue::Null, &WireKind::Void).unwrap_err();
    assert!(matches!(err, CodecError::VoidValue));
}

#[test]
fn test_duplicate_map_key_rejected_on_decode() {
    // The encoder does not inspect map keys; the decoder enforces uniqueness.
    let mut enc = Encoder::new();
    enc.map_begin().unwrap();
    enc.str("k").unwrap();
    enc.s32(1).unwrap();
    enc.str("k").unwrap();
    enc.s32(2).unwrap();
    enc.map_end().unwrap();
    let bytes = enc.into_bytes().unwrap();

    let kind = WireKind::Map(Arc::new(WireKind::Text), Arc::new(WireKind::Int32));
    let mut dec = Decoder::new(&bytes);
    let err = decode_value(&mut dec, &kind).unwrap_err();
    assert!(matches!(err, CodecError::DuplicateMapKey));
}

#[test]
fn test_recursion_limit() {
    let mut kind = WireKind::Int32;
    let mut val = WireValue::Int32(0);
    for _ in 0..70 {
        kind = WireKind::List(Arc::new(kind));
        val = WireValue::List(vec![val]);
    }

    let mut enc = Encoder::new();
    let err = encode_value(&mut enc, &val, &kind).unwrap_err();
    assert!(matches!(err, CodecError::RecursionLimitExceeded));
}

// ============================================================================
//  3. SELF-DESCRIBING CODEC
// ============================================================================

#[test]
fn test_any_roundtrips() {
    assert_roundtrip_any(WireValue::Null);
    assert_roundtrip_any(WireValue::Bool(false));
    assert_roundtrip_any(WireValue::Text("self-describing".into()));
    assert_roundtrip_any(WireValue::Uuid(sample_uuid()));
    assert_roundtrip_any(WireValue::Inet("10.0.0.1".parse().unwrap()));
    assert_roundtrip_any(WireValue::List(vec![
        WireValue::Int64(1),
        WireValue::Text("mixed".into()),
        WireValue::Null,
    ]));
    assert_roundtrip_any(WireValue::Map(vec![(
        WireValue::Text("key".into()),
        WireValue::Set(vec![WireValue::Byte(1)]),
    )]));
}

#[test]
fn test_any_rejects_structural_tags() {
    // A bare Record has no WireValue mapping; only frames use it.
    let mut enc = Encoder::new();
    enc.record_begin().unwrap();
    enc.record_end().unwrap();
    let bytes = enc.into_bytes().unwrap();

    let mut dec = Decoder::new(&bytes);
    let err = decode_value_any(&mut dec).unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedTag(_)));
}

// ============================================================================
//  4. FRAMES
// ============================================================================

fn encode_call(call: &CallEncoder) -> Vec<u8> {
    let mut enc = Encoder::new();
    call.encode(&mut enc).expect("encode call");
    enc.into_bytes().expect("scopes open")
}

fn encode_reply(reply: &ReplyEncoder) -> Vec<u8> {
    let mut enc = Encoder::new();
    reply.encode(&mut enc).expect("encode reply");
    enc.into_bytes().expect("scopes open")
}

#[test]
fn test_call_roundtrip() {
    let args = vec![WireValue::Text("node-7".into()), WireValue::Int32(2)];
    let call = CallEncoder::new(42, "NodeOps", "decommission", Some("ops-team"), &args);
    let bytes = encode_call(&call);

    let mut dec = Decoder::new(&bytes);
    let frame = Frame::decode(&mut dec).unwrap();
    let Frame::Call(call) = frame else { panic!("expected a call") };

    assert_eq!(call.seq, 42);
    assert_eq!(call.object, "NodeOps");
    assert_eq!(call.method, "decommission");
    assert_eq!(call.caller, Some("ops-team"));

    let mut args_dec = call.args;
    let mut iter = args_dec.list().unwrap();
    let mut first = iter.next().unwrap();
    assert_eq!(first.str().unwrap(), "node-7");
    let mut second = iter.next().unwrap();
    assert_eq!(second.s32().unwrap(), 2);
    assert!(iter.next().is_none());
}

#[test]
fn test_call_without_caller() {
    let call = CallEncoder::new(1, "NodeOps", "ping", None, &[]);
    let bytes = encode_call(&call);

    let mut dec = Decoder::new(&bytes);
    let Frame::Call(call) = Frame::decode(&mut dec).unwrap() else { panic!("expected a call") };
    assert_eq!(call.caller, None);
}

#[test]
fn test_reply_rows_roundtrip() {
    let rows = vec![
        vec![
            ("id".to_string(), WireValue::Uuid(sample_uuid())),
            ("name".to_string(), WireValue::Text("alpha".into())),
        ],
        vec![("id".to_string(), WireValue::Null)],
    ];
    let reply = ReplyEncoder::new(7, ReplyBody::Rows(&rows));
    let bytes = encode_reply(&reply);

    let mut dec = Decoder::new(&bytes);
    let Frame::Reply(reply) = Frame::decode(&mut dec).unwrap() else { panic!("expected a reply") };
    assert_eq!(reply.seq, 7);
    assert_eq!(reply.outcome, ReplyOutcome::Rows(rows));
}

#[test]
fn test_reply_void_is_zero_rows() {
    let reply = ReplyEncoder::new(3, ReplyBody::Rows(&[]));
    let bytes = encode_reply(&reply);

    let mut dec = Decoder::new(&bytes);
    let Frame::Reply(reply) = Frame::decode(&mut dec).unwrap() else { panic!("expected a reply") };
    assert_eq!(reply.outcome, ReplyOutcome::Rows(vec![]));
    // Zero rows stays distinct from NotFound.
    assert_ne!(reply.outcome, ReplyOutcome::NotFound);
}

#[test]
fn test_reply_not_found_roundtrip() {
    let reply = ReplyEncoder::new(9, ReplyBody::NotFound);
    let bytes = encode_reply(&reply);

    let mut dec = Decoder::new(&bytes);
    let Frame::Reply(reply) = Frame::decode(&mut dec).unwrap() else { panic!("expected a reply") };
    assert_eq!(reply.outcome, ReplyOutcome::NotFound);
}

#[test]
fn test_reply_error_roundtrip() {
    let reply = ReplyEncoder::new(11, ReplyBody::Error {
        code: ErrorCode::Unauthorized,
        message: "caller lacks authorize on rpc/NodeOps/decommission",
    });
    let bytes = encode_reply(&reply);

    let mut dec = Decoder::new(&bytes);
    let Frame::Reply(reply) = Frame::decode(&mut dec).unwrap() else { panic!("expected a reply") };
    match reply.outcome {
        ReplyOutcome::Error { code, message } => {
            assert_eq!(code, ErrorCode::Unauthorized);
            assert!(message.contains("rpc/NodeOps/decommission"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_decode_seq_from_raw_bytes() {
    let call = CallEncoder::new(0xDEAD_BEEF, "Obj", "m", None, &[]);
    let bytes = encode_call(&call);
    assert_eq!(decode_seq(&bytes).unwrap(), 0xDEAD_BEEF);

    let reply = ReplyEncoder::new(55, ReplyBody::NotFound);
    let bytes = encode_reply(&reply);
    assert_eq!(decode_seq(&bytes).unwrap(), 55);
}

#[test]
fn test_unknown_frame_variant_rejected() {
    let mut enc = Encoder::new();
    enc.variant_begin("Gossip").unwrap();
    enc.unit().unwrap();
    enc.variant_end().unwrap();
    let bytes = enc.into_bytes().unwrap();

    let mut dec = Decoder::new(&bytes);
    let err = Frame::decode(&mut dec).unwrap_err();
    assert!(matches!(err, FrameError::UnknownVariant(_)));
}

#[test]
fn test_call_skips_unknown_fields() {
    // A newer peer may add header fields; older decoders must skip them.
    let mut enc = Encoder::new();
    enc.variant_begin("Call").unwrap();
    enc.record_begin().unwrap();

    enc.variant_begin("seq").unwrap();
    enc.s64(5).unwrap();
    enc.variant_end().unwrap();

    enc.variant_begin("priority").unwrap();
    enc.s32(99).unwrap();
    enc.variant_end().unwrap();

    enc.variant_begin("object").unwrap();
    enc.str("Obj").unwrap();
    enc.variant_end().unwrap();

    enc.variant_begin("method").unwrap();
    enc.str("m").unwrap();
    enc.variant_end().unwrap();

    enc.variant_begin("caller").unwrap();
    enc.null().unwrap();
    enc.variant_end().unwrap();

    enc.variant_begin("args").unwrap();
    enc.list_begin().unwrap();
    enc.list_end().unwrap();
    enc.variant_end().unwrap();

    enc.record_end().unwrap();
    enc.variant_end().unwrap();
    let bytes = enc.into_bytes().unwrap();

    let mut dec = Decoder::new(&bytes);
    let Frame::Call(call) = Frame::decode(&mut dec).unwrap() else { panic!("expected a call") };
    assert_eq!(call.seq, 5);
    assert_eq!(call.object, "Obj");
    assert_eq!(call.method, "m");
}

#[test]
fn test_truncated_frame_is_an_error() {
    let call = CallEncoder::new(1, "Obj", "m", None, &[]);
    let bytes = encode_call(&call);

    let mut dec = Decoder::new(&bytes[..bytes.len() / 2]);
    assert!(Frame::decode(&mut dec).is_err());
}
