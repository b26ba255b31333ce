//! Struct codec properties: round trips, default elision, required
//! enforcement, forward compatibility, and codec cache behavior.

use std::sync::{Arc, Weak};

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;

use thrift_reflect::binary::TBinaryProtocol;
use thrift_reflect::descriptor::{
    Converter, SchemaRegistry, StructDescriptor, TypeDecl,
};
use thrift_reflect::protocol::TOutputProtocol;
use thrift_reflect::thrift::TType;
use thrift_reflect::value::{Record, Value};
use thrift_reflect::{ClientCore, Error, ProtocolErrorKind};

fn point_descriptor() -> Arc<StructDescriptor> {
    StructDescriptor::builder("Point")
        .required(1, "x", TypeDecl::I32)
        .required(2, "y", TypeDecl::I32)
        .build()
        .unwrap()
}

fn point(x: i32, y: i32) -> Value {
    Value::Struct(Record::new().with(1, x).with(2, y))
}

fn core_with(descriptors: &[&Arc<StructDescriptor>]) -> ClientCore {
    let mut registry = SchemaRegistry::new();
    for d in descriptors {
        registry.register((*d).clone()).unwrap();
    }
    ClientCore::new(registry)
}

fn round_trip(core: &ClientCore, descriptor: &Arc<StructDescriptor>, record: &Record) -> Record {
    let mut proto = TBinaryProtocol::new(BytesMut::new());
    core.write_struct(&mut proto, descriptor, record).unwrap();
    core.read_struct(&mut proto, descriptor).unwrap()
}

#[test]
fn kitchen_sink_round_trip() {
    let point_desc = point_descriptor();
    let everything = StructDescriptor::builder("Everything")
        .required(1, "flag", TypeDecl::Bool)
        .required(2, "tiny", TypeDecl::I8)
        .required(3, "small", TypeDecl::I16)
        .required(4, "medium", TypeDecl::I32)
        .required(5, "large", TypeDecl::I64)
        .required(6, "real", TypeDecl::Double)
        .required(7, "name", TypeDecl::Text)
        .required(8, "blob", TypeDecl::Binary)
        .optional(9, "nick", TypeDecl::Text.optional())
        .required(10, "origin", TypeDecl::struct_named("Point"))
        .required(11, "trail", TypeDecl::list_of(TypeDecl::struct_named("Point")))
        .required(12, "tags", TypeDecl::set_of(TypeDecl::Text))
        .required(13, "scores", TypeDecl::map_of(TypeDecl::Text, TypeDecl::I32))
        .build()
        .unwrap();
    let core = core_with(&[&point_desc, &everything]);

    let record = Record::new()
        .with(1, true)
        .with(2, -3i8)
        .with(3, 1_000i16)
        .with(4, -70_000i32)
        .with(5, 1i64 << 40)
        .with(6, 0.25f64)
        .with(7, "thrift")
        .with(8, Bytes::from_static(b"\x00\x01"))
        .with(10, point(3, 4))
        .with(11, Value::List(vec![point(0, 0), point(1, 1)]))
        .with(12, Value::Set(Vec::new())) // empty container
        .with(
            13,
            Value::Map(vec![(Value::from("a"), Value::I32(1))]),
        );

    assert_eq!(round_trip(&core, &everything, &record), record);
    // one codec per struct type, reused across both directions
    assert_eq!(core.compiled_codecs(), 2);
}

#[test]
fn literal_wire_form_of_required_string_field() {
    // struct {1: required string s} with s = "hi"
    let s_desc = StructDescriptor::builder("S")
        .required(1, "s", TypeDecl::Text)
        .build()
        .unwrap();
    let core = core_with(&[&s_desc]);

    let mut proto = TBinaryProtocol::new(BytesMut::new());
    core.write_struct(&mut proto, &s_desc, &Record::new().with(1, "hi"))
        .unwrap();
    let got = proto.into_inner();

    let mut want = TBinaryProtocol::new(BytesMut::new());
    want.write_field_begin(TType::Binary, 1).unwrap();
    want.write_string("hi").unwrap();
    want.write_field_end().unwrap();
    want.write_field_stop().unwrap();
    let want = want.into_inner();

    assert_eq!(&got[..], &want[..]);

    let mut proto = TBinaryProtocol::new(got);
    let back = core.read_struct(&mut proto, &s_desc).unwrap();
    assert_eq!(back, Record::new().with(1, "hi"));
}

#[test]
fn optional_equal_to_default_is_elided() {
    let s_desc = StructDescriptor::builder("S")
        .required(1, "id", TypeDecl::I32)
        .optional(2, "color", TypeDecl::Text)
        .default_value("red")
        .build()
        .unwrap();
    let core = core_with(&[&s_desc]);

    let mut proto = TBinaryProtocol::new(BytesMut::new());
    core.write_struct(
        &mut proto,
        &s_desc,
        &Record::new().with(1, 9i32).with(2, "red"),
    )
    .unwrap();
    let got = proto.into_inner();

    // only field 1 makes it to the wire
    let mut want = TBinaryProtocol::new(BytesMut::new());
    want.write_field_begin(TType::I32, 1).unwrap();
    want.write_i32(9).unwrap();
    want.write_field_stop().unwrap();
    let want = want.into_inner();
    assert_eq!(&got[..], &want[..]);

    // reading the elided stream restores the default
    let mut proto = TBinaryProtocol::new(got);
    let back = core.read_struct(&mut proto, &s_desc).unwrap();
    assert_eq!(back.get(2), Some(&Value::from("red")));

    // a non-default value is written out
    let mut proto = TBinaryProtocol::new(BytesMut::new());
    core.write_struct(
        &mut proto,
        &s_desc,
        &Record::new().with(1, 9i32).with(2, "blue"),
    )
    .unwrap();
    let back = core.read_struct(&mut proto, &s_desc).unwrap();
    assert_eq!(back.get(2), Some(&Value::from("blue")));
}

#[test]
fn required_field_enforced_on_write_and_read() {
    let s_desc = StructDescriptor::builder("S")
        .required(1, "id", TypeDecl::I32)
        .required(2, "name", TypeDecl::Text)
        .build()
        .unwrap();
    let core = core_with(&[&s_desc]);

    // write: required field absent
    let mut proto = TBinaryProtocol::new(BytesMut::new());
    let err = core
        .write_struct(&mut proto, &s_desc, &Record::new().with(1, 1i32))
        .unwrap_err();
    assert_eq!(
        err.as_protocol().unwrap().kind,
        ProtocolErrorKind::RequiredFieldMissing
    );

    // read: stream carries only field 1
    let mut proto = TBinaryProtocol::new(BytesMut::new());
    proto.write_field_begin(TType::I32, 1).unwrap();
    proto.write_i32(1).unwrap();
    proto.write_field_stop().unwrap();
    let err = core.read_struct(&mut proto, &s_desc).unwrap_err();
    assert_eq!(
        err.as_protocol().unwrap().kind,
        ProtocolErrorKind::RequiredFieldMissing
    );
}

#[test]
fn unknown_fields_skip_including_list_of_struct() {
    let point_desc = point_descriptor();
    // v2 extends v1 with new optional fields of container and text shape
    let v1 = StructDescriptor::builder("Event")
        .required(1, "id", TypeDecl::I32)
        .optional(3, "note", TypeDecl::Text)
        .build()
        .unwrap();
    let v2 = StructDescriptor::builder("EventV2")
        .required(1, "id", TypeDecl::I32)
        .optional(2, "extras", TypeDecl::list_of(TypeDecl::struct_named("Point")))
        .optional(3, "note", TypeDecl::Text)
        .optional(4, "weight", TypeDecl::Double)
        .build()
        .unwrap();
    let core = core_with(&[&point_desc, &v1, &v2]);

    let extended = Record::new()
        .with(1, 7i32)
        .with(2, Value::List(vec![point(1, 2), point(3, 4)]))
        .with(3, "hello")
        .with(4, 1.5f64);
    let mut proto = TBinaryProtocol::new(BytesMut::new());
    core.write_struct(&mut proto, &v2, &extended).unwrap();

    // the old reader sees only its own fields; the nested list of
    // structs is skipped wholesale
    let back = core.read_struct(&mut proto, &v1).unwrap();
    assert_eq!(back, Record::new().with(1, 7i32).with(3, "hello"));
}

#[test]
fn duplicate_wire_field_is_last_wins() {
    let s_desc = StructDescriptor::builder("S")
        .required(1, "id", TypeDecl::I32)
        .build()
        .unwrap();
    let core = core_with(&[&s_desc]);

    let mut proto = TBinaryProtocol::new(BytesMut::new());
    proto.write_field_begin(TType::I32, 1).unwrap();
    proto.write_i32(1).unwrap();
    proto.write_field_begin(TType::I32, 1).unwrap();
    proto.write_i32(2).unwrap();
    proto.write_field_stop().unwrap();

    let back = core.read_struct(&mut proto, &s_desc).unwrap();
    assert_eq!(back.get(1), Some(&Value::I32(2)));
}

#[test]
fn mismatched_wire_tag_is_skipped_not_decoded() {
    let s_desc = StructDescriptor::builder("S")
        .optional(1, "id", TypeDecl::I32)
        .optional(2, "name", TypeDecl::Text)
        .build()
        .unwrap();
    let core = core_with(&[&s_desc]);

    // field 1 arrives as a string even though the schema says i32
    let mut proto = TBinaryProtocol::new(BytesMut::new());
    proto.write_field_begin(TType::Binary, 1).unwrap();
    proto.write_string("not a number").unwrap();
    proto.write_field_begin(TType::Binary, 2).unwrap();
    proto.write_string("ok").unwrap();
    proto.write_field_stop().unwrap();

    let back = core.read_struct(&mut proto, &s_desc).unwrap();
    assert!(back.get(1).is_none());
    assert_eq!(back.get(2), Some(&Value::from("ok")));
}

#[test]
fn absent_optional_value_type_stays_absent() {
    let s_desc = StructDescriptor::builder("S")
        .required(1, "id", TypeDecl::I32)
        .optional(2, "count", TypeDecl::I64.optional())
        .build()
        .unwrap();
    let core = core_with(&[&s_desc]);

    let absent = Record::new().with(1, 1i32);
    assert_eq!(round_trip(&core, &s_desc, &absent), absent);

    let present = Record::new().with(1, 1i32).with(2, 5i64);
    assert_eq!(round_trip(&core, &s_desc, &present), present);
}

#[test]
fn converter_applies_at_the_wire_boundary() {
    // user shape: decimal text, wire shape: i64
    let as_i64 = Converter::new(
        TypeDecl::I64,
        |wire| match wire {
            Value::I64(n) => Ok(Value::Text(n.to_string())),
            _ => Err(thrift_reflect::ProtocolError::invalid_data()),
        },
        |user| match user {
            Value::Text(s) => s
                .parse()
                .map(Value::I64)
                .map_err(|_| thrift_reflect::ProtocolError::invalid_data()),
            _ => Err(thrift_reflect::ProtocolError::invalid_data()),
        },
    );
    let s_desc = StructDescriptor::builder("S")
        .required(1, "stamp", TypeDecl::Text)
        .converter(as_i64)
        .build()
        .unwrap();
    let core = core_with(&[&s_desc]);

    let record = Record::new().with(1, "123456789");
    let mut proto = TBinaryProtocol::new(BytesMut::new());
    core.write_struct(&mut proto, &s_desc, &record).unwrap();

    // on-wire bytes reflect the converter's wire shape
    let mut want = TBinaryProtocol::new(BytesMut::new());
    want.write_field_begin(TType::I64, 1).unwrap();
    want.write_i64(123_456_789).unwrap();
    want.write_field_stop().unwrap();
    assert_eq!(&proto.get_ref()[..], &want.into_inner()[..]);

    assert_eq!(core.read_struct(&mut proto, &s_desc).unwrap(), record);
}

#[test]
fn recursive_struct_round_trip() {
    let node = StructDescriptor::builder("Node")
        .required(1, "value", TypeDecl::I32)
        .optional(2, "next", TypeDecl::struct_named("Node"))
        .build()
        .unwrap();
    let core = core_with(&[&node]);

    let chain = Record::new().with(1, 1i32).with(
        2,
        Value::Struct(Record::new().with(1, 2i32).with(
            2,
            Value::Struct(Record::new().with(1, 3i32)),
        )),
    );
    assert_eq!(round_trip(&core, &node, &chain), chain);
    assert_eq!(core.compiled_codecs(), 1);
}

#[test]
fn value_shape_mismatch_fails_encode() {
    let s_desc = StructDescriptor::builder("S")
        .required(1, "id", TypeDecl::I32)
        .build()
        .unwrap();
    let core = core_with(&[&s_desc]);
    let mut proto = TBinaryProtocol::new(BytesMut::new());
    let err = core
        .write_struct(&mut proto, &s_desc, &Record::new().with(1, "oops"))
        .unwrap_err();
    assert_eq!(
        err.as_protocol().unwrap().kind,
        ProtocolErrorKind::InvalidData
    );
}

#[test]
fn unregistered_struct_reference_fails_compilation() {
    let s_desc = StructDescriptor::builder("S")
        .required(1, "p", TypeDecl::struct_named("Missing"))
        .build()
        .unwrap();
    let core = core_with(&[&s_desc]);
    let mut proto = TBinaryProtocol::new(BytesMut::new());
    let err = core
        .write_struct(&mut proto, &s_desc, &Record::new())
        .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[test]
fn concurrent_first_use_compiles_equivalent_codecs() {
    let point_desc = point_descriptor();
    let core = Arc::new(core_with(&[&point_desc]));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let core = core.clone();
            let desc = point_desc.clone();
            std::thread::spawn(move || {
                let record = Record::new().with(1, i as i32).with(2, -(i as i32));
                let mut proto = TBinaryProtocol::new(BytesMut::new());
                core.write_struct(&mut proto, &desc, &record).unwrap();
                let back = core.read_struct(&mut proto, &desc).unwrap();
                assert_eq!(back, record);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // one surviving entry no matter how the race went
    assert_eq!(core.compiled_codecs(), 1);
    let record = Record::new().with(1, 5i32).with(2, 6i32);
    let mut proto = TBinaryProtocol::new(BytesMut::new());
    core.write_struct(&mut proto, &point_desc, &record).unwrap();
    core.read_struct(&mut proto, &point_desc).unwrap();
    assert_eq!(core.compiled_codecs(), 1);
}

#[test]
fn dropping_the_core_releases_descriptors() {
    let point_desc = point_descriptor();
    let weak: Weak<StructDescriptor> = Arc::downgrade(&point_desc);
    {
        let core = core_with(&[&point_desc]);
        let record = Record::new().with(1, 1i32).with(2, 2i32);
        round_trip(&core, &point_desc, &record);
        drop(core);
    }
    drop(point_desc);
    // nothing outside the caller kept the descriptor graph alive
    assert!(weak.upgrade().is_none());
}

proptest! {
    #[test]
    fn arbitrary_scalars_round_trip(
        flag in any::<bool>(),
        n in any::<i64>(),
        s in ".*",
        xs in prop::collection::vec(any::<i32>(), 0..8),
        d in -1.0e9f64..1.0e9f64,
    ) {
        let s_desc = StructDescriptor::builder("P")
            .required(1, "flag", TypeDecl::Bool)
            .required(2, "n", TypeDecl::I64)
            .required(3, "s", TypeDecl::Text)
            .required(4, "xs", TypeDecl::list_of(TypeDecl::I32))
            .required(5, "d", TypeDecl::Double)
            .build()
            .unwrap();
        let core = core_with(&[&s_desc]);

        let record = Record::new()
            .with(1, flag)
            .with(2, n)
            .with(3, s)
            .with(4, Value::List(xs.into_iter().map(Value::I32).collect()))
            .with(5, d);
        prop_assert_eq!(round_trip(&core, &s_desc, &record), record);
    }
}
