//! DSL unit tests: syntax (parse success/failure), semantics (resolve), and custom registries.

use f1wire::{
    decode_packet, parse, Codec, DecodeCursor, DecodeError, Dispatch, FieldKind, Primitive, Registry,
    ResolvedSchema, SchemaError, Value,
};

fn resolve(src: &str) -> Result<ResolvedSchema, SchemaError> {
    ResolvedSchema::resolve(parse(src)?)
}

// ==================== Syntax ====================

#[test]
fn parse_empty_schema() {
    let s = parse("").expect("empty schema parses");
    assert!(s.dispatch.is_none());
    assert!(s.structs.is_empty());
    assert!(s.packets.is_empty());
}

#[test]
fn parse_all_field_kinds() {
    let src = r#"
struct All {
	a: u8;
	b: i8;
	c: u16;
	d: i16;
	e: u32;
	f: f32;
	g: bytes(8);
	h: string(48);
	i: Other;
	j: f32[4];
	k: u8[4][2];
}
struct Other {
	x: u8;
}
"#;
    let s = parse(src).expect("parse");
    let f = &s.structs[0].fields;
    assert_eq!(f.len(), 11);
    assert_eq!(f[0].kind, FieldKind::Primitive(Primitive::U8));
    assert_eq!(f[5].kind, FieldKind::Primitive(Primitive::F32));
    assert_eq!(f[6].kind, FieldKind::Bytes(8));
    assert_eq!(f[7].kind, FieldKind::Str(48));
    assert_eq!(f[8].kind, FieldKind::StructRef("Other".to_string()));
    assert_eq!(f[9].kind, FieldKind::Array(Box::new(FieldKind::Primitive(Primitive::F32)), 4));
    assert_eq!(
        f[10].kind,
        FieldKind::Array(Box::new(FieldKind::Array(Box::new(FieldKind::Primitive(Primitive::U8)), 4)), 2)
    );
}

#[test]
fn parse_comments_and_dispatch() {
    let src = r#"
// line comment
dispatch H.id; /* block
comment */
struct H { id: u8; }
packet 200 Big { h: H; }
"#;
    let s = parse(src).expect("parse");
    let d = s.dispatch.expect("dispatch");
    assert_eq!((d.header.as_str(), d.key.as_str()), ("H", "id"));
    assert_eq!(s.packets[0].id, 200);
    assert_eq!(s.packets[0].name, "Big");
}

#[test]
fn struct_named_like_a_primitive_prefix_is_a_reference() {
    let s = parse("struct u8x { a: u8; }\nstruct T { b: u8x; }").expect("parse");
    assert_eq!(s.structs[1].fields[0].kind, FieldKind::StructRef("u8x".to_string()));
}

#[test]
fn parse_errors() {
    for src in [
        "struct S { a: u8 }",
        "struct S { a u8; }",
        "struct { a: u8; }",
        "packet X S { a: u8; }",
        "packet 256 S { a: u8; }",
        "struct S { a: bytes(); }",
        "struct S { a: u8[]; }",
        "dispatch H;",
        "dispatch H.id; dispatch H.id;",
        "message S { a: u8; }",
    ] {
        assert!(matches!(parse(src), Err(SchemaError::Parse(_))), "should fail: {}", src);
    }
}

// ==================== Semantics ====================

#[test]
fn resolve_computes_lengths() {
    let r = resolve(
        "dispatch H.id;\nstruct H { f: u16; id: u8; }\nstruct Car { a: f32; b: i8[3]; }\npacket 1 P { h: H; cars: Car[20]; tail: u32; }",
    )
    .expect("resolve");
    assert_eq!(r.struct_len("H"), Some(3));
    assert_eq!(r.struct_len("Car"), Some(7));
    assert_eq!(r.packet_len(1), Some(3 + 140 + 4));
    assert_eq!(r.packet_len(2), None);
}

#[test]
fn resolve_rejects_bad_schemas() {
    let cases: [(&str, fn(&SchemaError) -> bool); 10] = [
        ("struct A { x: u8; } struct A { y: u8; }", |e| matches!(e, SchemaError::DuplicateStruct(n) if n == "A")),
        ("struct A { x: u8; x: u16; }", |e| matches!(e, SchemaError::DuplicateField { .. })),
        ("packet 1 P { x: u8; } packet 1 Q { x: u8; }", |e| matches!(e, SchemaError::DuplicatePacketId { id: 1, .. })),
        ("packet 1 P { x: u8; } packet 2 P { x: u8; }", |e| matches!(e, SchemaError::DuplicatePacketName(_))),
        ("packet 1 P { x: Missing; }", |e| matches!(e, SchemaError::UnknownStruct { name, .. } if name == "Missing")),
        ("struct A { b: B; } struct B { a: A[2]; }", |e| matches!(e, SchemaError::Recursive(_))),
        ("struct A { a: A; }", |e| matches!(e, SchemaError::Recursive(_))),
        ("struct Big { x: u32[18446744073709551615]; }", |e| {
            matches!(e, SchemaError::LayoutTooLarge { layout } if layout == "Big")
        }),
        ("struct Wide { a: u8[18446744073709551615]; b: u8; }", |e| {
            matches!(e, SchemaError::LayoutTooLarge { layout } if layout == "Wide")
        }),
        ("struct Half { a: u8[9223372036854775807]; }\npacket 1 P { a: Half; b: Half; c: Half; }", |e| {
            matches!(e, SchemaError::LayoutTooLarge { layout } if layout == "P")
        }),
    ];
    for (src, check) in cases {
        let err = resolve(src).expect_err(src);
        assert!(check(&err), "{}: unexpected {:?}", src, err);
    }
}

#[test]
fn registry_requires_valid_dispatch() {
    assert_eq!(Registry::from_source("struct H { id: u8; }").err(), Some(SchemaError::MissingDispatch));
    assert!(matches!(
        Registry::from_source("dispatch Nope.id; struct H { id: u8; }"),
        Err(SchemaError::UnknownHeader(_))
    ));
    assert!(matches!(
        Registry::from_source("dispatch H.id; struct H { id: u16; }"),
        Err(SchemaError::BadDispatchKey { .. })
    ));
    assert!(matches!(
        Registry::from_source("dispatch H.kind; struct H { id: u8; }"),
        Err(SchemaError::BadDispatchKey { .. })
    ));
}

// ==================== Custom layouts ====================

const GRID: &str = r#"
dispatch Hdr.kind;
struct Hdr {
	magic: bytes(2);
	kind: u8;
}
struct Cell {
	v: i16;
}
packet 1 Grid {
	hdr: Hdr;
	label: string(6);
	grid: u8[2][3];
	cells: Cell[2];
}
"#;

fn grid_bytes() -> Vec<u8> {
    let mut b = vec![0xca, 0xfe, 1];
    b.extend_from_slice(b"hi\0\0\0\0");
    b.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
    b.extend_from_slice(&(-300i16).to_le_bytes());
    b.extend_from_slice(&7i16.to_le_bytes());
    b.extend_from_slice(&[0; 10]);
    b
}

#[test]
fn custom_registry_decodes_nested_arrays() {
    let registry = Registry::from_source(GRID).expect("registry");
    assert_eq!(registry.expected_len(1), Some(3 + 6 + 6 + 4));
    let p = match decode_packet(&registry, &grid_bytes()).expect("decode") {
        Dispatch::Packet(p) => p,
        other => panic!("expected packet, got {:?}", other),
    };
    assert_eq!(p.name, "Grid");
    let r = &p.record;
    assert_eq!(r.path("hdr.magic").and_then(Value::as_bytes), Some(&[0xca, 0xfe][..]));
    assert_eq!(r.get("label").and_then(Value::as_str), Some("hi"));
    assert_eq!(r.path("grid[0][0]"), Some(&Value::U8(1)));
    assert_eq!(r.path("grid[2][1]"), Some(&Value::U8(6)));
    assert_eq!(r.path("grid[3][0]"), None);
    assert_eq!(r.path("cells[0].v"), Some(&Value::I16(-300)));
    assert_eq!(r.path("cells[1].v").and_then(Value::as_i64), Some(7));
    assert_eq!(r.path("cells.v"), None);
}

#[test]
fn custom_registry_error_paths() {
    let registry = Registry::from_source(GRID).expect("registry");
    let bytes = grid_bytes();
    let err = decode_packet(&registry, &bytes[..24]).map(|_| ());
    assert_eq!(err, Ok(()));
    let short = &bytes[..3 + 6 + 6 + 3];
    // below the minimum datagram length the header is rejected outright
    assert!(matches!(
        decode_packet(&registry, short),
        Err(DecodeError::Truncated { ref field, .. }) if field == "Hdr"
    ));

    let codec = registry.codec();
    let err = codec.decode_packet(1, short).expect_err("short");
    assert_eq!(err.field(), Some("Grid.cells[1].v"));
    assert_eq!(err.offset(), Some(17));
    assert_eq!(codec.decode_packet(9, &bytes), Err(DecodeError::UnknownPacket(9)));
    assert_eq!(codec.decode_struct("Nope", &bytes), Err(DecodeError::UnknownStruct("Nope".to_string())));
}

#[test]
fn huge_array_on_short_buffer_is_truncated() {
    let registry =
        Registry::from_source("dispatch H.id;\nstruct H { id: u8; }\npacket 1 Big { h: H; x: u8[1000000000000000]; }")
            .expect("registry");
    let mut bytes = vec![0u8; 30];
    bytes[0] = 1;
    match decode_packet(&registry, &bytes) {
        Err(DecodeError::Truncated { field, offset, needed, available }) => {
            assert_eq!(field, "Big.x[29]");
            assert_eq!((offset, needed, available), (30, 1, 0));
        }
        other => panic!("expected Truncated, got {:?}", other),
    }
}

#[test]
fn decode_fields_continues_from_cursor_position() {
    let resolved = resolve("struct Cell { v: i16; }").expect("resolve");
    let codec = Codec::new(resolved);
    let fields = codec.resolved().get_struct("Cell").expect("cell").fields.clone();
    let bytes = [0x01, 0x00, 0x02, 0x00];
    let mut cursor = DecodeCursor::new(&bytes);
    let a = codec.decode_fields(&mut cursor, &fields).expect("first");
    let b = codec.decode_fields(&mut cursor, &fields).expect("second");
    assert_eq!(a.get("v"), Some(&Value::I16(1)));
    assert_eq!(b.get("v"), Some(&Value::I16(2)));
    assert!(cursor.is_empty());
    assert!(codec.decode_fields(&mut cursor, &fields).is_err());
}

#[test]
fn registry_from_schema_file_on_disk() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(GRID.as_bytes()).expect("write");
    let source = std::fs::read_to_string(file.path()).expect("read back");
    let registry = Registry::from_source(&source).expect("registry");
    assert_eq!(registry.header_struct(), "Hdr");
    assert_eq!(registry.key_field(), "kind");
    assert_eq!(registry.ids(), vec![1]);
}

#[test]
fn builtin_schema_text_round_trips_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("f1_2019.schema");
    std::fs::write(&path, f1wire::F1_2019_SCHEMA).expect("write");
    let registry = Registry::from_source(&std::fs::read_to_string(&path).expect("read")).expect("registry");
    let builtin = f1wire::f1_2019().expect("builtin");
    assert_eq!(registry.ids(), builtin.ids());
    for id in registry.ids() {
        assert_eq!(registry.expected_len(id), builtin.expected_len(id));
    }
}
