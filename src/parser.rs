//! Parse DSL source into AST using PEST.

use crate::ast::*;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Parse schema source into AST.
pub fn parse(source: &str) -> Result<SchemaFile, SchemaError> {
    let pairs = SchemaParser::parse(Rule::schema_file, source)
        .map_err(|e| SchemaError::Parse(e.to_string()))?;
    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| SchemaError::Parse("empty parse".to_string()))?;
    build_schema_file(pair)
}

fn build_schema_file(pair: Pair) -> Result<SchemaFile, SchemaError> {
    let mut out = SchemaFile::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::dispatch_decl => {
                if out.dispatch.is_some() {
                    return Err(SchemaError::Parse("more than one dispatch declaration".to_string()));
                }
                out.dispatch = Some(build_dispatch(inner)?);
            }
            Rule::struct_section => out.structs.push(build_struct(inner)?),
            Rule::packet_section => out.packets.push(build_packet(inner)?),
            _ => {}
        }
    }
    Ok(out)
}

fn build_dispatch(pair: Pair) -> Result<DispatchDecl, SchemaError> {
    let mut idents = pair.into_inner().filter(|p| p.as_rule() == Rule::ident);
    let header = idents.next().ok_or_else(|| missing("dispatch: header struct"))?;
    let key = idents.next().ok_or_else(|| missing("dispatch: key field"))?;
    Ok(DispatchDecl {
        header: header.as_str().to_string(),
        key: key.as_str().to_string(),
    })
}

fn build_struct(pair: Pair) -> Result<StructDef, SchemaError> {
    let mut name = String::new();
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::field => fields.push(build_field(inner)?),
            _ => {}
        }
    }
    Ok(StructDef { name, fields })
}

fn build_packet(pair: Pair) -> Result<PacketDef, SchemaError> {
    let mut id = None;
    let mut name = String::new();
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::number => id = Some(parse_number::<u8>(inner, "packet id")?),
            Rule::ident => name = inner.as_str().to_string(),
            Rule::field => fields.push(build_field(inner)?),
            _ => {}
        }
    }
    Ok(PacketDef {
        id: id.ok_or_else(|| missing("packet id"))?,
        name,
        fields,
    })
}

fn build_field(pair: Pair) -> Result<FieldDef, SchemaError> {
    let mut name = String::new();
    let mut kind = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::type_spec => kind = Some(build_type_spec(inner)?),
            _ => {}
        }
    }
    let kind = kind.ok_or_else(|| missing("field type"))?;
    Ok(FieldDef { name, kind })
}

fn build_type_spec(pair: Pair) -> Result<FieldKind, SchemaError> {
    let mut inner = pair.into_inner();
    let elem = inner.next().ok_or_else(|| missing("element type"))?;
    let mut kind = match elem.as_rule() {
        Rule::primitive_type => FieldKind::Primitive(parse_primitive(elem.as_str())?),
        Rule::bytes_type => FieldKind::Bytes(sized_arg(elem, "bytes(n)")?),
        Rule::string_type => FieldKind::Str(sized_arg(elem, "string(n)")?),
        Rule::struct_ref => FieldKind::StructRef(elem.as_str().trim().to_string()),
        other => return Err(SchemaError::Parse(format!("unexpected type rule {:?}", other))),
    };
    // `u16[4][20]` is twenty groups of four.
    for len in inner {
        let count = len.into_inner().next().ok_or_else(|| missing("array length"))?;
        kind = FieldKind::Array(Box::new(kind), parse_number::<usize>(count, "array length")?);
    }
    Ok(kind)
}

fn parse_primitive(s: &str) -> Result<Primitive, SchemaError> {
    Ok(match s {
        "u8" => Primitive::U8,
        "i8" => Primitive::I8,
        "u16" => Primitive::U16,
        "i16" => Primitive::I16,
        "u32" => Primitive::U32,
        "f32" => Primitive::F32,
        other => return Err(SchemaError::Parse(format!("unknown primitive type: {}", other))),
    })
}

fn sized_arg(pair: Pair, what: &str) -> Result<usize, SchemaError> {
    let n = pair.into_inner().next().ok_or_else(|| missing(what))?;
    parse_number(n, what)
}

fn parse_number<T: std::str::FromStr>(pair: Pair, what: &str) -> Result<T, SchemaError> {
    pair.as_str()
        .parse()
        .map_err(|_| SchemaError::Parse(format!("{}: `{}` out of range", what, pair.as_str())))
}

fn missing(what: &str) -> SchemaError {
    SchemaError::Parse(format!("missing {}", what))
}
