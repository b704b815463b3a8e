//! Abstract Syntax Tree for the packet layout DSL, plus the resolved form used by the codec.

use std::collections::{HashMap, HashSet};

/// Root of a schema source: optional dispatch declaration, structs and packets.
#[derive(Debug, Clone, Default)]
pub struct SchemaFile {
    pub dispatch: Option<DispatchDecl>,
    pub structs: Vec<StructDef>,
    pub packets: Vec<PacketDef>,
}

/// `dispatch Header.key;`: the common header struct and the field of it that selects the packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchDecl {
    pub header: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// A packet layout, selected by `id` in the dispatch key.
#[derive(Debug, Clone)]
pub struct PacketDef {
    pub id: u8,
    pub name: String,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// Field type. Every kind has a fixed wire width; there are no length prefixes.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Primitive(Primitive),
    /// `bytes(n)`: raw bytes, copied out.
    Bytes(usize),
    /// `string(n)`: n bytes of UTF-8, truncated at the first NUL.
    Str(usize),
    StructRef(String),
    /// `T[k]`: k consecutive elements.
    Array(Box<FieldKind>, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    U8,
    I8,
    U16,
    I16,
    U32,
    F32,
}

impl Primitive {
    pub fn width(self) -> usize {
        match self {
            Primitive::U8 | Primitive::I8 => 1,
            Primitive::U16 | Primitive::I16 => 2,
            Primitive::U32 | Primitive::F32 => 4,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::U8 => "u8",
            Primitive::I8 => "i8",
            Primitive::U16 => "u16",
            Primitive::I16 => "i16",
            Primitive::U32 => "u32",
            Primitive::F32 => "f32",
        }
    }
}

/// Errors raised while parsing or resolving a schema source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("duplicate struct name: {0}")]
    DuplicateStruct(String),
    #[error("duplicate packet id {id} ({name})")]
    DuplicatePacketId { id: u8, name: String },
    #[error("duplicate packet name: {0}")]
    DuplicatePacketName(String),
    #[error("duplicate field `{field}` in {layout}")]
    DuplicateField { layout: String, field: String },
    #[error("unknown struct `{name}` referenced from {layout}")]
    UnknownStruct { layout: String, name: String },
    #[error("recursive struct reference through {0}")]
    Recursive(String),
    #[error("schema has no dispatch declaration")]
    MissingDispatch,
    #[error("dispatch header struct `{0}` is not defined")]
    UnknownHeader(String),
    #[error("dispatch key `{header}.{key}` must be a u8 field of the header")]
    BadDispatchKey { header: String, key: String },
    #[error("{layout} is too large: its byte length overflows usize")]
    LayoutTooLarge { layout: String },
}

/// Resolved schema: structs and packets indexed for the codec, byte lengths precomputed.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub schema: SchemaFile,
    pub structs_by_name: HashMap<String, usize>,
    pub packets_by_id: HashMap<u8, usize>,
    struct_lens: HashMap<String, usize>,
}

impl ResolvedSchema {
    pub fn resolve(schema: SchemaFile) -> Result<Self, SchemaError> {
        let mut structs_by_name = HashMap::new();
        let mut packets_by_id = HashMap::new();
        let mut packet_names = HashSet::new();
        for (i, s) in schema.structs.iter().enumerate() {
            if structs_by_name.insert(s.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateStruct(s.name.clone()));
            }
            check_unique_fields(&s.name, &s.fields)?;
        }
        for (i, p) in schema.packets.iter().enumerate() {
            if packets_by_id.insert(p.id, i).is_some() {
                return Err(SchemaError::DuplicatePacketId { id: p.id, name: p.name.clone() });
            }
            if !packet_names.insert(p.name.as_str()) {
                return Err(SchemaError::DuplicatePacketName(p.name.clone()));
            }
            check_unique_fields(&p.name, &p.fields)?;
        }

        let mut resolved = ResolvedSchema {
            schema,
            structs_by_name,
            packets_by_id,
            struct_lens: HashMap::new(),
        };
        let names: Vec<String> = resolved.schema.structs.iter().map(|s| s.name.clone()).collect();
        for name in &names {
            let mut visiting = Vec::new();
            resolved.compute_struct_len(name, &mut visiting)?;
        }
        for p in &resolved.schema.packets {
            for f in &p.fields {
                resolved.check_refs(&p.name, &f.kind)?;
            }
            if resolved.fields_len(&p.fields).is_none() {
                return Err(SchemaError::LayoutTooLarge { layout: p.name.clone() });
            }
        }
        Ok(resolved)
    }

    fn compute_struct_len(&mut self, name: &str, visiting: &mut Vec<String>) -> Result<usize, SchemaError> {
        if let Some(&len) = self.struct_lens.get(name) {
            return Ok(len);
        }
        if visiting.iter().any(|v| v == name) {
            visiting.push(name.to_string());
            return Err(SchemaError::Recursive(visiting.join(" -> ")));
        }
        let idx = *self.structs_by_name.get(name).ok_or_else(|| SchemaError::UnknownStruct {
            layout: visiting.last().cloned().unwrap_or_default(),
            name: name.to_string(),
        })?;
        visiting.push(name.to_string());
        let fields = self.schema.structs[idx].fields.clone();
        let mut total = 0usize;
        for f in &fields {
            let len = self.compute_kind_len(&f.kind, visiting)?;
            total = total
                .checked_add(len)
                .ok_or_else(|| SchemaError::LayoutTooLarge { layout: name.to_string() })?;
        }
        visiting.pop();
        self.struct_lens.insert(name.to_string(), total);
        Ok(total)
    }

    fn compute_kind_len(&mut self, kind: &FieldKind, visiting: &mut Vec<String>) -> Result<usize, SchemaError> {
        Ok(match kind {
            FieldKind::Primitive(p) => p.width(),
            FieldKind::Bytes(n) | FieldKind::Str(n) => *n,
            FieldKind::StructRef(name) => self.compute_struct_len(name, visiting)?,
            FieldKind::Array(elem, k) => self
                .compute_kind_len(elem, visiting)?
                .checked_mul(*k)
                .ok_or_else(|| SchemaError::LayoutTooLarge {
                    layout: visiting.last().cloned().unwrap_or_default(),
                })?,
        })
    }

    fn check_refs(&self, layout: &str, kind: &FieldKind) -> Result<(), SchemaError> {
        match kind {
            FieldKind::StructRef(name) if !self.structs_by_name.contains_key(name) => {
                Err(SchemaError::UnknownStruct { layout: layout.to_string(), name: name.clone() })
            }
            FieldKind::Array(elem, _) => self.check_refs(layout, elem),
            _ => Ok(()),
        }
    }

    pub fn get_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs_by_name.get(name).map(|&i| &self.schema.structs[i])
    }

    pub fn get_packet(&self, id: u8) -> Option<&PacketDef> {
        self.packets_by_id.get(&id).map(|&i| &self.schema.packets[i])
    }

    /// Wire length of a struct, in bytes.
    pub fn struct_len(&self, name: &str) -> Option<usize> {
        self.struct_lens.get(name).copied()
    }

    /// Wire length of a field kind, in bytes.
    pub fn kind_len(&self, kind: &FieldKind) -> Option<usize> {
        match kind {
            FieldKind::Primitive(p) => Some(p.width()),
            FieldKind::Bytes(n) | FieldKind::Str(n) => Some(*n),
            FieldKind::StructRef(name) => self.struct_len(name),
            FieldKind::Array(elem, k) => self.kind_len(elem)?.checked_mul(*k),
        }
    }

    /// Summed wire length of `fields`; `None` on an unknown struct or overflow.
    pub fn fields_len(&self, fields: &[FieldDef]) -> Option<usize> {
        fields
            .iter()
            .try_fold(0usize, |total, f| total.checked_add(self.kind_len(&f.kind)?))
    }

    /// Wire length of a packet layout (header included), in bytes.
    pub fn packet_len(&self, id: u8) -> Option<usize> {
        let p = self.get_packet(id)?;
        self.fields_len(&p.fields)
    }

    /// Checks the dispatch declaration and returns it.
    pub fn dispatch(&self) -> Result<&DispatchDecl, SchemaError> {
        let d = self.schema.dispatch.as_ref().ok_or(SchemaError::MissingDispatch)?;
        let header = self
            .get_struct(&d.header)
            .ok_or_else(|| SchemaError::UnknownHeader(d.header.clone()))?;
        let key_ok = header
            .fields
            .iter()
            .any(|f| f.name == d.key && f.kind == FieldKind::Primitive(Primitive::U8));
        if !key_ok {
            return Err(SchemaError::BadDispatchKey { header: d.header.clone(), key: d.key.clone() });
        }
        Ok(d)
    }
}

fn check_unique_fields(layout: &str, fields: &[FieldDef]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for f in fields {
        if !seen.insert(f.name.as_str()) {
            return Err(SchemaError::DuplicateField { layout: layout.to_string(), field: f.name.clone() });
        }
    }
    Ok(())
}
