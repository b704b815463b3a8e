//! Decode binary packets from resolved layout definitions.
//!
//! Fields are read strictly in declaration order from one shared cursor: nested structs and
//! array elements continue where the previous field stopped. Values are not range-checked.

use crate::ast::*;
use crate::cursor::{CursorError, DecodeCursor};
use crate::value::{Record, Value};
use std::str::Utf8Error;

#[derive(Debug)]
pub struct Codec {
    resolved: ResolvedSchema,
}

/// Decode failure. `field` is the path of the field being read, e.g. `Lap.lapData[4].sector`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated input reading `{field}`: need {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        field: String,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("invalid UTF-8 text in `{field}` at offset {offset}: {source}")]
    InvalidText {
        field: String,
        offset: usize,
        #[source]
        source: Utf8Error,
    },
    #[error("unknown struct: {0}")]
    UnknownStruct(String),
    #[error("no layout for packet id {0}")]
    UnknownPacket(u8),
    #[error("schema: {0}")]
    Schema(#[from] SchemaError),
}

impl From<CursorError> for DecodeError {
    fn from(e: CursorError) -> Self {
        match e {
            CursorError::Truncated { offset, needed, available } => DecodeError::Truncated {
                field: String::new(),
                offset,
                needed,
                available,
            },
            CursorError::InvalidText { offset, source } => DecodeError::InvalidText {
                field: String::new(),
                offset,
                source,
            },
        }
    }
}

impl DecodeError {
    /// Path of the field that failed, for errors raised while reading bytes.
    pub fn field(&self) -> Option<&str> {
        match self {
            DecodeError::Truncated { field, .. } | DecodeError::InvalidText { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Buffer offset at which the failing read started.
    pub fn offset(&self) -> Option<usize> {
        match self {
            DecodeError::Truncated { offset, .. } | DecodeError::InvalidText { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, DecodeError::Truncated { .. })
    }

    fn map_field(self, f: impl FnOnce(&str) -> String) -> Self {
        match self {
            DecodeError::Truncated { field, offset, needed, available } => DecodeError::Truncated {
                field: f(&field),
                offset,
                needed,
                available,
            },
            DecodeError::InvalidText { field, offset, source } => DecodeError::InvalidText {
                field: f(&field),
                offset,
                source,
            },
            other => other,
        }
    }

    fn in_field(self, name: &str) -> Self {
        self.map_field(|inner| {
            if inner.is_empty() {
                name.to_string()
            } else if inner.starts_with('[') {
                format!("{}{}", name, inner)
            } else {
                format!("{}.{}", name, inner)
            }
        })
    }

    fn at_index(self, i: usize) -> Self {
        self.map_field(|inner| {
            if inner.is_empty() || inner.starts_with('[') {
                format!("[{}]{}", i, inner)
            } else {
                format!("[{}].{}", i, inner)
            }
        })
    }
}

impl Codec {
    pub fn new(resolved: ResolvedSchema) -> Self {
        Codec { resolved }
    }

    pub fn resolved(&self) -> &ResolvedSchema {
        &self.resolved
    }

    /// Decode one struct layout from the start of `bytes`. Trailing bytes are left unread.
    pub fn decode_struct(&self, name: &str, bytes: &[u8]) -> Result<Record, DecodeError> {
        let s = self
            .resolved
            .get_struct(name)
            .ok_or_else(|| DecodeError::UnknownStruct(name.to_string()))?;
        let mut cursor = DecodeCursor::new(bytes);
        self.decode_fields(&mut cursor, &s.fields)
            .map_err(|e| e.in_field(&s.name))
    }

    /// Decode the packet layout registered under `id` from the start of `bytes`.
    pub fn decode_packet(&self, id: u8, bytes: &[u8]) -> Result<Record, DecodeError> {
        let p = self.resolved.get_packet(id).ok_or(DecodeError::UnknownPacket(id))?;
        let mut cursor = DecodeCursor::new(bytes);
        self.decode_fields(&mut cursor, &p.fields)
            .map_err(|e| e.in_field(&p.name))
    }

    /// Decode `fields` in order from the cursor's current position.
    pub fn decode_fields(
        &self,
        cursor: &mut DecodeCursor<'_>,
        fields: &[FieldDef],
    ) -> Result<Record, DecodeError> {
        let mut out = Record::with_capacity(fields.len());
        for f in fields {
            let v = self
                .decode_kind(cursor, &f.kind)
                .map_err(|e| e.in_field(&f.name))?;
            out.push(f.name.clone(), v);
        }
        Ok(out)
    }

    fn decode_kind(&self, cursor: &mut DecodeCursor<'_>, kind: &FieldKind) -> Result<Value, DecodeError> {
        match kind {
            FieldKind::Primitive(p) => self.decode_primitive(cursor, *p),
            FieldKind::Bytes(n) => Ok(Value::Bytes(cursor.read_bytes(*n)?)),
            FieldKind::Str(n) => Ok(Value::Str(cursor.read_fixed_string(*n)?)),
            FieldKind::StructRef(name) => {
                let s = self
                    .resolved
                    .get_struct(name)
                    .ok_or_else(|| DecodeError::UnknownStruct(name.clone()))?;
                Ok(Value::Record(self.decode_fields(cursor, &s.fields)?))
            }
            FieldKind::Array(elem, k) => {
                // every non-empty element consumes at least one byte
                let mut list = Vec::with_capacity((*k).min(cursor.remaining()));
                for i in 0..*k {
                    list.push(self.decode_kind(cursor, elem).map_err(|e| e.at_index(i))?);
                }
                Ok(Value::List(list))
            }
        }
    }

    fn decode_primitive(&self, cursor: &mut DecodeCursor<'_>, p: Primitive) -> Result<Value, DecodeError> {
        Ok(match p {
            Primitive::U8 => Value::U8(cursor.read_u8()?),
            Primitive::I8 => Value::I8(cursor.read_i8()?),
            Primitive::U16 => Value::U16(cursor.read_u16_le()?),
            Primitive::I16 => Value::I16(cursor.read_i16_le()?),
            Primitive::U32 => Value::U32(cursor.read_u32_le()?),
            Primitive::F32 => Value::Float(cursor.read_f32_le()?),
        })
    }
}
