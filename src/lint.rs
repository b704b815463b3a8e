//! Linter for packet layout schemas: checks that parse and resolve cannot express.
//!
//! ## Rules
//!
//! - **Packet starts with header**: every packet's first field must be the dispatch header struct,
//!   otherwise the id read during dispatch would not match the decoded body.
//! - **Zero-length array**: `T[0]` decodes to an empty list and is almost always a typo.
//! - **Zero-width field**: `bytes(0)` / `string(0)`.
//! - **Empty layout**: a struct or packet without fields.
//! - **Unused struct**: a struct no packet or struct refers to (the header counts as used).
//!
//! Run the linter via the `schema_check` binary: `cargo run --bin schema_check -- layouts.schema`.

use crate::ast::{FieldDef, FieldKind, SchemaFile};
use std::collections::HashSet;

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintRule {
    PacketStartsWithHeader,
    ZeroLengthArray,
    ZeroWidthField,
    EmptyLayout,
    UnusedStruct,
}

impl LintRule {
    pub fn id(self) -> &'static str {
        match self {
            LintRule::PacketStartsWithHeader => "packet-starts-with-header",
            LintRule::ZeroLengthArray => "zero-length-array",
            LintRule::ZeroWidthField => "zero-width-field",
            LintRule::EmptyLayout => "empty-layout",
            LintRule::UnusedStruct => "unused-struct",
        }
    }
}

/// A single lint message. `layout` is the struct or packet name, `field` the offending field.
#[derive(Debug, Clone)]
pub struct LintMessage {
    pub layout: String,
    pub field: Option<String>,
    pub rule: LintRule,
    pub severity: Severity,
    pub message: String,
}

/// Run all lint rules. Messages follow source order: structs first, then packets.
pub fn lint(schema: &SchemaFile) -> Vec<LintMessage> {
    let mut out = Vec::new();
    let header = schema.dispatch.as_ref().map(|d| d.header.as_str());

    let mut used: HashSet<&str> = HashSet::new();
    used.extend(header);
    for fields in schema
        .structs
        .iter()
        .map(|s| &s.fields)
        .chain(schema.packets.iter().map(|p| &p.fields))
    {
        for f in fields {
            collect_refs(&f.kind, &mut used);
        }
    }

    for s in &schema.structs {
        check_layout(&s.name, &s.fields, &mut out);
        if !used.contains(s.name.as_str()) {
            out.push(LintMessage {
                layout: s.name.clone(),
                field: None,
                rule: LintRule::UnusedStruct,
                severity: Severity::Warning,
                message: format!("struct {} is never referenced", s.name),
            });
        }
    }

    for p in &schema.packets {
        check_layout(&p.name, &p.fields, &mut out);
        if let Some(header) = header {
            let starts_ok = matches!(
                p.fields.first().map(|f| &f.kind),
                Some(FieldKind::StructRef(name)) if name == header
            );
            if !starts_ok {
                out.push(LintMessage {
                    layout: p.name.clone(),
                    field: p.fields.first().map(|f| f.name.clone()),
                    rule: LintRule::PacketStartsWithHeader,
                    severity: Severity::Error,
                    message: format!("packet {} ({}) must start with a {} field", p.id, p.name, header),
                });
            }
        }
    }
    out
}

fn check_layout(layout: &str, fields: &[FieldDef], out: &mut Vec<LintMessage>) {
    if fields.is_empty() {
        out.push(LintMessage {
            layout: layout.to_string(),
            field: None,
            rule: LintRule::EmptyLayout,
            severity: Severity::Warning,
            message: format!("{} has no fields", layout),
        });
    }
    for f in fields {
        check_kind(layout, &f.name, &f.kind, out);
    }
}

fn check_kind(layout: &str, field: &str, kind: &FieldKind, out: &mut Vec<LintMessage>) {
    let (rule, message) = match kind {
        FieldKind::Array(elem, 0) => {
            check_kind(layout, field, elem, out);
            (LintRule::ZeroLengthArray, format!("{}.{} is an array of length 0", layout, field))
        }
        FieldKind::Array(elem, _) => return check_kind(layout, field, elem, out),
        FieldKind::Bytes(0) | FieldKind::Str(0) => {
            (LintRule::ZeroWidthField, format!("{}.{} has zero width", layout, field))
        }
        _ => return,
    };
    out.push(LintMessage {
        layout: layout.to_string(),
        field: Some(field.to_string()),
        rule,
        severity: Severity::Warning,
        message,
    });
}

fn collect_refs<'a>(kind: &'a FieldKind, used: &mut HashSet<&'a str>) {
    match kind {
        FieldKind::StructRef(name) => {
            used.insert(name.as_str());
        }
        FieldKind::Array(elem, _) => collect_refs(elem, used),
        _ => {}
    }
}
