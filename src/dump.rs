//! Format decoded values for display (dump text for tools and logs).

use crate::value::{Record, Value};
use std::io::{self, Write};

/// Raw scalar string; `None` for compound values.
pub fn format_scalar(v: &Value) -> Option<String> {
    Some(match v {
        Value::U8(x) => x.to_string(),
        Value::I8(x) => x.to_string(),
        Value::U16(x) => x.to_string(),
        Value::I16(x) => x.to_string(),
        Value::U32(x) => x.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Str(s) => format!("{:?}", s),
        Value::Bytes(b) => format!("hex({})", hex_string(b)),
        Value::Record(_) | Value::List(_) => return None,
    })
}

pub fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Format a value at `indent`. Lists of scalars stay on one line; records and lists of
/// records expand one field per line.
pub fn format_value(v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match v {
        Value::Record(r) => {
            let mut lines = vec![format!("{}{{", pad)];
            push_fields(&mut lines, r, indent + 1);
            lines.push(format!("{}}}", pad));
            lines.join("\n")
        }
        Value::List(items) => {
            let inline: Option<Vec<String>> = items.iter().map(format_scalar).collect();
            if let Some(parts) = inline {
                return format!("{}[{}]", pad, parts.join(", "));
            }
            let mut lines = vec![format!("{}[", pad)];
            for (i, item) in items.iter().enumerate() {
                let sub = format_value(item, indent + 1);
                lines.push(format!("{}  [{}] {}", pad, i, sub.trim_start()));
            }
            lines.push(format!("{}]", pad));
            lines.join("\n")
        }
        scalar => format!("{}{}", pad, format_scalar(scalar).unwrap_or_default()),
    }
}

/// Multi-line dump of a record, one `name: value` per line, in declaration order.
pub fn dump_record(r: &Record) -> String {
    let mut lines = Vec::new();
    push_fields(&mut lines, r, 0);
    lines.join("\n")
}

/// Write one `=== title ===` entry, followed by the record dump when there is one.
pub fn write_entry(w: &mut dyn Write, title: &str, record: Option<&Record>) -> io::Result<()> {
    writeln!(w, "=== {} ===", title)?;
    if let Some(r) = record {
        writeln!(w, "{}", dump_record(r))?;
    }
    Ok(())
}

fn push_fields(lines: &mut Vec<String>, r: &Record, indent: usize) {
    let pad = "  ".repeat(indent);
    for (name, v) in r.iter() {
        let sub = format_value(v, indent);
        lines.push(format!("{}{}: {}", pad, name, sub.trim_start()));
    }
}
