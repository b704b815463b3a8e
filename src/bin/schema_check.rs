//! Check packet layout schemas: parse, resolve, lint, and print the wire size of every packet.
//!
//! Usage:
//!   schema_check [--human] [FILE.schema ...]
//!
//! Without files the built-in F1 2019 schema is checked. Exit code 1 if any file fails to
//! parse/resolve or has error-level lint findings.

use f1wire::lint::{lint, LintMessage, Severity};
use f1wire::{parse, Registry, ResolvedSchema};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

fn print_message(path: &str, m: &LintMessage, style: OutputStyle) {
    let severity = match m.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    let location = match &m.field {
        Some(f) => format!("{}.{}", m.layout, f),
        None => m.layout.clone(),
    };
    match style {
        OutputStyle::Compact => println!("{}:{}: {}: {} [{}]", path, location, severity, m.message, m.rule.id()),
        OutputStyle::Human => {
            println!("  {} {}: {}", path, location, m.message);
            println!("    rule: {}", m.rule.id());
        }
    }
}

/// Returns true when the source is usable (resolves, no lint errors).
fn check(path: &str, source: &str, style: OutputStyle) -> bool {
    let schema = match parse(source) {
        Ok(s) => s,
        Err(e) => {
            println!("{}: error: {}", path, e);
            return false;
        }
    };
    let messages = lint(&schema);
    for m in &messages {
        print_message(path, m, style);
    }
    let lint_ok = !messages.iter().any(|m| m.severity == Severity::Error);

    let registry = match ResolvedSchema::resolve(schema).and_then(Registry::new) {
        Ok(r) => r,
        Err(e) => {
            println!("{}: error: {}", path, e);
            return false;
        }
    };
    println!("{}: header {} ({} bytes), key {}", path, registry.header_struct(), registry.header_len(), registry.key_field());
    for id in registry.ids() {
        if let (Some(p), Some(len)) = (registry.packet(id), registry.expected_len(id)) {
            println!("  packet {:>3} {:<16} {:>5} bytes", id, p.name, len);
        }
    }
    lint_ok
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "f1wire=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let style = if let Some(pos) = args.iter().position(|a| a == "--human" || a == "-H") {
        args.remove(pos);
        OutputStyle::Human
    } else {
        OutputStyle::Compact
    };

    let mut ok = true;
    if args.is_empty() {
        ok &= check("<builtin:f1_2019>", f1wire::F1_2019_SCHEMA, style);
    }
    for path in &args {
        debug!(path = %path, "checking schema file");
        let source = std::fs::read_to_string(path)?;
        ok &= check(path, &source, style);
    }
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
