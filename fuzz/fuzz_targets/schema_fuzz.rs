//! Schema fuzz target: feed arbitrary text to the layout parser, resolver and linter.
//! Build with: cargo fuzz run schema_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(schema) = f1wire::parse(s) {
        let _ = f1wire::lint::lint(&schema);
        let _ = f1wire::ResolvedSchema::resolve(schema).and_then(f1wire::Registry::new);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run schema_fuzz");
}
