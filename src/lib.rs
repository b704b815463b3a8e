//! # f1wire: schema-driven F1 telemetry decoder
//!
//! Decodes the fixed-layout little-endian UDP packets broadcast by the F1 2019 game into
//! [`Record`]s. Packet layouts are data, written in a small DSL and interpreted by one generic
//! [`Codec`]; the dispatcher reads the common header, picks the layout by its `id` field and
//! decodes the whole buffer with it.
//!
//! ## DSL structure
//!
//! - **dispatch**: `dispatch Header.field;` names the header struct and its `u8` id field
//! - **struct**: reusable compound layouts
//! - **packet**: `packet <id> Name { ... }` layouts selected by the id
//!
//! ## Field types
//!
//! - Base: `u8`, `i8`, `u16`, `i16`, `u32`, `f32` (all little-endian)
//! - `bytes(n)`: raw bytes; `string(n)`: n bytes of UTF-8 cut at the first NUL
//! - Struct references and fixed arrays `T[k]` (no length prefixes anywhere)
//!
//! ## Example DSL
//!
//! ```text
//! dispatch Header.id;
//!
//! struct Header {
//!   format: u16;
//!   id: u8;
//! }
//!
//! packet 3 Event {
//!   header: Header;
//!   code: string(4);
//! }
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! # fn handle(datagram: &[u8]) -> Result<(), f1wire::DecodeError> {
//! match f1wire::decode(datagram)? {
//!     f1wire::Dispatch::Packet(p) => println!("{}: {:?}", p.name, p.record.path("header.frameIdentifier")),
//!     f1wire::Dispatch::Unrecognized { id, .. } => println!("skipping packet id {}", id),
//! }
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod codec;
pub mod cursor;
pub mod dispatch;
pub mod dump;
pub mod lint;
pub mod parser;
pub mod registry;
pub mod value;

pub use ast::{FieldDef, FieldKind, PacketDef, Primitive, ResolvedSchema, SchemaError, SchemaFile, StructDef};
pub use codec::{Codec, DecodeError};
pub use cursor::{CursorError, DecodeCursor};
pub use dispatch::{decode_packet, DecodedPacket, Dispatch, MIN_PACKET_LEN};
pub use parser::parse;
pub use registry::{f1_2019, Registry, F1_2019_SCHEMA};
pub use value::{Record, Value};

/// Decode one datagram with the built-in F1 2019 registry.
pub fn decode(bytes: &[u8]) -> Result<Dispatch, DecodeError> {
    decode_packet(f1_2019()?, bytes)
}
