//! Packet registry: the dispatch header plus every packet layout keyed by id.

use crate::ast::{PacketDef, ResolvedSchema, SchemaError};
use crate::codec::Codec;
use crate::parser::parse;
use std::sync::OnceLock;
use tracing::debug;

/// Layout source for the built-in F1 2019 packet set.
pub const F1_2019_SCHEMA: &str = include_str!("schemas/f1_2019.schema");

/// Resolved layouts and the dispatch declaration. Read-only once built.
#[derive(Debug)]
pub struct Registry {
    codec: Codec,
    header: String,
    key: String,
    header_len: usize,
}

impl Registry {
    pub fn new(resolved: ResolvedSchema) -> Result<Self, SchemaError> {
        let dispatch = resolved.dispatch()?.clone();
        let header_len = resolved
            .struct_len(&dispatch.header)
            .ok_or_else(|| SchemaError::UnknownHeader(dispatch.header.clone()))?;
        Ok(Registry {
            codec: Codec::new(resolved),
            header: dispatch.header,
            key: dispatch.key,
            header_len,
        })
    }

    /// Parse and resolve DSL source into a registry.
    pub fn from_source(source: &str) -> Result<Self, SchemaError> {
        let registry = Registry::new(ResolvedSchema::resolve(parse(source)?)?)?;
        debug!(
            header = %registry.header,
            packets = registry.codec.resolved().packets_by_id.len(),
            "packet registry built"
        );
        Ok(registry)
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Name of the header struct every packet starts with.
    pub fn header_struct(&self) -> &str {
        &self.header
    }

    /// Name of the `u8` header field holding the packet id.
    pub fn key_field(&self) -> &str {
        &self.key
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn packet(&self, id: u8) -> Option<&PacketDef> {
        self.codec.resolved().get_packet(id)
    }

    /// Registered ids, ascending.
    pub fn ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.codec.resolved().packets_by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Exact wire length of the packet registered under `id`.
    pub fn expected_len(&self, id: u8) -> Option<usize> {
        self.codec.resolved().packet_len(id)
    }
}

static F1_2019: OnceLock<Result<Registry, SchemaError>> = OnceLock::new();

/// Process-wide registry for the built-in F1 2019 layouts, built on first use.
pub fn f1_2019() -> Result<&'static Registry, SchemaError> {
    F1_2019
        .get_or_init(|| Registry::from_source(F1_2019_SCHEMA))
        .as_ref()
        .map_err(|e| e.clone())
}
