//! Packet dispatch: read the header, pick the layout by id, decode the whole buffer with it.

use crate::codec::DecodeError;
use crate::registry::Registry;
use crate::value::{Record, Value};
use tracing::{debug, trace};

/// Shortest datagram that is classified at all. Anything shorter is rejected before decoding.
pub const MIN_PACKET_LEN: usize = 24;

/// Result of classifying one buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Packet(DecodedPacket),
    /// The header decoded but no layout is registered for its id.
    Unrecognized { id: u8, header: Record },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub id: u8,
    pub name: String,
    /// Full packet record; its first field is the header.
    pub record: Record,
}

impl Dispatch {
    pub fn id(&self) -> u8 {
        match self {
            Dispatch::Packet(p) => p.id,
            Dispatch::Unrecognized { id, .. } => *id,
        }
    }

    pub fn packet(&self) -> Option<&DecodedPacket> {
        match self {
            Dispatch::Packet(p) => Some(p),
            Dispatch::Unrecognized { .. } => None,
        }
    }

    pub fn into_packet(self) -> Option<DecodedPacket> {
        match self {
            Dispatch::Packet(p) => Some(p),
            Dispatch::Unrecognized { .. } => None,
        }
    }

    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Dispatch::Unrecognized { .. })
    }
}

/// Decode one datagram with `registry`.
///
/// The header is decoded on its own to find the id, then the matching layout decodes the buffer
/// again from offset 0, header included, so the returned header always comes from the same read
/// as the body.
pub fn decode_packet(registry: &Registry, bytes: &[u8]) -> Result<Dispatch, DecodeError> {
    if bytes.len() < MIN_PACKET_LEN {
        return Err(DecodeError::Truncated {
            field: registry.header_struct().to_string(),
            offset: 0,
            needed: MIN_PACKET_LEN,
            available: bytes.len(),
        });
    }
    let codec = registry.codec();
    let header = codec.decode_struct(registry.header_struct(), bytes)?;
    let id = match header.get(registry.key_field()) {
        Some(Value::U8(id)) => *id,
        _ => return Err(DecodeError::UnknownStruct(registry.header_struct().to_string())),
    };
    trace!(id, len = bytes.len(), "dispatching packet");

    let Some(def) = registry.packet(id) else {
        debug!(id, len = bytes.len(), "unrecognized packet id");
        return Ok(Dispatch::Unrecognized { id, header });
    };
    match codec.decode_packet(id, bytes) {
        Ok(record) => Ok(Dispatch::Packet(DecodedPacket {
            id,
            name: def.name.clone(),
            record,
        })),
        Err(e) => {
            debug!(id, packet = %def.name, error = %e, "packet decode failed");
            Err(e)
        }
    }
}
