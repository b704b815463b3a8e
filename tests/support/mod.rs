//! Packet builders shared by the integration tests.

#![allow(dead_code)]

pub const HEADER_LEN: usize = 23;
pub const ID_OFFSET: usize = 5;

/// F1 2019 header with the given id and recognisable session fields.
pub fn header(id: u8) -> Vec<u8> {
    let mut b = Vec::with_capacity(HEADER_LEN);
    b.extend_from_slice(&2019u16.to_le_bytes());
    b.push(1); // gameMajorVersion
    b.push(22); // gameMinorVersion
    b.push(1); // version
    b.push(id);
    b.extend_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);
    b.extend_from_slice(&12.5f32.to_le_bytes());
    b.extend_from_slice(&4242u32.to_le_bytes());
    b.push(0); // playerCarIndex
    assert_eq!(b.len(), HEADER_LEN);
    b
}

/// Header plus a body of printable ASCII so every string region is valid UTF-8.
pub fn packet(id: u8, total_len: usize) -> Vec<u8> {
    let mut b = header(id);
    b.extend((0..total_len - HEADER_LEN).map(|i| (i % 95 + 32) as u8));
    b
}

pub fn expected_len(id: u8) -> usize {
    f1wire::f1_2019()
        .expect("builtin registry")
        .expected_len(id)
        .expect("registered id")
}
