//! Property tests over the built-in registry: classification and truncation for arbitrary buffers.

mod support;

use f1wire::{decode, DecodeError, Dispatch, MIN_PACKET_LEN};
use proptest::prelude::*;
use support::{expected_len, ID_OFFSET};

const MAX_DATAGRAM: usize = 2048;

/// Well-formed buffer for `id` with random printable content (strings stay valid UTF-8).
fn well_formed(id: u8) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0x20u8..0x7f, expected_len(id)).prop_map(move |mut b| {
        b[ID_OFFSET] = id;
        b
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Arbitrary bytes of any length never panic the dispatcher.
    #[test]
    fn prop_random_bytes_no_panic(data in proptest::collection::vec(any::<u8>(), 0..MAX_DATAGRAM)) {
        let _ = decode(&data);
    }

    #[test]
    fn prop_short_buffers_truncated(data in proptest::collection::vec(any::<u8>(), 0..MIN_PACKET_LEN)) {
        let is_truncated = matches!(decode(&data), Err(DecodeError::Truncated { .. }));
        prop_assert!(is_truncated);
    }

    #[test]
    fn prop_unknown_ids_unrecognized(
        id in 8u8..=255,
        data in proptest::collection::vec(any::<u8>(), MIN_PACKET_LEN..MAX_DATAGRAM),
    ) {
        let mut data = data;
        data[ID_OFFSET] = id;
        match decode(&data) {
            Ok(Dispatch::Unrecognized { id: got, .. }) => prop_assert_eq!(got, id),
            other => prop_assert!(false, "expected Unrecognized, got {:?}", other),
        }
    }

    #[test]
    fn prop_well_formed_decodes_idempotently(data in (0u8..8).prop_flat_map(well_formed)) {
        let first = decode(&data);
        let is_packet = matches!(first, Ok(Dispatch::Packet(_)));
        prop_assert!(is_packet);
        prop_assert_eq!(first, decode(&data));
    }

    #[test]
    fn prop_truncation_reports_field_past_cut(
        (data, cut) in (0u8..8)
            .prop_flat_map(well_formed)
            .prop_flat_map(|d| { let len = d.len(); (Just(d), MIN_PACKET_LEN..len) })
    ) {
        match decode(&data[..cut]) {
            Err(DecodeError::Truncated { offset, needed, .. }) => prop_assert!(offset + needed > cut),
            other => prop_assert!(false, "expected Truncated, got {:?}", other),
        }
    }
}
