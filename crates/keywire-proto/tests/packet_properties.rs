//! Property-based tests for packet encoding/decoding.
//!
//! Round-trip identity must hold for every packet kind and payload, the
//! encoded length must match the header's claim, and the decoder must be
//! total over arbitrary bytes: decode or typed error, never a panic.

use keywire_proto::{ErrorCode, Packet, PacketBody, PacketHeader, Value};
use proptest::prelude::*;

fn arbitrary_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        ".{0,64}".prop_map(Value::Text),
        any::<i32>().prop_map(Value::Int),
        any::<bool>().prop_map(Value::Bool),
    ]
}

fn arbitrary_error_code() -> impl Strategy<Value = ErrorCode> {
    prop_oneof![
        Just(ErrorCode::AuthRequired),
        Just(ErrorCode::KeyNotFound),
        Just(ErrorCode::Unexpected),
    ]
}

fn arbitrary_ack() -> impl Strategy<Value = Result<(), ErrorCode>> {
    prop_oneof![Just(Ok(())), arbitrary_error_code().prop_map(Err)]
}

fn arbitrary_body() -> impl Strategy<Value = PacketBody> {
    prop_oneof![
        ".{0,64}".prop_map(|api_key| PacketBody::AuthRequest { api_key }),
        arbitrary_ack().prop_map(|ack| PacketBody::AuthResponse { ack }),
        ".{0,64}".prop_map(|key| PacketBody::DataRequest { key }),
        prop_oneof![
            arbitrary_value().prop_map(Ok),
            arbitrary_error_code().prop_map(Err),
        ]
        .prop_map(|outcome| PacketBody::DataResponse { outcome }),
        (".{0,64}", arbitrary_value())
            .prop_map(|(key, value)| PacketBody::DataAdditionRequest { key, value }),
        arbitrary_ack().prop_map(|ack| PacketBody::DataAdditionResponse { ack }),
        ".{0,64}".prop_map(|key| PacketBody::DataRemovalRequest { key }),
        arbitrary_ack().prop_map(|ack| PacketBody::DataRemovalResponse { ack }),
    ]
}

fn arbitrary_packet() -> impl Strategy<Value = Packet> {
    (any::<u32>(), arbitrary_body()).prop_map(|(id, body)| Packet::new(id, body))
}

proptest! {
    #[test]
    fn packet_round_trip(packet in arbitrary_packet()) {
        let wire = packet.encode_to_vec().expect("should encode");

        let header = PacketHeader::from_bytes(&wire[..PacketHeader::SIZE])
            .expect("header should parse");
        let decoded = Packet::decode(header, &wire[PacketHeader::SIZE..])
            .expect("payload should decode");

        prop_assert_eq!(decoded, packet);
    }

    #[test]
    fn encoded_length_matches_the_header_claim(packet in arbitrary_packet()) {
        let wire = packet.encode_to_vec().expect("should encode");

        let header = PacketHeader::from_bytes(&wire[..PacketHeader::SIZE])
            .expect("header should parse");

        prop_assert_eq!(
            wire.len(),
            PacketHeader::SIZE + header.payload_length() as usize
        );
        prop_assert_eq!(header.packet_id(), packet.id);
        prop_assert_eq!(header.kind(), Some(packet.kind()));
    }

    #[test]
    fn decoding_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        // Totality: any byte soup yields Ok or a typed error.
        if let Ok(header) = PacketHeader::from_bytes(&bytes) {
            let declared = header.payload_length() as usize;
            let available = bytes.len() - PacketHeader::SIZE;
            let payload = &bytes[PacketHeader::SIZE..PacketHeader::SIZE + declared.min(available)];
            let _ = Packet::decode(header, payload);
        }
    }

    #[test]
    fn decoding_valid_headers_with_mangled_payloads_never_panics(
        packet in arbitrary_packet(),
        mangled in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        // A well-formed header over garbage payload bytes must fail
        // cleanly, not panic. Length mismatches are also typed errors.
        let wire = packet.encode_to_vec().expect("should encode");
        let header = PacketHeader::from_bytes(&wire[..PacketHeader::SIZE])
            .expect("header should parse");

        let _ = Packet::decode(header, &mangled);
    }
}
