//! Packet header implementation with zero-copy parsing.
//!
//! The `PacketHeader` is a fixed 10-byte structure serialized as raw binary
//! (Big Endian). The payload length it carries makes the stream
//! self-delimiting, so a session can frame packets without inspecting
//! payload bytes.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    errors::{ProtocolError, Result},
    packet::PacketKind,
};

/// Fixed 10-byte packet header (Big Endian network byte order).
///
/// Multi-byte fields are stored as raw byte arrays to avoid alignment
/// issues. Layout on the wire:
///
/// | Offset | Size | Field |
/// |-------:|-----:|-------|
/// | 0 | 1 | Protocol version (must be [`Self::VERSION`]) |
/// | 1 | 4 | Packet id (`0` = no response expected) |
/// | 5 | 1 | Packet type tag |
/// | 6 | 4 | Payload length in bytes |
///
/// The `#[repr(C, packed)]` layout with zerocopy traits lets this struct be
/// cast directly from untrusted network bytes: all 10-byte patterns are
/// valid representations, so the cast itself cannot misbehave. Semantic
/// validation (version, payload bound) happens in [`Self::from_bytes`]; the
/// type tag is validated later by the packet factory, which needs it to
/// pick a payload decoder anyway.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct PacketHeader {
    version: u8,
    packet_id: [u8; 4],
    packet_type: u8,
    payload_length: [u8; 4],
}

impl PacketHeader {
    /// Size of the serialized header (10 bytes).
    pub const SIZE: usize = 10;

    /// Current protocol version.
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (16 MiB).
    ///
    /// A structural bound, well below the 64 MiB per-session buffer
    /// ceiling: a header declaring more than this is rejected before any
    /// payload bytes are buffered for it.
    pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

    /// Create a header for the given packet kind.
    ///
    /// `payload_length` must equal the byte count of the payload that will
    /// follow; [`crate::Packet::encode`] computes it.
    #[must_use]
    pub fn new(kind: PacketKind, packet_id: u32, payload_length: u32) -> Self {
        Self {
            version: Self::VERSION,
            packet_id: packet_id.to_be_bytes(),
            packet_type: kind.to_u8(),
            payload_length: payload_length.to_be_bytes(),
        }
    }

    /// Parse a header from network bytes (zero-copy).
    ///
    /// Casts the first 10 bytes directly to a `PacketHeader` reference. No
    /// data is copied. Validation order is cheapest-first: size, then
    /// version, then payload bound.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::HeaderTooShort`] if fewer than 10 bytes are given
    /// - [`ProtocolError::UnsupportedVersion`] on a version mismatch
    /// - [`ProtocolError::PayloadTooLarge`] if the declared payload exceeds
    ///   [`Self::MAX_PAYLOAD_SIZE`]
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::HeaderTooShort {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?
            .0;

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let payload_length = u32::from_be_bytes(header.payload_length);
        if payload_length > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_length as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize the header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Protocol version byte (currently 0x01).
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Correlation id. `0` means the sender expects no response.
    #[must_use]
    pub fn packet_id(&self) -> u32 {
        u32::from_be_bytes(self.packet_id)
    }

    /// Packet type tag as the raw byte.
    #[must_use]
    pub fn packet_type(&self) -> u8 {
        self.packet_type
    }

    /// Packet type tag as an enum. `None` if unrecognized.
    #[must_use]
    pub fn kind(&self) -> Option<PacketKind> {
        PacketKind::from_u8(self.packet_type)
    }

    /// Payload size in bytes; may be zero.
    #[must_use]
    pub fn payload_length(&self) -> u32 {
        u32::from_be_bytes(self.payload_length)
    }

    /// Set the correlation id.
    pub fn set_packet_id(&mut self, packet_id: u32) {
        self.packet_id = packet_id.to_be_bytes();
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for PacketHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketHeader")
            .field("version", &self.version())
            .field("packet_id", &self.packet_id())
            .field("packet_type", &format!("{:#04x}", self.packet_type()))
            .field("payload_length", &self.payload_length())
            .finish()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for PacketHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PacketHeader {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn header_size() {
        assert_eq!(std::mem::size_of::<PacketHeader>(), PacketHeader::SIZE);
        assert_eq!(PacketHeader::SIZE, 10);
    }

    #[test]
    fn header_wire_layout() {
        let header = PacketHeader::new(PacketKind::DataAdditionRequest, 0x0102_0304, 8);
        assert_eq!(
            header.to_bytes(),
            [0x01, 0x01, 0x02, 0x03, 0x04, 0x05, 0x00, 0x00, 0x00, 0x08]
        );
    }

    #[test]
    fn reject_short_buffer() {
        let short = [0u8; 7];
        let result = PacketHeader::from_bytes(&short);
        assert_eq!(result, Err(ProtocolError::HeaderTooShort { expected: 10, actual: 7 }));
    }

    #[test]
    fn reject_invalid_version() {
        let mut buf = PacketHeader::new(PacketKind::AuthRequest, 1, 0).to_bytes();
        buf[0] = 0x7F;
        let result = PacketHeader::from_bytes(&buf);
        assert_eq!(result, Err(ProtocolError::UnsupportedVersion(0x7F)));
    }

    #[test]
    fn reject_oversized_payload() {
        let oversized = PacketHeader::MAX_PAYLOAD_SIZE + 1;
        let header = PacketHeader::new(PacketKind::DataRequest, 1, oversized);
        let buf = header.to_bytes();
        assert!(matches!(
            PacketHeader::from_bytes(&buf),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn set_packet_id_round_trips() {
        let mut header = PacketHeader::new(PacketKind::DataResponse, 0, 0);
        header.set_packet_id(0xDEAD_BEEF);
        assert_eq!(header.packet_id(), 0xDEAD_BEEF);
    }

    proptest! {
        #[test]
        fn header_round_trip(id in any::<u32>(), len in 0..=PacketHeader::MAX_PAYLOAD_SIZE) {
            let header = PacketHeader::new(PacketKind::AuthResponse, id, len);
            let bytes = header.to_bytes();
            let parsed = PacketHeader::from_bytes(&bytes).expect("should parse");
            prop_assert_eq!(&header, parsed);
            prop_assert_eq!(parsed.packet_id(), id);
            prop_assert_eq!(parsed.payload_length(), len);
            prop_assert_eq!(parsed.kind(), Some(PacketKind::AuthResponse));
        }

        #[test]
        fn arbitrary_ten_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
            // Decoding must be total: any input yields Ok or a typed error.
            let _ = PacketHeader::from_bytes(&bytes);
        }
    }
}
