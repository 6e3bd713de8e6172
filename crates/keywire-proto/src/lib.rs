//! Keywire wire protocol.
//!
//! Defines the binary request/response protocol spoken between keywire
//! clients and servers:
//!
//! - [`PacketHeader`]: fixed 10-byte header (Big Endian) with zero-copy
//!   parsing
//! - [`Packet`] / [`PacketBody`]: the typed packet kinds and their payload
//!   encodings
//! - [`Value`]: the typed binary values the store holds (string, i32, bool)
//! - [`SegmentBuffer`]: segment-based byte queue used to reassemble packets
//!   from a chunked transport stream
//!
//! The protocol is self-delimiting: the header carries the payload length,
//! so framing needs no sentinels or escaping. All multi-byte integers are
//! Big Endian.

#![forbid(unsafe_code)]

mod errors;
mod framing;
mod header;
mod packet;

pub use errors::{ProtocolError, Result};
pub use framing::SegmentBuffer;
pub use header::PacketHeader;
pub use packet::{ErrorCode, Packet, PacketBody, PacketKind, Value, ValueKind};
