//! Session error types.
//!
//! Transport failures (closed, faulted) terminate the session and fail its
//! in-flight requests; decode failures are contained and the session keeps
//! running. We avoid `std::io::Error` in the public surface so errors stay
//! cloneable and comparable.

use keywire_proto::ProtocolError;
use thiserror::Error;

/// Errors from session operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session was ended, locally or by a transport failure.
    ///
    /// Every in-flight request fails with this once the session goes down.
    #[error("session ended")]
    Ended,

    /// The peer (or the local side) closed the byte stream.
    #[error("transport closed")]
    TransportClosed,

    /// Unexpected I/O failure while reading or writing the transport.
    #[error("transport fault: {0}")]
    Transport(String),

    /// Outbound packet failed to encode.
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),

    /// A request id was allocated while still present in the in-flight
    /// table. This is a logic bug: ids are only reused after removal.
    /// Fatal - report as issue.
    #[error("request id {0} already has an in-flight completion")]
    RequestIdInUse(u32),

    /// The framing buffer outgrew its ceiling; the peer is flooding bytes
    /// faster than they frame into packets. The session is closed.
    #[error("framing buffer grew to {buffered} bytes, above the {max} byte ceiling")]
    BufferOverflow {
        /// Bytes buffered when the ceiling was hit.
        buffered: usize,
        /// Configured ceiling in bytes.
        max: usize,
    },
}
