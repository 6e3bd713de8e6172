//! Protocol error types.
//!
//! Every way a byte sequence can fail to become a packet gets its own
//! variant, so callers can distinguish a version mismatch from a truncated
//! payload from garbage bytes. Decode errors are contained at the session
//! layer; they never tear down a connection by themselves.

use thiserror::Error;

/// Convenience alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding protocol data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Header buffer is shorter than the fixed header size.
    #[error("header too short: expected {expected} bytes, got {actual}")]
    HeaderTooShort {
        /// Required header size in bytes.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// Header carries a protocol version this implementation does not speak.
    #[error("unsupported protocol version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Header carries a packet type tag with no known packet kind.
    #[error("unknown packet type tag: {0:#04x}")]
    UnknownPacketType(u8),

    /// Declared or actual payload exceeds the structural size limit.
    #[error("payload of {size} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Offending payload size in bytes.
        size: usize,
        /// Maximum permitted payload size in bytes.
        max: usize,
    },

    /// Payload bytes do not match the encoding of the packet kind.
    ///
    /// Covers short payloads, trailing bytes, invalid UTF-8 where a string
    /// is required, and unknown status/error-code/value-kind bytes.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A framing buffer read asked for zero bytes or more than are buffered.
    #[error("invalid buffer slice: requested {requested} bytes, {available} buffered")]
    SliceOutOfRange {
        /// Bytes requested by the caller.
        requested: usize,
        /// Bytes currently buffered.
        available: usize,
    },
}
