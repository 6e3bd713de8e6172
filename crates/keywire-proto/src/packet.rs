//! Typed packets and their payload encodings.
//!
//! The packet type tag in the header selects the payload layout; decoding
//! goes through a factory keyed by that tag. Requests carry keys (and, for
//! additions, a typed value); responses carry a status byte followed by
//! either result data or an error code.
//!
//! # Invariants
//!
//! - Each [`PacketBody`] variant maps to exactly one [`PacketKind`]
//!   (enforced by match exhaustiveness).
//! - `payload_length` in an encoded header equals the payload byte count.
//! - Round-trip encoding must produce structurally identical packets.

use bytes::BufMut;

use crate::{
    errors::{ProtocolError, Result},
    header::PacketHeader,
};

/// Status byte for a successful response.
const STATUS_SUCCESS: u8 = 0x01;

/// Status byte emitted for a failed response.
///
/// Decoding treats any non-success byte as failure; this is the one we
/// write.
const STATUS_FAILURE: u8 = 0x02;

/// Packet type tags.
///
/// Requests carry odd tags, their responses the following even tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// Client presents the shared secret.
    AuthRequest = 0x01,
    /// Server accepts or rejects authentication.
    AuthResponse = 0x02,
    /// Client looks up a key.
    DataRequest = 0x03,
    /// Server returns the value or a failure code.
    DataResponse = 0x04,
    /// Client inserts or replaces a key.
    DataAdditionRequest = 0x05,
    /// Server acknowledges the insertion.
    DataAdditionResponse = 0x06,
    /// Client removes a key.
    DataRemovalRequest = 0x07,
    /// Server acknowledges the removal.
    DataRemovalResponse = 0x08,
}

impl PacketKind {
    /// Parse a wire tag. `None` if unrecognized.
    #[must_use]
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::AuthRequest),
            0x02 => Some(Self::AuthResponse),
            0x03 => Some(Self::DataRequest),
            0x04 => Some(Self::DataResponse),
            0x05 => Some(Self::DataAdditionRequest),
            0x06 => Some(Self::DataAdditionResponse),
            0x07 => Some(Self::DataRemovalRequest),
            0x08 => Some(Self::DataRemovalResponse),
            _ => None,
        }
    }

    /// Wire tag for this kind.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Whether this kind is a response that correlates to a request id.
    #[must_use]
    pub const fn is_response(self) -> bool {
        matches!(
            self,
            Self::AuthResponse
                | Self::DataResponse
                | Self::DataAdditionResponse
                | Self::DataRemovalResponse
        )
    }
}

/// Error codes carried by failed responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// The session has not authenticated.
    AuthRequired = 0x01,
    /// Lookup key is not present in the store.
    KeyNotFound = 0x02,
    /// Server-side failure that should not occur; signals a bug.
    Unexpected = 0x03,
}

impl ErrorCode {
    /// Parse a wire byte. `None` if unrecognized.
    #[must_use]
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::AuthRequired),
            0x02 => Some(Self::KeyNotFound),
            0x03 => Some(Self::Unexpected),
            _ => None,
        }
    }

    /// Wire byte for this code.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Wire tags for value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueKind {
    /// UTF-8 string.
    Text = 0x01,
    /// Signed 32-bit integer, Big Endian two's complement.
    Int = 0x02,
    /// Boolean, one byte (`0x00` false, `0x01` true).
    Bool = 0x03,
}

impl ValueKind {
    /// Parse a wire byte. `None` if unrecognized.
    #[must_use]
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::Text),
            0x02 => Some(Self::Int),
            0x03 => Some(Self::Bool),
            _ => None,
        }
    }

    /// Wire byte for this kind.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

/// A typed binary value as stored and transmitted.
///
/// The wire form is a [`ValueKind`] byte followed by the raw value bytes.
/// Decoding is strict: an `Int` payload must be exactly 4 bytes, a `Bool`
/// exactly one byte holding `0x00` or `0x01`, and `Text` must be valid
/// UTF-8. Lenient readings would make round-trips lossy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// UTF-8 string value.
    Text(String),
    /// Signed 32-bit integer value.
    Int(i32),
    /// Boolean value.
    Bool(bool),
}

impl Value {
    /// Wire tag for this value's type.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Int(_) => ValueKind::Int,
            Self::Bool(_) => ValueKind::Bool,
        }
    }

    /// Length of the raw value bytes (excluding the kind tag).
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Int(_) => 4,
            Self::Bool(_) => 1,
        }
    }

    /// Write the raw value bytes (excluding the kind tag).
    pub fn encode(&self, dst: &mut impl BufMut) {
        match self {
            Self::Text(text) => dst.put_slice(text.as_bytes()),
            Self::Int(value) => dst.put_slice(&value.to_be_bytes()),
            Self::Bool(value) => dst.put_u8(u8::from(*value)),
        }
    }

    /// Decode raw value bytes for a known kind.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedPayload`] on invalid UTF-8, a non-4-byte
    /// integer, or a boolean that is not exactly `0x00`/`0x01`.
    pub fn decode(kind: ValueKind, bytes: &[u8]) -> Result<Self> {
        match kind {
            ValueKind::Text => {
                let text = std::str::from_utf8(bytes).map_err(|_| {
                    ProtocolError::MalformedPayload("string value is not valid UTF-8".into())
                })?;
                Ok(Self::Text(text.to_owned()))
            },
            ValueKind::Int => {
                let raw: [u8; 4] = bytes.try_into().map_err(|_| {
                    ProtocolError::MalformedPayload(format!(
                        "int value must be 4 bytes, got {}",
                        bytes.len()
                    ))
                })?;
                Ok(Self::Int(i32::from_be_bytes(raw)))
            },
            ValueKind::Bool => match bytes {
                [0x00] => Ok(Self::Bool(false)),
                [0x01] => Ok(Self::Bool(true)),
                _ => Err(ProtocolError::MalformedPayload(format!(
                    "bool value must be a single 0x00/0x01 byte, got {} bytes",
                    bytes.len()
                ))),
            },
        }
    }
}

/// Payload of a protocol packet, one variant per [`PacketKind`].
///
/// Response acknowledgements are `Result<(), ErrorCode>`: `Ok` encodes the
/// success status byte, `Err` the failure status byte plus the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketBody {
    /// Shared secret presented by the client; the whole payload is the key.
    AuthRequest {
        /// Secret to compare against the server's.
        api_key: String,
    },
    /// Authentication outcome.
    AuthResponse {
        /// `Ok` on success, otherwise the rejection code.
        ack: std::result::Result<(), ErrorCode>,
    },
    /// Key lookup; the whole payload is the key.
    DataRequest {
        /// Key to look up.
        key: String,
    },
    /// Lookup outcome: the stored value or a failure code.
    DataResponse {
        /// `Ok` with the value on success, otherwise the failure code.
        outcome: std::result::Result<Value, ErrorCode>,
    },
    /// Insert-or-replace of a key with a typed value.
    DataAdditionRequest {
        /// Key to insert or replace.
        key: String,
        /// Value to store.
        value: Value,
    },
    /// Insertion outcome.
    DataAdditionResponse {
        /// `Ok` on success, otherwise the failure code.
        ack: std::result::Result<(), ErrorCode>,
    },
    /// Key removal; the whole payload is the key.
    DataRemovalRequest {
        /// Key to remove.
        key: String,
    },
    /// Removal outcome.
    DataRemovalResponse {
        /// `Ok` on success, otherwise the failure code.
        ack: std::result::Result<(), ErrorCode>,
    },
}

impl PacketBody {
    /// Packet kind corresponding to this payload.
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        match self {
            Self::AuthRequest { .. } => PacketKind::AuthRequest,
            Self::AuthResponse { .. } => PacketKind::AuthResponse,
            Self::DataRequest { .. } => PacketKind::DataRequest,
            Self::DataResponse { .. } => PacketKind::DataResponse,
            Self::DataAdditionRequest { .. } => PacketKind::DataAdditionRequest,
            Self::DataAdditionResponse { .. } => PacketKind::DataAdditionResponse,
            Self::DataRemovalRequest { .. } => PacketKind::DataRemovalRequest,
            Self::DataRemovalResponse { .. } => PacketKind::DataRemovalResponse,
        }
    }

    /// Exact length of the encoded payload in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Self::AuthRequest { api_key } => api_key.len(),
            Self::DataRequest { key } | Self::DataRemovalRequest { key } => key.len(),
            Self::DataAdditionRequest { key, value } => 4 + key.len() + 1 + value.encoded_len(),
            Self::AuthResponse { ack }
            | Self::DataAdditionResponse { ack }
            | Self::DataRemovalResponse { ack } => match ack {
                Ok(()) => 1,
                Err(_) => 2,
            },
            Self::DataResponse { outcome } => match outcome {
                Ok(value) => 2 + value.encoded_len(),
                Err(_) => 2,
            },
        }
    }

    /// Write the payload bytes (header excluded).
    pub fn encode_payload(&self, dst: &mut impl BufMut) {
        match self {
            Self::AuthRequest { api_key } => dst.put_slice(api_key.as_bytes()),
            Self::DataRequest { key } | Self::DataRemovalRequest { key } => {
                dst.put_slice(key.as_bytes());
            },
            Self::DataAdditionRequest { key, value } => {
                dst.put_u32(key.len() as u32);
                dst.put_slice(key.as_bytes());
                dst.put_u8(value.kind().to_u8());
                value.encode(dst);
            },
            Self::AuthResponse { ack }
            | Self::DataAdditionResponse { ack }
            | Self::DataRemovalResponse { ack } => match ack {
                Ok(()) => dst.put_u8(STATUS_SUCCESS),
                Err(code) => {
                    dst.put_u8(STATUS_FAILURE);
                    dst.put_u8(code.to_u8());
                },
            },
            Self::DataResponse { outcome } => match outcome {
                Ok(value) => {
                    dst.put_u8(STATUS_SUCCESS);
                    dst.put_u8(value.kind().to_u8());
                    value.encode(dst);
                },
                Err(code) => {
                    dst.put_u8(STATUS_FAILURE);
                    dst.put_u8(code.to_u8());
                },
            },
        }
    }

    /// Decode a payload for a known packet kind: the factory keyed by the
    /// header's type tag.
    ///
    /// Decoding is strict: payloads must be exactly as long as their
    /// encoding requires; trailing bytes are malformed.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedPayload`] on any structural violation.
    pub fn decode_payload(kind: PacketKind, payload: &[u8]) -> Result<Self> {
        match kind {
            PacketKind::AuthRequest => {
                Ok(Self::AuthRequest { api_key: decode_key(payload, "api key")? })
            },
            PacketKind::DataRequest => Ok(Self::DataRequest { key: decode_key(payload, "key")? }),
            PacketKind::DataRemovalRequest => {
                Ok(Self::DataRemovalRequest { key: decode_key(payload, "key")? })
            },
            PacketKind::DataAdditionRequest => decode_addition(payload),
            PacketKind::AuthResponse => Ok(Self::AuthResponse { ack: decode_ack(payload)? }),
            PacketKind::DataAdditionResponse => {
                Ok(Self::DataAdditionResponse { ack: decode_ack(payload)? })
            },
            PacketKind::DataRemovalResponse => {
                Ok(Self::DataRemovalResponse { ack: decode_ack(payload)? })
            },
            PacketKind::DataResponse => decode_data_response(payload),
        }
    }
}

/// A protocol packet: correlation id plus typed payload.
///
/// The id is `0` for packets that expect no response; request ids are
/// allocated by the session, responses echo the request's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Correlation id ([`Self::NO_RESPONSE_ID`] = none expected).
    pub id: u32,
    /// Typed payload.
    pub body: PacketBody,
}

impl Packet {
    /// Reserved id for packets that do not demand a response.
    pub const NO_RESPONSE_ID: u32 = 0;

    /// Create a packet with an explicit correlation id.
    #[must_use]
    pub fn new(id: u32, body: PacketBody) -> Self {
        Self { id, body }
    }

    /// Create a packet that expects no response (id 0).
    #[must_use]
    pub fn fire_and_forget(body: PacketBody) -> Self {
        Self { id: Self::NO_RESPONSE_ID, body }
    }

    /// Packet kind of the payload.
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        self.body.kind()
    }

    /// Encode header and payload into `dst`.
    ///
    /// The header's `payload_length` equals the written payload byte count.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`PacketHeader::MAX_PAYLOAD_SIZE`]. This is the enforcement point on
    /// the outbound path.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let payload_len = self.body.payload_len();
        if payload_len > PacketHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: PacketHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let header = PacketHeader::new(self.kind(), self.id, payload_len as u32);
        dst.put_slice(&header.to_bytes());
        self.body.encode_payload(dst);
        Ok(())
    }

    /// Encode header and payload into a fresh byte vector.
    ///
    /// # Errors
    ///
    /// Same as [`Self::encode`].
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(PacketHeader::SIZE + self.body.payload_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Build a typed packet from a validated header and its payload bytes.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnknownPacketType`] if the header tag is
    ///   unrecognized
    /// - [`ProtocolError::MalformedPayload`] if the payload length differs
    ///   from the header's claim or the payload bytes are structurally
    ///   invalid for the kind
    pub fn decode(header: &PacketHeader, payload: &[u8]) -> Result<Self> {
        let kind = header
            .kind()
            .ok_or_else(|| ProtocolError::UnknownPacketType(header.packet_type()))?;

        if payload.len() != header.payload_length() as usize {
            return Err(ProtocolError::MalformedPayload(format!(
                "header declares {} payload bytes, got {}",
                header.payload_length(),
                payload.len()
            )));
        }

        let body = PacketBody::decode_payload(kind, payload)?;
        Ok(Self { id: header.packet_id(), body })
    }
}

/// Whole-payload UTF-8 key (AuthRequest, DataRequest, DataRemovalRequest).
fn decode_key(payload: &[u8], what: &str) -> Result<String> {
    let key = std::str::from_utf8(payload)
        .map_err(|_| ProtocolError::MalformedPayload(format!("{what} is not valid UTF-8")))?;
    Ok(key.to_owned())
}

/// Key-length-prefixed addition payload: `u32 key_len | key | kind | value`.
fn decode_addition(payload: &[u8]) -> Result<PacketBody> {
    let Some((len_bytes, rest)) = payload.split_first_chunk::<4>() else {
        return Err(ProtocolError::MalformedPayload(format!(
            "addition payload of {} bytes is too short for the key length",
            payload.len()
        )));
    };
    let key_len = u32::from_be_bytes(*len_bytes) as usize;

    let Some(key_bytes) = rest.get(..key_len) else {
        return Err(ProtocolError::MalformedPayload(format!(
            "addition payload declares a {key_len}-byte key but only {} bytes follow",
            rest.len()
        )));
    };
    let key = std::str::from_utf8(key_bytes)
        .map_err(|_| ProtocolError::MalformedPayload("key is not valid UTF-8".into()))?
        .to_owned();

    let Some((&kind_byte, value_bytes)) = rest[key_len..].split_first() else {
        return Err(ProtocolError::MalformedPayload(
            "addition payload is missing the value type".into(),
        ));
    };
    let value_kind = ValueKind::from_u8(kind_byte).ok_or_else(|| {
        ProtocolError::MalformedPayload(format!("unknown value type tag: {kind_byte:#04x}"))
    })?;

    let value = Value::decode(value_kind, value_bytes)?;
    Ok(PacketBody::DataAdditionRequest { key, value })
}

/// Status byte followed by an error code on failure.
fn decode_ack(payload: &[u8]) -> Result<std::result::Result<(), ErrorCode>> {
    match payload {
        [] => Err(ProtocolError::MalformedPayload("response is missing the status byte".into())),
        [STATUS_SUCCESS] => Ok(Ok(())),
        [STATUS_SUCCESS, ..] => Err(ProtocolError::MalformedPayload(
            "trailing bytes after a success status".into(),
        )),
        [_, code] => decode_error_code(*code).map(Err),
        [_] => Err(ProtocolError::MalformedPayload("failed response is missing the error code".into())),
        [_, _, ..] => Err(ProtocolError::MalformedPayload(
            "trailing bytes after a failure error code".into(),
        )),
    }
}

/// Status byte followed by value kind + bytes on success, error code on
/// failure.
fn decode_data_response(payload: &[u8]) -> Result<PacketBody> {
    match payload {
        [] => Err(ProtocolError::MalformedPayload("response is missing the status byte".into())),
        [STATUS_SUCCESS, kind_byte, value_bytes @ ..] => {
            let value_kind = ValueKind::from_u8(*kind_byte).ok_or_else(|| {
                ProtocolError::MalformedPayload(format!(
                    "unknown value type tag: {kind_byte:#04x}"
                ))
            })?;
            let value = Value::decode(value_kind, value_bytes)?;
            Ok(PacketBody::DataResponse { outcome: Ok(value) })
        },
        [STATUS_SUCCESS] => Err(ProtocolError::MalformedPayload(
            "successful lookup response is missing the value".into(),
        )),
        [_, code] => {
            let code = decode_error_code(*code)?;
            Ok(PacketBody::DataResponse { outcome: Err(code) })
        },
        [_] => Err(ProtocolError::MalformedPayload("failed response is missing the error code".into())),
        [_, _, ..] => Err(ProtocolError::MalformedPayload(
            "trailing bytes after a failure error code".into(),
        )),
    }
}

fn decode_error_code(code: u8) -> Result<ErrorCode> {
    ErrorCode::from_u8(code)
        .ok_or_else(|| ProtocolError::MalformedPayload(format!("unknown error code: {code:#04x}")))
}
