//! Client error types.

use keywire_core::SessionError;
use keywire_proto::{ErrorCode, PacketKind};
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// TCP connection to the server failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The underlying session failed (transport fault, session ended).
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The server answered with a failure code.
    #[error("server rejected the request: {0:?}")]
    Rejected(ErrorCode),

    /// The server answered with the wrong response kind for the request.
    /// Protocol violation; fatal for the exchange.
    #[error("expected a {expected:?} response, got {got:?}")]
    UnexpectedResponse {
        /// Response kind the request demands.
        expected: PacketKind,
        /// Kind actually received.
        got: PacketKind,
    },
}
