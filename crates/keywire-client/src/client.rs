//! Typed client over one keywire session.

use std::sync::Arc;

use keywire_core::{Session, SessionEvent};
use keywire_proto::{ErrorCode, PacketBody, PacketKind, Value};
use tokio::net::TcpStream;

use crate::errors::ClientError;

/// Handle to a connected keywire server.
///
/// Cheap to clone and safe to use from multiple tasks; every operation is
/// an independent request/response exchange and the session correlates
/// them by id, so responses may return in any order.
#[derive(Debug, Clone)]
pub struct Client {
    session: Arc<Session<TcpStream>>,
}

impl Client {
    /// Connect to a server at `addr` (e.g. `"127.0.0.1:3000"`).
    ///
    /// Spawns the session's polling task and a background drain for its
    /// events so a quiet caller never stalls the read loop.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connect`] if the TCP connection cannot be
    /// established.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|error| ClientError::Connect(error.to_string()))?;

        let session = Arc::new(Session::new(stream));
        if let Some(mut events) = session.take_events() {
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    match event {
                        SessionEvent::Packet(_) => {},
                        SessionEvent::DecodeError(error) => {
                            tracing::warn!(%error, "server sent undecodable bytes");
                        },
                        SessionEvent::Ended(reason) => {
                            tracing::debug!(%reason, "session ended");
                            break;
                        },
                    }
                }
            });
        }
        session.start_polling();

        Ok(Self { session })
    }

    /// Present the shared secret.
    ///
    /// # Errors
    ///
    /// [`ClientError::Rejected`] with [`ErrorCode::AuthRequired`] when the
    /// secret does not match.
    pub async fn authenticate(&self, api_key: &str) -> Result<(), ClientError> {
        let response = self
            .session
            .send_request(PacketBody::AuthRequest { api_key: api_key.to_owned() })
            .await?;
        match response.body {
            PacketBody::AuthResponse { ack: Ok(()) } => Ok(()),
            PacketBody::AuthResponse { ack: Err(code) } => Err(ClientError::Rejected(code)),
            other => Err(unexpected(PacketKind::AuthResponse, &other)),
        }
    }

    /// Insert a key or replace its value.
    pub async fn add(&self, key: &str, value: Value) -> Result<(), ClientError> {
        let response = self
            .session
            .send_request(PacketBody::DataAdditionRequest { key: key.to_owned(), value })
            .await?;
        match response.body {
            PacketBody::DataAdditionResponse { ack: Ok(()) } => Ok(()),
            PacketBody::DataAdditionResponse { ack: Err(code) } => {
                Err(ClientError::Rejected(code))
            },
            other => Err(unexpected(PacketKind::DataAdditionResponse, &other)),
        }
    }

    /// Look up a key. Absence is `Ok(None)`, not an error.
    pub async fn find(&self, key: &str) -> Result<Option<Value>, ClientError> {
        let response =
            self.session.send_request(PacketBody::DataRequest { key: key.to_owned() }).await?;
        match response.body {
            PacketBody::DataResponse { outcome: Ok(value) } => Ok(Some(value)),
            PacketBody::DataResponse { outcome: Err(ErrorCode::KeyNotFound) } => Ok(None),
            PacketBody::DataResponse { outcome: Err(code) } => Err(ClientError::Rejected(code)),
            other => Err(unexpected(PacketKind::DataResponse, &other)),
        }
    }

    /// Remove a key. Succeeds whether or not the key was present.
    pub async fn remove(&self, key: &str) -> Result<(), ClientError> {
        let response = self
            .session
            .send_request(PacketBody::DataRemovalRequest { key: key.to_owned() })
            .await?;
        match response.body {
            PacketBody::DataRemovalResponse { ack: Ok(()) } => Ok(()),
            PacketBody::DataRemovalResponse { ack: Err(code) } => Err(ClientError::Rejected(code)),
            other => Err(unexpected(PacketKind::DataRemovalResponse, &other)),
        }
    }

    /// End the session and close the connection. Idempotent.
    pub async fn close(&self) {
        self.session.end().await;
    }

    /// Whether the underlying session has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.session.is_ended()
    }
}

fn unexpected(expected: PacketKind, got: &PacketBody) -> ClientError {
    ClientError::UnexpectedResponse { expected, got: got.kind() }
}
