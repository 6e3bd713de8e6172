//! Accept loop and request dispatch.
//!
//! One task per connection: the session's polling task decodes packets,
//! this module drains the session events, checks the auth flag, drives the
//! store, and answers with the matching response kind. Decode errors are
//! logged and dropped; the connection survives them. Transport failures
//! end the session, never the server.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use keywire_core::{Session, SessionError, SessionEvent};
use keywire_proto::{ErrorCode, Packet, PacketBody};
use keywire_store::Store;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::RwLock,
};

use crate::{config::ServerConfig, errors::ServerError};

/// State shared by every connection task.
struct SharedState {
    /// The one store every session reads and writes.
    store: Store,
    /// Shared secret for `AuthRequest` comparison.
    secret: String,
    /// Session id → authenticated flag.
    sessions: RwLock<HashMap<u64, bool>>,
    /// Source of process-local session ids.
    next_session_id: AtomicU64,
}

/// Keywire TCP server.
///
/// Binds on construction so configuration failures surface before any
/// client can connect; [`Self::run`] then accepts until the process stops.
pub struct Server {
    listener: TcpListener,
    state: Arc<SharedState>,
}

impl Server {
    /// Bind the listener and build the store from `config`.
    ///
    /// # Errors
    ///
    /// [`ServerError::Store`] for rejected tree bounds (already caught by
    /// config validation in the normal path), [`ServerError::Transport`]
    /// if the port cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let store = Store::new(config.tree_min, config.tree_max)?;
        let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;

        tracing::info!(
            a = config.tree_min,
            b = config.tree_max,
            "store ready; listening on {}",
            listener.local_addr()?
        );

        Ok(Self {
            listener,
            state: Arc::new(SharedState {
                store,
                secret: config.api_key,
                sessions: RwLock::new(HashMap::new()),
                next_session_id: AtomicU64::new(1),
            }),
        })
    }

    /// Local address the listener is bound to.
    ///
    /// # Errors
    ///
    /// [`ServerError::Transport`] if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the process stops.
    ///
    /// Per-connection failures are logged and do not stop the loop.
    ///
    /// # Errors
    ///
    /// Currently never returns; the `Result` keeps the signature stable
    /// for callers that `?` it.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        handle_connection(stream, peer, state).await;
                    });
                },
                Err(error) => {
                    tracing::error!(%error, "accept failed");
                },
            }
        }
    }
}

/// Drive one connection from accept to session end.
async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: Arc<SharedState>) {
    let session_id = state.next_session_id.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(session_id, %peer, "connection accepted");

    let session = Session::new(stream);
    let Some(mut events) = session.take_events() else {
        return;
    };

    state.sessions.write().await.insert(session_id, false);
    session.start_polling();

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Packet(packet) => {
                if let Err(error) = dispatch(session_id, &packet, &session, &state).await {
                    // A send failure already ended the session; the Ended
                    // event will close the loop.
                    tracing::warn!(session_id, %error, "failed to answer request");
                }
            },
            SessionEvent::DecodeError(error) => {
                tracing::warn!(session_id, %error, "dropping undecodable packet");
            },
            SessionEvent::Ended(reason) => {
                tracing::debug!(session_id, %reason, "session ended");
                break;
            },
        }
    }

    state.sessions.write().await.remove(&session_id);
}

/// Answer one request packet.
async fn dispatch(
    session_id: u64,
    packet: &Packet,
    session: &Session<TcpStream>,
    state: &SharedState,
) -> Result<(), SessionError> {
    let authenticated = state
        .sessions
        .read()
        .await
        .get(&session_id)
        .copied()
        .unwrap_or(false);

    let response = match &packet.body {
        PacketBody::AuthRequest { api_key } => {
            if *api_key == state.secret {
                state.sessions.write().await.insert(session_id, true);
                tracing::debug!(session_id, "session authenticated");
                PacketBody::AuthResponse { ack: Ok(()) }
            } else {
                tracing::debug!(session_id, "authentication rejected");
                PacketBody::AuthResponse { ack: Err(ErrorCode::AuthRequired) }
            }
        },

        PacketBody::DataRequest { key } => {
            if authenticated {
                match state.store.find(key).await {
                    Some(value) => PacketBody::DataResponse { outcome: Ok(value) },
                    None => PacketBody::DataResponse { outcome: Err(ErrorCode::KeyNotFound) },
                }
            } else {
                PacketBody::DataResponse { outcome: Err(ErrorCode::AuthRequired) }
            }
        },

        PacketBody::DataAdditionRequest { key, value } => {
            if authenticated {
                state.store.add(key.clone(), value.clone()).await;
                PacketBody::DataAdditionResponse { ack: Ok(()) }
            } else {
                PacketBody::DataAdditionResponse { ack: Err(ErrorCode::AuthRequired) }
            }
        },

        PacketBody::DataRemovalRequest { key } => {
            if authenticated {
                // Removal succeeds whether or not the key was present.
                state.store.remove(key).await;
                PacketBody::DataRemovalResponse { ack: Ok(()) }
            } else {
                PacketBody::DataRemovalResponse { ack: Err(ErrorCode::AuthRequired) }
            }
        },

        PacketBody::AuthResponse { .. }
        | PacketBody::DataResponse { .. }
        | PacketBody::DataAdditionResponse { .. }
        | PacketBody::DataRemovalResponse { .. } => {
            tracing::warn!(session_id, kind = ?packet.kind(), "client sent a response kind; dropping");
            return Ok(());
        },
    };

    session.send_response(packet, response).await
}
