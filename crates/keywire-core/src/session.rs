//! Session multiplexer over one transport connection.
//!
//! The session owns both halves of the transport. A polling task reads
//! fixed-size chunks into a [`SegmentBuffer`] and runs the streaming decode
//! loop: latch a header once 10 bytes are buffered, peel the payload once
//! it is complete, hand both to the packet factory. Decoded responses
//! complete the matching in-flight request before the packet event fires;
//! everything else is surfaced through the event stream.
//!
//! # Invariants
//!
//! - An in-flight id has exactly one outstanding completion; the id leaves
//!   the table on every exit path (response, session end, caller gone).
//! - `SessionEvent::Ended` fires at most once, after all in-flight
//!   completions have been failed.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

use bytes::Bytes;
use keywire_proto::{Packet, PacketBody, PacketHeader, ProtocolError, SegmentBuffer};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::{Notify, mpsc, oneshot},
};

use crate::errors::SessionError;

/// Transport read size; packets larger than this simply span chunks.
const READ_CHUNK_SIZE: usize = 1024;

/// Ceiling on buffered-but-unframed bytes per session (64 MiB).
///
/// A peer that outruns the decode loop this far is flooding; the session
/// closes with a protocol error instead of growing without bound.
const MAX_BUFFER_BYTES: usize = 64 * 1024 * 1024;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

type InFlightTable = HashMap<u32, oneshot::Sender<Packet>>;

/// Events surfaced by a session to whoever drains [`Session::take_events`].
#[derive(Debug)]
pub enum SessionEvent {
    /// A packet arrived. For correlated responses this fires after the
    /// matching request future has been completed.
    Packet(Packet),

    /// Inbound bytes failed to decode. The offending header/payload was
    /// discarded and the session keeps running.
    DecodeError(ProtocolError),

    /// The session terminated; carries the reason. Fires exactly once.
    Ended(SessionError),
}

/// One protocol session over a reliable, ordered byte transport.
///
/// Generic over the transport so production code runs it on a
/// `tokio::net::TcpStream` while tests drive it through in-memory duplex
/// pipes. Cheap to share: all methods take `&self`.
#[derive(Debug)]
pub struct Session<T> {
    shared: Arc<Shared<T>>,
    reader: Mutex<Option<ReadHalf<T>>>,
    events: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
}

/// State shared between the session handle and its polling task.
#[derive(Debug)]
struct Shared<T> {
    writer: tokio::sync::Mutex<WriteHalf<T>>,
    in_flight: Mutex<InFlightTable>,
    next_request_id: AtomicU32,
    ended: AtomicBool,
    closed: Notify,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap a transport in a new session.
    ///
    /// The session is idle until [`Self::start_polling`] is called; bytes
    /// the peer sends before that sit in the transport.
    #[must_use]
    pub fn new(transport: T) -> Self {
        let (read_half, write_half) = tokio::io::split(transport);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                writer: tokio::sync::Mutex::new(write_half),
                in_flight: Mutex::new(HashMap::new()),
                next_request_id: AtomicU32::new(1),
                ended: AtomicBool::new(false),
                closed: Notify::new(),
                events_tx,
            }),
            reader: Mutex::new(Some(read_half)),
            events: Mutex::new(Some(events_rx)),
        }
    }

    /// Take the event receiver. Yields `Some` exactly once.
    #[must_use]
    pub fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events.lock().ok()?.take()
    }

    /// Begin consuming the transport on a background task.
    ///
    /// Must be called before any [`Self::send_request`] response can
    /// complete. Calling it again is a no-op.
    pub fn start_polling(&self) {
        let Some(reader) = self.reader.lock().ok().and_then(|mut slot| slot.take()) else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        drop(tokio::spawn(run_read_loop(reader, shared)));
    }

    /// Encode and transmit a packet without waiting for anything.
    ///
    /// # Errors
    ///
    /// [`SessionError::Ended`] after the session ended; a write failure
    /// ends the session and surfaces as [`SessionError::Transport`].
    pub async fn send_packet(&self, packet: &Packet) -> Result<(), SessionError> {
        self.shared.send_packet(packet).await
    }

    /// Send a response correlated to `request`: the response packet takes
    /// the request's id.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_packet`].
    pub async fn send_response(
        &self,
        request: &Packet,
        body: PacketBody,
    ) -> Result<(), SessionError> {
        self.send_packet(&Packet::new(request.id, body)).await
    }

    /// Send a request and await its correlated response.
    ///
    /// Allocates a fresh non-zero id, registers a completion under it,
    /// transmits, and waits. The caller observes exactly one terminal
    /// outcome: the response, or [`SessionError::Ended`] if the session
    /// goes down first. The id leaves the in-flight table on every exit
    /// path, including caller cancellation.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Ended`] if the session is or becomes ended
    /// - [`SessionError::RequestIdInUse`] on an id collision (logic bug)
    /// - transmission failures as in [`Self::send_packet`]
    pub async fn send_request(&self, body: PacketBody) -> Result<Packet, SessionError> {
        if self.shared.ended.load(Ordering::Acquire) {
            return Err(SessionError::Ended);
        }

        let id = self.shared.allocate_request_id();
        let (completion_tx, completion_rx) = oneshot::channel();
        {
            let mut in_flight = self.shared.in_flight_lock();
            if in_flight.contains_key(&id) {
                return Err(SessionError::RequestIdInUse(id));
            }
            in_flight.insert(id, completion_tx);
        }
        let guard = InFlightGuard { table: &self.shared.in_flight, id };

        self.shared.send_packet(&Packet::new(id, body)).await?;

        let result = match completion_rx.await {
            Ok(response) => Ok(response),
            // The sender was dropped without a response: the session ended
            // and drained the table.
            Err(_) => Err(SessionError::Ended),
        };
        drop(guard);
        result
    }

    /// End the session: close the transport, fail every in-flight request,
    /// emit [`SessionEvent::Ended`]. Idempotent.
    pub async fn end(&self) {
        self.shared.end_with(SessionError::Ended).await;
    }

    /// Whether the session has ended.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.shared.ended.load(Ordering::Acquire)
    }
}

impl<T> Shared<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    #[allow(clippy::expect_used)]
    fn in_flight_lock(&self) -> MutexGuard<'_, InFlightTable> {
        // The table is only touched under this lock and never across a
        // panic, so poisoning cannot occur.
        self.in_flight.lock().expect("in-flight mutex poisoned")
    }

    /// Next non-zero request id; the counter wraps past the reserved `0`.
    fn allocate_request_id(&self) -> u32 {
        loop {
            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            if id != Packet::NO_RESPONSE_ID {
                return id;
            }
        }
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), SessionError> {
        if self.ended.load(Ordering::Acquire) {
            return Err(SessionError::Ended);
        }

        let wire = packet.encode_to_vec()?;
        let write_result = {
            let mut writer = self.writer.lock().await;
            writer.write_all(&wire).await
        };

        if let Err(error) = write_result {
            let fault = SessionError::Transport(error.to_string());
            self.end_with(fault.clone()).await;
            return Err(fault);
        }
        Ok(())
    }

    /// Terminate the session once; later calls are no-ops.
    ///
    /// Order matters: in-flight completions are failed before the ended
    /// event goes out, so a request future never outlives the event.
    async fn end_with(&self, reason: SessionError) {
        if self.ended.swap(true, Ordering::AcqRel) {
            return;
        }

        let pending: Vec<oneshot::Sender<Packet>> =
            self.in_flight_lock().drain().map(|(_, sender)| sender).collect();
        // Dropping the senders wakes every waiter with `Ended`.
        drop(pending);

        self.closed.notify_one();
        let _ = self.writer.lock().await.shutdown().await;
        let _ = self.events_tx.send(SessionEvent::Ended(reason)).await;
    }
}

/// Removes its id from the in-flight table when dropped.
///
/// The completion path removes the entry itself, so this only acts when a
/// request exits without one: send failure or caller cancellation.
struct InFlightGuard<'a> {
    table: &'a Mutex<InFlightTable>,
    id: u32,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut table) = self.table.lock() {
            table.remove(&self.id);
        }
    }
}

/// Polling task: chunked reads feeding the streaming decode loop.
async fn run_read_loop<T>(mut reader: ReadHalf<T>, shared: Arc<Shared<T>>)
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let mut buffer = SegmentBuffer::new();
    let mut pending_header: Option<PacketHeader> = None;
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        if shared.ended.load(Ordering::Acquire) {
            return;
        }

        let read = tokio::select! {
            () = shared.closed.notified() => return,
            read = reader.read(&mut chunk) => read,
        };

        match read {
            Ok(0) => {
                shared.end_with(SessionError::TransportClosed).await;
                return;
            },
            Ok(n) => buffer.append(Bytes::copy_from_slice(&chunk[..n])),
            Err(error) => {
                shared.end_with(SessionError::Transport(error.to_string())).await;
                return;
            },
        }

        if buffer.len() > MAX_BUFFER_BYTES {
            shared
                .end_with(SessionError::BufferOverflow {
                    buffered: buffer.len(),
                    max: MAX_BUFFER_BYTES,
                })
                .await;
            return;
        }

        drain_packets(&mut buffer, &mut pending_header, &shared).await;
    }
}

/// Decode every complete packet currently buffered.
///
/// A decode failure discards the offending header/payload bytes, clears
/// the latch, and reports through the event stream; the session continues.
async fn drain_packets<T>(
    buffer: &mut SegmentBuffer,
    pending_header: &mut Option<PacketHeader>,
    shared: &Shared<T>,
) where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    loop {
        if pending_header.is_none() {
            if buffer.len() < PacketHeader::SIZE {
                return;
            }
            let Ok(header_bytes) = buffer.remove_first(PacketHeader::SIZE) else {
                return;
            };
            match PacketHeader::from_bytes(&header_bytes) {
                Ok(header) => *pending_header = Some(*header),
                Err(error) => {
                    let _ = shared.events_tx.send(SessionEvent::DecodeError(error)).await;
                    continue;
                },
            }
        }

        let Some(header) = pending_header.as_ref() else {
            return;
        };
        let payload_length = header.payload_length() as usize;
        if buffer.len() < payload_length {
            return;
        }
        let payload = if payload_length == 0 {
            Vec::new()
        } else {
            let Ok(payload) = buffer.remove_first(payload_length) else {
                return;
            };
            payload
        };

        let decoded = Packet::decode(header, &payload);
        *pending_header = None;

        match decoded {
            Ok(packet) => dispatch_inbound(packet, shared).await,
            Err(error) => {
                let _ = shared.events_tx.send(SessionEvent::DecodeError(error)).await;
            },
        }
    }
}

/// Route one decoded packet: correlate responses, then notify.
async fn dispatch_inbound<T>(packet: Packet, shared: &Shared<T>)
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    if packet.kind().is_response() {
        let completion = shared.in_flight_lock().remove(&packet.id);
        match completion {
            Some(sender) => {
                // Complete the request future before the packet event so a
                // listener always observes completion first.
                let _ = sender.send(packet.clone());
                let _ = shared.events_tx.send(SessionEvent::Packet(packet)).await;
            },
            None => {
                tracing::warn!(
                    id = packet.id,
                    kind = ?packet.kind(),
                    "response matches no in-flight request; dropping"
                );
            },
        }
    } else {
        let _ = shared.events_tx.send(SessionEvent::Packet(packet)).await;
    }
}
