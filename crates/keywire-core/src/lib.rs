//! Keywire session layer.
//!
//! A [`Session`] wraps one reliable, ordered byte transport and turns it
//! into typed packet traffic: inbound chunks are reassembled through a
//! framing buffer and decoded into packets, outbound packets are encoded
//! and written, and responses are matched to in-flight requests by their
//! correlation id.
//!
//! Both sides of the protocol use the same session type (a server drains
//! its event stream for requests, a client awaits `send_request` futures),
//! which keeps the wire discipline in exactly one place.

#![forbid(unsafe_code)]

mod errors;
mod session;

pub use errors::SessionError;
pub use session::{Session, SessionEvent};
