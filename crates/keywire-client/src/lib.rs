//! Keywire client library.
//!
//! Thin typed wrapper over the session layer: connect over TCP,
//! authenticate with the shared secret, then `add`/`find`/`remove` keys.
//! Each operation is one request/response exchange; correlation, framing,
//! and retry-free error propagation live in [`keywire_core`].

#![forbid(unsafe_code)]

mod client;
mod errors;

pub use client::Client;
pub use errors::ClientError;
