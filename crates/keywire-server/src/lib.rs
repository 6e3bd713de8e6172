//! Keywire production server.
//!
//! Accepts TCP connections, wraps each in a protocol session, and routes
//! authenticated requests to the shared concurrent store. Configuration
//! comes from environment variables; invalid configuration stops the
//! process before the listener opens.
//!
//! # Components
//!
//! - [`ServerConfig`]: environment-variable configuration with validation
//! - [`Server`]: accept loop plus per-session dispatch
//! - per-session state: an authenticated flag in a concurrent session
//!   table; everything else lives in the session itself

#![forbid(unsafe_code)]

mod config;
mod errors;
mod server;

pub use config::ServerConfig;
pub use errors::{ConfigError, ServerError};
pub use server::Server;
