//! Server error types.

use keywire_store::TreeError;
use thiserror::Error;

/// Errors from server configuration loading.
///
/// All of these are fatal for startup: fix the environment and restart.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable holds a value of the wrong shape.
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What a valid value looks like.
        expected: &'static str,
        /// Value found in the environment.
        value: String,
    },

    /// The tree bounds cannot keep an (a,b)-tree balanced.
    #[error("tree bounds a={min}, b={max} are invalid (need a >= 2 and b >= 2a - 1)")]
    InvalidTreeBounds {
        /// Configured lower bound `a`.
        min: usize,
        /// Configured upper bound `b`.
        max: usize,
    },
}

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error. Fatal before startup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Store construction failed; the configured bounds were rejected by
    /// the engine. Fatal before startup.
    #[error("store error: {0}")]
    Store(#[from] TreeError),

    /// Transport/network error. The accept loop logs and continues on
    /// per-connection failures; bind failures are fatal.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<std::io::Error> for ServerError {
    fn from(error: std::io::Error) -> Self {
        Self::Transport(error.to_string())
    }
}
