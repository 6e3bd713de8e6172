//! Keywire storage engine.
//!
//! An ordered in-memory key-value map structured as an (a,b)-tree, with
//! logarithmic insert/remove/find and explicit overflow and underflow
//! rebalancing, plus [`Store`]: the readers-writer gate that admits many
//! concurrent lookups or one exclusive mutation.
//!
//! The engine itself ([`AbTree`]) is single-threaded and synchronous; all
//! sharing happens through the gate.

#![forbid(unsafe_code)]

mod errors;
mod store;
mod tree;

pub use errors::TreeError;
pub use store::Store;
pub use tree::{AbTree, KeyData};
