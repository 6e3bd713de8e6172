//! Storage engine error types.

use thiserror::Error;

/// Errors from (a,b)-tree construction and invariant checking.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Construction parameters violate `a >= 2` or `b >= 2a - 1`.
    ///
    /// Fatal for the caller: a tree with these bounds cannot keep its
    /// rebalancing guarantees.
    #[error("invalid tree parameters: a={min}, b={max} (need a >= 2 and b >= 2a - 1)")]
    InvalidParameters {
        /// Requested lower fan-out bound `a`.
        min: usize,
        /// Requested upper fan-out bound `b`.
        max: usize,
    },

    /// A structural invariant does not hold.
    ///
    /// Only produced by [`crate::AbTree::check_invariants`]; a violation in
    /// a live tree signals a rebalancing bug.
    #[error("tree invariant violated: {0}")]
    InvariantViolated(String),
}
