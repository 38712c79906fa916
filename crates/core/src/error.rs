//! Error types shared across the Sluice workspace.

use crate::status::Status;
use thiserror::Error;

/// Result type alias for Sluice operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for Sluice operations.
///
/// Every variant here is an invariant-violation class failure: a malformed
/// delta, an out-of-range position or an illegal lifecycle transition means
/// something upstream already corrupted its state. Callers propagate these
/// with `?`; nothing in the core retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A position was outside the valid range of the target collection.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A delta did not match the content it was applied to.
    #[error("delta mismatch at index {index}: {detail}")]
    DeltaMismatch { index: usize, detail: String },

    /// A state that must carry full content arrived without it.
    #[error("missing content for status {0:?}")]
    MissingContent(Status),

    /// A lifecycle transition outside the legal state machine.
    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: Status, to: Status },

    /// An operation on an observer that has already been detached,
    /// or on a producer past its terminal state.
    #[error("subscription detached")]
    Detached,

    /// A structural validation hook found an inconsistency.
    #[error("structure check failed: {0}")]
    CheckFailed(String),
}

impl Error {
    /// Creates an out-of-range error.
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { index, len }
    }

    /// Creates a delta mismatch error.
    pub fn mismatch(index: usize, detail: impl Into<String>) -> Self {
        Error::DeltaMismatch {
            index,
            detail: detail.into(),
        }
    }

    /// Creates an invalid transition error.
    pub fn invalid_transition(from: Status, to: Status) -> Self {
        Error::InvalidTransition { from, to }
    }
}
