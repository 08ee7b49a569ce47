//! Domain error types.

use thiserror::Error;

/// Top-level error type shared by the stores, repositories and aggregates.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Optimistic concurrency conflict: the stream head moved since the
    /// caller last read it.
    #[error(
        "concurrency conflict on stream {stream_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The stream that had the conflict.
        stream_id: String,
        /// The expected head version.
        expected: i64,
        /// The actual head version found.
        actual: i64,
    },

    /// A precondition on the arguments of an operation was violated, or a
    /// command was rejected by an aggregate.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    /// Stored events could not be decoded or replayed into an aggregate.
    #[error("reconstruction error: {0}")]
    Reconstruction(String),

    /// A snapshot could not be read or written.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl DomainError {
    /// Returns `true` if this error is an optimistic concurrency conflict,
    /// which callers typically answer with reload-and-retry.
    #[must_use]
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
