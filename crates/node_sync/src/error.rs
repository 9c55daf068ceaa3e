//! # Sync Error Types
//!
//! All errors that can occur in the cross-region sync engine.

use thiserror::Error;

/// Errors that can occur in the delta recorder, batch pipeline, and
/// conflict resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The outbound ring rejected a record because it is full and
    /// back-pressure coalescing could not make room (should not happen
    /// in practice since coalescing always frees at least one slot).
    #[error("delta ring full, record dropped")]
    RingFull,

    /// A transient failure publishing to the event bus. Retried with
    /// exponential backoff by the caller.
    #[error("transient publish failure: {0}")]
    Transient(String),

    /// Publication has failed repeatedly and the producer has paused.
    #[error("sync stalled: {0}")]
    SyncStalled(String),

    /// A remote record could not be decoded; the offending record is
    /// dropped without halting the consumer.
    #[error("failed to decode remote record: {0}")]
    DecodeError(String),

    /// Invalid configuration for the event bus client or sync pipeline.
    #[error("invalid sync configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
