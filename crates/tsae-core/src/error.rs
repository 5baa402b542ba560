//! Error types for the causal log.

use crate::timestamp::{ReplicaId, SeqNo};
use thiserror::Error;

/// Reasons an operation is refused by [`Log::append`](crate::Log::append).
///
/// A rejection never mutates the log. Callers retry once the missing
/// predecessor has arrived.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("Operation {origin}:{seq} is already in the log")]
    Duplicate { origin: ReplicaId, seq: SeqNo },

    #[error("Gap in log of {origin}: expected seq {expected}, found {found}")]
    Gap {
        origin: ReplicaId,
        expected: SeqNo,
        found: SeqNo,
    },

    #[error("Unknown origin: {0}")]
    UnknownOrigin(ReplicaId),

    #[error("Operation from {0} carries the null timestamp")]
    NullTimestamp(ReplicaId),
}

pub type Result<T> = std::result::Result<T, LogError>;
