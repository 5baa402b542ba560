//! Logical timestamps issued by replicas.
//!
//! A timestamp pairs the issuing replica with a per-replica sequence number.
//! Timestamps from the same origin are totally ordered by sequence; timestamps
//! from different origins are not comparable.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of a replica (participant) in the group.
pub type ReplicaId = String;

/// Per-origin sequence number.
pub type SeqNo = i64;

/// Sequence number meaning "no operation seen yet".
pub const NULL_SEQ: SeqNo = -1000;

/// A logical timestamp `(origin, seq)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    origin: ReplicaId,
    seq: SeqNo,
}

impl Timestamp {
    /// Create a timestamp for `origin` with the given sequence number.
    pub fn new(origin: impl Into<ReplicaId>, seq: SeqNo) -> Self {
        Timestamp {
            origin: origin.into(),
            seq,
        }
    }

    /// The sentinel timestamp for `origin`.
    pub fn null(origin: impl Into<ReplicaId>) -> Self {
        Timestamp::new(origin, NULL_SEQ)
    }

    /// The replica that issued this timestamp.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The sequence number.
    pub fn seq(&self) -> SeqNo {
        self.seq
    }

    /// Whether this is the sentinel timestamp.
    pub fn is_null(&self) -> bool {
        self.seq == NULL_SEQ
    }

    /// The successor of this timestamp in the same origin.
    ///
    /// The successor of the sentinel is sequence number `0`.
    pub fn next(&self) -> Timestamp {
        let seq = if self.is_null() { 0 } else { self.seq + 1 };
        Timestamp::new(self.origin.clone(), seq)
    }

    /// Compare two timestamps of the same origin.
    ///
    /// Returns `None` when the origins differ.
    pub fn compare(&self, other: &Timestamp) -> Option<Ordering> {
        if self.origin != other.origin {
            return None;
        }
        Some(self.seq.cmp(&other.seq))
    }

    /// Whether `self` is strictly later than `other` in the same origin.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.compare(other) == Some(Ordering::Greater)
    }

    /// Whether `self` is strictly earlier than `other` in the same origin.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.compare(other) == Some(Ordering::Less)
    }

    /// Deterministic total order used only to break ties between
    /// timestamps of different origins: sequence first, then origin.
    pub fn total_cmp(&self, other: &Timestamp) -> Ordering {
        self.seq
            .cmp(&other.seq)
            .then_with(|| self.origin.cmp(&other.origin))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.seq)
    }
}
