//! Per-origin causal operation log.
//!
//! The log keeps one sublog per participant. Operations of an origin are
//! accepted strictly in sequence order: operation `n` is only appended once
//! `n - 1` is present, whatever order the transport delivers them in.
//!
//! Operations leave the log only through garbage collection, once the ack
//! matrix certifies every replica has received them. Each sublog remembers
//! the last sequence number it accepted so contiguity keeps holding after
//! its retained suffix has been purged.

use crate::ack_matrix::AckMatrix;
use crate::error::{LogError, Result};
use crate::operation::Operation;
use crate::summary::Summary;
use crate::timestamp::{ReplicaId, SeqNo, NULL_SEQ};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Operations issued by one origin, in sequence order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sublog {
    ops: VecDeque<Operation>,
    last_seq: SeqNo,
}

impl Sublog {
    fn new() -> Self {
        Sublog {
            ops: VecDeque::new(),
            last_seq: NULL_SEQ,
        }
    }

    /// Sequence number the next accepted operation must carry.
    fn expected_seq(&self) -> SeqNo {
        if self.last_seq == NULL_SEQ {
            0
        } else {
            self.last_seq + 1
        }
    }

    /// Retained operations.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter()
    }

    /// Last accepted sequence number, including purged ones.
    pub fn last_seq(&self) -> SeqNo {
        self.last_seq
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Causal log of operations keyed by origin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    sublogs: BTreeMap<ReplicaId, Sublog>,
}

impl Log {
    /// Create an empty log for the given participants.
    pub fn new<I, S>(participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ReplicaId>,
    {
        Log {
            sublogs: participants
                .into_iter()
                .map(|id| (id.into(), Sublog::new()))
                .collect(),
        }
    }

    /// Append an operation if it is the immediate successor of the last
    /// accepted operation of its origin.
    pub fn append(&mut self, op: Operation) -> Result<()> {
        let ts = op.timestamp();
        if ts.is_null() {
            return Err(LogError::NullTimestamp(ts.origin().to_string()));
        }

        let sublog = self
            .sublogs
            .get_mut(ts.origin())
            .ok_or_else(|| LogError::UnknownOrigin(ts.origin().to_string()))?;

        let expected = sublog.expected_seq();
        if ts.seq() < expected {
            return Err(LogError::Duplicate {
                origin: ts.origin().to_string(),
                seq: ts.seq(),
            });
        }
        if ts.seq() > expected {
            return Err(LogError::Gap {
                origin: ts.origin().to_string(),
                expected,
                found: ts.seq(),
            });
        }

        sublog.last_seq = ts.seq();
        sublog.ops.push_back(op);
        Ok(())
    }

    /// Operations not yet covered by `summary`.
    ///
    /// Per-origin order is preserved. Callers must not rely on the
    /// interleaving of different origins.
    pub fn list_newer(&self, summary: &Summary) -> Vec<Operation> {
        self.sublogs
            .iter()
            .flat_map(|(origin, sublog)| {
                let known = summary.seq_of(origin);
                sublog
                    .ops
                    .iter()
                    .filter(move |op| op.timestamp().seq() > known)
                    .cloned()
            })
            .collect()
    }

    /// Discard every operation known to all replicas according to `ack`.
    ///
    /// Returns the number of operations removed.
    pub fn garbage_collect(&mut self, ack: &AckMatrix) -> usize {
        self.purge_upto(&ack.min_summary())
    }

    /// Discard every operation with `seq <= floor.seq_of(origin)`.
    pub fn purge_upto(&mut self, floor: &Summary) -> usize {
        let mut purged = 0;
        for (origin, sublog) in self.sublogs.iter_mut() {
            let stable = floor.seq_of(origin);
            while sublog
                .ops
                .front()
                .is_some_and(|op| op.timestamp().seq() <= stable)
            {
                sublog.ops.pop_front();
                purged += 1;
            }
        }
        purged
    }

    /// The sublog of `origin`.
    pub fn sublog(&self, origin: &str) -> Option<&Sublog> {
        self.sublogs.get(origin)
    }

    /// Last sequence number accepted from `origin`.
    pub fn last_seq(&self, origin: &str) -> SeqNo {
        self.sublogs
            .get(origin)
            .map(Sublog::last_seq)
            .unwrap_or(NULL_SEQ)
    }

    /// Iterate over all retained operations, grouped by origin.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.sublogs.values().flat_map(|s| s.ops.iter())
    }

    /// Total number of retained operations.
    pub fn len(&self) -> usize {
        self.sublogs.values().map(Sublog::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sublogs.values().all(Sublog::is_empty)
    }
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in self.iter() {
            writeln!(f, "{}", op)?;
        }
        Ok(())
    }
}
