//! Summary (vector clock) of the operations a replica has seen.
//!
//! A summary records, for every participant, the timestamp of the last
//! operation issued by that participant that has been received locally.
//! Because logs are contiguous per origin, this single timestamp stands for
//! the whole prefix `0..=seq`.

use crate::timestamp::{ReplicaId, SeqNo, Timestamp, NULL_SEQ};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Vector clock mapping every known origin to its last seen timestamp.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    entries: BTreeMap<ReplicaId, Timestamp>,
}

impl Summary {
    /// Create a summary with a sentinel entry for each participant.
    pub fn new<I, S>(participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ReplicaId>,
    {
        Summary {
            entries: participants
                .into_iter()
                .map(|id| {
                    let id = id.into();
                    (id.clone(), Timestamp::null(id))
                })
                .collect(),
        }
    }

    /// Create a summary from explicit `(origin, seq)` pairs.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, SeqNo)>,
        S: Into<ReplicaId>,
    {
        Summary {
            entries: entries
                .into_iter()
                .map(|(id, seq)| {
                    let id = id.into();
                    (id.clone(), Timestamp::new(id, seq))
                })
                .collect(),
        }
    }

    /// Last timestamp seen from `origin`.
    pub fn last(&self, origin: &str) -> Option<&Timestamp> {
        self.entries.get(origin)
    }

    /// Last sequence number seen from `origin`, or the sentinel.
    pub fn seq_of(&self, origin: &str) -> SeqNo {
        self.entries.get(origin).map(Timestamp::seq).unwrap_or(NULL_SEQ)
    }

    /// Advance the entry for `ts.origin()` to `ts` if it is newer.
    ///
    /// Returns whether the summary changed.
    pub fn update(&mut self, ts: &Timestamp) -> bool {
        match self.entries.get_mut(ts.origin()) {
            Some(current) if ts.seq() > current.seq() => {
                *current = ts.clone();
                true
            }
            Some(_) => false,
            None => {
                self.entries.insert(ts.origin().to_string(), ts.clone());
                true
            }
        }
    }

    /// Merge with another summary taking the elementwise maximum.
    pub fn merge_max(&mut self, other: &Summary) {
        for ts in other.entries.values() {
            self.update(ts);
        }
    }

    /// Merge with another summary taking the elementwise minimum.
    ///
    /// Origins unknown locally are adopted from `other`.
    pub fn merge_min(&mut self, other: &Summary) {
        for (origin, ts) in &other.entries {
            match self.entries.get_mut(origin) {
                Some(current) if ts.seq() < current.seq() => *current = ts.clone(),
                Some(_) => {}
                None => {
                    self.entries.insert(origin.clone(), ts.clone());
                }
            }
        }
    }

    /// Whether every entry of `other` is covered by this summary.
    pub fn dominates(&self, other: &Summary) -> bool {
        other
            .entries
            .iter()
            .all(|(origin, ts)| self.seq_of(origin) >= ts.seq())
    }

    /// Whether the operation `ts` has been seen.
    pub fn contains(&self, ts: &Timestamp) -> bool {
        !ts.is_null() && self.seq_of(ts.origin()) >= ts.seq()
    }

    /// Participants tracked by this summary.
    pub fn participants(&self) -> impl Iterator<Item = &ReplicaId> {
        self.entries.keys()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&ReplicaId, &Timestamp)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.entries.values().map(|ts| ts.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
