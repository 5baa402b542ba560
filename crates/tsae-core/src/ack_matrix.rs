//! Acknowledgment matrix: the last summary reported by every replica.
//!
//! The column-wise minimum of the matrix is the causal-stability floor. Any
//! operation at or below the floor has been received by every replica and
//! may be discarded.

use crate::summary::Summary;
use crate::timestamp::ReplicaId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One [`Summary`] row per replica.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMatrix {
    participants: Vec<ReplicaId>,
    rows: BTreeMap<ReplicaId, Summary>,
}

impl AckMatrix {
    /// Create a matrix with an empty row for every participant.
    pub fn new<I, S>(participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ReplicaId>,
    {
        let participants: Vec<ReplicaId> = participants.into_iter().map(Into::into).collect();
        let rows = participants
            .iter()
            .map(|id| (id.clone(), Summary::new(participants.iter().cloned())))
            .collect();

        AckMatrix { participants, rows }
    }

    /// The participants this matrix was created for.
    pub fn participants(&self) -> &[ReplicaId] {
        &self.participants
    }

    /// The last summary reported by `replica`.
    pub fn row(&self, replica: &str) -> Option<&Summary> {
        self.rows.get(replica)
    }

    /// Replace the row of `replica` with a copy of `summary`.
    pub fn set_row(&mut self, replica: impl Into<ReplicaId>, summary: &Summary) {
        self.rows.insert(replica.into(), summary.clone());
    }

    /// Merge with a peer's matrix taking the rowwise elementwise maximum.
    ///
    /// Rows the local matrix has never seen are adopted as copies.
    pub fn merge_max(&mut self, other: &AckMatrix) {
        for (replica, row) in &other.rows {
            match self.rows.get_mut(replica) {
                Some(current) => current.merge_max(row),
                None => {
                    self.rows.insert(replica.clone(), row.clone());
                }
            }
        }
    }

    /// Column-wise minimum over all rows.
    ///
    /// An operation from origin `o` with `seq <= min_summary().seq_of(o)` is
    /// known to every replica.
    pub fn min_summary(&self) -> Summary {
        let mut rows = self.rows.values();
        let mut floor = match rows.next() {
            Some(first) => first.clone(),
            None => return Summary::new(self.participants.iter().cloned()),
        };
        for row in rows {
            floor.merge_min(row);
        }
        floor
    }

    /// Iterate over `(replica, row)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ReplicaId, &Summary)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for AckMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (replica, row) in &self.rows {
            writeln!(f, "{}: {}", replica, row)?;
        }
        Ok(())
    }
}
