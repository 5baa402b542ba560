//! Tombstones for removed document versions.
//!
//! A tombstone records the creation timestamp of a removed version so an
//! `Add` for that exact version arriving late is not resurrected. It only
//! targets that version: a new `Add` for the same title under a different
//! timestamp is unaffected.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tsae_core::{Summary, Timestamp};

/// Marker for a removed version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    /// Creation timestamp of the removed version.
    pub created: Timestamp,
    /// Latest removal seen for that version.
    pub removed: Timestamp,
}

/// Tombstones keyed by creation timestamp.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TombstoneSet {
    by_created: HashMap<Timestamp, Timestamp>,
}

impl TombstoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a removal of `created`, or extend an existing tombstone.
    ///
    /// The stored removal timestamp never regresses. Concurrent removals
    /// issued by different replicas resolve to the same winner everywhere
    /// through [`Timestamp::total_cmp`].
    ///
    /// Returns whether the set changed.
    pub fn register(&mut self, created: &Timestamp, removed: &Timestamp) -> bool {
        match self.by_created.get_mut(created) {
            Some(current) => {
                if removed.total_cmp(current) == Ordering::Greater {
                    *current = removed.clone();
                    true
                } else {
                    false
                }
            }
            None => {
                self.by_created.insert(created.clone(), removed.clone());
                true
            }
        }
    }

    /// Whether the version created at `created` has been removed.
    pub fn contains(&self, created: &Timestamp) -> bool {
        self.by_created.contains_key(created)
    }

    /// The tombstone for `created`, if any.
    pub fn get(&self, created: &Timestamp) -> Option<Tombstone> {
        self.by_created.get(created).map(|removed| Tombstone {
            created: created.clone(),
            removed: removed.clone(),
        })
    }

    /// Drop tombstones whose removal and creation are both covered by the
    /// stability `floor`.
    ///
    /// Returns the number of tombstones dropped.
    pub fn purge(&mut self, floor: &Summary) -> usize {
        let before = self.by_created.len();
        self.by_created
            .retain(|created, removed| !(floor.contains(removed) && floor.contains(created)));
        before - self.by_created.len()
    }

    /// All tombstones, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = Tombstone> + '_ {
        self.by_created.iter().map(|(created, removed)| Tombstone {
            created: created.clone(),
            removed: removed.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.by_created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_created.is_empty()
    }
}
