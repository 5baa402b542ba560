//! Garbage collection of causally stable history.
//!
//! One pass computes a single stability floor from the ack matrix and uses
//! it for both the log and the tombstones, so the two never disagree on
//! what every replica has seen.

use crate::tombstone::TombstoneSet;
use tsae_core::{AckMatrix, Log, Summary};

/// Outcome of a garbage collection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Operations dropped from the log.
    pub operations_purged: usize,
    /// Tombstones dropped.
    pub tombstones_purged: usize,
    /// The stability floor used for this pass.
    pub floor: Summary,
}

impl GcStats {
    /// Whether the pass removed anything.
    pub fn is_noop(&self) -> bool {
        self.operations_purged == 0 && self.tombstones_purged == 0
    }
}

/// Purge `log` and `tombstones` below the floor of `ack`.
pub(crate) fn collect(log: &mut Log, tombstones: &mut TombstoneSet, ack: &AckMatrix) -> GcStats {
    let floor = ack.min_summary();
    let operations_purged = log.purge_upto(&floor);
    let tombstones_purged = tombstones.purge(&floor);

    GcStats {
        operations_purged,
        tombstones_purged,
        floor,
    }
}
