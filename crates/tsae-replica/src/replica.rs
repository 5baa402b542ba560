//! Thread-safe replica handle.
//!
//! All reconciliation runs under one replica-wide lock so local clients and
//! concurrent anti-entropy sessions never interleave. Local timestamps are
//! drawn from a separate clock lock, always taken while the state lock is
//! held so that appends stay contiguous; the clock only guarantees that a
//! sequence number is never handed out twice.
//!
//! Session drivers must not hold anything across a network exchange: take
//! snapshots, release, exchange, then call back in to apply the results.

use crate::config::ReplicaConfig;
use crate::gc::GcStats;
use crate::state::ReplicaState;
use crate::tombstone::Tombstone;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use tsae_core::{
    AckMatrix, Document, Log, Operation, ReplicaId, SeqNo, Summary, Timestamp, NULL_SEQ,
};

/// A replica of the shared document collection.
pub struct Replica {
    id: ReplicaId,
    participants: Vec<ReplicaId>,
    config: ReplicaConfig,
    /// Last sequence number issued locally.
    clock: Mutex<SeqNo>,
    state: Mutex<ReplicaState>,
}

impl Replica {
    /// Create a replica with the default configuration.
    pub fn new<I, S>(id: impl Into<ReplicaId>, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ReplicaId>,
    {
        Self::with_config(id, participants, ReplicaConfig::default())
    }

    /// Create a replica with a custom configuration.
    pub fn with_config<I, S>(id: impl Into<ReplicaId>, participants: I, config: ReplicaConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ReplicaId>,
    {
        let id = id.into();
        let mut participants: Vec<ReplicaId> = participants.into_iter().map(Into::into).collect();
        if !participants.contains(&id) {
            participants.push(id.clone());
        }

        let state = ReplicaState::new(id.clone(), &participants, &config);
        Replica {
            id,
            participants,
            config,
            clock: Mutex::new(NULL_SEQ),
            state: Mutex::new(state),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn participants(&self) -> &[ReplicaId] {
        &self.participants
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    fn next_timestamp(&self) -> Timestamp {
        let mut clock = self.clock.lock();
        *clock = if *clock == NULL_SEQ { 0 } else { *clock + 1 };
        Timestamp::new(self.id.clone(), *clock)
    }

    // ------------------------------------------------------------------
    // Local mutations
    // ------------------------------------------------------------------

    /// Create a document locally.
    ///
    /// Returns the creation timestamp.
    pub fn create_local(&self, title: impl Into<String>, content: impl Into<String>) -> Option<Timestamp> {
        let mut state = self.state.lock();
        let ts = self.next_timestamp();
        match state.create_local(ts.clone(), title, content) {
            Ok(()) => Some(ts),
            Err(e) => {
                warn!(replica = %self.id, error = %e, "local add rejected by log");
                None
            }
        }
    }

    /// Delete the current version of `title`.
    ///
    /// Returns the removal timestamp, or `None` when there was nothing to
    /// delete.
    pub fn delete_local(&self, title: &str) -> Option<Timestamp> {
        let mut state = self.state.lock();
        state.current_version(title)?;

        let ts = self.next_timestamp();
        match state.delete_local(ts.clone(), title) {
            Ok(true) => Some(ts),
            Ok(false) => None,
            Err(e) => {
                warn!(replica = %self.id, error = %e, "local remove rejected by log");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Session interface
    // ------------------------------------------------------------------

    /// Deep copy of the local summary.
    pub fn summary_snapshot(&self) -> Summary {
        self.state.lock().summary().clone()
    }

    /// Deep copy of the ack matrix, `None` when garbage collection is off.
    pub fn ack_snapshot(&self) -> Option<AckMatrix> {
        self.state.lock().ack().cloned()
    }

    /// Operations the owner of `remote` has not seen, grouped per origin.
    pub fn operations_newer_than(&self, remote: &Summary) -> Vec<Operation> {
        self.state.lock().log().list_newer(remote)
    }

    /// Apply one operation received from a peer.
    ///
    /// Returns `false` when the log refuses it (duplicate, gap or unknown
    /// origin); nothing changes in that case.
    pub fn apply_remote(&self, op: Operation) -> bool {
        let ts = op.timestamp().clone();
        match self.state.lock().apply_remote(op) {
            Ok(()) => true,
            Err(e) => {
                trace!(replica = %self.id, ts = %ts, reason = %e, "remote operation rejected");
                false
            }
        }
    }

    /// Apply a batch of remote operations in order.
    ///
    /// The lock is taken once per operation. Returns how many were accepted.
    pub fn apply_remote_all(&self, ops: impl IntoIterator<Item = Operation>) -> usize {
        ops.into_iter()
            .map(|op| self.apply_remote(op))
            .filter(|&accepted| accepted)
            .count()
    }

    /// Fold a peer's ack matrix into the local one.
    pub fn merge_ack(&self, remote: &AckMatrix) {
        self.state.lock().merge_ack(remote);
    }

    /// Copy the local summary into the own ack row.
    pub fn refresh_own_ack_row(&self) {
        self.state.lock().refresh_own_ack_row();
    }

    /// Purge causally stable operations and tombstones.
    pub fn run_garbage_collection(&self) -> GcStats {
        let stats = self.state.lock().garbage_collect();
        if !stats.is_noop() {
            debug!(
                replica = %self.id,
                operations = stats.operations_purged,
                tombstones = stats.tombstones_purged,
                floor = %stats.floor,
                "garbage collected"
            );
        }
        stats
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Deep copy of the log.
    pub fn log_snapshot(&self) -> Log {
        self.state.lock().log().clone()
    }

    /// Number of retained log entries.
    pub fn log_len(&self) -> usize {
        self.state.lock().log().len()
    }

    /// Current documents, ordered by title.
    pub fn documents(&self) -> Vec<Document> {
        self.state.lock().view().iter().cloned().collect()
    }

    pub fn document(&self, title: &str) -> Option<Document> {
        self.state.lock().view().get(title).cloned()
    }

    pub fn contains(&self, title: &str) -> bool {
        self.state.lock().view().contains(title)
    }

    /// Current titles, ordered.
    pub fn titles(&self) -> Vec<String> {
        self.state.lock().view().titles().cloned().collect()
    }

    pub fn tombstones(&self) -> Vec<Tombstone> {
        self.state.lock().tombstones().iter().collect()
    }

    /// Live versions hidden behind a concurrent version of their title.
    pub fn shadowed_count(&self) -> usize {
        self.state.lock().view().shadowed_count()
    }

    pub fn tombstone_count(&self) -> usize {
        self.state.lock().tombstones().len()
    }

    pub fn is_tombstoned(&self, created: &Timestamp) -> bool {
        self.state.lock().tombstones().contains(created)
    }

    /// Full copy of the reconciliation state.
    pub fn state_snapshot(&self) -> ReplicaState {
        self.state.lock().clone()
    }
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("id", &self.id)
            .field("participants", &self.participants)
            .finish_non_exhaustive()
    }
}
