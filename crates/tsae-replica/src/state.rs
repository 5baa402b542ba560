//! Single-writer reconciliation state of a replica.
//!
//! `ReplicaState` owns the log, summary, ack matrix, tombstones and the
//! materialized view, and applies local and remote operations to them. It
//! has no interior locking; [`Replica`](crate::Replica) serializes access.
//!
//! # Conflict resolution
//!
//! - An `Add` supersedes every older version of its title from the same
//!   origin, even when the `Add` itself is tombstoned.
//! - A tombstoned `Add` is then dropped. Otherwise it becomes visible only
//!   if no later version of its title from another origin is live; the
//!   earlier one stays shadowed behind the visible version.
//! - A `Remove` always records a tombstone and drops exactly the version it
//!   names. Older versions from its origin are already gone, so removing
//!   the latest version of a single writer removes the title.

use crate::config::ReplicaConfig;
use crate::gc::{self, GcStats};
use crate::tombstone::TombstoneSet;
use crate::view::DocumentView;
use tracing::trace;
use tsae_core::{AckMatrix, Document, Log, LogError, Operation, ReplicaId, Summary, Timestamp};

/// Log, clocks, tombstones and view of one replica.
#[derive(Clone, Debug)]
pub struct ReplicaState {
    id: ReplicaId,
    log: Log,
    summary: Summary,
    ack: Option<AckMatrix>,
    tombstones: TombstoneSet,
    view: DocumentView,
}

impl ReplicaState {
    /// Create an empty state for `id` among `participants`.
    pub fn new(id: impl Into<ReplicaId>, participants: &[ReplicaId], config: &ReplicaConfig) -> Self {
        ReplicaState {
            id: id.into(),
            log: Log::new(participants.iter().cloned()),
            summary: Summary::new(participants.iter().cloned()),
            ack: config
                .garbage_collection
                .then(|| AckMatrix::new(participants.iter().cloned())),
            tombstones: TombstoneSet::new(),
            view: DocumentView::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn ack(&self) -> Option<&AckMatrix> {
        self.ack.as_ref()
    }

    pub fn tombstones(&self) -> &TombstoneSet {
        &self.tombstones
    }

    pub fn view(&self) -> &DocumentView {
        &self.view
    }

    /// Log and materialize a new document created locally at `ts`.
    pub fn create_local(
        &mut self,
        ts: Timestamp,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), LogError> {
        let document = Document::new(title, content, ts.clone());
        self.log.append(Operation::add(document.clone()))?;
        self.advance(&ts);
        trace!(replica = %self.id, ts = %ts, title = %document.title, "created document");
        self.view.insert(document);
        Ok(())
    }

    /// Creation timestamp of the current version of `title`, if any.
    ///
    /// Used to decide whether a local delete has anything to remove before
    /// spending a timestamp on it.
    pub fn current_version(&self, title: &str) -> Option<Timestamp> {
        self.view.version_of(title).cloned()
    }

    /// Log a local removal at `ts` of the current version of `title`.
    ///
    /// Returns `Ok(false)` without touching anything when the title is not
    /// present.
    pub fn delete_local(&mut self, ts: Timestamp, title: &str) -> Result<bool, LogError> {
        let created = match self.view.version_of(title) {
            Some(created) => created.clone(),
            None => return Ok(false),
        };

        self.log
            .append(Operation::remove(title, created.clone(), ts.clone()))?;
        self.advance(&ts);
        self.view.remove_version(title, &created);
        self.tombstones.register(&created, &ts);
        trace!(replica = %self.id, ts = %ts, title, created = %created, "removed document");
        Ok(true)
    }

    /// Apply an operation received from a peer.
    ///
    /// A rejected append leaves the state untouched; the caller retries after
    /// pulling the missing predecessor.
    pub fn apply_remote(&mut self, op: Operation) -> Result<(), LogError> {
        let ts = op.timestamp().clone();
        self.log.append(op.clone())?;

        match op {
            Operation::Add { document } => self.apply_add(document),
            Operation::Remove {
                title,
                created,
                removed,
            } => self.apply_remove(&title, &created, &removed),
        }

        self.advance(&ts);
        Ok(())
    }

    fn apply_add(&mut self, document: Document) {
        if self.tombstones.contains(&document.timestamp) {
            let superseded = self.view.supersede(&document.title, &document.timestamp);
            trace!(replica = %self.id, ts = %document.timestamp, superseded, "add suppressed by tombstone");
            return;
        }

        let ts = document.timestamp.clone();
        if self.view.insert(document) {
            trace!(replica = %self.id, ts = %ts, "applied add");
        } else {
            trace!(replica = %self.id, ts = %ts, "add shadowed by a later version");
        }
    }

    fn apply_remove(&mut self, title: &str, created: &Timestamp, removed: &Timestamp) {
        self.tombstones.register(created, removed);

        if self.view.remove_version(title, created).is_some() {
            trace!(replica = %self.id, ts = %removed, title, "applied remove");
        }
    }

    /// Advance the summary with `ts` and refresh the own ack row.
    fn advance(&mut self, ts: &Timestamp) {
        self.summary.update(ts);
        self.refresh_own_ack_row();
    }

    /// Copy the local summary into the own row of the ack matrix.
    pub fn refresh_own_ack_row(&mut self) {
        if let Some(ack) = self.ack.as_mut() {
            ack.set_row(self.id.clone(), &self.summary);
        }
    }

    /// Fold a peer's ack matrix into the local one.
    pub fn merge_ack(&mut self, peer: &AckMatrix) {
        if let Some(ack) = self.ack.as_mut() {
            ack.merge_max(peer);
        }
    }

    /// Purge the log and tombstones below the stability floor.
    pub fn garbage_collect(&mut self) -> GcStats {
        match self.ack.as_ref() {
            Some(ack) => gc::collect(&mut self.log, &mut self.tombstones, ack),
            None => GcStats::default(),
        }
    }
}
