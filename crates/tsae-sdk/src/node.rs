//! A replica wired to a transport, a membership and a session schedule.

use crate::error::{Result, SdkError};
use crate::membership::Membership;
use crate::network::{PeerId, SessionTransport};
use crate::scheduler::{PeriodicScheduler, SchedulerHandle};
use crate::session::{self, SessionOutcome};
use crate::sync::{SyncConfig, SyncEvent};
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use tsae_core::Timestamp;
use tsae_replica::{Document, Replica};

const EVENT_CAPACITY: usize = 256;

/// State shared between a node and its periodic task.
struct Shared<T, M> {
    replica: Arc<Replica>,
    transport: Arc<T>,
    membership: Arc<M>,
    config: SyncConfig,
    events: broadcast::Sender<SyncEvent>,
}

impl<T: SessionTransport, M: Membership> Shared<T, M> {
    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn session(&self, peer: &PeerId) -> Result<SessionOutcome> {
        self.emit(SyncEvent::SessionStarted(peer.clone()));

        let result = session::originate_with_timeout(
            &self.replica,
            self.transport.as_ref(),
            peer,
            self.config.session_timeout(),
        )
        .await;

        match result {
            Ok(outcome) => {
                self.emit(SyncEvent::SessionCompleted {
                    peer: peer.clone(),
                    received: outcome.received,
                    accepted: outcome.accepted,
                    sent: outcome.sent,
                });
                if !outcome.gc.is_noop() {
                    self.emit(SyncEvent::GarbageCollected {
                        operations: outcome.gc.operations_purged,
                        tombstones: outcome.gc.tombstones_purged,
                    });
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!(replica = self.replica.id(), peer = %peer, error = %e, "session failed");
                self.emit(SyncEvent::SessionFailed {
                    peer: peer.clone(),
                    error: e.to_string(),
                });
                Err(SdkError::Network(e))
            }
        }
    }

    /// Run sessions with up to `count` random partners concurrently.
    async fn round(&self, count: usize) -> Vec<Result<SessionOutcome>> {
        let peers = self.membership.select_peers(count);
        if peers.is_empty() {
            return Vec::new();
        }
        debug!(replica = self.replica.id(), peers = peers.len(), "starting session round");
        join_all(peers.iter().map(|peer| self.session(peer))).await
    }
}

/// A TSAE participant.
///
/// # Example
///
/// ```rust
/// use tsae_sdk::quick::create_cluster;
/// use tsae_sdk::{NetworkConfig, SyncConfig};
///
/// # tokio_test::block_on(async {
/// let (_network, nodes) =
///     create_cluster(&["S1", "S2"], NetworkConfig::perfect(), SyncConfig::default()).unwrap();
///
/// nodes[0].add_document("Paella", "rice, saffron").await;
/// nodes[1].run_round().await;
/// assert!(nodes[1].replica().contains("Paella"));
/// # });
/// ```
pub struct Node<T: SessionTransport, M: Membership> {
    shared: Arc<Shared<T, M>>,
    scheduler: Mutex<Option<SchedulerHandle>>,
    connected: watch::Sender<bool>,
}

impl<T: SessionTransport, M: Membership> Node<T, M> {
    /// Create a node. Fails on an invalid configuration.
    pub fn new(replica: Arc<Replica>, transport: Arc<T>, membership: M, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        if transport.local_id().as_str() != replica.id() {
            return Err(SdkError::Config(format!(
                "transport sends as {} but the replica is {}",
                transport.local_id(),
                replica.id()
            )));
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (connected, _) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(Shared {
                replica,
                transport,
                membership: Arc::new(membership),
                config,
                events,
            }),
            scheduler: Mutex::new(None),
            connected,
        })
    }

    pub fn id(&self) -> &str {
        self.shared.replica.id()
    }

    pub fn replica(&self) -> &Arc<Replica> {
        &self.shared.replica
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.shared.transport
    }

    pub fn membership(&self) -> &M {
        &self.shared.membership
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Subscribe to node events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Create a document, then run `propagation_degree` sessions.
    pub async fn add_document(&self, title: impl Into<String>, content: impl Into<String>) -> Option<Timestamp> {
        let title = title.into();
        let ts = self.shared.replica.create_local(title.clone(), content)?;
        self.shared.emit(SyncEvent::DocumentCreated {
            title,
            timestamp: ts.clone(),
        });
        self.propagate().await;
        Some(ts)
    }

    /// Remove the current version of `title`, then run
    /// `propagation_degree` sessions. Nothing happens when the title is
    /// absent.
    pub async fn remove_document(&self, title: &str) -> Option<Timestamp> {
        let ts = self.shared.replica.delete_local(title)?;
        self.shared.emit(SyncEvent::DocumentRemoved {
            title: title.to_string(),
            timestamp: ts.clone(),
        });
        self.propagate().await;
        Some(ts)
    }

    pub fn document(&self, title: &str) -> Option<Document> {
        self.shared.replica.document(title)
    }

    pub fn documents(&self) -> Vec<Document> {
        self.shared.replica.documents()
    }

    async fn propagate(&self) {
        let degree = self.shared.config.propagation_degree;
        if degree > 0 {
            self.shared.round(degree).await;
        }
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Run one session with `peer`.
    pub async fn run_session(&self, peer: &PeerId) -> Result<SessionOutcome> {
        self.shared.session(peer).await
    }

    /// Run sessions with `sessions_per_round` random partners.
    pub async fn run_round(&self) -> Vec<Result<SessionOutcome>> {
        self.shared.round(self.shared.config.sessions_per_round).await
    }

    /// Start periodic rounds on the current tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut scheduler = self.scheduler.lock();
        if scheduler.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(SdkError::AlreadyRunning);
        }

        let shared = self.shared.clone();
        let handle = PeriodicScheduler::spawn(
            self.shared.config.session_delay(),
            self.shared.config.session_period(),
            move || {
                let shared = shared.clone();
                async move {
                    shared.round(shared.config.sessions_per_round).await;
                }
            },
        );
        *scheduler = Some(handle);

        info!(replica = self.id(), period_ms = self.shared.config.session_period_ms, "periodic sessions started");
        Ok(())
    }

    /// Stop periodic rounds and wait for the current one to finish.
    pub async fn stop(&self) -> Result<()> {
        let handle = self.scheduler.lock().take().ok_or(SdkError::NotRunning)?;
        handle.shutdown().await?;
        info!(replica = self.id(), "periodic sessions stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Number of completed periodic rounds since the last `start`.
    pub fn rounds_completed(&self) -> u64 {
        self.scheduler.lock().as_ref().map_or(0, |h| h.ticks())
    }

    // ------------------------------------------------------------------
    // Readiness
    // ------------------------------------------------------------------

    /// Open the readiness gate.
    pub fn mark_connected(&self) {
        self.connected.send_replace(true);
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Wait until [`mark_connected`](Self::mark_connected) has been called.
    pub async fn wait_connected(&self) {
        let mut rx = self.connected.subscribe();
        // The sender lives as long as `self`, so this cannot close early.
        let _ = rx.wait_for(|connected| *connected).await;
    }
}

impl<T: SessionTransport, M: Membership> std::fmt::Debug for Node<T, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("running", &self.is_running())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Convenience functions for quickly wiring in-memory clusters.
pub mod quick {
    use super::*;
    use crate::membership::StaticMembership;
    use crate::network::{MemoryNetwork, MemoryTransport, NetworkConfig};

    /// Build one node per id, all registered on a fresh in-memory network.
    pub fn create_cluster(
        ids: &[&str],
        network: NetworkConfig,
        config: SyncConfig,
    ) -> Result<(MemoryNetwork, Vec<Node<MemoryTransport, StaticMembership>>)> {
        let memory = MemoryNetwork::new(network);
        let nodes = ids
            .iter()
            .map(|id| {
                let replica = Arc::new(Replica::new(*id, ids.iter().copied()));
                let transport = Arc::new(memory.register(replica.clone()));
                let membership = StaticMembership::new(*id, ids.iter().copied());
                Node::new(replica, transport, membership, config.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((memory, nodes))
    }
}
