//! Session transport abstractions and an in-memory network for tests and
//! simulation.

use crate::session::{self, SessionFinish, SessionReply, SessionRequest};
use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tsae_replica::Replica;

/// Unique identifier for a peer.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        PeerId::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        PeerId(id)
    }
}

/// Network error type.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    #[error("Link to {0} is down")]
    Disconnected(String),

    #[error("Message to {0} was dropped")]
    Dropped(String),

    #[error("Session with {0} timed out")]
    Timeout(String),

    #[error("Codec error: {0}")]
    Codec(String),
}

/// Carries the two round trips of a session to a partner.
#[async_trait]
pub trait SessionTransport: Send + Sync + 'static {
    /// The peer this transport sends from.
    fn local_id(&self) -> &PeerId;

    /// Send an opening request and wait for the partner's reply.
    async fn request(
        &self,
        peer: &PeerId,
        request: SessionRequest,
    ) -> Result<SessionReply, NetworkError>;

    /// Deliver the closing message of a session.
    async fn finish(&self, peer: &PeerId, finish: SessionFinish) -> Result<(), NetworkError>;
}

/// Behavior of the simulated links.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Probability in `[0, 1]` that a single message is lost.
    pub loss_rate: f64,
    /// One-way delay per message, in milliseconds.
    pub latency_ms: u64,
    /// Round-trip every message through JSON, as a real wire would.
    pub encode_messages: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::perfect()
    }
}

impl NetworkConfig {
    /// No loss, no delay.
    pub fn perfect() -> Self {
        Self {
            loss_rate: 0.0,
            latency_ms: 0,
            encode_messages: true,
        }
    }

    /// Lose each message with probability `loss_rate`.
    pub fn lossy(loss_rate: f64) -> Self {
        Self {
            loss_rate: loss_rate.clamp(0.0, 1.0),
            ..Self::perfect()
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

#[derive(Default)]
struct Registry {
    endpoints: HashMap<PeerId, Arc<Replica>>,
    /// Severed links, stored with the smaller id first.
    cut: HashSet<(PeerId, PeerId)>,
}

fn link(a: &PeerId, b: &PeerId) -> (PeerId, PeerId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

type SharedRegistry = Arc<RwLock<Registry>>;

/// A set of replicas reachable from each other in memory.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    registry: SharedRegistry,
    config: NetworkConfig,
}

impl MemoryNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            registry: Arc::default(),
            config,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Attach `replica` and return the transport it sends through.
    pub fn register(&self, replica: Arc<Replica>) -> MemoryTransport {
        let local_id = PeerId::new(replica.id());
        self.registry.write().endpoints.insert(local_id.clone(), replica);
        MemoryTransport {
            local_id,
            registry: self.registry.clone(),
            config: self.config.clone(),
        }
    }

    /// Detach a peer; sessions with it fail with `PeerNotFound`.
    pub fn unregister(&self, peer: &PeerId) -> bool {
        self.registry.write().endpoints.remove(peer).is_some()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self.registry.read().endpoints.keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Sever the link between `a` and `b` in both directions.
    pub fn partition(&self, a: &PeerId, b: &PeerId) {
        self.registry.write().cut.insert(link(a, b));
    }

    /// Sever every link between the two groups.
    pub fn split(&self, left: &[PeerId], right: &[PeerId]) {
        let mut registry = self.registry.write();
        for a in left {
            for b in right {
                registry.cut.insert(link(a, b));
            }
        }
    }

    /// Restore the link between `a` and `b`.
    pub fn heal(&self, a: &PeerId, b: &PeerId) {
        self.registry.write().cut.remove(&link(a, b));
    }

    /// Restore every severed link.
    pub fn heal_all(&self) {
        self.registry.write().cut.clear();
    }

    pub fn is_linked(&self, a: &PeerId, b: &PeerId) -> bool {
        !self.registry.read().cut.contains(&link(a, b))
    }
}

/// In-memory transport: the partner's side of a session runs directly on
/// the partner replica.
#[derive(Clone)]
pub struct MemoryTransport {
    local_id: PeerId,
    registry: SharedRegistry,
    config: NetworkConfig,
}

impl MemoryTransport {
    fn endpoint(&self, peer: &PeerId) -> Result<Arc<Replica>, NetworkError> {
        let registry = self.registry.read();
        if registry.cut.contains(&link(&self.local_id, peer)) {
            return Err(NetworkError::Disconnected(peer.to_string()));
        }
        registry
            .endpoints
            .get(peer)
            .cloned()
            .ok_or_else(|| NetworkError::PeerNotFound(peer.to_string()))
    }

    /// One message crossing the link: delay, then maybe lose it.
    async fn transit(&self, peer: &PeerId) -> Result<(), NetworkError> {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
        let lost = self.config.loss_rate > 0.0 && rand::thread_rng().gen::<f64>() < self.config.loss_rate;
        if lost {
            return Err(NetworkError::Dropped(peer.to_string()));
        }
        Ok(())
    }

    fn encode<M>(&self, message: M) -> Result<M, NetworkError>
    where
        M: Serialize + DeserializeOwned,
    {
        if !self.config.encode_messages {
            return Ok(message);
        }
        let bytes = serde_json::to_vec(&message).map_err(|e| NetworkError::Codec(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| NetworkError::Codec(e.to_string()))
    }
}

#[async_trait]
impl SessionTransport for MemoryTransport {
    fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    async fn request(
        &self,
        peer: &PeerId,
        request: SessionRequest,
    ) -> Result<SessionReply, NetworkError> {
        let partner = self.endpoint(peer)?;
        self.transit(peer).await?;
        let request = self.encode(request)?;

        let reply = session::answer(&partner, &request);

        self.transit(peer).await?;
        self.encode(reply)
    }

    async fn finish(&self, peer: &PeerId, finish: SessionFinish) -> Result<(), NetworkError> {
        let partner = self.endpoint(peer)?;
        self.transit(peer).await?;
        let finish = self.encode(finish)?;

        session::complete(&partner, finish);
        Ok(())
    }
}

/// Register every replica on a fresh network.
pub fn create_network(
    replicas: &[Arc<Replica>],
    config: NetworkConfig,
) -> (MemoryNetwork, Vec<MemoryTransport>) {
    let network = MemoryNetwork::new(config);
    let transports = replicas
        .iter()
        .map(|replica| network.register(replica.clone()))
        .collect();
    (network, transports)
}
