//! Peer selection for anti-entropy sessions.

use crate::network::PeerId;
use parking_lot::RwLock;
use rand::seq::SliceRandom;

/// Source of session partners.
pub trait Membership: Send + Sync + 'static {
    /// The local peer; never returned as a partner.
    fn local_id(&self) -> &PeerId;

    /// Every known peer other than the local one.
    fn peers(&self) -> Vec<PeerId>;

    /// Up to `count` distinct partners, chosen at random.
    fn select_peers(&self, count: usize) -> Vec<PeerId> {
        let peers = self.peers();
        peers
            .choose_multiple(&mut rand::thread_rng(), count)
            .cloned()
            .collect()
    }
}

/// A fixed participant list, optionally edited at runtime.
pub struct StaticMembership {
    local_id: PeerId,
    peers: RwLock<Vec<PeerId>>,
}

impl StaticMembership {
    /// Build from the full participant list; the local id is filtered out
    /// and duplicates are dropped.
    pub fn new<I, P>(local_id: impl Into<PeerId>, participants: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PeerId>,
    {
        let local_id = local_id.into();
        let mut peers: Vec<PeerId> = participants
            .into_iter()
            .map(Into::into)
            .filter(|p| *p != local_id)
            .collect();
        peers.sort();
        peers.dedup();

        Self {
            local_id,
            peers: RwLock::new(peers),
        }
    }

    /// Add a peer. Returns false for the local id or a known peer.
    pub fn add_peer(&self, peer: PeerId) -> bool {
        if peer == self.local_id {
            return false;
        }
        let mut peers = self.peers.write();
        if peers.contains(&peer) {
            return false;
        }
        peers.push(peer);
        true
    }

    pub fn remove_peer(&self, peer: &PeerId) -> bool {
        let mut peers = self.peers.write();
        let before = peers.len();
        peers.retain(|p| p != peer);
        peers.len() != before
    }
}

impl Membership for StaticMembership {
    fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    fn peers(&self) -> Vec<PeerId> {
        self.peers.read().clone()
    }
}
