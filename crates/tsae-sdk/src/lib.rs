//! TSAE SDK - anti-entropy sessions for replicated document collections
//!
//! This SDK drives [`tsae_replica::Replica`]s over a network: it runs the
//! two-round-trip TSAE session, picks partners, and schedules periodic
//! rounds.
//!
//! # Quick Start
//!
//! ```rust
//! use tsae_sdk::quick::create_cluster;
//! use tsae_sdk::{NetworkConfig, PeerId, SyncConfig};
//!
//! # tokio_test::block_on(async {
//! let (_network, nodes) =
//!     create_cluster(&["S1", "S2"], NetworkConfig::perfect(), SyncConfig::default()).unwrap();
//!
//! nodes[0].add_document("Paella", "rice, saffron").await;
//! nodes[1].add_document("Gazpacho", "tomato, cucumber").await;
//!
//! // One session moves operations in both directions.
//! nodes[0].run_session(&PeerId::new("S2")).await.unwrap();
//! assert_eq!(nodes[0].replica().titles(), nodes[1].replica().titles());
//! # });
//! ```
//!
//! # Architecture
//!
//! - [`session`] - Session messages and the originator/partner steps
//! - [`network`] - Transport trait and the in-memory network
//! - [`membership`] - Partner selection
//! - [`scheduler`] - Cancellable periodic task
//! - [`sync`] - Session configuration and events
//! - [`node`] - A replica wired to all of the above
//! - [`error`] - Error types

pub mod error;
pub mod membership;
pub mod network;
pub mod node;
pub mod scheduler;
pub mod session;
pub mod sync;

// Re-exports for convenience
pub use error::{Result, SdkError};
pub use membership::{Membership, StaticMembership};
pub use network::{
    create_network, MemoryNetwork, MemoryTransport, NetworkConfig, NetworkError, PeerId, SessionTransport,
};
pub use node::{quick, Node};
pub use scheduler::{PeriodicScheduler, SchedulerHandle};
pub use session::{SessionFinish, SessionOutcome, SessionReply, SessionRequest};
pub use sync::{SyncConfig, SyncConfigBuilder, SyncEvent};

// Re-export the replica layer
pub use tsae_replica::{
    AckMatrix, Document, GcStats, Operation, Replica, ReplicaConfig, ReplicaId, Summary, Timestamp,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::SdkError;
    pub use crate::membership::{Membership, StaticMembership};
    pub use crate::network::{MemoryNetwork, NetworkConfig, PeerId, SessionTransport};
    pub use crate::node::Node;
    pub use crate::sync::{SyncConfig, SyncEvent};
    pub use tsae_replica::Replica;
}
