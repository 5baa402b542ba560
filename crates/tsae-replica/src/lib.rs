//! # tsae-replica
//!
//! Replica state of the TSAE replicated document collection.
//!
//! This crate provides:
//! - Reconciliation: local create/delete and remote operation apply
//! - Tombstones: remove-wins for a specific version, regardless of order
//! - Garbage collection: log and tombstone purge below the ack floor
//! - A thread-safe [`Replica`] handle for clients and session drivers
//!
//! ## Example
//!
//! ```rust
//! use tsae_replica::Replica;
//!
//! let s1 = Replica::new("S1", ["S1", "S2"]);
//! let s2 = Replica::new("S2", ["S1", "S2"]);
//!
//! s1.create_local("Paella", "rice, saffron");
//!
//! // One direction of an anti-entropy exchange.
//! for op in s1.operations_newer_than(&s2.summary_snapshot()) {
//!     assert!(s2.apply_remote(op));
//! }
//! assert!(s2.contains("Paella"));
//! ```

mod config;
mod gc;
mod replica;
mod state;
mod tombstone;
mod view;

pub use config::ReplicaConfig;
pub use gc::GcStats;
pub use replica::Replica;
pub use state::ReplicaState;
pub use tombstone::{Tombstone, TombstoneSet};
pub use view::DocumentView;

pub use tsae_core::{AckMatrix, Document, Log, Operation, ReplicaId, Summary, Timestamp};
