//! # tsae-core
//!
//! Data structures of the Timestamped Anti-Entropy (TSAE) protocol.
//!
//! This crate provides:
//! - Timestamps: `(origin, seq)` logical clocks with a "nothing seen" sentinel
//! - Summaries: vector clocks of the operations received per origin
//! - Ack matrices: every replica's last reported summary, and their minimum
//! - Logs: per-origin, gap-free operation sequences with ack-driven purging
//!
//! ## Example
//!
//! ```rust
//! use tsae_core::{Document, Log, Operation, Summary, Timestamp};
//!
//! let mut log = Log::new(["S1", "S2"]);
//! let mut summary = Summary::new(["S1", "S2"]);
//!
//! let ts = Timestamp::new("S1", 0);
//! log.append(Operation::add(Document::new("Paella", "rice", ts.clone()))).unwrap();
//! summary.update(&ts);
//!
//! // A peer that has seen nothing pulls the new operation.
//! let peer = Summary::new(["S1", "S2"]);
//! assert_eq!(log.list_newer(&peer).len(), 1);
//! ```

mod ack_matrix;
mod error;
mod log;
mod operation;
mod summary;
mod timestamp;

pub use ack_matrix::AckMatrix;
pub use error::{LogError, Result};
pub use log::{Log, Sublog};
pub use operation::{Document, Operation, OperationKind};
pub use summary::Summary;
pub use timestamp::{ReplicaId, SeqNo, Timestamp, NULL_SEQ};
