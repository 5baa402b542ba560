//! The TSAE anti-entropy session.
//!
//! A session between an originator and a partner runs in two round trips:
//!
//! ```text
//! originator                                   partner
//!     | -- SessionRequest(summary, ack) -------->  |
//!     |                                            |  ops newer than summary
//!     | <-- SessionReply(ops, summary, ack) -----  |
//!  apply ops                                       |
//!     | -- SessionFinish(ops newer, ack) ------->  |
//!  merge ack, gc                               apply ops, merge ack, gc
//! ```
//!
//! Neither side holds its replica's lock across a network exchange: every
//! step takes snapshots or applies results through the [`Replica`] methods,
//! each of which locks for its own duration only. Dropping a session at any
//! await point leaves both replicas consistent.

use crate::network::{NetworkError, PeerId, SessionTransport};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};
use tsae_core::{AckMatrix, Operation, Summary};
use tsae_replica::{GcStats, Replica};

/// Opening message: the originator's knowledge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub from: PeerId,
    pub summary: Summary,
    pub ack: Option<AckMatrix>,
}

/// The partner's answer: what the originator is missing plus the
/// partner's own knowledge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReply {
    pub from: PeerId,
    pub operations: Vec<Operation>,
    pub summary: Summary,
    pub ack: Option<AckMatrix>,
}

/// Closing message: what the partner is missing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionFinish {
    pub from: PeerId,
    pub operations: Vec<Operation>,
    pub ack: Option<AckMatrix>,
}

/// Result of a completed session, seen from the originator.
#[derive(Clone, Debug, Default)]
pub struct SessionOutcome {
    pub peer: PeerId,
    /// Operations received from the partner.
    pub received: usize,
    /// Of those, how many the local log accepted.
    pub accepted: usize,
    /// Operations sent to the partner.
    pub sent: usize,
    /// Garbage collection run at the end of the session.
    pub gc: GcStats,
}

impl SessionRequest {
    /// Snapshot `replica` into an opening message.
    pub fn from_replica(replica: &Replica) -> Self {
        SessionRequest {
            from: PeerId::new(replica.id()),
            summary: replica.summary_snapshot(),
            ack: replica.ack_snapshot(),
        }
    }
}

/// Partner side, first step: answer an opening request.
pub fn answer(replica: &Replica, request: &SessionRequest) -> SessionReply {
    let operations = replica.operations_newer_than(&request.summary);
    trace!(
        replica = replica.id(),
        peer = %request.from,
        count = operations.len(),
        "answering session request"
    );

    SessionReply {
        from: PeerId::new(replica.id()),
        operations,
        summary: replica.summary_snapshot(),
        ack: replica.ack_snapshot(),
    }
}

/// Partner side, second step: apply the originator's operations and fold
/// in its acknowledgments.
///
/// Returns the number of accepted operations.
pub fn complete(replica: &Replica, finish: SessionFinish) -> usize {
    let accepted = replica.apply_remote_all(finish.operations);
    if let Some(ack) = finish.ack.as_ref() {
        replica.merge_ack(ack);
    }
    replica.refresh_own_ack_row();
    replica.run_garbage_collection();

    debug!(replica = replica.id(), peer = %finish.from, accepted, "session completed as partner");
    accepted
}

/// Originator side: run a whole session with `peer`.
pub async fn originate<T>(
    replica: &Replica,
    transport: &T,
    peer: &PeerId,
) -> Result<SessionOutcome, NetworkError>
where
    T: SessionTransport + ?Sized,
{
    let reply = transport
        .request(peer, SessionRequest::from_replica(replica))
        .await?;

    let received = reply.operations.len();
    let accepted = replica.apply_remote_all(reply.operations);

    let operations = replica.operations_newer_than(&reply.summary);
    let sent = operations.len();
    transport
        .finish(
            peer,
            SessionFinish {
                from: PeerId::new(replica.id()),
                operations,
                ack: replica.ack_snapshot(),
            },
        )
        .await?;

    if let Some(ack) = reply.ack.as_ref() {
        replica.merge_ack(ack);
    }
    replica.refresh_own_ack_row();
    let gc = replica.run_garbage_collection();

    debug!(replica = replica.id(), peer = %peer, received, accepted, sent, "session completed");
    Ok(SessionOutcome {
        peer: peer.clone(),
        received,
        accepted,
        sent,
        gc,
    })
}

/// [`originate`] bounded by `timeout`.
pub async fn originate_with_timeout<T>(
    replica: &Replica,
    transport: &T,
    peer: &PeerId,
    timeout: Duration,
) -> Result<SessionOutcome, NetworkError>
where
    T: SessionTransport + ?Sized,
{
    tokio::time::timeout(timeout, originate(replica, transport, peer))
        .await
        .map_err(|_| NetworkError::Timeout(peer.to_string()))?
}
