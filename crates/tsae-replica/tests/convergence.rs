//! Convergence tests for TSAE replicas
//!
//! These tests verify that replicas converge when operations are exchanged
//! through pull-based sessions, including duplicated, reordered and
//! partially delivered batches, and that garbage collection only drops
//! history every replica has seen.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tsae_core::{Document, Operation, Timestamp};
use tsae_replica::{Replica, ReplicaConfig};

const PARTICIPANTS: [&str; 3] = ["S1", "S2", "S3"];

fn cluster(n: usize) -> Vec<Replica> {
    let ids = &PARTICIPANTS[..n];
    ids.iter().map(|id| Replica::new(*id, ids.iter().copied())).collect()
}

/// One full anti-entropy session between `a` and `b`.
fn session(a: &Replica, b: &Replica) {
    let (a_summary, a_ack) = (a.summary_snapshot(), a.ack_snapshot());
    let (b_summary, b_ack) = (b.summary_snapshot(), b.ack_snapshot());

    b.apply_remote_all(a.operations_newer_than(&b_summary));
    a.apply_remote_all(b.operations_newer_than(&a_summary));

    if let Some(ack) = b_ack {
        a.merge_ack(&ack);
    }
    if let Some(ack) = a_ack {
        b.merge_ack(&ack);
    }
    a.refresh_own_ack_row();
    b.refresh_own_ack_row();
    a.run_garbage_collection();
    b.run_garbage_collection();
}

fn full_round(replicas: &[Replica]) {
    for i in 0..replicas.len() {
        for j in 0..replicas.len() {
            if i != j {
                session(&replicas[i], &replicas[j]);
            }
        }
    }
}

fn assert_converged(replicas: &[Replica]) {
    let reference = &replicas[0];
    for other in &replicas[1..] {
        assert_eq!(reference.documents(), other.documents(), "views differ");
        assert_eq!(
            reference.summary_snapshot(),
            other.summary_snapshot(),
            "summaries differ"
        );
    }
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[test]
fn test_paella_scenario() {
    let s1 = Replica::new("S1", ["S1", "S2"]);
    let s2 = Replica::new("S2", ["S1", "S2"]);

    s1.create_local("Paella", "rice, saffron, seafood");
    let log = s1.log_snapshot();
    assert_eq!(log.sublog("S1").unwrap().len(), 1);
    assert_eq!(s1.summary_snapshot().seq_of("S1"), 0);

    let pulled = s1.operations_newer_than(&s2.summary_snapshot());
    assert_eq!(pulled.len(), 1);
    assert_eq!(pulled[0].timestamp(), &Timestamp::new("S1", 0));
    assert!(s2.apply_remote(pulled[0].clone()));
    assert!(s2.contains("Paella"));
    assert_eq!(s2.summary_snapshot().seq_of("S1"), 0);

    assert_eq!(s1.delete_local("Paella"), Some(Timestamp::new("S1", 1)));
    assert_eq!(s1.log_len(), 2);
    assert!(s1.is_tombstoned(&Timestamp::new("S1", 0)));
    let tomb = &s1.tombstones()[0];
    assert_eq!(tomb.removed, Timestamp::new("S1", 1));

    let pulled = s1.operations_newer_than(&s2.summary_snapshot());
    assert_eq!(pulled.len(), 1);
    assert!(matches!(pulled[0], Operation::Remove { .. }));
    assert!(s2.apply_remote(pulled[0].clone()));
    assert!(!s2.contains("Paella"));
    assert_eq!(s2.tombstones(), s1.tombstones());

    // Neither side has the other's acknowledgment yet.
    assert!(s1.run_garbage_collection().is_noop());
    assert!(s2.run_garbage_collection().is_noop());

    let s1_ack = s1.ack_snapshot().unwrap();
    let s2_ack = s2.ack_snapshot().unwrap();
    s1.merge_ack(&s2_ack);
    s2.merge_ack(&s1_ack);

    let gc1 = s1.run_garbage_collection();
    let gc2 = s2.run_garbage_collection();
    assert_eq!(gc1.operations_purged, 2);
    assert_eq!(gc2.operations_purged, 2);
    assert_eq!(gc1.tombstones_purged, 1);
    assert_eq!(gc2.tombstones_purged, 1);
    assert_eq!(s1.log_len(), 0);
    assert_eq!(s2.log_len(), 0);
    assert_eq!(s1.tombstone_count(), 0);
    assert_eq!(s2.tombstone_count(), 0);
}

// ============================================================================
// Idempotence and commutativity
// ============================================================================

#[test]
fn test_applying_twice_is_idempotent() {
    let s1 = Replica::new("S1", ["S1", "S2"]);
    let s2 = Replica::new("S2", ["S1", "S2"]);
    s1.create_local("Tortilla", "eggs, potatoes");
    s1.delete_local("Tortilla");
    let ops = s1.operations_newer_than(&s2.summary_snapshot());

    assert_eq!(s2.apply_remote_all(ops.clone()), 2);
    let once = (s2.documents(), s2.log_snapshot(), s2.tombstones());

    for _ in 0..3 {
        assert_eq!(s2.apply_remote_all(ops.clone()), 0);
    }
    assert_eq!((s2.documents(), s2.log_snapshot(), s2.tombstones()), once);
}

#[test]
fn test_cross_origin_order_commutes() {
    let s1 = Replica::new("S1", PARTICIPANTS);
    let s2 = Replica::new("S2", PARTICIPANTS);
    s1.create_local("Gazpacho", "tomato");
    s2.create_local("Gazpacho", "cucumber");
    s2.create_local("Fideua", "noodles");

    let empty = Replica::new("S3", PARTICIPANTS).summary_snapshot();
    let from_s1 = s1.operations_newer_than(&empty);
    let from_s2 = s2.operations_newer_than(&empty);

    let ab = Replica::new("S3", PARTICIPANTS);
    ab.apply_remote_all(from_s1.iter().chain(&from_s2).cloned());
    let ba = Replica::new("S3", PARTICIPANTS);
    ba.apply_remote_all(from_s2.iter().chain(&from_s1).cloned());

    assert_eq!(ab.documents(), ba.documents());
    assert_eq!(ab.log_snapshot(), ba.log_snapshot());
    assert_eq!(ab.document("Gazpacho").unwrap().author, "S2");
}

#[test]
fn test_out_of_order_delivery_is_rejected_then_retried() {
    let s1 = Replica::new("S1", ["S1", "S2"]);
    let s2 = Replica::new("S2", ["S1", "S2"]);
    for i in 0..3 {
        s1.create_local(format!("doc-{}", i), "x");
    }
    let mut ops = s1.operations_newer_than(&s2.summary_snapshot());
    ops.reverse();

    // Only the first operation in reversed order is deliverable.
    assert_eq!(s2.apply_remote_all(ops.clone()), 1);
    assert_eq!(s2.summary_snapshot().seq_of("S1"), 0);

    let retry = s1.operations_newer_than(&s2.summary_snapshot());
    assert_eq!(s2.apply_remote_all(retry), 2);
    assert_eq!(s2.titles(), vec!["doc-0", "doc-1", "doc-2"]);
}

// ============================================================================
// Tombstones
// ============================================================================

#[test]
fn test_remove_wins_in_any_order() {
    let created = Timestamp::new("S1", 0);
    let add = Operation::add(Document::new("Paella", "rice", created.clone()));
    let remove = Operation::remove("Paella", created.clone(), Timestamp::new("S2", 0));

    let add_first = Replica::new("S3", PARTICIPANTS);
    assert!(add_first.apply_remote(add.clone()));
    assert!(add_first.apply_remote(remove.clone()));

    let remove_first = Replica::new("S3", PARTICIPANTS);
    assert!(remove_first.apply_remote(remove));
    assert!(remove_first.apply_remote(add));

    assert!(!add_first.contains("Paella"));
    assert!(!remove_first.contains("Paella"));
    assert_eq!(add_first.tombstones(), remove_first.tombstones());
}

#[test]
fn test_new_version_after_removal_is_visible() {
    let s1 = Replica::new("S1", ["S1", "S2"]);
    let s2 = Replica::new("S2", ["S1", "S2"]);

    s1.create_local("Paella", "v1");
    s1.delete_local("Paella");
    s1.create_local("Paella", "v2");

    s2.apply_remote_all(s1.operations_newer_than(&s2.summary_snapshot()));
    let doc = s2.document("Paella").unwrap();
    assert_eq!(doc.content, "v2");
    assert_eq!(doc.timestamp, Timestamp::new("S1", 2));
    assert!(s2.is_tombstoned(&Timestamp::new("S1", 0)));
}

#[test]
fn test_recreate_then_delete_is_absent_everywhere() {
    let s1 = Replica::new("S1", ["S1", "S2"]);
    let s2 = Replica::new("S2", ["S1", "S2"]);

    s1.create_local("Paella", "v1");
    s2.apply_remote_all(s1.operations_newer_than(&s2.summary_snapshot()));
    s1.create_local("Paella", "v2");
    s1.delete_local("Paella");
    assert!(!s1.contains("Paella"));

    s2.apply_remote_all(s1.operations_newer_than(&s2.summary_snapshot()));
    assert!(!s2.contains("Paella"));
    assert_eq!(s2.documents(), s1.documents());
    assert_eq!(s2.shadowed_count(), 0);
}

#[test]
fn test_late_tombstoned_add_converges_across_orders() {
    let s1 = Replica::new("S1", PARTICIPANTS);
    let s2 = Replica::new("S2", PARTICIPANTS);

    // S2 removes S1's second version of the title.
    s1.create_local("Flan", "v1");
    s1.create_local("Flan", "v2");
    s2.apply_remote_all(s1.operations_newer_than(&s2.summary_snapshot()));
    s2.delete_local("Flan");
    assert!(!s2.contains("Flan"));

    let empty = Replica::new("S3", PARTICIPANTS).summary_snapshot();
    let from_s1 = s1.operations_newer_than(&empty);
    let from_s2: Vec<Operation> = s2
        .operations_newer_than(&empty)
        .into_iter()
        .filter(|op| op.origin() == "S2")
        .collect();

    let in_order = Replica::new("S3", PARTICIPANTS);
    in_order.apply_remote_all(from_s1.iter().chain(&from_s2).cloned());

    // The removal lands between the two adds.
    let remove_early = Replica::new("S3", PARTICIPANTS);
    remove_early.apply_remote(from_s1[0].clone());
    remove_early.apply_remote_all(from_s2.iter().cloned());
    remove_early.apply_remote(from_s1[1].clone());

    assert!(!in_order.contains("Flan"));
    assert!(!remove_early.contains("Flan"));
    assert_eq!(in_order.documents(), remove_early.documents());
    assert_eq!(in_order.tombstones(), remove_early.tombstones());
}

#[test]
fn test_removing_one_concurrent_version_converges_across_orders() {
    let s1 = Replica::new("S1", PARTICIPANTS);
    let s2 = Replica::new("S2", PARTICIPANTS);
    s1.create_local("Flan", "s1");
    s2.create_local("Flan", "s2");

    // S2 saw both concurrent versions and removes its own, the visible one.
    s2.apply_remote_all(s1.operations_newer_than(&s2.summary_snapshot()));
    assert_eq!(s2.document("Flan").unwrap().content, "s2");
    s2.delete_local("Flan");

    let empty = Replica::new("S3", PARTICIPANTS).summary_snapshot();
    let from_s1 = s1.operations_newer_than(&empty);
    let from_s2: Vec<Operation> = s2
        .operations_newer_than(&empty)
        .into_iter()
        .filter(|op| op.origin() == "S2")
        .collect();

    let a = Replica::new("S3", PARTICIPANTS);
    a.apply_remote_all(from_s1.iter().chain(&from_s2).cloned());
    let b = Replica::new("S3", PARTICIPANTS);
    b.apply_remote_all(from_s2.iter().chain(&from_s1).cloned());

    assert_eq!(a.documents(), b.documents());
    assert_eq!(a.document("Flan").unwrap().content, "s1");
    assert_eq!(s2.document("Flan").unwrap().content, "s1");
}

// ============================================================================
// Garbage collection
// ============================================================================

#[test]
fn test_gc_waits_for_every_replica() {
    let replicas = cluster(3);
    replicas[0].create_local("Churros", "flour");

    // Only S1 and S2 exchange; S3 has not acknowledged anything.
    session(&replicas[0], &replicas[1]);
    session(&replicas[1], &replicas[0]);
    assert_eq!(replicas[0].log_len(), 1);
    assert_eq!(replicas[1].log_len(), 1);

    full_round(&replicas);
    full_round(&replicas);
    for replica in &replicas {
        assert_eq!(replica.log_len(), 0);
        assert!(replica.contains("Churros"));
    }
}

#[test]
fn test_gc_floor_is_respected() {
    let replicas = cluster(3);
    for i in 0..5 {
        replicas[i % 3].create_local(format!("doc-{}", i), "x");
    }
    full_round(&replicas);
    replicas[2].create_local("late", "y");
    session(&replicas[2], &replicas[0]);

    for replica in &replicas {
        let floor = replica.ack_snapshot().unwrap().min_summary();
        for op in replica.log_snapshot().iter() {
            assert!(op.timestamp().seq() > floor.seq_of(op.origin()));
        }
    }
}

#[test]
fn test_gc_disabled_replica_keeps_log() {
    let s1 = Replica::with_config("S1", ["S1", "S2"], ReplicaConfig::without_gc());
    let s2 = Replica::with_config("S2", ["S1", "S2"], ReplicaConfig::without_gc());
    s1.create_local("Croquetas", "ham");
    for _ in 0..3 {
        session(&s1, &s2);
    }

    assert!(s1.ack_snapshot().is_none());
    assert_eq!(s1.log_len(), 1);
    assert_eq!(s2.log_len(), 1);
    assert!(s2.contains("Croquetas"));
}

// ============================================================================
// Randomized gossip
// ============================================================================

/// Deliver a shuffled, possibly truncated, batch from `from` to `to`.
fn lossy_pull(rng: &mut StdRng, from: &Replica, to: &Replica) {
    let mut ops = from.operations_newer_than(&to.summary_snapshot());
    ops.shuffle(rng);
    let keep = rng.gen_range(0..=ops.len());
    ops.truncate(keep);
    to.apply_remote_all(ops);
}

#[test]
fn test_random_gossip_converges() {
    let titles = ["Paella", "Gazpacho", "Tortilla", "Flan"];

    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let replicas = cluster(3);

        for _ in 0..60 {
            let idx = rng.gen_range(0..replicas.len());
            let title = titles[rng.gen_range(0..titles.len())];
            match rng.gen_range(0..4) {
                0 | 1 => {
                    replicas[idx].create_local(title, format!("{}-{}", idx, rng.gen::<u16>()));
                }
                2 => {
                    replicas[idx].delete_local(title);
                }
                _ => {
                    let other = (idx + rng.gen_range(1..replicas.len())) % replicas.len();
                    lossy_pull(&mut rng, &replicas[other], &replicas[idx]);
                }
            }
        }

        for _ in 0..4 {
            full_round(&replicas);
        }

        assert_converged(&replicas);
        for replica in &replicas {
            assert_eq!(replica.log_len(), 0, "seed {} left history behind", seed);
            assert_eq!(replica.tombstone_count(), 0, "seed {} left tombstones", seed);
        }
    }
}
