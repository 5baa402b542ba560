use async_stream::stream;
use futures::stream::Stream;
use futures::stream::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tsae_sdk::quick::create_cluster;
use tsae_sdk::{MemoryNetwork, MemoryTransport, NetworkConfig, Node, PeerId, Result, StaticMembership, SyncConfig};

type StressNode = Node<MemoryTransport, StaticMembership>;

/// Upper bound on gossip passes before a run is declared stuck.
const MAX_PASSES: usize = 2_000;

/// Statistics collected during stress testing
#[derive(Clone, Debug)]
pub struct StressTestStats {
    pub num_replicas: usize,
    pub operations_per_replica: usize,
    pub loss_rate: f64,
    pub sessions: usize,
    pub failed_sessions: usize,
    pub passes_to_converge: usize,
    pub passes_to_quiesce: usize,
    pub converged: bool,
    pub residual_log: usize,
    pub residual_tombstones: usize,
    pub documents: usize,
    pub total_time: Duration,
    pub avg_session_time: Duration,
    pub ops_per_second: f64,
}

impl StressTestStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Stress Test Statistics                        ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Number of Replicas:        {:>30} ║", self.num_replicas);
        println!("║  Operations per Replica:    {:>30} ║", self.operations_per_replica);
        println!("║  Message Loss Rate:         {:>30} ║", format!("{:.0}%", self.loss_rate * 100.0));
        println!("║  Sessions (failed):         {:>30} ║", format!("{} ({})", self.sessions, self.failed_sessions));
        println!("║  Passes to Converge:        {:>30} ║", self.passes_to_converge);
        println!("║  Passes to Quiesce:         {:>30} ║", self.passes_to_quiesce);
        println!("║  Converged:                 {:>30} ║", if self.converged { "yes" } else { "NO" });
        println!("║  Visible Documents:         {:>30} ║", self.documents);
        println!("║  Residual Log / Tombstones: {:>30} ║", format!("{} / {}", self.residual_log, self.residual_tombstones));
        println!("║  Total Time:                {:>29}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("║  Average Session Time:      {:>28}µs ║", self.avg_session_time.as_micros());
        println!("║  Operations/Second:         {:>30.0} ║", self.ops_per_second);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// A local mutation issued by the workload.
#[derive(Clone, Debug)]
enum LocalOp {
    Create { title: String, content: String },
    Delete { title: String },
}

/// Generator of local mutations for one replica.
///
/// Titles are drawn from a small shared pool so that replicas overwrite and
/// delete each other's documents.
fn workload_generator(replica: usize, ops: usize, seed: u64) -> impl Stream<Item = LocalOp> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed ^ ((replica as u64) << 32));
        for i in 0..ops {
            let title = format!("recipe-{}", rng.gen_range(0..ops.max(4) / 2));
            if rng.gen_bool(0.3) {
                yield LocalOp::Delete { title };
            } else {
                yield LocalOp::Create { title, content: format!("draft {} from replica {}", i, replica) };
            }
        }
    }
}

/// Generator that yields replica indices for session patterns
fn session_generator(num_replicas: usize, num_sessions: usize, seed: u64) -> impl Stream<Item = (usize, usize)> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..num_sessions {
            let originator = rng.gen_range(0..num_replicas);
            let partner = rng.gen_range(0..num_replicas);
            yield (originator, partner);
        }
    }
}

fn build_cluster(num_replicas: usize, network: NetworkConfig) -> Result<(MemoryNetwork, Vec<StressNode>)> {
    let ids: Vec<String> = (0..num_replicas).map(|i| format!("replica-{}", i)).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    create_cluster(&refs, network, SyncConfig::default())
}

fn is_converged(nodes: &[StressNode]) -> bool {
    let first = &nodes[0];
    let summary = first.replica().summary_snapshot();
    let documents = first.documents();
    nodes[1..]
        .iter()
        .all(|n| n.replica().summary_snapshot() == summary && n.documents() == documents)
}

fn residual(nodes: &[StressNode]) -> (usize, usize) {
    nodes.iter().fold((0, 0), |(log, tombstones), n| {
        (log + n.replica().log_len(), tombstones + n.replica().tombstone_count())
    })
}

#[derive(Default)]
struct SessionCounters {
    sessions: usize,
    failed: usize,
    times: Vec<Duration>,
}

impl SessionCounters {
    async fn run(&mut self, from: &StressNode, to: &StressNode) {
        let start = Instant::now();
        let result = from.run_session(&PeerId::new(to.id())).await;
        self.times.push(start.elapsed());
        self.sessions += 1;
        if result.is_err() {
            self.failed += 1;
        }
    }

    /// One pass: every replica runs a session with every other replica.
    async fn full_pass(&mut self, nodes: &[StressNode]) {
        for a in nodes {
            for b in nodes {
                if a.id() != b.id() {
                    self.run(a, b).await;
                }
            }
        }
    }

    fn average(&self) -> Duration {
        if self.times.is_empty() {
            Duration::ZERO
        } else {
            self.times.iter().sum::<Duration>() / self.times.len() as u32
        }
    }
}

/// Apply every replica's workload concurrently, gossiping in between.
async fn run_workload(nodes: &Arc<Vec<StressNode>>, ops_per_replica: usize, seed: u64) {
    let mut handles = vec![];
    for idx in 0..nodes.len() {
        let nodes = Arc::clone(nodes);
        handles.push(tokio::spawn(async move {
            let node = &nodes[idx];
            let mut workload = Box::pin(workload_generator(idx, ops_per_replica, seed));
            let mut issued = 0;
            while let Some(op) = workload.next().await {
                match op {
                    LocalOp::Create { title, content } => {
                        node.add_document(title, content).await;
                    }
                    LocalOp::Delete { title } => {
                        node.remove_document(&title).await;
                    }
                }
                issued += 1;
                if issued % 10 == 0 {
                    node.run_round().await;
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
}

/// Gossip stress test: concurrent writers, random sessions over a lossy
/// network, then full passes until every log and tombstone set is empty.
pub async fn stress_test_gossip(
    num_replicas: usize,
    ops_per_replica: usize,
    num_sessions: usize,
    loss_rate: f64,
    seed: u64,
) -> Result<StressTestStats> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        TSAE Gossip Stress Test                             ║");
    println!(
        "║  Replicas: {} | Ops/Replica: {} | Sessions: {} | Loss: {:.0}% ",
        num_replicas,
        ops_per_replica,
        num_sessions,
        loss_rate * 100.0
    );
    println!("╚════════════════════════════════════════════════════════════╝");

    let start = Instant::now();
    let (_network, nodes) = build_cluster(num_replicas, NetworkConfig::lossy(loss_rate))?;
    let nodes = Arc::new(nodes);

    println!("\n[Phase 1/3] Concurrent writers with background rounds...");
    run_workload(&nodes, ops_per_replica, seed).await;
    println!("[Phase 1/3] ✓ Completed");

    println!("[Phase 2/3] Random sessions...");
    let mut counters = SessionCounters::default();
    let mut pairs = Box::pin(session_generator(num_replicas, num_sessions, seed));
    while let Some((a, b)) = pairs.next().await {
        if a == b {
            continue;
        }
        counters.run(&nodes[a], &nodes[b]).await;
        if counters.sessions % 100 == 0 {
            println!("  Sessions completed: {}/{}", counters.sessions, num_sessions);
        }
    }
    println!("[Phase 2/3] ✓ Completed");

    println!("[Phase 3/3] Full passes until convergence and quiescence...");
    let mut passes_to_converge = 0;
    while !is_converged(&nodes) && passes_to_converge < MAX_PASSES {
        counters.full_pass(&nodes).await;
        passes_to_converge += 1;
    }
    let converged = is_converged(&nodes);

    let mut passes_to_quiesce = passes_to_converge;
    while residual(&nodes) != (0, 0) && passes_to_quiesce < MAX_PASSES {
        counters.full_pass(&nodes).await;
        passes_to_quiesce += 1;
    }
    let (residual_log, residual_tombstones) = residual(&nodes);
    debug!(passes_to_converge, passes_to_quiesce, "gossip finished");
    println!("[Phase 3/3] ✓ Completed");

    let total_time = start.elapsed();
    let total_operations = num_replicas * ops_per_replica + counters.sessions;

    Ok(StressTestStats {
        num_replicas,
        operations_per_replica: ops_per_replica,
        loss_rate,
        sessions: counters.sessions,
        failed_sessions: counters.failed,
        passes_to_converge,
        passes_to_quiesce,
        converged,
        residual_log,
        residual_tombstones,
        documents: nodes[0].documents().len(),
        total_time,
        avg_session_time: counters.average(),
        ops_per_second: total_operations as f64 / total_time.as_secs_f64(),
    })
}

/// Partition stress test: two halves write independently, then the
/// network heals and the halves reconcile.
pub async fn stress_test_partition(num_replicas: usize, ops_per_replica: usize, seed: u64) -> Result<StressTestStats> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        TSAE Partition Stress Test                          ║");
    println!("║  Replicas: {} | Ops/Replica: {} ", num_replicas, ops_per_replica);
    println!("╚════════════════════════════════════════════════════════════╝");

    let start = Instant::now();
    let (network, nodes) = build_cluster(num_replicas, NetworkConfig::perfect())?;
    let nodes = Arc::new(nodes);

    let peers: Vec<PeerId> = nodes.iter().map(|n| PeerId::new(n.id())).collect();
    let (left, right) = peers.split_at(num_replicas / 2);
    network.split(left, right);

    println!("\n[Phase 1/2] Writing on both sides of the partition...");
    run_workload(&nodes, ops_per_replica, seed).await;
    let mut counters = SessionCounters::default();
    counters.full_pass(&nodes).await;
    let (stuck_log, _) = residual(&nodes);
    info!(stuck_log, "operations held back by the partition");
    println!("[Phase 1/2] ✓ Completed ({} operations awaiting acknowledgment)", stuck_log);

    println!("[Phase 2/2] Healing and reconciling...");
    network.heal_all();
    let mut passes_to_converge = 0;
    while !is_converged(&nodes) && passes_to_converge < MAX_PASSES {
        counters.full_pass(&nodes).await;
        passes_to_converge += 1;
    }
    let converged = is_converged(&nodes);
    let mut passes_to_quiesce = passes_to_converge;
    while residual(&nodes) != (0, 0) && passes_to_quiesce < MAX_PASSES {
        counters.full_pass(&nodes).await;
        passes_to_quiesce += 1;
    }
    let (residual_log, residual_tombstones) = residual(&nodes);
    println!("[Phase 2/2] ✓ Completed");

    let total_time = start.elapsed();
    let total_operations = num_replicas * ops_per_replica + counters.sessions;

    Ok(StressTestStats {
        num_replicas,
        operations_per_replica: ops_per_replica,
        loss_rate: 0.0,
        sessions: counters.sessions,
        failed_sessions: counters.failed,
        passes_to_converge,
        passes_to_quiesce,
        converged,
        residual_log,
        residual_tombstones,
        documents: nodes[0].documents().len(),
        total_time,
        avg_session_time: counters.average(),
        ops_per_second: total_operations as f64 / total_time.as_secs_f64(),
    })
}

/// Gossip cost as the cluster grows
pub async fn stress_test_scaling(max_replicas: usize, step_size: usize) -> Result<()> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║      Scaling Analysis - Sessions vs Replicas               ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut current_replicas = step_size.max(2);
    while current_replicas <= max_replicas {
        let stats = stress_test_gossip(current_replicas, 20, current_replicas * 20, 0.1, current_replicas as u64).await?;
        stats.print();
        current_replicas += step_size;
    }
    Ok(())
}
