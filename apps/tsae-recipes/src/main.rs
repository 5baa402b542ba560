//! # TSAE Recipes
//!
//! A standalone CLI recipe book built on the TSAE SDK.
//! Every replica holds a collection of recipes keyed by title; replicas
//! reconcile through timestamped anti-entropy sessions over an in-memory
//! network.
//!
//! ## Replication model
//!
//! ```text
//! create  →  Add{title, content, S:n}        logged under origin S
//! delete  →  Remove{title, created, S:m}     tombstones exactly one version
//! session →  summaries + ack matrices out, missing operations back
//! GC      →  drop what every replica has acknowledged
//! ```

use std::collections::BTreeMap;
use std::io::{self, Write};

use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;
use tsae_sdk::quick::create_cluster;
use tsae_sdk::{MemoryNetwork, MemoryTransport, NetworkConfig, Node, PeerId, StaticMembership, SyncConfig};

type RecipeNode = Node<MemoryTransport, StaticMembership>;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tsae-recipes")]
#[command(about = "Recipe book replicated with TSAE anti-entropy (TSAE SDK)")]
#[command(version)]
struct Cli {
    /// Log filter, e.g. `debug` or `tsae_sdk=trace`
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: create, session, delete, session, garbage collection
    Demo,
    /// Conflict scenario: concurrent versions of one recipe across 3 replicas
    Conflict,
    /// Network partition simulation: split, independent work, heal, full convergence
    Partition,
    /// Interactive REPL for manual experimentation
    Interactive {
        /// Comma-separated replica ids
        #[arg(long, default_value = "S1,S2,S3")]
        replicas: String,
        /// Probability that a single message is lost
        #[arg(long, default_value_t = 0.0)]
        loss: f64,
    },
}

// ─── Cluster helpers ───────────────────────────────────────────────────────

struct Cluster {
    network: MemoryNetwork,
    nodes: BTreeMap<String, RecipeNode>,
}

impl Cluster {
    fn new(ids: &[&str], network: NetworkConfig) -> tsae_sdk::Result<Self> {
        let (network, nodes) = create_cluster(ids, network, SyncConfig::default())?;
        let nodes = nodes.into_iter().map(|n| (n.id().to_string(), n)).collect();
        Ok(Self { network, nodes })
    }

    fn node(&self, id: &str) -> Option<&RecipeNode> {
        self.nodes.get(id)
    }

    fn all(&self) -> Vec<&RecipeNode> {
        self.nodes.values().collect()
    }

    /// One session from `from` to `to`, reported on the console.
    async fn session(&self, from: &str, to: &str) {
        let Some(node) = self.node(from) else {
            println!("  {} Unknown replica '{}'", "!".bright_red(), from);
            return;
        };
        match node.run_session(&PeerId::new(to)).await {
            Ok(outcome) => {
                sync_arrow(from, to, outcome.received, outcome.sent);
                if !outcome.gc.is_noop() {
                    step(&format!(
                        "{} purged {} operation(s), {} tombstone(s)",
                        from, outcome.gc.operations_purged, outcome.gc.tombstones_purged
                    ));
                }
            }
            Err(e) => sync_failed(from, to, &e.to_string()),
        }
    }

    /// Every ordered pair among `ids` runs one session.
    async fn exchange(&self, ids: &[&str]) {
        for from in ids {
            for to in ids {
                if from != to {
                    self.session(from, to).await;
                }
            }
        }
    }

    async fn exchange_all(&self) {
        let ids: Vec<String> = self.nodes.keys().cloned().collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        self.exchange(&ids).await;
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn sync_arrow(from: &str, to: &str, received: usize, sent: usize) {
    println!(
        "  {} {} {} {} {}",
        from.bright_magenta(),
        "──session──▶".bright_cyan(),
        to.bright_magenta(),
        "✓".bright_green(),
        format!("(pulled {}, pushed {})", received, sent).dimmed()
    );
}

fn sync_failed(from: &str, to: &str, error: &str) {
    println!(
        "  {} {} {} {} {}",
        from.bright_magenta(),
        "──session──▶".bright_cyan(),
        to.bright_magenta(),
        "✗".bright_red(),
        error.dimmed()
    );
}

fn show_replica(node: &RecipeNode) {
    let border = "─".repeat(52);
    let replica = node.replica();
    println!("  ┌{}┐", border);
    println!(
        "  │ {:^50} │",
        format!("Replica: {}", replica.id()).bright_yellow().to_string()
    );
    println!("  ├{}┤", border);

    let documents = replica.documents();
    if documents.is_empty() {
        println!("  │ {:^50} │", "(no recipes)".dimmed().to_string());
    } else {
        for doc in &documents {
            let line = format!("{:<12} = {:<22} ({})", doc.title, doc.content, doc.timestamp);
            println!("  │ {:<50} │", line);
        }
    }

    println!("  ├{}┤", border);
    println!("  │ {:<50} │", format!("summary    {}", replica.summary_snapshot()));
    println!(
        "  │ {:<50} │",
        format!(
            "log        {} op(s), {} tombstone(s)",
            replica.log_len(),
            replica.tombstone_count()
        )
    );
    println!("  └{}┘", border);
}

fn convergence_check(nodes: &[&RecipeNode]) -> bool {
    if nodes.len() < 2 {
        return true;
    }
    let base = nodes[0].replica();
    nodes[1..].iter().all(|n| {
        n.replica().documents() == base.documents() && n.replica().summary_snapshot() == base.summary_snapshot()
    })
}

fn convergence_result(converged: bool) {
    if converged {
        println!(
            "\n  {} {}",
            "✓".bright_green().bold(),
            "ALL REPLICAS CONVERGED: recipes and summaries are identical!"
                .bright_green()
                .bold()
        );
    } else {
        println!(
            "\n  {} {}",
            "✗".bright_red().bold(),
            "DIVERGENCE DETECTED: replicas differ!".bright_red().bold()
        );
    }
}

fn history_report(nodes: &[&RecipeNode]) {
    for node in nodes {
        step(&format!(
            "{}: {} logged operation(s), {} tombstone(s)",
            node.id(),
            node.replica().log_len(),
            node.replica().tombstone_count()
        ));
    }
}

// ─── Demo ──────────────────────────────────────────────────────────────────

async fn run_demo() -> tsae_sdk::Result<()> {
    header("DEMO: Create, Session, Delete, Garbage Collection");
    let cluster = Cluster::new(&["S1", "S2"], NetworkConfig::perfect())?;
    let nodes = cluster.all();
    let (s1, s2) = (nodes[0], nodes[1]);

    section("Phase 1: S1 writes a recipe");
    if let Some(ts) = s1.add_document("Paella", "rice, saffron").await {
        step(&format!("S1: create Paella at {}", ts));
    }
    show_replica(s1);
    show_replica(s2);

    section("Phase 2: S1 opens a session with S2");
    cluster.session("S1", "S2").await;
    show_replica(s2);

    section("Phase 3: S2 deletes the recipe, S1 pulls the removal");
    if let Some(ts) = s2.remove_document("Paella").await {
        step(&format!("S2: remove Paella at {}", ts));
    }
    cluster.session("S1", "S2").await;
    show_replica(s1);
    show_replica(s2);
    convergence_result(convergence_check(&[s1, s2]));

    section("Phase 4: acknowledgments spread, history is collected");
    cluster.session("S2", "S1").await;
    history_report(&[s1, s2]);
    Ok(())
}

// ─── Conflict ──────────────────────────────────────────────────────────────

async fn run_conflict() -> tsae_sdk::Result<()> {
    header("CONFLICT: Concurrent Versions, Merge-Order Independence");
    let cluster = Cluster::new(&["node-1", "node-2", "node-3"], NetworkConfig::perfect())?;
    let nodes = cluster.all();

    section("Phase 1: three replicas write the same recipe concurrently");
    nodes[0].add_document("Paella", "valenciana").await;
    step("node-1: Paella = valenciana");
    nodes[1].add_document("Paella", "marisco").await;
    nodes[1].add_document("Tortilla", "eggs, potato").await;
    step("node-2: Paella = marisco, Tortilla = eggs, potato");
    nodes[2].add_document("Paella", "negra").await;
    step("node-3: Paella = negra");

    section("Pre-session (diverged)");
    for node in &nodes {
        show_replica(node);
    }

    section("Phase 2: sessions in different orders");
    cluster.session("node-1", "node-2").await;
    cluster.session("node-3", "node-2").await;
    cluster.session("node-2", "node-1").await;
    cluster.session("node-1", "node-3").await;
    cluster.exchange_all().await;

    convergence_result(convergence_check(&nodes));
    if let Some(doc) = nodes[0].document("Paella") {
        step(&format!(
            "Paella = {} from {} at {} (latest version wins on every replica)",
            doc.content, doc.author, doc.timestamp
        ));
    }

    section("Phase 3: removing the winning version reveals a concurrent one");
    nodes[0].remove_document("Paella").await;
    if let Some(doc) = nodes[0].document("Paella") {
        step(&format!("node-1 now shows Paella = {} from {}", doc.content, doc.author));
    }
    cluster.exchange_all().await;
    convergence_result(convergence_check(&nodes));

    section("Phase 4: idempotence, repeating a session changes nothing");
    let before = nodes[0].replica().documents();
    cluster.session("node-1", "node-2").await;
    cluster.session("node-1", "node-2").await;
    if nodes[0].replica().documents() == before {
        step("Idempotent ✓  documents unchanged after duplicate sessions");
    } else {
        step("IDEMPOTENCE FAILURE ✗");
    }
    history_report(&nodes);
    Ok(())
}

// ─── Partition ─────────────────────────────────────────────────────────────

async fn run_partition() -> tsae_sdk::Result<()> {
    header("PARTITION: Network Split, Independent Work, Heal & Converge");
    let east = ["east-1", "east-2"];
    let west = ["west-1", "west-2"];
    let cluster = Cluster::new(&["east-1", "east-2", "west-1", "west-2"], NetworkConfig::perfect())?;

    section("Phase 1: shared baseline");
    if let Some(node) = cluster.node("east-1") {
        node.add_document("Paella", "rice, saffron").await;
    }
    cluster.exchange_all().await;
    step("Baseline: Paella synced to all 4 replicas");

    section("Phase 2: NETWORK PARTITION");
    println!(
        "  {}   {}",
        "╔══════════════════╗".bright_blue(),
        "╔══════════════════╗".bright_red()
    );
    println!(
        "  {}   {}",
        "║  EAST DC         ║".bright_blue(),
        "║  WEST DC         ║".bright_red()
    );
    println!(
        "  {}   {}",
        "║  east-1, east-2  ║".bright_blue(),
        "║  west-1, west-2  ║".bright_red()
    );
    println!(
        "  {}   {}",
        "╚══════════════════╝".bright_blue(),
        "╚══════════════════╝".bright_red()
    );
    println!("  {}", "         ╳╳╳ PARTITION ╳╳╳".bright_red().bold());

    let east_ids: Vec<PeerId> = east.iter().map(|id| PeerId::new(*id)).collect();
    let west_ids: Vec<PeerId> = west.iter().map(|id| PeerId::new(*id)).collect();
    cluster.network.split(&east_ids, &west_ids);

    if let Some(node) = cluster.node("east-1") {
        node.add_document("Paella", "rice, saffron, rosemary").await;
    }
    if let Some(node) = cluster.node("east-2") {
        node.add_document("Gazpacho", "tomato, cucumber").await;
    }
    cluster.exchange(&east).await;
    step("East: east-1 writes a new Paella version; east-2 adds Gazpacho");

    if let Some(node) = cluster.node("west-1") {
        node.remove_document("Paella").await;
    }
    if let Some(node) = cluster.node("west-2") {
        node.add_document("Tortilla", "eggs, potato").await;
    }
    cluster.exchange(&west).await;
    step("West: west-1 deletes the baseline Paella; west-2 adds Tortilla");

    section("Pre-heal state");
    if let (Some(e), Some(w)) = (cluster.node("east-1"), cluster.node("west-1")) {
        show_replica(e);
        show_replica(w);
    }
    step("Cross-partition sessions fail:");
    cluster.session("east-1", "west-1").await;

    section("Phase 3: PARTITION HEALS");
    println!("  {}", "         ════ HEALED ════".bright_green().bold());
    cluster.network.heal_all();
    cluster.exchange_all().await;
    cluster.exchange_all().await;

    section("Phase 4: Post-heal state");
    if let (Some(e), Some(w)) = (cluster.node("east-1"), cluster.node("west-1")) {
        show_replica(e);
        show_replica(w);
    }
    convergence_result(convergence_check(&cluster.all()));
    step("The west deletion removed only the baseline version; east's rewrite survives");
    history_report(&cluster.all());
    Ok(())
}

// ─── Interactive REPL ──────────────────────────────────────────────────────

fn usage(text: &str) {
    println!("  {} Usage: {}", "!".bright_red(), text);
}

fn run_interactive(rt: &tokio::runtime::Runtime, replicas: &str, loss: f64) -> tsae_sdk::Result<()> {
    header("INTERACTIVE REPL: TSAE Recipe Book");

    let ids: Vec<&str> = replicas.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let cluster = Cluster::new(&ids, NetworkConfig::lossy(loss))?;
    step(&format!("Replicas: {}", ids.join(", ")));

    println!();
    println!("  {}", "Commands:".bold().underline());
    println!("    {} <r> <title> <content...>   Create a recipe", "add".bright_cyan());
    println!("    {} <r> <title>                Delete the current version", "del".bright_cyan());
    println!("    {} <from> <to>            Run one session", "session".bright_cyan());
    println!("    {} <r>                      Sessions with random partners", "round".bright_cyan());
    println!("    {}                          Every pair runs a session", "gossip".bright_cyan());
    println!("    {} <r>                       Show replica state", "show".bright_cyan());
    println!("    {} <r>                       Dump recipes as JSON", "json".bright_cyan());
    println!("    {}                          Show all replicas", "list".bright_cyan());
    println!("    {}                         Check convergence", "check".bright_cyan());
    println!("    {} <a> <b> / {}             Sever a link / restore all", "cut".bright_cyan(), "heal".bright_cyan());
    println!("    {}                          Exit", "quit".bright_cyan());
    println!();

    loop {
        print!("{}", "tsae> ".bright_cyan().bold());
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() || input.is_empty() {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "add" | "a" => {
                if parts.len() < 4 {
                    usage("add <replica> <title> <content...>");
                    continue;
                }
                match cluster.node(parts[1]) {
                    Some(node) => {
                        let content = parts[3..].join(" ");
                        if let Some(ts) = rt.block_on(node.add_document(parts[2], content)) {
                            step(&format!("{}: created {} at {}", parts[1], parts[2], ts));
                        }
                    }
                    None => println!("  {} Unknown replica '{}'", "!".bright_red(), parts[1]),
                }
            }

            "del" | "d" => {
                if parts.len() < 3 {
                    usage("del <replica> <title>");
                    continue;
                }
                match cluster.node(parts[1]) {
                    Some(node) => match rt.block_on(node.remove_document(parts[2])) {
                        Some(ts) => step(&format!("{}: removed {} at {}", parts[1], parts[2], ts)),
                        None => println!("  {} '{}' not found on {}", "!".bright_yellow(), parts[2], parts[1]),
                    },
                    None => println!("  {} Unknown replica '{}'", "!".bright_red(), parts[1]),
                }
            }

            "session" | "s" => {
                if parts.len() < 3 {
                    usage("session <from> <to>");
                    continue;
                }
                rt.block_on(cluster.session(parts[1], parts[2]));
            }

            "round" | "r" => {
                if parts.len() < 2 {
                    usage("round <replica>");
                    continue;
                }
                match cluster.node(parts[1]) {
                    Some(node) => {
                        for result in rt.block_on(node.run_round()) {
                            match result {
                                Ok(outcome) => sync_arrow(parts[1], outcome.peer.as_str(), outcome.received, outcome.sent),
                                Err(e) => println!("  {} {}", "✗".bright_red(), e),
                            }
                        }
                    }
                    None => println!("  {} Unknown replica '{}'", "!".bright_red(), parts[1]),
                }
            }

            "gossip" | "g" => rt.block_on(cluster.exchange_all()),

            "show" => {
                if parts.len() < 2 {
                    usage("show <replica>");
                    continue;
                }
                match cluster.node(parts[1]) {
                    Some(node) => show_replica(node),
                    None => println!("  {} Unknown replica '{}'", "!".bright_red(), parts[1]),
                }
            }

            "json" => {
                if parts.len() < 2 {
                    usage("json <replica>");
                    continue;
                }
                match cluster.node(parts[1]) {
                    Some(node) => match serde_json::to_string_pretty(&node.documents()) {
                        Ok(json) => println!("{}", json),
                        Err(e) => println!("  {} {}", "!".bright_red(), e),
                    },
                    None => println!("  {} Unknown replica '{}'", "!".bright_red(), parts[1]),
                }
            }

            "list" | "ls" => {
                for node in cluster.all() {
                    show_replica(node);
                }
            }

            "check" => convergence_result(convergence_check(&cluster.all())),

            "cut" => {
                if parts.len() < 3 {
                    usage("cut <a> <b>");
                    continue;
                }
                cluster
                    .network
                    .partition(&PeerId::new(parts[1]), &PeerId::new(parts[2]));
                step(&format!("Link {} ╳ {} severed", parts[1], parts[2]));
            }

            "heal" => {
                cluster.network.heal_all();
                step("All links restored");
            }

            "quit" | "exit" | "q" => {
                println!("  {}", "Goodbye!".dimmed());
                break;
            }

            "help" | "h" | "?" => {
                println!("  add <r> <t> <c..> | del <r> <t> | session <a> <b> | round <r>");
                println!("  gossip | show <r> | json <r> | list | check | cut <a> <b> | heal | quit");
            }

            other => {
                println!("  {} Unknown command '{}', type 'help'", "?".bright_yellow(), other);
            }
        }
    }
    Ok(())
}

// ─── Entry point ───────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Demo => rt.block_on(run_demo())?,
        Commands::Conflict => rt.block_on(run_conflict())?,
        Commands::Partition => rt.block_on(run_partition())?,
        Commands::Interactive { replicas, loss } => run_interactive(&rt, &replicas, loss)?,
    }
    Ok(())
}
