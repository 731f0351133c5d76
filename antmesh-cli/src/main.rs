//! Antmesh CLI - run and inspect pheromone routing experiments

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use antmesh_core::{ForwardingPolicy, ProtocolConfig};
use antmesh_sim::{DelayModel, EngineEvent, SimConfig, SimEngine, SimReport, TopologyKind};

#[derive(Parser)]
#[command(name = "antmesh")]
#[command(about = "Antmesh - pheromone-adaptive query routing simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and print the outcome report
    Sim {
        /// Load the full simulation config from a JSON file; other flags are
        /// ignored when set
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of nodes
        #[arg(short, long, default_value = "50")]
        nodes: usize,

        /// Overlay shape (ring, grid, mesh, random, small_world, scale_free)
        #[arg(short, long, default_value = "small_world")]
        topology: String,

        /// Number of searches to schedule
        #[arg(short, long, default_value = "20")]
        searches: u64,

        /// Virtual time between scheduled searches
        #[arg(long, default_value = "10")]
        interval: u64,

        /// Forwarding policy (flood, greedy)
        #[arg(short, long, default_value = "flood")]
        policy: String,

        /// Reinforcement scale q1
        #[arg(long, default_value_t = antmesh_core::DEFAULT_Q1)]
        q1: f64,

        /// Reinforcement exponent coefficient q2
        #[arg(long, default_value_t = antmesh_core::DEFAULT_Q2)]
        q2: f64,

        /// Evaporation rate in [0, 1)
        #[arg(long, default_value_t = antmesh_core::DEFAULT_EVAPORATION)]
        evaporation: f64,

        /// TTL-decrement pheromone bound
        #[arg(long, default_value_t = antmesh_core::DEFAULT_LOW_BOUND)]
        low_bound: f64,

        /// TTL-increment pheromone bound
        #[arg(long, default_value_t = antmesh_core::DEFAULT_HIGH_BOUND)]
        high_bound: f64,

        /// Greedy exploration threshold
        #[arg(long, default_value_t = antmesh_core::DEFAULT_ALPHA)]
        alpha: f64,

        /// Starting probe TTL
        #[arg(long, default_value_t = antmesh_core::DEFAULT_INITIAL_TTL)]
        ttl: i32,

        /// Resource universe size (defaults to the node count)
        #[arg(long)]
        universe: Option<u64>,

        /// Maximum randomly assigned resources per node
        #[arg(long, default_value = "2")]
        max_resources: usize,

        /// Minimum per-hop delay in virtual time units
        #[arg(long, default_value = "1")]
        min_delay: u64,

        /// Maximum per-hop delay in virtual time units
        #[arg(long, default_value = "1")]
        max_delay: u64,

        /// RNG seed; a seed fully determines the run
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Pace the run at one delivery per this many milliseconds,
        /// streaming events as they happen
        #[arg(long)]
        pace_ms: Option<u64>,

        /// Print the report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Build an overlay and print its shape statistics
    Topology {
        /// Number of nodes
        #[arg(short, long, default_value = "50")]
        nodes: usize,

        /// Overlay shape (ring, grid, mesh, random, small_world, scale_free)
        #[arg(short, long, default_value = "small_world")]
        topology: String,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Sim {
            config,
            nodes,
            topology,
            searches,
            interval,
            policy,
            q1,
            q2,
            evaporation,
            low_bound,
            high_bound,
            alpha,
            ttl,
            universe,
            max_resources,
            min_delay,
            max_delay,
            seed,
            pace_ms,
            json,
        } => {
            let sim_config = match config {
                Some(path) => load_config(&path)?,
                None => SimConfig {
                    nodes,
                    topology: topology.parse::<TopologyKind>()?,
                    protocol: ProtocolConfig {
                        q1,
                        q2,
                        evaporation,
                        low_bound,
                        high_bound,
                        alpha,
                        initial_ttl: ttl,
                        policy: parse_policy(&policy)?,
                    },
                    delay: if min_delay == max_delay {
                        DelayModel::Fixed(min_delay)
                    } else {
                        DelayModel::Uniform {
                            min: min_delay,
                            max: max_delay,
                        }
                    },
                    resource_universe: universe.unwrap_or(nodes as u64),
                    max_resources_per_node: max_resources,
                    searches,
                    search_interval: interval,
                    seed,
                    ..Default::default()
                },
            };

            let report = run_sim(sim_config, pace_ms).await?;
            print_report(&report, json)?;
        }

        Commands::Topology {
            nodes,
            topology,
            seed,
        } => {
            let kind = topology.parse::<TopologyKind>()?;
            let config = SimConfig {
                nodes,
                topology: kind,
                seed,
                searches: 0,
                ..Default::default()
            };
            let engine = SimEngine::new(config)?;
            let overlay = engine.overlay();

            println!("Overlay: {:?}", kind);
            println!("  nodes:      {}", overlay.node_count());
            println!("  edges:      {}", overlay.edge_count());
            println!("  avg degree: {:.2}", overlay.avg_degree());
        }
    }

    Ok(())
}

fn parse_policy(s: &str) -> Result<ForwardingPolicy> {
    match s.to_lowercase().as_str() {
        "flood" => Ok(ForwardingPolicy::Flood),
        "greedy" => Ok(ForwardingPolicy::Greedy),
        other => anyhow::bail!("unknown forwarding policy: {other}"),
    }
}

fn load_config(path: &PathBuf) -> Result<SimConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config = serde_json::from_str(&raw)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    Ok(config)
}

async fn run_sim(config: SimConfig, pace_ms: Option<u64>) -> Result<SimReport> {
    let mut engine = SimEngine::new(config)?;
    engine.schedule_workload()?;

    let report = match pace_ms {
        Some(ms) => {
            // Stream events while the paced run progresses
            let mut events = engine.take_events().expect("events taken once");
            let printer = tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    match event {
                        EngineEvent::SearchStarted {
                            origin, query, ..
                        } => info!(%origin, %query, "search started"),
                        EngineEvent::Hit {
                            node, path_len, ..
                        } => info!(%node, path_len, "hit"),
                        EngineEvent::SearchFailed { query, .. } => {
                            info!(%query, "search failed")
                        }
                        EngineEvent::RunCompleted { .. } => break,
                    }
                }
            });

            let report = engine.run_paced(Duration::from_millis(ms)).await?;
            drop(engine);
            let _ = printer.await;
            report
        }
        None => engine.run_to_completion()?,
    };

    Ok(report)
}

fn print_report(report: &SimReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Run finished at virtual time {}", report.virtual_time);
    println!("  nodes / edges:    {} / {}", report.nodes, report.edges);
    println!("  searches:         {}", report.stats.searches);
    println!(
        "  succeeded/failed: {} / {}",
        report.stats.searches - report.stats.failed_searches,
        report.stats.failed_searches
    );
    println!("  success rate:     {:.1}%", report.success_rate() * 100.0);
    println!("  hits:             {}", report.stats.hits);
    println!("  deliveries:       {}", report.stats.deliveries);
    println!("  forwards:         {}", report.stats.forwards);
    println!(
        "  drops (loop/ttl): {} / {}",
        report.stats.loop_drops, report.stats.ttl_drops
    );
    if let (Some(min), Some(mean), Some(max)) = (
        report.hit_path_min,
        report.hit_path_mean,
        report.hit_path_max,
    ) {
        println!("  hit path length:  min {min} / mean {mean:.2} / max {max}");
    }
    if report.truncated {
        println!("  note: run stopped at the delivery guard");
    }

    Ok(())
}
