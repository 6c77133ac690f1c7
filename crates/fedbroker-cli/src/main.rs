//! # Fedbroker CLI Entry Point
//!
//! Main binary for the fedbroker federated request broker. Provides the
//! command-line interface for starting brokers, worker and client stubs, and
//! a one-process simulation of a whole node.
//!
//! ## Usage
//!
//! ```bash
//! # Start a broker named "alpha" peered with "beta" and "gamma"
//! fedbroker broker alpha beta gamma
//!
//! # Attach an echo worker to alpha's local backend
//! fedbroker worker alpha
//!
//! # Attach a burst client to alpha's local frontend
//! fedbroker client alpha
//!
//! # Run alpha with its own workers and clients in one process
//! fedbroker sim alpha beta --workers 5 --clients 10
//! ```
//!
//! All processes sharing a federation must agree on `--runtime-dir`, the
//! directory where every node's sockets live (default: the system temp
//! directory). Stop any command with ctrl-c; brokers tear down in order,
//! releasing queued worker identities before exiting.

use std::time::Duration;

use anyhow::Result;
use argh::FromArgs;
use tokio_util::sync::CancellationToken;

use fedbroker_core::{Broker, BrokerConfig};
use fedbroker_sim::{BurstClient, ClientConfig, EchoWorker, WorkerConfig};

/// Main CLI structure parsed from command-line arguments.
#[derive(FromArgs)]
/// fedbroker - federated request broker
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

/// Available CLI subcommands.
///
/// - **Broker**: run a broker node
/// - **Worker**: run an echo worker stub
/// - **Client**: run a burst client stub
/// - **Sim**: run a broker plus its workers and clients in one process
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Broker(BrokerArgs),
    Worker(WorkerArgs),
    Client(ClientArgs),
    Sim(SimArgs),
}

/// Arguments for running a broker node.
#[derive(FromArgs)]
#[argh(subcommand, name = "broker")]
/// start a broker node
struct BrokerArgs {
    /// this broker's own name
    #[argh(positional)]
    name: String,

    /// names of the peer brokers in the federation
    #[argh(positional)]
    peers: Vec<String>,

    /// directory holding every node's socket files
    ///
    /// All processes in a federation must agree on this. Defaults to the
    /// system temp directory.
    #[argh(option, long = "runtime-dir")]
    runtime_dir: Option<String>,

    /// readiness-wait timeout in milliseconds while workers are idle
    #[argh(option, long = "heartbeat-ms", default = "1000")]
    heartbeat_ms: u64,
}

/// Arguments for running an echo worker stub.
#[derive(FromArgs)]
#[argh(subcommand, name = "worker")]
/// start an echo worker attached to a broker
struct WorkerArgs {
    /// name of the broker to serve
    #[argh(positional)]
    broker: String,

    /// directory holding every node's socket files
    #[argh(option, long = "runtime-dir")]
    runtime_dir: Option<String>,

    /// upper bound on simulated busy time per job, in milliseconds
    #[argh(option, long = "busy-max-ms", default = "1000")]
    busy_max_ms: u64,
}

/// Arguments for running a burst client stub.
#[derive(FromArgs)]
#[argh(subcommand, name = "client")]
/// start a burst client attached to a broker
struct ClientArgs {
    /// name of the broker to send requests to
    #[argh(positional)]
    broker: String,

    /// directory holding every node's socket files
    #[argh(option, long = "runtime-dir")]
    runtime_dir: Option<String>,

    /// upper bound on the idle pause between bursts, in milliseconds
    #[argh(option, long = "idle-max-ms", default = "5000")]
    idle_max_ms: u64,

    /// upper bound on requests per burst
    #[argh(option, long = "burst-max", default = "15")]
    burst_max: u32,

    /// per-reply deadline in milliseconds before the task counts as lost
    #[argh(option, long = "reply-deadline-ms", default = "10000")]
    reply_deadline_ms: u64,
}

/// Arguments for the one-process simulation.
///
/// Starts a broker and spawns its workers and clients as concurrent tasks in
/// the same process, which is the quickest way to watch a federation work:
/// run one `sim` per node name, all sharing a runtime directory.
#[derive(FromArgs)]
#[argh(subcommand, name = "sim")]
/// run a broker with local workers and clients in one process
struct SimArgs {
    /// this broker's own name
    #[argh(positional)]
    name: String,

    /// names of the peer brokers in the federation
    #[argh(positional)]
    peers: Vec<String>,

    /// number of echo workers to spawn
    #[argh(option, long = "workers", default = "5")]
    workers: u32,

    /// number of burst clients to spawn
    #[argh(option, long = "clients", default = "10")]
    clients: u32,

    /// directory holding every node's socket files
    #[argh(option, long = "runtime-dir")]
    runtime_dir: Option<String>,
}

fn broker_config(
    name: &str,
    peers: &[String],
    runtime_dir: &Option<String>,
    heartbeat_ms: u64,
) -> BrokerConfig {
    let mut config = BrokerConfig::new(name)
        .with_peers(peers.to_vec())
        .with_heartbeat(Duration::from_millis(heartbeat_ms));
    if let Some(dir) = runtime_dir {
        config = config.with_runtime_dir(dir);
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Default to INFO, but let RUST_LOG override.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("caught interrupt, shutting down");
            interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Broker(args) => {
            if args.peers.is_empty() {
                println!("syntax: fedbroker broker <name> <peer>…");
                return Ok(());
            }
            let config = broker_config(&args.name, &args.peers, &args.runtime_dir, args.heartbeat_ms);
            let broker = Broker::bind(config, cancel.clone()).await?;
            broker.run().await?;
            Ok(())
        }
        Commands::Worker(args) => {
            let mut config = WorkerConfig::new(&args.broker)
                .with_busy_max(Duration::from_millis(args.busy_max_ms));
            if let Some(dir) = &args.runtime_dir {
                config = config.with_runtime_dir(dir);
            }
            EchoWorker::new(config, cancel.clone()).run().await?;
            Ok(())
        }
        Commands::Client(args) => {
            let mut config = ClientConfig::new(&args.broker)
                .with_idle_max(Duration::from_millis(args.idle_max_ms))
                .with_burst_max(args.burst_max)
                .with_reply_deadline(Duration::from_millis(args.reply_deadline_ms));
            if let Some(dir) = &args.runtime_dir {
                config = config.with_runtime_dir(dir);
            }
            BurstClient::new(config, cancel.clone()).run().await?;
            Ok(())
        }
        Commands::Sim(args) => run_sim(args, cancel).await,
    }
}

/// Executes the `sim` subcommand: one broker plus its worker and client
/// actors, all cooperating through the transport alone.
async fn run_sim(args: SimArgs, cancel: CancellationToken) -> Result<()> {
    if args.peers.is_empty() {
        println!("syntax: fedbroker sim <name> <peer>…");
        return Ok(());
    }

    let config = broker_config(&args.name, &args.peers, &args.runtime_dir, 1000);
    let runtime_dir = config.runtime_dir.clone();
    let broker = Broker::bind(config, cancel.clone()).await?;

    let mut actors = Vec::new();
    for n in 0..args.workers {
        let config = WorkerConfig::new(&args.name).with_runtime_dir(&runtime_dir);
        let worker = EchoWorker::new(config, cancel.clone());
        actors.push(tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                tracing::error!("worker {} stopped: {}", n, e);
            }
        }));
    }
    for n in 0..args.clients {
        let config = ClientConfig::new(&args.name).with_runtime_dir(&runtime_dir);
        let client = BurstClient::new(config, cancel.clone());
        actors.push(tokio::spawn(async move {
            if let Err(e) = client.run().await {
                tracing::error!("client {} stopped: {}", n, e);
            }
        }));
    }

    let result = broker.run().await;

    // The broker is down; take the actors with it.
    cancel.cancel();
    for actor in actors {
        let _ = actor.await;
    }

    result?;
    Ok(())
}
