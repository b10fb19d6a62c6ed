//! Mirrors a planner's task graph into an issue tracker.
//!
//! Usage:
//!
//! ```text
//! plansync [--config plansync.toml] sync --prd docs/prd.md
//! plansync replay --run-id <uuid>
//! plansync sweep --run-id <uuid>
//! plansync closed --run-id <uuid> --item 42
//! plansync breakdown --run-id <uuid> --node 3 --depth 1 --threshold 5 [--force] [--even-split]
//! ```
//!
//! Every command prints a JSON report on standard output. Logs go to standard
//! error and are filtered with `RUST_LOG` (default `plansync=info`).
//!
//! Exit status is 0 on success, 2 when the run finished with failed nodes and
//! 1 when the command itself failed.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use mockable::DefaultClock;
use plansync::config::{ConfigError, DEFAULT_CONFIG_FILE, FileConfig, TrackerKind};
use plansync::graph::{
    adapters::{CommandGraphProducer, EvenSplitExpander},
    domain::{GraphDomainError, NodeId},
    ports::{GraphProducer, ProduceRequest, ProducerError},
};
use plansync::sync::{
    adapters::FsSnapshotStore,
    domain::{RunId, SyncDomainError},
    services::{BreakdownError, BreakdownRequest, HierarchyLinker, SyncEngine, SyncError},
};
use plansync::tracker::{
    adapters::{GitHubTracker, InMemoryTracker, RetryingTracker},
    domain::{ItemId, TrackerDomainError},
    ports::{NativeHierarchy, TrackerClient, TrackerError},
};
use serde::Serialize;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "plansync",
    about = "Synchronise a planner's task graph with an issue tracker",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Produce a graph from a requirements document and sync it.
    Sync {
        /// Requirements document.
        #[arg(long)]
        prd: Utf8PathBuf,
    },
    /// Resume an interrupted run from its latest snapshot.
    Replay {
        /// Run to resume.
        #[arg(long)]
        run_id: String,
    },
    /// Re-evaluate blocked labels for every node of a run.
    Sweep {
        /// Run whose graph to sweep.
        #[arg(long)]
        run_id: String,
    },
    /// Re-evaluate the dependents of an item that was just closed.
    Closed {
        /// Run whose graph holds the item.
        #[arg(long)]
        run_id: String,
        /// Closed item number.
        #[arg(long)]
        item: u64,
    },
    /// Break one node down into a bounded sub-graph and sync the new nodes.
    Breakdown {
        /// Run whose graph holds the node.
        #[arg(long)]
        run_id: String,
        /// Node to break down.
        #[arg(long)]
        node: String,
        /// Maximum levels generated below the node.
        #[arg(long, default_value_t = 1)]
        depth: u32,
        /// Leaves above this complexity are split further.
        #[arg(long)]
        threshold: Option<u32>,
        /// Re-expand even if the node was expanded with the same arguments.
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Split complexity evenly instead of invoking the planner.
        #[arg(long, default_value_t = false)]
        even_split: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("tracker.repository must be set for the github tracker")]
    MissingRepository,
    #[error("environment variable {0} holding the tracker token is not set")]
    MissingToken(String),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Producer(#[from] ProducerError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Breakdown(#[from] BreakdownError),
    #[error("failed to write report: {0}")]
    Output(#[source] std::io::Error),
}

impl From<SyncDomainError> for CliError {
    fn from(err: SyncDomainError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<GraphDomainError> for CliError {
    fn from(err: GraphDomainError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<TrackerDomainError> for CliError {
    fn from(err: TrackerDomainError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

/// Whether the command finished with node-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Clean,
    Degraded,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "plansync=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(Outcome::Clean) => ExitCode::SUCCESS,
        Ok(Outcome::Degraded) => ExitCode::from(2),
        Err(err) => {
            if let CliError::Sync(SyncError::Fatal { run_id, .. }) = &err {
                warn!(%run_id, "run can be resumed with `plansync replay --run-id {run_id}`");
            }
            error!(%err, "plansync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome, CliError> {
    let (config_path, required) = cli
        .config
        .map_or_else(|| (Utf8PathBuf::from(DEFAULT_CONFIG_FILE), false), |path| (path, true));
    let config = FileConfig::load(&config_path, required)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current node");
            on_signal.cancel();
        }
    });

    match config.tracker.kind {
        TrackerKind::Github => {
            let repository = config
                .tracker
                .repository
                .clone()
                .ok_or(CliError::MissingRepository)?;
            let token = std::env::var(&config.tracker.token_env)
                .map_err(|_| CliError::MissingToken(config.tracker.token_env.clone()))?;
            let github = GitHubTracker::new(
                &config.tracker.api_base,
                repository,
                token,
                config.retry.call_timeout,
            )?;
            let tracker = Arc::new(RetryingTracker::new(Arc::new(github), config.retry));
            dispatch(cli.command, tracker, &config, &cancel).await
        }
        TrackerKind::Memory => {
            warn!("using the in-memory tracker; nothing is written to a real tracker");
            let tracker = Arc::new(InMemoryTracker::with_native_hierarchy());
            dispatch(cli.command, tracker, &config, &cancel).await
        }
    }
}

async fn dispatch<T>(
    command: Command,
    tracker: Arc<T>,
    config: &FileConfig,
    cancel: &CancellationToken,
) -> Result<Outcome, CliError>
where
    T: TrackerClient + NativeHierarchy + 'static,
{
    let sync_config = config.sync_config();
    let linker = HierarchyLinker::for_mode(sync_config.hierarchy, &tracker);
    let store = Arc::new(FsSnapshotStore::new(config.snapshots.directory.clone()));
    let engine = SyncEngine::new(
        tracker,
        store,
        Arc::new(DefaultClock),
        &sync_config,
        linker,
    );
    let producer = CommandGraphProducer::new(
        config.producer.program.clone(),
        config.producer.args.iter().cloned(),
    );

    match command {
        Command::Sync { prd } => {
            let graph = producer
                .produce(&ProduceRequest {
                    source_path: prd,
                    complexity_threshold: config.producer.complexity_threshold,
                    max_depth: config.producer.max_depth,
                })
                .await?;
            let summary = engine.run(graph, cancel).await?;
            report(&summary)?;
            Ok(outcome(summary.is_clean()))
        }
        Command::Replay { run_id } => {
            let summary = engine.resume(RunId::parse(&run_id)?, cancel).await?;
            report(&summary)?;
            Ok(outcome(summary.is_clean()))
        }
        Command::Sweep { run_id } => {
            let sweep = engine.sweep(RunId::parse(&run_id)?).await?;
            report(&sweep)?;
            Ok(outcome(sweep.is_clean()))
        }
        Command::Closed { run_id, item } => {
            let sweep = engine
                .item_closed(RunId::parse(&run_id)?, ItemId::new(item)?)
                .await?;
            report(&sweep)?;
            Ok(outcome(sweep.is_clean()))
        }
        Command::Breakdown {
            run_id,
            node,
            depth,
            threshold,
            force,
            even_split,
        } => {
            let request = BreakdownRequest {
                run_id: RunId::parse(&run_id)?,
                node_id: NodeId::new(node)?,
                depth_limit: depth,
                complexity_threshold: threshold.unwrap_or(config.producer.complexity_threshold),
                force,
            };
            let result = if even_split {
                engine.expand(&request, &EvenSplitExpander::new(), cancel).await?
            } else {
                engine.expand(&request, &producer, cancel).await?
            };
            report(&result)?;
            Ok(outcome(result.summary.as_ref().is_none_or(|summary| summary.is_clean())))
        }
    }
}

const fn outcome(clean: bool) -> Outcome {
    if clean { Outcome::Clean } else { Outcome::Degraded }
}

fn report<R: Serialize>(value: &R) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)
        .map_err(|err| CliError::Output(std::io::Error::other(err)))?;
    writeln!(stdout).map_err(CliError::Output)
}
