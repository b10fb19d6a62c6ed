//! Shared world state for graph synchronisation BDD scenarios.

use std::sync::Arc;

use eyre::WrapErr;
use plansync::{
    graph::domain::{ContentHash, NodeId, TaskGraph, decode_graph},
    sync::{
        adapters::InMemorySnapshotStore,
        domain::{HierarchyMode, RunId, RunSummary, SyncConfig},
        services::{BreakdownOutcome, HierarchyLinker, SyncEngine, SyncError},
    },
    tracker::{
        adapters::InMemoryTracker,
        domain::{ItemBody, TrackerItem},
    },
};
use mockable::DefaultClock;
use rstest::fixture;

/// Producer output used by every scenario.
pub const PARSER_PLAN: &str = include_str!("../fixtures/parser_plan.json");

/// Engine type used by the BDD world.
pub type TestEngine = SyncEngine<InMemoryTracker, InMemorySnapshotStore, DefaultClock>;

/// Scenario world for graph synchronisation behaviour tests.
pub struct SyncWorld {
    pub tracker: Arc<InMemoryTracker>,
    pub engine: TestEngine,
    pub graph: Option<TaskGraph>,
    pub run_id: Option<RunId>,
    pub writes_before: usize,
    pub last_sync: Option<Result<RunSummary, SyncError>>,
    pub last_breakdown: Option<BreakdownOutcome>,
}

impl SyncWorld {
    /// Creates a world over an empty tracker and snapshot store.
    #[must_use]
    pub fn new() -> Self {
        let tracker = Arc::new(InMemoryTracker::new());
        let store = Arc::new(InMemorySnapshotStore::new());
        let config = SyncConfig::default();
        let linker = HierarchyLinker::for_mode(HierarchyMode::Native, &tracker);
        let engine = SyncEngine::new(
            Arc::clone(&tracker),
            store,
            Arc::new(DefaultClock),
            &config,
            linker,
        );
        Self {
            tracker,
            engine,
            graph: None,
            run_id: None,
            writes_before: 0,
            last_sync: None,
            last_breakdown: None,
        }
    }

    /// Decodes the parser plan as the planner would hand it over.
    pub fn load_plan(&mut self) -> Result<(), eyre::Report> {
        let hash = ContentHash::of(b"# Parser PRD");
        self.graph = Some(decode_graph(PARSER_PLAN, hash).wrap_err("decode parser plan")?);
        Ok(())
    }

    /// Returns the planned graph.
    pub fn graph(&self) -> Result<TaskGraph, eyre::Report> {
        self.graph
            .clone()
            .ok_or_else(|| eyre::eyre!("missing planned graph in scenario world"))
    }

    /// Returns the run the scenario is working with.
    pub fn run_id(&self) -> Result<RunId, eyre::Report> {
        self.run_id
            .ok_or_else(|| eyre::eyre!("no run recorded in scenario world"))
    }

    /// Returns the node identifiers of the run's latest snapshot.
    pub fn run_nodes(&self) -> Result<Vec<NodeId>, eyre::Report> {
        let (state, _) = run_async(self.engine.snapshots().replay(self.run_id()?))
            .wrap_err("replay run snapshot")?;
        Ok(state
            .graph
            .nodes()
            .iter()
            .map(|node| node.id().clone())
            .collect())
    }

    /// Returns the items whose metadata names `node`.
    #[must_use]
    pub fn items_for(&self, node: &NodeId) -> Vec<TrackerItem> {
        self.tracker
            .items()
            .into_iter()
            .filter(|item| {
                ItemBody::parse(&item.body)
                    .ok()
                    .and_then(|body| body.metadata().map(|meta| meta.node_id == *node))
                    .unwrap_or(false)
            })
            .collect()
    }
}

impl Default for SyncWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> SyncWorld {
    SyncWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Parses a node identifier captured from a step.
pub fn node_id(value: &str) -> Result<NodeId, eyre::Report> {
    NodeId::new(value).wrap_err_with(|| format!("invalid node id {value}"))
}
