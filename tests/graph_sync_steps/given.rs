//! Given steps for graph synchronisation BDD scenarios.

use super::world::{SyncWorld, run_async};
use eyre::WrapErr;
use plansync::tracker::ports::TrackerError;
use rstest_bdd_macros::given;
use tokio_util::sync::CancellationToken;

#[given("the planner produced the parser plan")]
fn planner_produced_plan(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    world.load_plan()
}

#[given("the graph has been synced")]
fn graph_already_synced(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let graph = world.graph()?;
    let summary = run_async(world.engine.run(graph, &CancellationToken::new()))
        .wrap_err("initial sync")?;
    world.run_id = Some(summary.run_id);
    Ok(())
}

#[given("the tracker rejects credentials after {writes:usize} writes")]
fn tracker_outage(world: &mut SyncWorld, writes: usize) -> Result<(), eyre::Report> {
    world
        .tracker
        .fail_after_mutations(
            writes,
            TrackerError::Unauthorized("token revoked".to_owned()),
        )
        .wrap_err("schedule tracker outage")
}
