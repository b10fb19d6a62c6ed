//! When steps for graph synchronisation BDD scenarios.

use super::world::{SyncWorld, node_id, run_async};
use eyre::WrapErr;
use plansync::{
    graph::adapters::EvenSplitExpander,
    sync::services::{BreakdownRequest, SyncError},
    tracker::domain::ItemState,
};
use rstest_bdd_macros::when;
use tokio_util::sync::CancellationToken;

#[when("the graph is synced")]
fn sync_graph(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let graph = world.graph()?;
    world.writes_before = world.tracker.mutation_count();
    let result = run_async(world.engine.run(graph, &CancellationToken::new()));
    match &result {
        Ok(summary) => world.run_id = Some(summary.run_id),
        Err(SyncError::Fatal { run_id, .. }) => world.run_id = Some(*run_id),
        Err(_) => {}
    }
    world.last_sync = Some(result);
    Ok(())
}

#[when(r#"the item for node "{node}" is closed"#)]
fn close_node_item(world: &mut SyncWorld, node: String) -> Result<(), eyre::Report> {
    let id = node_id(&node)?;
    let item = world
        .items_for(&id)
        .into_iter()
        .next()
        .ok_or_else(|| eyre::eyre!("no item for node {node}"))?;
    world
        .tracker
        .set_state(item.id, ItemState::Closed)
        .wrap_err("close item")?;
    run_async(world.engine.item_closed(world.run_id()?, item.id)).wrap_err("evaluate dependents")?;
    Ok(())
}

#[when("the tracker recovers and the run is resumed")]
fn resume_run(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    world.tracker.restore().wrap_err("end tracker outage")?;
    let result = run_async(
        world
            .engine
            .resume(world.run_id()?, &CancellationToken::new()),
    );
    world.last_sync = Some(result);
    Ok(())
}

#[when(r#"node "{node}" is broken down to depth {depth:u32} with threshold {threshold:u32}"#)]
fn break_down_node(
    world: &mut SyncWorld,
    node: String,
    depth: u32,
    threshold: u32,
) -> Result<(), eyre::Report> {
    let request = BreakdownRequest {
        run_id: world.run_id()?,
        node_id: node_id(&node)?,
        depth_limit: depth,
        complexity_threshold: threshold,
        force: false,
    };
    let outcome = run_async(world.engine.expand(
        &request,
        &EvenSplitExpander::new(),
        &CancellationToken::new(),
    ))
    .wrap_err("break down node")?;
    world.last_breakdown = Some(outcome);
    Ok(())
}
