//! Then steps for graph synchronisation BDD scenarios.

use super::world::{SyncWorld, node_id};
use plansync::{
    sync::services::SyncError,
    tracker::domain::{ItemState, LabelConfig, TrackerItem},
};
use rstest_bdd_macros::then;

fn open_item(world: &SyncWorld, node: &str) -> Result<TrackerItem, eyre::Report> {
    let id = node_id(node)?;
    let open: Vec<TrackerItem> = world
        .items_for(&id)
        .into_iter()
        .filter(|item| item.state == ItemState::Open)
        .collect();
    match open.as_slice() {
        [item] => Ok(item.clone()),
        items => Err(eyre::eyre!(
            "expected one open item for node {node}, found {}",
            items.len()
        )),
    }
}

#[then("every node has exactly one open item")]
fn one_open_item_per_node(world: &SyncWorld) -> Result<(), eyre::Report> {
    for id in world.run_nodes()? {
        open_item(world, id.as_str())?;
    }
    Ok(())
}

#[then(r#"node "{node}" is labelled blocked"#)]
fn node_is_blocked(world: &SyncWorld, node: String) -> Result<(), eyre::Report> {
    let item = open_item(world, &node)?;
    if !item.has_label(&LabelConfig::default().blocked) {
        return Err(eyre::eyre!("expected node {node} to be blocked"));
    }
    Ok(())
}

#[then(r#"node "{node}" is not labelled blocked"#)]
fn node_is_not_blocked(world: &SyncWorld, node: String) -> Result<(), eyre::Report> {
    let item = open_item(world, &node)?;
    if item.has_label(&LabelConfig::default().blocked) {
        return Err(eyre::eyre!("expected node {node} to be unblocked"));
    }
    Ok(())
}

#[then("the last sync made no tracker writes")]
fn no_tracker_writes(world: &SyncWorld) -> Result<(), eyre::Report> {
    let writes = world
        .tracker
        .mutation_count()
        .saturating_sub(world.writes_before);
    if writes != 0 {
        return Err(eyre::eyre!("expected no tracker writes, found {writes}"));
    }
    Ok(())
}

#[then("the last sync reported {count:usize} unchanged nodes")]
fn unchanged_nodes(world: &SyncWorld, count: usize) -> Result<(), eyre::Report> {
    let summary = world
        .last_sync
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing sync result in scenario world"))?
        .as_ref()
        .map_err(|err| eyre::eyre!("unexpected sync failure: {err}"))?;
    if summary.unchanged.len() != count {
        return Err(eyre::eyre!(
            "expected {count} unchanged nodes, got {:?}",
            summary.unchanged
        ));
    }
    Ok(())
}

#[then("the sync aborts with a resumable error")]
fn sync_aborted(world: &SyncWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_sync
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing sync result in scenario world"))?;
    if !matches!(result, Err(SyncError::Fatal { .. })) {
        return Err(eyre::eyre!("expected a fatal run error, got {result:?}"));
    }
    Ok(())
}

#[then("the tracker holds {count:usize} items")]
fn tracker_item_count(world: &SyncWorld, count: usize) -> Result<(), eyre::Report> {
    let found = world.tracker.items().len();
    if found != count {
        return Err(eyre::eyre!("expected {count} tracker items, found {found}"));
    }
    Ok(())
}

#[then("the breakdown produced {count:usize} nodes")]
fn breakdown_produced(world: &SyncWorld, count: usize) -> Result<(), eyre::Report> {
    let outcome = world
        .last_breakdown
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing breakdown outcome in scenario world"))?;
    if !outcome.expanded || outcome.produced.len() != count {
        return Err(eyre::eyre!(
            "expected {count} produced nodes, got {:?}",
            outcome.produced
        ));
    }
    Ok(())
}
