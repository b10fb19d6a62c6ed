//! Concurrent runs over one tracker converge on one item per node.

use super::{Harness, engine_with, sample_graph};
use crate::sync::{adapters::InMemorySnapshotStore, domain::HierarchyMode};
use crate::tracker::{
    adapters::InMemoryTracker,
    domain::{ItemState, LabelConfig},
};
use rstest::rstest;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const NODES: [&str; 4] = ["1", "2", "2.1", "2.2"];

fn assert_converged(harness: &Harness) {
    let duplicate = LabelConfig::default().duplicate;
    for id in NODES {
        harness.open_item(id);
        for item in harness.items_for(id) {
            if item.state == ItemState::Closed {
                assert!(item.has_label(&duplicate), "closed item {} lacks label", item.id);
                assert_eq!(harness.tracker.comments(item.id).len(), 1);
            }
        }
    }
}

#[rstest]
#[case::separate_stores(false)]
#[case::shared_store(true)]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_runs_leave_one_open_item_per_node(#[case] share_store: bool) {
    let harness = Harness::new(InMemoryTracker::new());
    let other_store = if share_store {
        Arc::clone(&harness.store)
    } else {
        Arc::new(InMemorySnapshotStore::new())
    };
    let rival = engine_with(&harness.tracker, &other_store, HierarchyMode::Native);
    let cancel = CancellationToken::new();

    let (first, second) = tokio::join!(
        harness.engine.run(sample_graph(), &cancel),
        rival.run(sample_graph(), &cancel)
    );

    let first_summary = first.expect("first run succeeds");
    let second_summary = second.expect("second run succeeds");
    assert!(first_summary.failed.is_empty());
    assert!(second_summary.failed.is_empty());
    assert_converged(&harness);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn settling_run_after_concurrent_runs_creates_nothing() {
    let harness = Harness::new(InMemoryTracker::new());
    let rival_store = Arc::new(InMemorySnapshotStore::new());
    let rival = engine_with(&harness.tracker, &rival_store, HierarchyMode::Native);
    let cancel = CancellationToken::new();
    let (first, second) = tokio::join!(
        harness.engine.run(sample_graph(), &cancel),
        rival.run(sample_graph(), &cancel)
    );
    first.expect("first run succeeds");
    second.expect("second run succeeds");
    let items = harness.tracker.items().len();

    let settled = harness
        .engine
        .run(sample_graph(), &cancel)
        .await
        .expect("settling run succeeds");

    assert!(settled.created.is_empty());
    assert!(settled.failed.is_empty());
    assert_eq!(harness.tracker.items().len(), items);
    assert_converged(&harness);
}
