//! Reconciliation tests: creation, idempotence, updates and identity.

use super::{Harness, engine_over, graph_from, node, node_id, sample_graph, sample_nodes};
use crate::sync::adapters::InMemorySnapshotStore;
use crate::sync::domain::{FailureKind, HierarchyMode, render_body};
use crate::sync::services::SyncError;
use crate::tracker::{
    adapters::{InMemoryTracker, RetryingTracker},
    domain::{ItemDraft, LabelConfig, RetryPolicy},
    ports::{TrackerClient, TrackerError},
};
use chrono::Utc;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

#[fixture]
fn harness() -> Harness {
    Harness::new(InMemoryTracker::new())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn first_run_creates_one_item_per_node(harness: Harness) {
    let summary = harness
        .engine
        .run(sample_graph(), &CancellationToken::new())
        .await
        .expect("run succeeds");

    assert_eq!(summary.created.len(), 4);
    assert!(summary.is_clean());
    assert_eq!(harness.tracker.items().len(), 4);
    for id in ["1", "2", "2.1", "2.2"] {
        harness.open_item(id);
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn created_items_carry_structural_and_blocked_labels(harness: Harness) {
    harness
        .engine
        .run(sample_graph(), &CancellationToken::new())
        .await
        .expect("run succeeds");
    let labels = LabelConfig::default();

    let setup = harness.open_item("1");
    let parser = harness.open_item("2");
    let tokenizer = harness.open_item("2.1");

    assert!(setup.has_label(&labels.leaf) && !setup.has_label(&labels.blocked));
    assert!(parser.has_label(&labels.parent) && parser.has_label(&labels.blocked));
    assert!(tokenizer.has_label(&labels.base) && !tokenizer.has_label(&labels.blocked));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rerun_without_changes_performs_no_writes(harness: Harness) {
    let cancel = CancellationToken::new();
    harness
        .engine
        .run(sample_graph(), &cancel)
        .await
        .expect("first run succeeds");
    let writes = harness.tracker.mutation_count();

    let summary = harness
        .engine
        .run(sample_graph(), &cancel)
        .await
        .expect("second run succeeds");

    assert_eq!(harness.tracker.mutation_count(), writes);
    assert_eq!(summary.unchanged.len(), 4);
    assert!(summary.created.is_empty() && summary.updated.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn changed_node_updates_item_and_keeps_foreign_labels(harness: Harness) {
    let cancel = CancellationToken::new();
    harness
        .engine
        .run(sample_graph(), &cancel)
        .await
        .expect("first run succeeds");
    let setup = harness.open_item("1");
    harness
        .tracker
        .add_label(setup.id, "customer-request")
        .await
        .expect("label added");

    let mut nodes = sample_nodes();
    if let Some(first) = nodes.first_mut() {
        *first = node("1", "Set up monorepo").with_complexity(2);
    }
    let summary = harness
        .engine
        .run(graph_from("# Parser PRD", nodes), &cancel)
        .await
        .expect("second run succeeds");

    let updated = harness.open_item("1");
    assert_eq!(summary.updated, vec![node_id("1")]);
    assert_eq!(updated.id, setup.id);
    assert_eq!(updated.title, "Set up monorepo");
    assert!(updated.has_label("customer-request"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn same_title_without_metadata_is_reported_not_adopted(harness: Harness) {
    let foreign = harness
        .tracker
        .seed_item(&ItemDraft::new("Set up repository", "Filed by hand.").expect("valid draft"))
        .expect("seed succeeds");

    let summary = harness
        .engine
        .run(sample_graph(), &CancellationToken::new())
        .await
        .expect("run succeeds");

    let failure = summary.failed.first().expect("one failure");
    assert_eq!(failure.node_id, node_id("1"));
    assert_eq!(
        failure.kind,
        FailureKind::AmbiguousIdentity {
            candidates: vec![foreign]
        }
    );
    assert!(harness.items_for("1").is_empty());
    assert_eq!(summary.created.len(), 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_graph_aborts_before_any_tracker_call(harness: Harness) {
    let graph = graph_from(
        "# Cyclic",
        [
            node("1", "First").with_dependencies([node_id("2")]),
            node("2", "Second").with_dependencies([node_id("1")]),
        ],
    );

    let result = harness.engine.run(graph, &CancellationToken::new()).await;

    assert!(matches!(result, Err(SyncError::InvalidGraph(_))));
    assert_eq!(harness.tracker.mutation_count(), 0);
    assert_eq!(harness.store.save_count(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn existing_item_is_recovered_from_metadata(harness: Harness) {
    let graph = sample_graph();
    let setup = graph.node(&node_id("1")).expect("node exists");
    let body = render_body(setup, Utc::now())
        .expect("body renders")
        .render()
        .expect("body serializes");
    let existing = harness
        .tracker
        .seed_item(&ItemDraft::new(setup.title(), body).expect("valid draft"))
        .expect("seed succeeds");

    let summary = harness
        .engine
        .run(graph, &CancellationToken::new())
        .await
        .expect("run succeeds");

    assert!(!summary.created.contains(&node_id("1")));
    assert_eq!(harness.open_item("1").id, existing);
    assert_eq!(harness.tracker.items().len(), 4);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleted_item_is_reported_missing(harness: Harness) {
    let cancel = CancellationToken::new();
    harness
        .engine
        .run(sample_graph(), &cancel)
        .await
        .expect("first run succeeds");
    let setup = harness.open_item("1");
    harness.tracker.delete_item(setup.id).expect("delete succeeds");

    let summary = harness
        .engine
        .run(sample_graph(), &cancel)
        .await
        .expect("second run succeeds");

    assert!(summary.failed.iter().any(|failure| failure.node_id == node_id("1")
        && failure.kind == FailureKind::MissingItem { item: setup.id }));
    assert_eq!(harness.tracker.items().len(), 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_node_fails_alone(harness: Harness) {
    harness
        .tracker
        .inject_failures([TrackerError::Rejected("422 validation failed".to_owned())])
        .expect("injection succeeds");

    let summary = harness
        .engine
        .run(sample_graph(), &CancellationToken::new())
        .await
        .expect("run completes");

    assert_eq!(summary.failed.len(), 1);
    assert!(matches!(
        summary.failed.first().map(|failure| &failure.kind),
        Some(FailureKind::Rejected { .. })
    ));
    assert_eq!(summary.created.len(), 3);
    assert!(summary.warnings.iter().any(|warning| warning.node_id == node_id("2")
        && warning.kind
            == FailureKind::UnresolvedDependency {
                dependency: node_id("1")
            }));
    assert!(harness.open_item("2").has_label(&LabelConfig::default().blocked));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_node_is_retried_on_resume(harness: Harness) {
    harness
        .tracker
        .inject_failures([TrackerError::Transient("502 Bad Gateway".to_owned())])
        .expect("injection succeeds");
    let cancel = CancellationToken::new();
    let first = harness
        .engine
        .run(sample_graph(), &cancel)
        .await
        .expect("run completes");

    let resumed = harness
        .engine
        .resume(first.run_id, &cancel)
        .await
        .expect("resume succeeds");

    assert_eq!(resumed.created, vec![node_id("1")]);
    assert_eq!(resumed.skipped.len(), 3);
    assert!(resumed.is_clean());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_run_stops_between_nodes(harness: Harness) {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = harness
        .engine
        .run(sample_graph(), &cancel)
        .await
        .expect("run returns");

    assert!(summary.cancelled);
    assert!(harness.tracker.items().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_one_node_and_the_run_continues() {
    let tracker = Arc::new(InMemoryTracker::new());
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(2),
        call_timeout: Duration::from_secs(5),
    };
    let retrying = Arc::new(RetryingTracker::new(Arc::clone(&tracker), policy));
    let store = Arc::new(InMemorySnapshotStore::new());
    let engine = engine_over(&retrying, &store, HierarchyMode::Native);
    // Node 1's identity lookup is the first call; every attempt at it fails.
    tracker
        .inject_failures((0..3).map(|_| TrackerError::transient("502 Bad Gateway")))
        .expect("faults queued");
    let started = Instant::now();
    let cancel = CancellationToken::new();

    let observe = async {
        // Attempts back off 100ms then 200ms; this lands in the second wait.
        sleep(Duration::from_millis(150)).await;
        tracker.mutation_count()
    };
    let (result, writes_while_backing_off) =
        tokio::join!(engine.run(sample_graph(), &cancel), observe);

    let summary = result.expect("run completes");
    assert_eq!(writes_while_backing_off, 0);
    assert!(started.elapsed() >= Duration::from_millis(300));
    let failure = summary.failed.first().expect("node 1 failed");
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(failure.node_id, node_id("1"));
    assert!(matches!(failure.kind, FailureKind::RetriesExhausted { .. }));
    assert_eq!(summary.created, vec![node_id("2"), node_id("2.1"), node_id("2.2")]);
    assert_eq!(tracker.items().len(), 3);
}
