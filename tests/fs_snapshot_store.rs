//! Integration tests for the filesystem snapshot store.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Duration, Utc};
use mockable::DefaultClock;
use plansync::{
    graph::domain::{ContentHash, TaskGraph, decode_graph},
    sync::{
        adapters::FsSnapshotStore,
        domain::{HierarchyMode, IdentityMapping, RunId, RunState, Snapshot, SyncConfig},
        ports::{SnapshotStore, SnapshotStoreError},
        services::{HierarchyLinker, SyncEngine},
    },
    tracker::adapters::InMemoryTracker,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const PARSER_PLAN: &str = include_str!("fixtures/parser_plan.json");

struct StoreRoot {
    _dir: TempDir,
    path: Utf8PathBuf,
}

#[fixture]
fn root() -> StoreRoot {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("snapshots"))
        .expect("temp dir path is UTF-8");
    StoreRoot { _dir: dir, path }
}

fn hash() -> ContentHash {
    ContentHash::of(b"# Parser PRD")
}

fn graph() -> TaskGraph {
    decode_graph(PARSER_PLAN, hash()).expect("plan decodes")
}

fn snapshot_at(minutes_ago: i64) -> Snapshot {
    RunState::new(RunId::new(), graph(), IdentityMapping::new())
        .to_snapshot(Utc::now() - Duration::minutes(minutes_ago))
}

fn engine_over(
    tracker: &Arc<InMemoryTracker>,
    root: &Utf8Path,
) -> SyncEngine<InMemoryTracker, FsSnapshotStore, DefaultClock> {
    SyncEngine::new(
        Arc::clone(tracker),
        Arc::new(FsSnapshotStore::new(root)),
        Arc::new(DefaultClock),
        &SyncConfig::default(),
        HierarchyLinker::for_mode(HierarchyMode::Native, tracker),
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_root_reads_as_empty(root: StoreRoot) {
    let store = FsSnapshotStore::new(root.path.clone());

    assert!(store.load(RunId::new()).await.expect("load succeeds").is_none());
    assert!(
        store
            .latest_for_source(&hash())
            .await
            .expect("lookup succeeds")
            .is_none()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn saved_snapshot_loads_back(root: StoreRoot) {
    let store = FsSnapshotStore::new(root.path.clone());
    let snapshot = snapshot_at(0);

    store.save(&snapshot).await.expect("save succeeds");

    let loaded = store.load(snapshot.run_id).await.expect("load succeeds");
    assert_eq!(loaded, Some(snapshot.clone()));
    let file = root
        .path
        .join(hash().as_str())
        .join(format!("{}.json", snapshot.run_id));
    assert!(file.is_file());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn saving_again_replaces_the_run_snapshot(root: StoreRoot) {
    let store = FsSnapshotStore::new(root.path.clone());
    let mut snapshot = snapshot_at(5);
    store.save(&snapshot).await.expect("first save succeeds");

    snapshot.taken_at = Utc::now();
    store.save(&snapshot).await.expect("second save succeeds");

    let entries = std::fs::read_dir(root.path.join(hash().as_str()))
        .expect("source directory exists")
        .count();
    assert_eq!(entries, 1);
    assert_eq!(
        store.load(snapshot.run_id).await.expect("load succeeds"),
        Some(snapshot)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn latest_snapshot_for_source_wins(root: StoreRoot) {
    let store = FsSnapshotStore::new(root.path.clone());
    let older = snapshot_at(10);
    let newer = snapshot_at(1);
    store.save(&newer).await.expect("save succeeds");
    store.save(&older).await.expect("save succeeds");

    let latest = store
        .latest_for_source(&hash())
        .await
        .expect("lookup succeeds")
        .expect("a snapshot exists");

    assert_eq!(latest.run_id, newer.run_id);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn latest_snapshot_for_path_spans_document_revisions(root: StoreRoot) {
    let store = FsSnapshotStore::new(root.path.clone());
    let original = snapshot_at(10);
    let revised = RunState::new(
        RunId::new(),
        decode_graph(PARSER_PLAN, ContentHash::of(b"# Parser PRD, revised")).expect("plan decodes"),
        IdentityMapping::new(),
    )
    .to_snapshot(Utc::now() - Duration::minutes(1));
    store.save(&revised).await.expect("save succeeds");
    store.save(&original).await.expect("save succeeds");
    let source_path = original.source_path().to_owned();

    let latest = store
        .latest_for_path(&source_path)
        .await
        .expect("lookup succeeds")
        .expect("a snapshot exists");

    assert_ne!(latest.source_hash(), original.source_hash());
    assert_eq!(latest.run_id, revised.run_id);
    assert!(
        store
            .latest_for_path("docs/unrelated.md")
            .await
            .expect("lookup succeeds")
            .is_none()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn corrupt_snapshot_is_reported(root: StoreRoot) {
    let store = FsSnapshotStore::new(root.path.clone());
    let snapshot = snapshot_at(0);
    store.save(&snapshot).await.expect("save succeeds");
    let file = root
        .path
        .join(hash().as_str())
        .join(format!("{}.json", snapshot.run_id));
    std::fs::write(&file, "{ not json").expect("overwrite snapshot");

    let result = store.load(snapshot.run_id).await;

    assert!(matches!(result, Err(SnapshotStoreError::Corrupt { .. })));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rerun_in_a_new_process_writes_nothing(root: StoreRoot) {
    let tracker = Arc::new(InMemoryTracker::new());
    let cancel = CancellationToken::new();
    engine_over(&tracker, &root.path)
        .run(graph(), &cancel)
        .await
        .expect("first run succeeds");
    let writes = tracker.mutation_count();

    let summary = engine_over(&tracker, &root.path)
        .run(graph(), &cancel)
        .await
        .expect("second run succeeds");

    assert_eq!(tracker.mutation_count(), writes);
    assert_eq!(summary.unchanged.len(), graph().nodes().len());
}
