//! Tests for the in-memory tracker adapter.

use crate::graph::domain::{NodeId, Priority};
use crate::tracker::{
    adapters::InMemoryTracker,
    domain::{ItemBody, ItemDraft, ItemId, ItemState, ItemUpdate, MetadataBlock},
    ports::{NativeHierarchy, TrackerClient, TrackerError},
};
use chrono::Utc;
use rstest::{fixture, rstest};

#[fixture]
fn tracker() -> InMemoryTracker {
    InMemoryTracker::new()
}

fn engine_body(node: &str) -> String {
    let metadata = MetadataBlock {
        node_id: NodeId::new(node).expect("valid node id"),
        parent_id: None,
        dependencies: Default::default(),
        complexity: 1,
        priority: Priority::Medium,
        generator: "plansync".to_owned(),
        generator_version: "0.1.0".to_owned(),
        generated_at: Utc::now(),
    };
    ItemBody::new(metadata, "content")
        .render()
        .expect("body renders")
}

#[rstest]
#[tokio::test]
async fn items_are_numbered_from_one(tracker: InMemoryTracker) {
    let first = tracker
        .create_item(&ItemDraft::new("First", "").expect("valid draft"))
        .await
        .expect("create succeeds");
    let second = tracker
        .create_item(&ItemDraft::new("Second", "").expect("valid draft"))
        .await
        .expect("create succeeds");

    assert_eq!(first.value(), 1);
    assert_eq!(second.value(), 2);
    assert_eq!(tracker.mutation_count(), 2);
}

#[rstest]
#[tokio::test]
async fn metadata_search_ignores_foreign_items(tracker: InMemoryTracker) {
    let owned = tracker
        .seed_item(&ItemDraft::new("Parser", engine_body("2")).expect("valid draft"))
        .expect("seed succeeds");
    tracker
        .seed_item(&ItemDraft::new("Parser", "typed by a person").expect("valid draft"))
        .expect("seed succeeds");

    let found = tracker
        .find_items_by_metadata_id(&NodeId::new("2").expect("valid node id"))
        .await
        .expect("search succeeds");
    let titled = tracker
        .find_items_by_title("Parser")
        .await
        .expect("search succeeds");

    assert_eq!(found, vec![owned]);
    assert_eq!(titled.len(), 2);
}

#[rstest]
#[tokio::test]
async fn label_calls_are_idempotent(tracker: InMemoryTracker) {
    let id = tracker
        .seed_item(&ItemDraft::new("Item", "").expect("valid draft"))
        .expect("seed succeeds");

    tracker.add_label(id, "blocked").await.expect("add succeeds");
    tracker.add_label(id, "blocked").await.expect("add succeeds");
    tracker.remove_label(id, "absent").await.expect("remove succeeds");

    let item = tracker.item(id).expect("item exists");
    assert_eq!(item.labels.len(), 1);
    assert!(item.has_label("blocked"));
}

#[rstest]
#[tokio::test]
async fn update_replaces_only_given_fields(tracker: InMemoryTracker) {
    let id = tracker
        .seed_item(&ItemDraft::new("Old title", "old body").expect("valid draft"))
        .expect("seed succeeds");
    let update = ItemUpdate {
        title: Some("New title".to_owned()),
        ..ItemUpdate::default()
    };

    tracker.update_item(id, &update).await.expect("update succeeds");

    let item = tracker.item(id).expect("item exists");
    assert_eq!(item.title, "New title");
    assert_eq!(item.body, "old body");
}

#[rstest]
#[tokio::test]
async fn injected_failures_are_returned_in_order(tracker: InMemoryTracker) {
    tracker
        .inject_failures([
            TrackerError::Transient("first".to_owned()),
            TrackerError::Unreachable("second".to_owned()),
        ])
        .expect("injection succeeds");
    let id = ItemId::new(1).expect("valid item id");

    let first = tracker.get_item(id).await;
    let second = tracker.get_item(id).await;
    let third = tracker.get_item(id).await;

    assert_eq!(first, Err(TrackerError::Transient("first".to_owned())));
    assert_eq!(second, Err(TrackerError::Unreachable("second".to_owned())));
    assert_eq!(third, Ok(None));
}

#[rstest]
#[tokio::test]
async fn outage_starts_after_mutation_budget(tracker: InMemoryTracker) {
    let outage = TrackerError::Unauthorized("token revoked".to_owned());
    tracker
        .fail_after_mutations(1, outage.clone())
        .expect("outage configured");

    let created = tracker
        .create_item(&ItemDraft::new("Allowed", "").expect("valid draft"))
        .await;
    let refused = tracker
        .create_item(&ItemDraft::new("Refused", "").expect("valid draft"))
        .await;
    tracker.restore().expect("restore succeeds");
    let after = tracker
        .create_item(&ItemDraft::new("After", "").expect("valid draft"))
        .await;

    assert!(created.is_ok());
    assert_eq!(refused, Err(outage));
    assert!(after.is_ok());
    assert_eq!(tracker.items().len(), 2);
}

#[rstest]
#[tokio::test]
async fn closing_changes_state(tracker: InMemoryTracker) {
    let id = tracker
        .seed_item(&ItemDraft::new("Item", "").expect("valid draft"))
        .expect("seed succeeds");

    tracker.close_item(id).await.expect("close succeeds");

    assert_eq!(
        tracker.get_item_state(id).await.expect("read succeeds"),
        Some(ItemState::Closed)
    );
}

#[rstest]
#[tokio::test]
async fn native_hierarchy_is_opt_in(tracker: InMemoryTracker) {
    let parent = ItemId::new(1).expect("valid item id");

    let unsupported = tracker.children(parent).await;

    assert!(matches!(unsupported, Err(TrackerError::Unsupported(_))));
}

#[rstest]
#[tokio::test]
async fn native_children_are_deduplicated() {
    let tracker = InMemoryTracker::with_native_hierarchy();
    let parent = tracker
        .seed_item(&ItemDraft::new("Parent", "").expect("valid draft"))
        .expect("seed succeeds");
    let child = tracker
        .seed_item(&ItemDraft::new("Child", "").expect("valid draft"))
        .expect("seed succeeds");

    tracker.add_child(parent, child).await.expect("link succeeds");
    tracker.add_child(parent, child).await.expect("link succeeds");

    assert_eq!(
        tracker.children(parent).await.expect("read succeeds"),
        vec![child]
    );
}
