//! Retry, backoff and timeout decorator for tracker clients.

use crate::graph::domain::NodeId;
use crate::tracker::{
    domain::{ItemDraft, ItemId, ItemState, ItemUpdate, RetryPolicy, TrackerItem},
    ports::{NativeHierarchy, TrackerClient, TrackerError, TrackerResult},
};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::warn;

/// Wraps a tracker client with bounded exponential backoff.
///
/// Transient failures are retried up to [`RetryPolicy::max_attempts`] times;
/// each call is bounded by [`RetryPolicy::call_timeout`]. A shared gate holds
/// back every call made through this client (and its clones) until the
/// current backoff has elapsed, so nothing is issued while the tracker is
/// rate limiting us.
#[derive(Debug)]
pub struct RetryingTracker<T> {
    inner: Arc<T>,
    policy: RetryPolicy,
    gate: Arc<Mutex<Option<Instant>>>,
}

impl<T> Clone for RetryingTracker<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            policy: self.policy,
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<T> RetryingTracker<T> {
    /// Wraps `inner` with the given policy.
    #[must_use]
    pub fn new(inner: Arc<T>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            gate: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the wrapped client.
    #[must_use]
    pub const fn inner(&self) -> &Arc<T> {
        &self.inner
    }

    async fn wait_for_gate(&self) {
        let until = *self.gate.lock().await;
        if let Some(deadline) = until
            && deadline > Instant::now()
        {
            sleep_until(deadline).await;
        }
    }

    async fn hold_gate(&self, delay: std::time::Duration) {
        let deadline = Instant::now() + delay;
        let mut gate = self.gate.lock().await;
        if gate.is_none_or(|current| current < deadline) {
            *gate = Some(deadline);
        }
    }

    async fn call<R, F, Fut>(&self, operation: &'static str, mut f: F) -> TrackerResult<R>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = TrackerResult<R>> + Send,
        R: Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.wait_for_gate().await;
            let error = match timeout(self.policy.call_timeout, f()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_elapsed) => TrackerError::Timeout(self.policy.call_timeout),
            };
            if !error.is_transient() {
                return Err(error);
            }
            if attempt >= max_attempts {
                return Err(TrackerError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }
            let retry_after = match &error {
                TrackerError::RateLimited { retry_after } => *retry_after,
                _ => None,
            };
            let delay = self.policy.delay_for(attempt, retry_after);
            warn!(operation, attempt, ?delay, %error, "tracker call failed, backing off");
            self.hold_gate(delay).await;
        }
    }
}

#[async_trait]
impl<T: TrackerClient> TrackerClient for RetryingTracker<T> {
    async fn create_item(&self, draft: &ItemDraft) -> TrackerResult<ItemId> {
        self.call("create_item", || self.inner.create_item(draft))
            .await
    }

    async fn update_item(&self, id: ItemId, update: &ItemUpdate) -> TrackerResult<()> {
        self.call("update_item", || self.inner.update_item(id, update))
            .await
    }

    async fn add_label(&self, id: ItemId, label: &str) -> TrackerResult<()> {
        self.call("add_label", || self.inner.add_label(id, label))
            .await
    }

    async fn remove_label(&self, id: ItemId, label: &str) -> TrackerResult<()> {
        self.call("remove_label", || self.inner.remove_label(id, label))
            .await
    }

    async fn get_item(&self, id: ItemId) -> TrackerResult<Option<TrackerItem>> {
        self.call("get_item", || self.inner.get_item(id)).await
    }

    async fn get_item_state(&self, id: ItemId) -> TrackerResult<Option<ItemState>> {
        self.call("get_item_state", || self.inner.get_item_state(id))
            .await
    }

    async fn find_items_by_metadata_id(&self, node_id: &NodeId) -> TrackerResult<Vec<ItemId>> {
        self.call("find_items_by_metadata_id", || {
            self.inner.find_items_by_metadata_id(node_id)
        })
        .await
    }

    async fn find_items_by_title(&self, title: &str) -> TrackerResult<Vec<ItemId>> {
        self.call("find_items_by_title", || self.inner.find_items_by_title(title))
            .await
    }

    async fn comment(&self, id: ItemId, text: &str) -> TrackerResult<()> {
        self.call("comment", || self.inner.comment(id, text)).await
    }

    async fn close_item(&self, id: ItemId) -> TrackerResult<()> {
        self.call("close_item", || self.inner.close_item(id)).await
    }
}

#[async_trait]
impl<T: NativeHierarchy> NativeHierarchy for RetryingTracker<T> {
    async fn add_child(&self, parent: ItemId, child: ItemId) -> TrackerResult<()> {
        self.call("add_child", || self.inner.add_child(parent, child))
            .await
    }

    async fn children(&self, parent: ItemId) -> TrackerResult<Vec<ItemId>> {
        self.call("children", || self.inner.children(parent)).await
    }
}
