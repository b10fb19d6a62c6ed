//! Parent/child linkage between tracker items.

use crate::sync::domain::HierarchyMode;
use crate::tracker::{
    domain::{ItemBody, ItemId, ItemUpdate, LinkNote},
    ports::{NativeHierarchy, TrackerClient, TrackerError, TrackerResult},
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// One way of recording that an item is another item's child.
#[async_trait]
pub trait HierarchyStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Records the link. Linking an already linked pair is a no-op.
    async fn link(&self, parent: ItemId, child: ItemId) -> TrackerResult<()>;

    /// Returns `true` when the pair is already linked.
    async fn is_linked(&self, parent: ItemId, child: ItemId) -> TrackerResult<bool>;
}

/// Tracker-native sub-items.
pub struct NativeStrategy<H>
where
    H: NativeHierarchy,
{
    tracker: Arc<H>,
}

impl<H> NativeStrategy<H>
where
    H: NativeHierarchy,
{
    /// Creates the strategy.
    #[must_use]
    pub const fn new(tracker: Arc<H>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl<H> HierarchyStrategy for NativeStrategy<H>
where
    H: NativeHierarchy,
{
    fn name(&self) -> &'static str {
        "native"
    }

    async fn link(&self, parent: ItemId, child: ItemId) -> TrackerResult<()> {
        if self.is_linked(parent, child).await? {
            return Ok(());
        }
        self.tracker.add_child(parent, child).await
    }

    async fn is_linked(&self, parent: ItemId, child: ItemId) -> TrackerResult<bool> {
        Ok(self.tracker.children(parent).await?.contains(&child))
    }
}

/// Cross-reference notes written into both items' bodies.
pub struct CrossReferenceStrategy<T>
where
    T: TrackerClient,
{
    tracker: Arc<T>,
}

impl<T> CrossReferenceStrategy<T>
where
    T: TrackerClient,
{
    /// Creates the strategy.
    #[must_use]
    pub const fn new(tracker: Arc<T>) -> Self {
        Self { tracker }
    }

    async fn body(&self, id: ItemId) -> TrackerResult<ItemBody> {
        let item = self
            .tracker
            .get_item(id)
            .await?
            .ok_or(TrackerError::NotFound(id))?;
        ItemBody::parse(&item.body).map_err(|err| TrackerError::Rejected(err.to_string()))
    }

    async fn ensure_note(&self, id: ItemId, note: LinkNote) -> TrackerResult<()> {
        let mut body = self.body(id).await?;
        if !body.add_link(note) {
            return Ok(());
        }
        let rendered = body
            .render()
            .map_err(|err| TrackerError::Rejected(err.to_string()))?;
        let update = ItemUpdate {
            body: Some(rendered),
            ..ItemUpdate::default()
        };
        self.tracker.update_item(id, &update).await
    }
}

#[async_trait]
impl<T> HierarchyStrategy for CrossReferenceStrategy<T>
where
    T: TrackerClient,
{
    fn name(&self) -> &'static str {
        "cross-reference"
    }

    async fn link(&self, parent: ItemId, child: ItemId) -> TrackerResult<()> {
        self.ensure_note(parent, LinkNote::Child(child)).await?;
        self.ensure_note(child, LinkNote::Parent(parent)).await
    }

    async fn is_linked(&self, parent: ItemId, child: ItemId) -> TrackerResult<bool> {
        Ok(self.body(parent).await?.has_link(LinkNote::Child(child))
            && self.body(child).await?.has_link(LinkNote::Parent(parent)))
    }
}

/// Links parents to children through a primary strategy, falling back when
/// the primary is unavailable or failing.
///
/// Once the primary reports [`TrackerError::Unsupported`] it is not tried
/// again by this linker.
pub struct HierarchyLinker {
    primary: Option<Arc<dyn HierarchyStrategy>>,
    fallback: Arc<dyn HierarchyStrategy>,
    primary_unsupported: AtomicBool,
}

impl HierarchyLinker {
    /// Creates a linker from explicit strategies.
    #[must_use]
    pub const fn new(
        primary: Option<Arc<dyn HierarchyStrategy>>,
        fallback: Arc<dyn HierarchyStrategy>,
    ) -> Self {
        Self {
            primary,
            fallback,
            primary_unsupported: AtomicBool::new(false),
        }
    }

    /// Builds the linker for a configured mode over one tracker.
    #[must_use]
    pub fn for_mode<T>(mode: HierarchyMode, tracker: &Arc<T>) -> Self
    where
        T: TrackerClient + NativeHierarchy + 'static,
    {
        let fallback: Arc<dyn HierarchyStrategy> =
            Arc::new(CrossReferenceStrategy::new(Arc::clone(tracker)));
        let primary: Option<Arc<dyn HierarchyStrategy>> = match mode {
            HierarchyMode::Native => Some(Arc::new(NativeStrategy::new(Arc::clone(tracker)))),
            HierarchyMode::CrossReference => None,
        };
        Self::new(primary, fallback)
    }

    fn active_primary(&self) -> Option<&Arc<dyn HierarchyStrategy>> {
        self.primary
            .as_ref()
            .filter(|_| !self.primary_unsupported.load(Ordering::Relaxed))
    }

    fn note_primary_error(&self, strategy: &dyn HierarchyStrategy, err: &TrackerError) {
        if matches!(err, TrackerError::Unsupported(_)) {
            self.primary_unsupported.store(true, Ordering::Relaxed);
        }
        warn!(strategy = strategy.name(), %err, "primary hierarchy strategy failed, falling back");
    }

    /// Links each child beneath `parent`, in order.
    ///
    /// Returns the number of pairs that were newly linked.
    ///
    /// # Errors
    ///
    /// Returns the fallback strategy's error, or a fatal primary error.
    pub async fn link_children(&self, parent: ItemId, children: &[ItemId]) -> TrackerResult<usize> {
        let mut linked = 0;
        for &child in children {
            if self.is_linked(parent, child).await? {
                continue;
            }
            if let Some(primary) = self.active_primary() {
                match primary.link(parent, child).await {
                    Ok(()) => {
                        debug!(%parent, %child, strategy = primary.name(), "linked");
                        linked += 1;
                        continue;
                    }
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => self.note_primary_error(primary.as_ref(), &err),
                }
            }
            self.fallback.link(parent, child).await?;
            debug!(%parent, %child, strategy = self.fallback.name(), "linked");
            linked += 1;
        }
        Ok(linked)
    }

    /// Returns `true` when either strategy already records the link.
    ///
    /// # Errors
    ///
    /// Returns the fallback strategy's error, or a fatal primary error.
    pub async fn is_linked(&self, parent: ItemId, child: ItemId) -> TrackerResult<bool> {
        if let Some(primary) = self.active_primary() {
            match primary.is_linked(parent, child).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => self.note_primary_error(primary.as_ref(), &err),
            }
        }
        self.fallback.is_linked(parent, child).await
    }
}
