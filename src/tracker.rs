//! Shared, versioned view of one company's work items.
//!
//! The generation driver and the reconciliation listener both write here.
//! Every write happens under one lock and bumps `version`. Reloads carry the
//! version they observed before fetching and are rejected if anything changed
//! in between (compare-and-swap); the listener then fetches again.
//!
//! The tracker also remembers which run its items belong to. A reload that
//! returns items of an earlier run is rejected, so a run that has just
//! persisted its items never falls back to its predecessor's counts.

use tokio::sync::{Mutex, watch};
use tracing::debug;

use crate::models::ContentWorkItem;
use crate::progress::{ProgressSnapshot, aggregate};

/// Why [`ItemTracker::replace_if_current`] rejected a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discarded {
    OtherCompany,
    /// The fetched items belong to a run older than the tracked one.
    EarlierRun,
    /// Something was written after the observed version was taken.
    Stale,
}

#[derive(Debug, Default)]
struct TrackerState {
    version: u64,
    company_id: Option<i64>,
    run_id: Option<i64>,
    items: Vec<ContentWorkItem>,
}

fn run_of(items: &[ContentWorkItem]) -> Option<i64> {
    items.iter().map(|i| i.run_id).max()
}

impl TrackerState {
    fn commit(&mut self) -> ProgressSnapshot {
        self.version += 1;
        aggregate(&self.items)
    }
}

pub struct ItemTracker {
    state: Mutex<TrackerState>,
    progress_tx: watch::Sender<ProgressSnapshot>,
}

impl Default for ItemTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemTracker {
    pub fn new() -> Self {
        let (progress_tx, _) = watch::channel(ProgressSnapshot::default());
        Self {
            state: Mutex::new(TrackerState::default()),
            progress_tx,
        }
    }

    /// Latest snapshot, recomputed on every write.
    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.progress_tx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    pub async fn version(&self) -> u64 {
        self.state.lock().await.version
    }

    #[cfg(test)]
    pub(crate) async fn company_id(&self) -> Option<i64> {
        self.state.lock().await.company_id
    }

    #[cfg(test)]
    pub(crate) async fn items(&self) -> Vec<ContentWorkItem> {
        self.state.lock().await.items.clone()
    }

    /// Start tracking `company_id` with a fresh item set.
    pub async fn reset(&self, company_id: i64, items: Vec<ContentWorkItem>) -> ProgressSnapshot {
        let mut state = self.state.lock().await;
        state.company_id = Some(company_id);
        state.run_id = run_of(&items);
        state.items = items;
        let snapshot = state.commit();
        self.publish(snapshot);
        snapshot
    }

    /// Drop all tracked items, e.g. before a new run persists its own.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.company_id = None;
        state.run_id = None;
        state.items.clear();
        let snapshot = state.commit();
        self.publish(snapshot);
    }

    /// Replace one item by id with its persisted form.
    ///
    /// Backward status transitions are ignored; unknown ids are ignored too
    /// (the item was deleted out of band and a reload already removed it).
    pub async fn apply(&self, item: ContentWorkItem) -> ProgressSnapshot {
        let mut state = self.state.lock().await;
        let Some(pos) = state.items.iter().position(|i| i.id == item.id) else {
            debug!(item_id = item.id, "ignoring update for untracked item");
            return aggregate(&state.items);
        };
        let current = state.items[pos].status;
        if current != item.status && !current.can_transition_to(item.status) {
            debug!(
                item_id = item.id,
                from = %current,
                to = %item.status,
                "ignoring backward status transition"
            );
            return aggregate(&state.items);
        }
        state.items[pos] = item;
        let snapshot = state.commit();
        self.publish(snapshot);
        snapshot
    }

    /// Replace the whole collection with a fresh read of the store, but only
    /// if nothing was written since `observed_version` was taken, the tracker
    /// still follows `company_id`, and the items are not from an earlier run.
    pub async fn replace_if_current(
        &self,
        company_id: i64,
        observed_version: u64,
        items: Vec<ContentWorkItem>,
    ) -> Result<ProgressSnapshot, Discarded> {
        let mut state = self.state.lock().await;
        if state.company_id.is_some_and(|id| id != company_id) {
            debug!(company_id, "discarding reload for untracked company");
            return Err(Discarded::OtherCompany);
        }
        let incoming_run = run_of(&items);
        if let (Some(tracked), Some(incoming)) = (state.run_id, incoming_run)
            && incoming < tracked
        {
            debug!(company_id, tracked, incoming, "discarding reload from an earlier run");
            return Err(Discarded::EarlierRun);
        }
        if state.version != observed_version {
            debug!(
                company_id,
                observed_version,
                current_version = state.version,
                "discarding stale reload"
            );
            return Err(Discarded::Stale);
        }
        state.company_id = Some(company_id);
        if incoming_run.is_some() {
            state.run_id = incoming_run;
        }
        state.items = items;
        let snapshot = state.commit();
        self.publish(snapshot);
        Ok(snapshot)
    }

    fn publish(&self, snapshot: ProgressSnapshot) {
        self.progress_tx.send_replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, ContentStatus};

    fn item(id: i64, status: ContentStatus) -> ContentWorkItem {
        run_item(1, id, status)
    }

    fn run_item(run_id: i64, id: i64, status: ContentStatus) -> ContentWorkItem {
        ContentWorkItem {
            id,
            company_id: 1,
            run_id,
            service_id: 1,
            location_id: None,
            kind: ContentKind::Service,
            title: "t".to_string(),
            content: None,
            status,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[tokio::test]
    async fn test_reset_publishes_snapshot() {
        let tracker = ItemTracker::new();
        let rx = tracker.watch();
        tracker
            .reset(1, vec![item(1, ContentStatus::Pending), item(2, ContentStatus::Pending)])
            .await;
        assert_eq!(rx.borrow().total, 2);
        assert_eq!(tracker.snapshot().pending, 2);
        assert_eq!(tracker.company_id().await, Some(1));
    }

    #[tokio::test]
    async fn test_apply_moves_forward_and_bumps_version() {
        let tracker = ItemTracker::new();
        tracker.reset(1, vec![item(1, ContentStatus::Pending)]).await;
        let before = tracker.version().await;
        let snapshot = tracker.apply(item(1, ContentStatus::Generated)).await;
        assert_eq!(snapshot.generated, 1);
        assert_eq!(snapshot.percent_complete, 100);
        assert!(tracker.version().await > before);
    }

    #[tokio::test]
    async fn test_apply_ignores_backward_transition() {
        let tracker = ItemTracker::new();
        tracker.reset(1, vec![item(1, ContentStatus::Generated)]).await;
        let before = tracker.version().await;
        let snapshot = tracker.apply(item(1, ContentStatus::Pending)).await;
        assert_eq!(snapshot.generated, 1);
        assert_eq!(tracker.version().await, before);
    }

    #[tokio::test]
    async fn test_apply_ignores_unknown_item() {
        let tracker = ItemTracker::new();
        tracker.reset(1, vec![item(1, ContentStatus::Pending)]).await;
        let snapshot = tracker.apply(item(99, ContentStatus::Generated)).await;
        assert_eq!(snapshot.total, 1);
        assert_eq!(snapshot.generated, 0);
    }

    #[tokio::test]
    async fn test_stale_reload_is_discarded() {
        let tracker = ItemTracker::new();
        tracker.reset(1, vec![item(1, ContentStatus::Pending)]).await;
        let observed = tracker.version().await;
        tracker.apply(item(1, ContentStatus::Generated)).await;

        let result = tracker
            .replace_if_current(1, observed, vec![item(1, ContentStatus::Pending)])
            .await;
        assert_eq!(result, Err(Discarded::Stale));
        assert_eq!(tracker.snapshot().generated, 1);
    }

    #[tokio::test]
    async fn test_current_reload_replaces_wholesale() {
        let tracker = ItemTracker::new();
        tracker.reset(1, vec![item(1, ContentStatus::Pending)]).await;
        let observed = tracker.version().await;
        let snapshot = tracker
            .replace_if_current(
                1,
                observed,
                vec![item(1, ContentStatus::Generated), item(2, ContentStatus::Error)],
            )
            .await
            .expect("reload should apply");
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.error, 1);
        assert_eq!(tracker.items().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reload_for_other_company_is_discarded() {
        let tracker = ItemTracker::new();
        tracker.reset(1, vec![item(1, ContentStatus::Pending)]).await;
        let observed = tracker.version().await;
        assert_eq!(
            tracker.replace_if_current(2, observed, vec![]).await,
            Err(Discarded::OtherCompany)
        );
        assert_eq!(tracker.snapshot().total, 1);
    }

    #[tokio::test]
    async fn test_reload_from_earlier_run_is_discarded() {
        let tracker = ItemTracker::new();
        tracker
            .reset(1, vec![run_item(2, 10, ContentStatus::Pending), run_item(2, 11, ContentStatus::Pending)])
            .await;
        let observed = tracker.version().await;

        let previous_run = vec![run_item(1, 1, ContentStatus::Generated)];
        assert_eq!(
            tracker.replace_if_current(1, observed, previous_run).await,
            Err(Discarded::EarlierRun)
        );
        assert_eq!(tracker.snapshot().total, 2);
        assert_eq!(tracker.snapshot().percent_complete, 0);
    }

    #[tokio::test]
    async fn test_reload_from_later_run_is_adopted() {
        let tracker = ItemTracker::new();
        tracker.reset(1, vec![run_item(1, 1, ContentStatus::Generated)]).await;
        let observed = tracker.version().await;

        let next_run = vec![run_item(2, 5, ContentStatus::Pending)];
        let snapshot = tracker.replace_if_current(1, observed, next_run).await.unwrap();
        assert_eq!(snapshot.pending, 1);

        // The later run is now the tracked one.
        let observed = tracker.version().await;
        let old = vec![run_item(1, 1, ContentStatus::Generated)];
        assert_eq!(
            tracker.replace_if_current(1, observed, old).await,
            Err(Discarded::EarlierRun)
        );
    }

    #[tokio::test]
    async fn test_clear_resets_progress() {
        let tracker = ItemTracker::new();
        tracker.reset(1, vec![item(1, ContentStatus::Generated)]).await;
        tracker.clear().await;
        assert_eq!(tracker.snapshot(), ProgressSnapshot::default());
        assert_eq!(tracker.company_id().await, None);
    }
}
