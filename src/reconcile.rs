//! Reconciliation listener: keeps the tracker in line with the store.
//!
//! Any content change for the followed company triggers a full re-read of the
//! company's current items, which then replaces the tracked set wholesale.
//! No deltas are merged. Bursts of notifications collapse into one reload.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::feed::{ChangeEvent, ChangeFeed};
use crate::progress::ProgressSnapshot;
use crate::store::RecordStore;
use crate::tracker::{Discarded, ItemTracker};

/// Back-to-back fetches allowed when the tracker keeps moving underneath one.
const MAX_STALE_ROUNDS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failed fetch.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied(ProgressSnapshot),
    /// A newer write landed during every fetch.
    Stale,
    /// The fetched items are not the ones the tracker follows.
    Ignored,
    /// Every attempt failed; local state stays as it was.
    Failed,
    /// The subscription closed mid-reload.
    Closed,
}

pub struct ReconciliationListener {
    store: Arc<dyn RecordStore>,
    feed: ChangeFeed,
    tracker: Arc<ItemTracker>,
    retry: RetryPolicy,
}

impl ReconciliationListener {
    pub fn new(
        store: Arc<dyn RecordStore>,
        feed: ChangeFeed,
        tracker: Arc<ItemTracker>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            feed,
            tracker,
            retry,
        }
    }

    /// Follow content changes of `company_id`. Without a company there is
    /// nothing to follow and no subscription is made.
    pub fn subscribe(&self, company_id: Option<i64>) -> Option<Subscription> {
        let company_id = company_id?;
        let closed = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            company_id,
            store: self.store.clone(),
            tracker: self.tracker.clone(),
            retry: self.retry,
            closed: closed.clone(),
        };
        let rx = self.feed.subscribe();
        let handle = tokio::spawn(worker.run(rx));
        info!(company_id, "reconciliation listener subscribed");
        Some(Subscription {
            company_id,
            closed,
            handle: Some(handle),
        })
    }

    /// One reload outside of any subscription, e.g. to seed the tracker.
    pub async fn reload_now(&self, company_id: i64) -> ReloadOutcome {
        Worker {
            company_id,
            store: self.store.clone(),
            tracker: self.tracker.clone(),
            retry: self.retry,
            closed: Arc::new(AtomicBool::new(false)),
        }
        .reload()
        .await
    }
}

/// Handle to a running listener. Dropping it unsubscribes.
pub struct Subscription {
    company_id: i64,
    closed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn company_id(&self) -> i64 {
        self.company_id
    }

    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop listening and wait for the worker to exit. Once this returns,
    /// the listener makes no further writes to the tracker.
    pub async fn unsubscribe(mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            // Cancelled or finished, either way it is gone.
            let _ = handle.await;
        }
        debug!(company_id = self.company_id, "reconciliation listener unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

struct Worker {
    company_id: i64,
    store: Arc<dyn RecordStore>,
    tracker: Arc<ItemTracker>,
    retry: RetryPolicy,
    closed: Arc<AtomicBool>,
}

impl Worker {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn run(self, mut rx: Receiver<ChangeEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) if event.touches_content_of(self.company_id) => {}
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(company_id = self.company_id, skipped, "change feed lagged, reloading");
                }
                Err(RecvError::Closed) => break,
            }
            self.drain(&mut rx);
            if self.is_closed() {
                break;
            }
            self.reload().await;
        }
        debug!(company_id = self.company_id, "reconciliation worker stopped");
    }

    /// Swallow notifications already queued; the next reload covers them.
    fn drain(&self, rx: &mut Receiver<ChangeEvent>) {
        loop {
            match rx.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    async fn reload(&self) -> ReloadOutcome {
        let mut attempt = 0;
        let mut stale_rounds = 0;
        loop {
            let observed = self.tracker.version().await;
            match self.store.list_current_items(self.company_id).await {
                Ok(items) => {
                    if self.is_closed() {
                        return ReloadOutcome::Closed;
                    }
                    let count = items.len();
                    match self
                        .tracker
                        .replace_if_current(self.company_id, observed, items)
                        .await
                    {
                        Ok(snapshot) => {
                            debug!(
                                company_id = self.company_id,
                                items = count,
                                generated = snapshot.generated,
                                "reconciled item state"
                            );
                            return ReloadOutcome::Applied(snapshot);
                        }
                        // The write that moved the tracker may have been
                        // drained already, so fetch again rather than wait.
                        Err(Discarded::Stale) if stale_rounds < MAX_STALE_ROUNDS => {
                            stale_rounds += 1;
                            debug!(
                                company_id = self.company_id,
                                stale_rounds,
                                "tracker moved during reload, fetching again"
                            );
                        }
                        Err(Discarded::Stale) => return ReloadOutcome::Stale,
                        Err(_) => return ReloadOutcome::Ignored,
                    }
                }
                Err(e) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        company_id = self.company_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %format!("{:#}", e),
                        "item reload failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                    if self.is_closed() {
                        return ReloadOutcome::Closed;
                    }
                }
                Err(e) => {
                    warn!(
                        company_id = self.company_id,
                        error = %format!("{:#}", e),
                        "item reload failed, keeping local state until the next change"
                    );
                    return ReloadOutcome::Failed;
                }
            }
        }
    }
}
