//! Change notification feed for persisted records.
//!
//! A thin wrapper over a `tokio::sync::broadcast` channel. Writers publish
//! "something changed for this company" events; subscribers re-read whatever
//! they care about. Events carry no diff.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity. Lagging receivers skip ahead, which is harmless
/// since every event only means "re-read".
pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Company,
    Service,
    Location,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    pub company_id: i64,
}

impl ChangeEvent {
    pub fn content(op: ChangeOp, company_id: i64) -> Self {
        Self {
            table: ChangeTable::Content,
            op,
            company_id,
        }
    }

    /// Whether this event means the content items of `company_id` changed.
    pub fn touches_content_of(&self, company_id: i64) -> bool {
        self.table == ChangeTable::Content && self.company_id == company_id
    }
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        if self.tx.send(event).is_err() {
            trace!(?event, "change event dropped, no subscribers");
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
