//! Progress aggregation over a work-item collection.
//!
//! Snapshots are always a full recount of the collection they are given;
//! nothing here is patched incrementally.

use serde::{Deserialize, Serialize};

use crate::models::{ContentStatus, ContentWorkItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub generated: usize,
    pub pending: usize,
    pub error: usize,
    pub percent_complete: u8,
}

impl ProgressSnapshot {
    /// Build a snapshot from raw status counts.
    pub fn from_counts(generated: usize, pending: usize, error: usize) -> Self {
        let total = generated + pending + error;
        Self {
            total,
            generated,
            pending,
            error,
            percent_complete: percent(generated, total),
        }
    }
}

/// Integer percentage of `done` over `total`, 0 for an empty collection.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done.min(total) * 100) / total) as u8
}

/// Count items by status. `error` items count toward `total` only.
pub fn aggregate(items: &[ContentWorkItem]) -> ProgressSnapshot {
    aggregate_statuses(items.iter().map(|i| i.status))
}

pub fn aggregate_statuses(statuses: impl IntoIterator<Item = ContentStatus>) -> ProgressSnapshot {
    let (mut generated, mut pending, mut error) = (0, 0, 0);
    for status in statuses {
        match status {
            ContentStatus::Generated => generated += 1,
            ContentStatus::Pending => pending += 1,
            ContentStatus::Error => error += 1,
        }
    }
    ProgressSnapshot::from_counts(generated, pending, error)
}
