//! Expansion of a business profile into the ordered set of content work items.

use serde::{Deserialize, Serialize};

use crate::models::{BusinessProfile, ContentKind, NewContentItem};

/// Blog posts produced per (service, location) pair.
pub const BLOGS_PER_LOCATION: usize = 1;

/// A work item before its parent records exist.
///
/// Parents are referenced by their index in the profile's `services` and
/// `locations`; [`WorkItemPlan::bind`] swaps those for persisted ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemPlan {
    pub kind: ContentKind,
    pub service_index: usize,
    pub location_index: Option<usize>,
    pub service_name: String,
    pub location: Option<String>,
}

impl WorkItemPlan {
    /// Resolve profile indexes against ids returned by the record store.
    ///
    /// `service_ids` and `location_ids` must be in profile order.
    pub fn bind(
        &self,
        company_id: i64,
        run_id: i64,
        service_ids: &[i64],
        location_ids: &[i64],
        title: String,
    ) -> anyhow::Result<NewContentItem> {
        let service_id = *service_ids.get(self.service_index).ok_or_else(|| {
            anyhow::anyhow!("No persisted service at index {}", self.service_index)
        })?;
        let location_id = match self.location_index {
            Some(idx) => Some(
                *location_ids
                    .get(idx)
                    .ok_or_else(|| anyhow::anyhow!("No persisted location at index {}", idx))?,
            ),
            None => None,
        };
        Ok(NewContentItem {
            company_id,
            run_id,
            service_id,
            location_id,
            kind: self.kind,
            title,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub items: Vec<WorkItemPlan>,
    pub total: usize,
}

/// Number of work items a profile with `services` × `locations` expands to.
pub fn expected_total(services: usize, locations: usize) -> usize {
    services + services * locations + services * locations * BLOGS_PER_LOCATION
}

/// Expand a profile into work items.
///
/// All service pages come first in input order, then for every service
/// (outer) and location (inner) one location page followed by its blog post.
/// The profile is assumed to be validated already.
pub fn expand(profile: &BusinessProfile) -> Expansion {
    let total = expected_total(profile.services.len(), profile.locations.len());
    let mut items = Vec::with_capacity(total);

    for (service_index, service) in profile.services.iter().enumerate() {
        items.push(WorkItemPlan {
            kind: ContentKind::Service,
            service_index,
            location_index: None,
            service_name: service.clone(),
            location: None,
        });
    }

    for (service_index, service) in profile.services.iter().enumerate() {
        for (location_index, location) in profile.locations.iter().enumerate() {
            items.push(WorkItemPlan {
                kind: ContentKind::Location,
                service_index,
                location_index: Some(location_index),
                service_name: service.clone(),
                location: Some(location.clone()),
            });
            for _ in 0..BLOGS_PER_LOCATION {
                items.push(WorkItemPlan {
                    kind: ContentKind::Blog,
                    service_index,
                    location_index: Some(location_index),
                    service_name: service.clone(),
                    location: Some(location.clone()),
                });
            }
        }
    }

    debug_assert_eq!(items.len(), total);
    Expansion { items, total }
}
