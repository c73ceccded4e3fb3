//! Generation driver: persists the company hierarchy, then fills in a title
//! and a body for every work item, strictly one item at a time.
//!
//! ```text
//! upsert company ─► replace services ─► replace locations ─► create run
//!      0%                20%                  40%
//!   ─► titles (remote, else template) ─► batch insert ─► bodies, item by item
//!                                           60%            60% → 100%
//! ```
//!
//! Everything before the batch insert is fatal on failure and leaves no work
//! items behind. Title failures fall back to templates; body failures mark
//! the item `error` and the run carries on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::GenerationError;
use crate::expand::{Expansion, WorkItemPlan, expand};
use crate::generator::{
    ContentGenerator, GenerationRequest, TitleChain, TitleSource, with_timeout,
};
use crate::models::{BusinessProfile, Company, ContentUpdate, ContentWorkItem, RunStatus};
use crate::progress::{ProgressSnapshot, percent};
use crate::store::RecordStore;
use crate::tracker::ItemTracker;

/// Run-level checkpoints, in percent.
pub const CHECKPOINT_COMPANY: u8 = 0;
pub const CHECKPOINT_SERVICES: u8 = 20;
pub const CHECKPOINT_LOCATIONS: u8 = 40;
pub const CHECKPOINT_TITLES: u8 = 60;
pub const CHECKPOINT_DONE: u8 = 100;

/// Default limit for a single external generator call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Company,
    Services,
    Locations,
    Titles,
    Bodies,
    Finished,
}

/// One progress report emitted by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: RunPhase,
    /// Known once the company record exists.
    pub company_id: Option<i64>,
    /// Run-level progress across all phases; never decreases within a run.
    pub checkpoint: u8,
    /// Item-level counts at the time of the report.
    pub snapshot: ProgressSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub company_id: i64,
    pub run_id: i64,
    pub status: RunStatus,
    pub snapshot: ProgressSnapshot,
    /// Titles that came from local templates instead of the generator.
    pub template_titles: usize,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs_f64(f64::deserialize(d)?))
    }
}

/// Clamps reported checkpoints so they never go backwards.
struct Reporter<'a, F> {
    sink: &'a F,
    last: u8,
    company_id: Option<i64>,
}

impl<'a, F: Fn(ProgressUpdate)> Reporter<'a, F> {
    fn new(sink: &'a F) -> Self {
        Self {
            sink,
            last: 0,
            company_id: None,
        }
    }

    fn report(&mut self, phase: RunPhase, checkpoint: u8, snapshot: ProgressSnapshot) {
        self.last = self.last.max(checkpoint.min(CHECKPOINT_DONE));
        (self.sink)(ProgressUpdate {
            phase,
            company_id: self.company_id,
            checkpoint: self.last,
            snapshot,
        });
    }
}

pub struct GenerationDriver {
    store: Arc<dyn RecordStore>,
    titles: TitleChain,
    content: Arc<dyn ContentGenerator>,
    tracker: Arc<ItemTracker>,
    call_timeout: Duration,
}

impl GenerationDriver {
    pub fn new(
        store: Arc<dyn RecordStore>,
        titles: TitleChain,
        content: Arc<dyn ContentGenerator>,
        tracker: Arc<ItemTracker>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            titles,
            content,
            tracker,
            call_timeout,
        }
    }

    /// Execute one generation run for an already validated profile.
    ///
    /// Cancellation is honoured between items; a cancelled run still
    /// returns a report with `status == Cancelled`.
    pub async fn run<F>(
        &self,
        profile: &BusinessProfile,
        cancel: &CancellationToken,
        on_progress: &F,
    ) -> Result<RunReport, GenerationError>
    where
        F: Fn(ProgressUpdate) + Send + Sync,
    {
        let started = Instant::now();
        let mut reporter = Reporter::new(on_progress);
        let expansion = expand(profile);
        info!(
            company = %profile.company_name,
            services = profile.services.len(),
            locations = profile.locations.len(),
            total = expansion.total,
            "starting generation run"
        );

        // Step 1: company
        reporter.report(RunPhase::Company, CHECKPOINT_COMPANY, self.tracker.snapshot());
        let company = self.upsert_company(profile).await?;
        reporter.company_id = Some(company.id);

        // Step 2: services, then locations
        reporter.report(RunPhase::Services, CHECKPOINT_SERVICES, self.tracker.snapshot());
        let services = self
            .store
            .replace_services(company.id, &profile.services)
            .await
            .map_err(|source| GenerationError::ReplaceServices {
                company_id: company.id,
                source,
            })?;

        reporter.report(RunPhase::Locations, CHECKPOINT_LOCATIONS, self.tracker.snapshot());
        let locations = self
            .store
            .replace_locations(company.id, &profile.locations)
            .await
            .map_err(|source| GenerationError::ReplaceLocations {
                company_id: company.id,
                source,
            })?;

        let run = self
            .store
            .create_run(company.id, expansion.total)
            .await
            .map_err(|source| GenerationError::PersistItems {
                company_id: company.id,
                source,
            })?;

        // Step 3: titles, then one batch insert
        let service_ids: Vec<i64> = services.iter().map(|s| s.id).collect();
        let location_ids: Vec<i64> = locations.iter().map(|l| l.id).collect();
        let mut template_titles = 0;
        let mut new_items = Vec::with_capacity(expansion.total);
        for plan in &expansion.items {
            if cancel.is_cancelled() {
                return self
                    .finish_cancelled(&company, run.id, template_titles, started, &mut reporter)
                    .await;
            }
            let outcome = self.titles.title(&request_for(profile, plan)).await;
            if outcome.source == TitleSource::Template {
                template_titles += 1;
            }
            match plan.bind(company.id, run.id, &service_ids, &location_ids, outcome.title) {
                Ok(item) => new_items.push(item),
                Err(source) => {
                    self.record_run_end(run.id, RunStatus::Failed, Some(&format!("{:#}", source)))
                        .await;
                    return Err(GenerationError::PersistItems {
                        company_id: company.id,
                        source,
                    });
                }
            }
        }

        let persisted = match self.store.insert_content_items(new_items).await {
            Ok(items) => items,
            Err(source) => {
                self.record_run_end(run.id, RunStatus::Failed, Some(&format!("{:#}", source)))
                    .await;
                return Err(GenerationError::PersistItems {
                    company_id: company.id,
                    source,
                });
            }
        };
        let snapshot = self.tracker.reset(company.id, persisted.clone()).await;
        reporter.report(RunPhase::Titles, CHECKPOINT_TITLES, snapshot);

        // Step 4: bodies
        let total = persisted.len();
        for (index, (item, plan)) in persisted.iter().zip(&expansion.items).enumerate() {
            if cancel.is_cancelled() {
                info!(company_id = company.id, done = index, total, "run cancelled");
                return self
                    .finish_cancelled(&company, run.id, template_titles, started, &mut reporter)
                    .await;
            }
            let snapshot = self.generate_body(profile, plan, item).await;
            let span = u16::from(CHECKPOINT_DONE - CHECKPOINT_TITLES);
            let checkpoint =
                CHECKPOINT_TITLES + (u16::from(percent(index + 1, total)) * span / 100) as u8;
            reporter.report(RunPhase::Bodies, checkpoint, snapshot);
        }

        // Step 5: final, authoritative state
        let snapshot = self.final_snapshot(company.id).await;
        self.record_run_end(run.id, RunStatus::Completed, None).await;
        reporter.report(RunPhase::Finished, CHECKPOINT_DONE, snapshot);
        info!(
            company_id = company.id,
            run_id = run.id,
            generated = snapshot.generated,
            error = snapshot.error,
            "generation run completed"
        );

        Ok(RunReport {
            company_id: company.id,
            run_id: run.id,
            status: RunStatus::Completed,
            snapshot,
            template_titles,
            duration: started.elapsed(),
        })
    }

    async fn upsert_company(&self, profile: &BusinessProfile) -> Result<Company, GenerationError> {
        let result = match self.store.find_company_by_name(&profile.company_name).await {
            Ok(Some(existing)) => {
                info!(company_id = existing.id, "updating existing company");
                self.store
                    .update_company(existing.id, &profile.industry, &profile.website)
                    .await
            }
            Ok(None) => {
                self.store
                    .insert_company(&profile.company_name, &profile.industry, &profile.website)
                    .await
            }
            Err(e) => Err(e),
        };
        result.map_err(|source| GenerationError::CompanyUpsert {
            name: profile.company_name.clone(),
            source,
        })
    }

    /// Generate and persist one body. Never fails the run.
    async fn generate_body(
        &self,
        profile: &BusinessProfile,
        plan: &WorkItemPlan,
        item: &ContentWorkItem,
    ) -> ProgressSnapshot {
        let mut request = request_for(profile, plan);
        request.service_id = Some(item.service_id);
        request.location_id = item.location_id;
        request.title = Some(item.title.clone());

        let update = match with_timeout(self.call_timeout, self.content.generate_content(&request))
            .await
        {
            Ok(generated) if !generated.content.trim().is_empty() => ContentUpdate::Generated {
                title: generated.title.unwrap_or_else(|| item.title.clone()),
                content: generated.content,
            },
            Ok(_) => {
                warn!(item_id = item.id, kind = %item.kind, "content generator returned empty body");
                ContentUpdate::Failed
            }
            Err(e) => {
                warn!(item_id = item.id, kind = %item.kind, error = %e, "content generation failed");
                ContentUpdate::Failed
            }
        };

        match self.store.update_content_item(item.id, update).await {
            Ok(updated) => self.tracker.apply(updated).await,
            Err(e) => {
                // Deleted or settled out of band; the listener's reload reconciles.
                warn!(item_id = item.id, error = %format!("{:#}", e), "failed to persist item outcome");
                self.tracker.snapshot()
            }
        }
    }

    async fn final_snapshot(&self, company_id: i64) -> ProgressSnapshot {
        match self.store.list_current_items(company_id).await {
            Ok(items) => self.tracker.reset(company_id, items).await,
            Err(e) => {
                warn!(company_id, error = %format!("{:#}", e), "final reload failed, using local state");
                self.tracker.snapshot()
            }
        }
    }

    async fn finish_cancelled<F: Fn(ProgressUpdate)>(
        &self,
        company: &Company,
        run_id: i64,
        template_titles: usize,
        started: Instant,
        reporter: &mut Reporter<'_, F>,
    ) -> Result<RunReport, GenerationError> {
        self.record_run_end(run_id, RunStatus::Cancelled, None).await;
        let snapshot = self.tracker.snapshot();
        let last = reporter.last;
        reporter.report(RunPhase::Finished, last, snapshot);
        Ok(RunReport {
            company_id: company.id,
            run_id,
            status: RunStatus::Cancelled,
            snapshot,
            template_titles,
            duration: started.elapsed(),
        })
    }

    async fn record_run_end(&self, run_id: i64, status: RunStatus, error: Option<&str>) {
        if let Err(e) = self.store.finish_run(run_id, status, error).await {
            warn!(run_id, %status, error = %format!("{:#}", e), "failed to record run outcome");
        }
    }
}

fn request_for(profile: &BusinessProfile, plan: &WorkItemPlan) -> GenerationRequest {
    GenerationRequest {
        kind: plan.kind,
        company_name: profile.company_name.clone(),
        industry: profile.industry.clone(),
        website: profile.website.clone(),
        service_name: plan.service_name.clone(),
        location: plan.location.clone(),
        service_id: None,
        location_id: None,
        title: None,
    }
}

/// Expected item count for a profile, without running anything.
pub fn planned_total(profile: &BusinessProfile) -> usize {
    let Expansion { total, .. } = expand(profile);
    total
}
