//! End-to-end tests of the orchestration facade over an in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use contentforge::driver::RunPhase;
use contentforge::errors::{GenerationError, GeneratorError};
use contentforge::feed::ChangeFeed;
use contentforge::generator::{
    ContentGenerator, GeneratedContent, GenerationRequest, TitleGenerator,
};
use contentforge::models::{
    BusinessProfile, ContentKind, ContentStatus, ContentUpdate, NewContentItem,
};
use contentforge::orchestrator::{Orchestrator, OrchestratorOptions, RunEvent, RunState};
use contentforge::progress::{ProgressSnapshot, aggregate};
use contentforge::store::{RecordStore, SqliteStore};

/// Writes a title and body for every request; fails bodies whose service
/// name matches `fail_service`.
struct MockWriter {
    fail_service: Option<&'static str>,
    bodies: AtomicUsize,
}

impl MockWriter {
    fn new(fail_service: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            fail_service,
            bodies: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TitleGenerator for MockWriter {
    async fn generate_title(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        Ok(match &request.location {
            Some(location) => format!("{} in {}", request.service_name, location),
            None => request.service_name.clone(),
        })
    }
}

#[async_trait]
impl ContentGenerator for MockWriter {
    async fn generate_content(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedContent, GeneratorError> {
        self.bodies.fetch_add(1, Ordering::SeqCst);
        if self.fail_service == Some(request.service_name.as_str()) {
            return Err(GeneratorError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(GeneratedContent {
            content: format!("All about {}", request.service_name),
            title: None,
        })
    }
}

fn acme() -> BusinessProfile {
    BusinessProfile {
        company_name: "Acme".to_string(),
        industry: "plumbing".to_string(),
        website: "https://acme.test".to_string(),
        services: vec!["Drain Cleaning".to_string()],
        locations: vec!["Austin".to_string()],
    }
}

fn setup(writer: Arc<MockWriter>) -> (Orchestrator, Arc<SqliteStore>) {
    let feed = ChangeFeed::default();
    let store = Arc::new(SqliteStore::new_in_memory(feed.clone()).unwrap());
    let orchestrator = Orchestrator::new(
        store.clone(),
        feed,
        writer.clone(),
        writer,
        OrchestratorOptions {
            template_seed: Some(11),
            ..Default::default()
        },
    );
    (orchestrator, store)
}

async fn wait_for_progress<F>(orchestrator: &Orchestrator, pred: F) -> ProgressSnapshot
where
    F: Fn(&ProgressSnapshot) -> bool,
{
    let mut rx = orchestrator.watch_progress();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let current = *rx.borrow_and_update();
            if pred(&current) {
                return current;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("progress never reached expected state")
}

#[tokio::test]
async fn test_acme_scenario() {
    let writer = MockWriter::new(None);
    let (orchestrator, store) = setup(writer.clone());

    let report = orchestrator.run(acme()).await.unwrap();

    assert_eq!(
        report.snapshot,
        ProgressSnapshot {
            total: 3,
            generated: 3,
            pending: 0,
            error: 0,
            percent_complete: 100,
        }
    );
    assert_eq!(orchestrator.state(), RunState::Completed);
    assert!(!orchestrator.is_generating());
    assert_eq!(orchestrator.progress(), report.snapshot);
    assert_eq!(writer.bodies.load(Ordering::SeqCst), 3);

    let items = store.list_current_items(report.company_id).await.unwrap();
    let kinds: Vec<ContentKind> = items.iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds,
        vec![ContentKind::Service, ContentKind::Location, ContentKind::Blog]
    );
    assert_eq!(items[1].title, "Drain Cleaning in Austin");
    assert!(items[0].location_id.is_none());
    assert!(items[1].location_id.is_some() && items[2].location_id.is_some());
}

#[tokio::test]
async fn test_company_upsert_is_idempotent_and_services_replaced() {
    let (orchestrator, store) = setup(MockWriter::new(None));
    let first = orchestrator.run(acme()).await.unwrap();

    let mut changed = acme();
    changed.industry = "plumbing & heating".to_string();
    changed.services = vec!["Boiler Repair".to_string()];
    changed.locations = vec!["Austin".to_string(), "Round Rock".to_string()];
    let second = orchestrator.run(changed).await.unwrap();

    assert_eq!(first.company_id, second.company_id);
    let companies = store.list_companies().await.unwrap();
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].industry, "plumbing & heating");

    let services = store.list_services(second.company_id).await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].name, "Boiler Repair");
    let locations = store.list_locations(second.company_id).await.unwrap();
    assert_eq!(locations.len(), 2);

    assert_eq!(second.snapshot.total, 1 + 2 + 2);
    assert_eq!(orchestrator.progress().total, 5);
    // Earlier content is kept, but only the latest run counts.
    let all = store.list_content_items(second.company_id).await.unwrap();
    assert_eq!(all.len(), 3 + 5);
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let mut profile = acme();
    profile.services = vec!["Drain Cleaning".to_string(), "Sewer Repair".to_string()];
    profile.locations = vec!["Austin".to_string(), "Dallas".to_string()];
    let (orchestrator, store) = setup(MockWriter::new(Some("Sewer Repair")));

    let report = orchestrator.run(profile).await.unwrap();

    // 2 services + 2*2 location + 2*2 blog = 10; Sewer Repair owns 1 + 2 + 2.
    assert_eq!(report.snapshot.total, 10);
    assert_eq!(report.snapshot.error, 5);
    assert_eq!(report.snapshot.generated, 5);
    assert_eq!(report.snapshot.percent_complete, 50);
    assert_eq!(orchestrator.state(), RunState::Completed);

    let items = store.list_current_items(report.company_id).await.unwrap();
    assert!(
        items
            .iter()
            .filter(|i| i.status == ContentStatus::Error)
            .all(|i| i.content.is_none())
    );
}

#[tokio::test]
async fn test_progress_events_are_monotonic() {
    let mut profile = acme();
    profile.services = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    profile.locations = vec!["X".to_string(), "Y".to_string()];
    let (orchestrator, _store) = setup(MockWriter::new(Some("B")));
    let mut events = orchestrator.events();

    orchestrator.run(profile).await.unwrap();

    let mut checkpoints = Vec::new();
    let mut percents = Vec::new();
    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RunEvent::RunProgress { update } = event {
            checkpoints.push(update.checkpoint);
            percents.push(update.snapshot.percent_complete);
            phases.push(update.phase);
        }
    }
    assert!(checkpoints.windows(2).all(|w| w[0] <= w[1]), "{:?}", checkpoints);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
    assert_eq!(checkpoints.first(), Some(&0));
    assert_eq!(checkpoints.last(), Some(&100));
    assert_eq!(phases.last(), Some(&RunPhase::Finished));
}

#[tokio::test]
async fn test_out_of_band_changes_are_reconciled() {
    let (orchestrator, store) = setup(MockWriter::new(Some("Drain Cleaning")));
    let report = orchestrator.run(acme()).await.unwrap();
    assert_eq!(report.snapshot.error, 3);

    // Another writer on the same store adds a fresh run and settles it.
    let run = store.create_run(report.company_id, 1).await.unwrap();
    let previous = store.list_content_items(report.company_id).await.unwrap();
    let new_item = NewContentItem {
        company_id: report.company_id,
        run_id: run.id,
        service_id: previous[0].service_id,
        location_id: None,
        kind: ContentKind::Service,
        title: "Drain Cleaning".to_string(),
    };
    let inserted = store.insert_content_items(vec![new_item]).await.unwrap();
    store
        .update_content_item(
            inserted[0].id,
            ContentUpdate::Generated {
                title: "Drain Cleaning, Rewritten".to_string(),
                content: "Fresh body".to_string(),
            },
        )
        .await
        .unwrap();

    let expected = aggregate(&store.list_current_items(report.company_id).await.unwrap());
    let snapshot = wait_for_progress(&orchestrator, |s| *s == expected).await;
    assert_eq!(snapshot.total, 1);
    assert_eq!(snapshot.percent_complete, 100);
}

#[tokio::test]
async fn test_deleting_an_item_shrinks_progress() {
    let (orchestrator, store) = setup(MockWriter::new(None));
    let report = orchestrator.run(acme()).await.unwrap();
    let items = store.list_current_items(report.company_id).await.unwrap();

    assert!(orchestrator.delete_item(items[2].id).await.unwrap());
    let snapshot = wait_for_progress(&orchestrator, |s| s.total == 2).await;
    assert_eq!(snapshot.generated, 2);
    assert!(!orchestrator.delete_item(items[2].id).await.unwrap());

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_rejected_profile_leaves_facade_startable() {
    let (orchestrator, _store) = setup(MockWriter::new(None));
    let mut bad = acme();
    bad.locations = vec!["Austin".to_string(), " austin ".to_string(), "Austin ".to_string()];

    let err = orchestrator.run(bad).await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidProfile(_)));
    assert!(!orchestrator.is_generating());

    let report = orchestrator.run(acme()).await.unwrap();
    assert_eq!(report.snapshot.generated, 3);
    assert!(orchestrator.last_error().is_none());
}

#[tokio::test]
async fn test_follow_seeds_progress_for_existing_company() {
    let (first, store) = setup(MockWriter::new(None));
    let report = first.run(acme()).await.unwrap();

    // A second facade over the same store, e.g. a dashboard.
    let observer = Orchestrator::new(
        store.clone(),
        store.feed().clone(),
        MockWriter::new(None),
        MockWriter::new(None),
        OrchestratorOptions::default(),
    );
    observer.follow(report.company_id).await;
    assert_eq!(observer.progress(), report.snapshot);
    assert_eq!(observer.state(), RunState::Idle);
}
