//! Orchestration facade: the single entry point for callers.
//!
//! Wires the expander, driver, tracker and reconciliation listener together
//! and enforces at most one run at a time. Observers can poll
//! [`Orchestrator::progress`] or subscribe to [`RunEvent`]s.

pub mod state;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::driver::{
    DEFAULT_CALL_TIMEOUT, GenerationDriver, ProgressUpdate, RunPhase, RunReport, planned_total,
};
use crate::errors::GenerationError;
use crate::feed::ChangeFeed;
use crate::generator::{ContentGenerator, TemplateEngine, TitleChain, TitleGenerator};
use crate::models::{BusinessProfile, RunStatus};
use crate::progress::ProgressSnapshot;
use crate::reconcile::{ReconciliationListener, RetryPolicy, Subscription};
use crate::store::RecordStore;
use crate::tracker::ItemTracker;

pub use state::{RunEvent, RunState};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Limit for each external generator call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    /// Fixed seed for template selection; random when unset.
    pub template_seed: Option<u64>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
            template_seed: None,
        }
    }
}

#[derive(Debug, Default)]
struct FacadeState {
    run: RunState,
    last_error: Option<String>,
    last_report: Option<RunReport>,
    last_update: Option<ProgressUpdate>,
    cancel: Option<CancellationToken>,
}

impl FacadeState {
    /// Move to `next` if the lifecycle allows it.
    fn transition(&mut self, next: RunState) -> bool {
        if !self.run.can_transition_to(next) {
            warn!(from = %self.run, to = %next, "ignoring illegal run state transition");
            return false;
        }
        self.run = next;
        true
    }
}

struct Inner {
    store: Arc<dyn RecordStore>,
    driver: GenerationDriver,
    listener: ReconciliationListener,
    tracker: Arc<ItemTracker>,
    state: Mutex<FacadeState>,
    subscription: Mutex<Option<Subscription>>,
    events: broadcast::Sender<RunEvent>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, FacadeState> {
        // The guarded data stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: RunEvent) {
        // No observers is fine.
        let _ = self.events.send(event);
    }

    /// Point the listener at `company_id`, replacing any earlier subscription.
    fn follow(&self, company_id: i64) {
        let mut slot = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|s| s.company_id() == company_id) {
            return;
        }
        *slot = self.listener.subscribe(Some(company_id));
    }

    fn on_progress(&self, update: ProgressUpdate) {
        // Before the titles checkpoint the store still holds the previous
        // run's items; listening then would report those.
        let items_persisted = matches!(
            update.phase,
            RunPhase::Titles | RunPhase::Bodies | RunPhase::Finished
        );
        if let Some(company_id) = update.company_id
            && items_persisted
        {
            self.follow(company_id);
        }
        self.state().last_update = Some(update);
        self.emit(RunEvent::RunProgress { update });
    }

    fn finish(&self, result: &Result<RunReport, GenerationError>) {
        let mut state = self.state();
        state.cancel = None;
        match result {
            Ok(report) => {
                state.transition(match report.status {
                    RunStatus::Cancelled => RunState::Cancelled,
                    _ => RunState::Completed,
                });
                state.last_report = Some(report.clone());
                drop(state);
                let event = if report.status == RunStatus::Cancelled {
                    RunEvent::RunCancelled {
                        report: report.clone(),
                    }
                } else {
                    RunEvent::RunCompleted {
                        report: report.clone(),
                    }
                };
                self.emit(event);
            }
            Err(e) => {
                state.transition(RunState::Failed);
                state.last_error = Some(e.to_string());
                drop(state);
                self.emit(RunEvent::RunFailed {
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Marks the facade failed if the run task dies without reporting.
struct RunGuard {
    inner: Arc<Inner>,
    settled: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.inner.state();
        if state.run.is_running() {
            state.transition(RunState::Failed);
            state.cancel = None;
            state.last_error = Some("generation task aborted".to_string());
        }
    }
}

/// Handle to a started run.
pub struct RunHandle {
    task: JoinHandle<Result<RunReport, GenerationError>>,
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunReport, GenerationError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(GenerationError::Cancelled),
            Err(e) => Err(GenerationError::Aborted(e.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        feed: ChangeFeed,
        titles: Arc<dyn TitleGenerator>,
        content: Arc<dyn ContentGenerator>,
        options: OrchestratorOptions,
    ) -> Self {
        let tracker = Arc::new(ItemTracker::new());
        let templates = match options.template_seed {
            Some(seed) => TemplateEngine::with_seed(seed),
            None => TemplateEngine::new(),
        };
        let driver = GenerationDriver::new(
            store.clone(),
            TitleChain::new(titles, templates, options.call_timeout),
            content,
            tracker.clone(),
            options.call_timeout,
        );
        let listener =
            ReconciliationListener::new(store.clone(), feed, tracker.clone(), options.retry);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                driver,
                listener,
                tracker,
                state: Mutex::new(FacadeState::default()),
                subscription: Mutex::new(None),
                events,
            }),
        }
    }

    /// Validate `profile` and start a run in the background.
    ///
    /// Rejected with [`GenerationError::AlreadyRunning`] while another run
    /// is active, and with [`GenerationError::InvalidProfile`] before any
    /// state changes.
    pub async fn start(&self, profile: BusinessProfile) -> Result<RunHandle, GenerationError> {
        let profile = profile.validate()?;
        let cancel = CancellationToken::new();
        {
            let mut state = self.inner.state();
            if !state.run.can_start() {
                warn!(company = %profile.company_name, "rejecting start, run already in progress");
                return Err(GenerationError::AlreadyRunning);
            }
            state.transition(RunState::Running);
            state.last_error = None;
            state.last_update = None;
            state.cancel = Some(cancel.clone());
        }

        // Re-subscribed once the new run's items are persisted. Waiting for
        // the old worker guarantees it cannot write after the clear below.
        let previous = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(previous) = previous {
            previous.unsubscribe().await;
        }
        self.inner.tracker.clear().await;
        let total = planned_total(&profile);
        info!(company = %profile.company_name, total, "generation run started");
        self.inner.emit(RunEvent::RunStarted {
            company_name: profile.company_name.clone(),
            total,
        });

        let inner = self.inner.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut guard = RunGuard {
                inner: inner.clone(),
                settled: false,
            };
            let sink = |update: ProgressUpdate| inner.on_progress(update);
            let result = inner.driver.run(&profile, &token, &sink).await;
            if let Err(e) = &result {
                error!(company = %profile.company_name, error = %e, "generation run failed");
            }
            inner.finish(&result);
            guard.settled = true;
            result
        });

        Ok(RunHandle { task, cancel })
    }

    /// Start a run and wait for it.
    pub async fn run(&self, profile: BusinessProfile) -> Result<RunReport, GenerationError> {
        self.start(profile).await?.wait().await
    }

    /// Request cancellation of the active run. Returns whether one was active.
    pub fn cancel(&self) -> bool {
        match &self.inner.state().cancel {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> RunState {
        self.inner.state().run
    }

    pub fn is_generating(&self) -> bool {
        self.state().is_running()
    }

    /// Item-level progress of the tracked company.
    pub fn progress(&self) -> ProgressSnapshot {
        self.inner.tracker.snapshot()
    }

    pub fn watch_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.inner.tracker.watch()
    }

    /// Last run-level report from the driver, if a run has reported.
    pub fn last_update(&self) -> Option<ProgressUpdate> {
        self.inner.state().last_update
    }

    /// Error of the last failed run; cleared when a new run starts.
    pub fn last_error(&self) -> Option<String> {
        self.inner.state().last_error.clone()
    }

    pub fn last_report(&self) -> Option<RunReport> {
        self.inner.state().last_report.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<RunEvent> {
        self.inner.events.subscribe()
    }

    /// Follow a company without running anything, e.g. to watch another
    /// facade's run over the same store and feed. Seeds the tracker with one
    /// reload first. Writes from other processes never reach the in-process
    /// feed, so for those only the seed reload applies.
    pub async fn follow(&self, company_id: i64) {
        self.inner.listener.reload_now(company_id).await;
        self.inner.follow(company_id);
    }

    /// Delete one content item. The change feed takes care of the tracker.
    pub async fn delete_item(&self, id: i64) -> anyhow::Result<bool> {
        self.inner.store.delete_content_item(id).await
    }

    /// Cancel any active run and stop listening for changes.
    pub async fn shutdown(&self) {
        self.cancel();
        let subscription = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe().await;
        }
    }
}
