//! Content generation: `contentforge generate --profile <file>`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;

use contentforge::config::Config;
use contentforge::driver::planned_total;
use contentforge::feed::ChangeFeed;
use contentforge::models::{BusinessProfile, RunStatus};
use contentforge::orchestrator::{Orchestrator, RunEvent};
use contentforge::store::SqliteStore;
use contentforge::ui::GenerationUI;
use contentforge::ui::icons::WARN;

pub async fn cmd_generate(
    config: &Config,
    profile_path: &Path,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let profile = BusinessProfile::load(profile_path)?.validate()?;

    for warning in config.validate() {
        eprintln!("{}{}", WARN, warning);
    }

    config.ensure_directories()?;
    let feed = ChangeFeed::default();
    let store = Arc::new(SqliteStore::open(&config.db_path(), feed.clone())?);
    let (titles, content) = config.generators();
    let mut options = config.orchestrator_options();
    options.template_seed = seed;
    let orchestrator = Orchestrator::new(store, feed, titles, content, options);

    let ui = Arc::new(GenerationUI::new(
        planned_total(&profile) as u64,
        config.verbose,
    ));
    let mut events = orchestrator.events();
    let handle = orchestrator.start(profile).await?;

    let render = {
        let ui = ui.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(RunEvent::RunProgress { update }) => ui.update(&update),
                    Ok(event) if event.is_terminal() => break,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    let interrupt = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                orchestrator.cancel();
            }
        })
    };

    let result = handle.wait().await;
    interrupt.abort();
    let _ = tokio::time::timeout(Duration::from_secs(1), render).await;
    orchestrator.shutdown().await;

    match result {
        Ok(report) => {
            if report.status == RunStatus::Cancelled {
                ui.finish_cancelled(&report);
            } else {
                ui.finish_success(&report);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(())
        }
        Err(e) => {
            ui.finish_error(&e.to_string());
            Err(e.into())
        }
    }
}
