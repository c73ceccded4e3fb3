pub mod config;
pub mod driver;
pub mod errors;
pub mod expand;
pub mod feed;
pub mod generator;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod reconcile;
pub mod store;
pub mod tracker;
pub mod ui;

#[cfg(test)]
mod testutil;

pub use errors::{GenerationError, GeneratorError, ProfileError};
pub use models::BusinessProfile;
pub use orchestrator::{Orchestrator, OrchestratorOptions, RunEvent, RunState};
pub use progress::ProgressSnapshot;
