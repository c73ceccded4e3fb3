//! Record store boundary.
//!
//! The orchestration engine only talks to persistence through
//! [`RecordStore`], injected at construction. [`db::SqliteStore`] is the
//! shipped implementation; tests wrap it to inject failures.

pub mod db;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    Company, ContentUpdate, ContentWorkItem, GenerationRun, NewContentItem, RunStatus, Service,
    ServiceLocation,
};

pub use db::{ContentDb, SqliteStore};

#[async_trait]
pub trait RecordStore: Send + Sync {
    // ── Companies ─────────────────────────────────────────────────────

    /// Exact, case-sensitive match on `name`.
    async fn find_company_by_name(&self, name: &str) -> Result<Option<Company>>;

    async fn insert_company(&self, name: &str, industry: &str, website: &str) -> Result<Company>;

    async fn update_company(&self, id: i64, industry: &str, website: &str) -> Result<Company>;

    async fn list_companies(&self) -> Result<Vec<Company>>;

    // ── Services and locations ────────────────────────────────────────

    /// Delete the company's services and insert `names` in their place, as
    /// one transaction. Returned rows are in input order.
    async fn replace_services(&self, company_id: i64, names: &[String]) -> Result<Vec<Service>>;

    async fn list_services(&self, company_id: i64) -> Result<Vec<Service>>;

    /// Same as `replace_services`, for locations.
    async fn replace_locations(
        &self,
        company_id: i64,
        locations: &[String],
    ) -> Result<Vec<ServiceLocation>>;

    async fn list_locations(&self, company_id: i64) -> Result<Vec<ServiceLocation>>;

    // ── Generation runs ───────────────────────────────────────────────

    async fn create_run(&self, company_id: i64, total: usize) -> Result<GenerationRun>;

    async fn finish_run(
        &self,
        id: i64,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<GenerationRun>;

    async fn latest_run(&self, company_id: i64) -> Result<Option<GenerationRun>>;

    // ── Content work items ────────────────────────────────────────────

    /// Bulk insert in one transaction; returned rows are in input order.
    async fn insert_content_items(&self, items: Vec<NewContentItem>)
    -> Result<Vec<ContentWorkItem>>;

    async fn update_content_item(&self, id: i64, update: ContentUpdate) -> Result<ContentWorkItem>;

    /// Items of the company's latest run, in creation order.
    async fn list_current_items(&self, company_id: i64) -> Result<Vec<ContentWorkItem>>;

    /// Every item the company ever had, in creation order.
    async fn list_content_items(&self, company_id: i64) -> Result<Vec<ContentWorkItem>>;

    async fn delete_content_item(&self, id: i64) -> Result<bool>;
}
