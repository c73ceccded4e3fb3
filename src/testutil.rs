//! Test doubles shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::feed::ChangeFeed;
use crate::models::*;
use crate::store::{RecordStore, SqliteStore};

/// Which operations misbehave, and how.
#[derive(Default)]
pub struct Faults {
    pub company: AtomicBool,
    pub services: AtomicBool,
    pub locations: AtomicBool,
    pub insert_items: AtomicBool,
    /// Persist locations but hand back none of them.
    pub drop_locations: AtomicBool,
    /// Stall `replace_locations` for this many milliseconds.
    pub replace_delay_ms: AtomicU64,
    /// Fail the next N `list_current_items` calls.
    pub list_failures: AtomicUsize,
    /// Stall each `list_current_items` call for this many milliseconds.
    pub list_delay_ms: AtomicU64,
    pub list_calls: AtomicUsize,
}

/// In-memory SQLite store that fails on demand.
pub struct FaultyStore {
    pub inner: SqliteStore,
    pub faults: Faults,
}

impl FaultyStore {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            inner: SqliteStore::new_in_memory(feed).unwrap(),
            faults: Faults::default(),
        }
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            bail!("injected {} failure", what);
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn find_company_by_name(&self, name: &str) -> Result<Option<Company>> {
        Self::check(&self.faults.company, "company")?;
        self.inner.find_company_by_name(name).await
    }

    async fn insert_company(&self, name: &str, industry: &str, website: &str) -> Result<Company> {
        Self::check(&self.faults.company, "company")?;
        self.inner.insert_company(name, industry, website).await
    }

    async fn update_company(&self, id: i64, industry: &str, website: &str) -> Result<Company> {
        Self::check(&self.faults.company, "company")?;
        self.inner.update_company(id, industry, website).await
    }

    async fn list_companies(&self) -> Result<Vec<Company>> {
        self.inner.list_companies().await
    }

    async fn replace_services(&self, company_id: i64, names: &[String]) -> Result<Vec<Service>> {
        Self::check(&self.faults.services, "services")?;
        self.inner.replace_services(company_id, names).await
    }

    async fn list_services(&self, company_id: i64) -> Result<Vec<Service>> {
        self.inner.list_services(company_id).await
    }

    async fn replace_locations(
        &self,
        company_id: i64,
        locations: &[String],
    ) -> Result<Vec<ServiceLocation>> {
        Self::check(&self.faults.locations, "locations")?;
        let delay = self.faults.replace_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let mut replaced = self.inner.replace_locations(company_id, locations).await?;
        if self.faults.drop_locations.load(Ordering::SeqCst) {
            replaced.clear();
        }
        Ok(replaced)
    }

    async fn list_locations(&self, company_id: i64) -> Result<Vec<ServiceLocation>> {
        self.inner.list_locations(company_id).await
    }

    async fn create_run(&self, company_id: i64, total: usize) -> Result<GenerationRun> {
        self.inner.create_run(company_id, total).await
    }

    async fn finish_run(
        &self,
        id: i64,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<GenerationRun> {
        self.inner.finish_run(id, status, error).await
    }

    async fn latest_run(&self, company_id: i64) -> Result<Option<GenerationRun>> {
        self.inner.latest_run(company_id).await
    }

    async fn insert_content_items(
        &self,
        items: Vec<NewContentItem>,
    ) -> Result<Vec<ContentWorkItem>> {
        Self::check(&self.faults.insert_items, "content insert")?;
        self.inner.insert_content_items(items).await
    }

    async fn update_content_item(&self, id: i64, update: ContentUpdate) -> Result<ContentWorkItem> {
        self.inner.update_content_item(id, update).await
    }

    async fn list_current_items(&self, company_id: i64) -> Result<Vec<ContentWorkItem>> {
        self.faults.list_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.faults.list_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.faults.list_failures.store(remaining - 1, Ordering::SeqCst);
            bail!("injected list failure");
        }
        let delay = self.faults.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.list_current_items(company_id).await
    }

    async fn list_content_items(&self, company_id: i64) -> Result<Vec<ContentWorkItem>> {
        self.inner.list_content_items(company_id).await
    }

    async fn delete_content_item(&self, id: i64) -> Result<bool> {
        self.inner.delete_content_item(id).await
    }
}
