use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use super::RecordStore;
use crate::feed::{ChangeEvent, ChangeFeed, ChangeOp, ChangeTable};
use crate::models::*;

const COMPANY_COLUMNS: &str = "id, name, industry, website, created_at";
const ITEM_COLUMNS: &str = "id, company_id, run_id, service_id, location_id, kind, title, content, status, created_at, updated_at";
const RUN_COLUMNS: &str = "id, company_id, status, total, error, started_at, completed_at";

/// Synchronous SQLite access. Wrapped by [`SqliteStore`] for async callers.
pub struct ContentDb {
    conn: Connection,
}

impl ContentDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        // Content rows keep plain service/location ids: a later run replaces
        // services and locations, but earlier content is only ever removed
        // by explicit deletion.
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS companies (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    industry TEXT NOT NULL DEFAULT '',
                    website TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS services (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS service_locations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
                    location TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS generation_runs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
                    status TEXT NOT NULL DEFAULT 'running',
                    total INTEGER NOT NULL DEFAULT 0,
                    error TEXT,
                    started_at TEXT NOT NULL DEFAULT (datetime('now')),
                    completed_at TEXT
                );

                CREATE TABLE IF NOT EXISTS content (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
                    run_id INTEGER NOT NULL REFERENCES generation_runs(id) ON DELETE CASCADE,
                    service_id INTEGER NOT NULL,
                    location_id INTEGER,
                    kind TEXT NOT NULL,
                    title TEXT NOT NULL,
                    content TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_services_company ON services(company_id);
                CREATE INDEX IF NOT EXISTS idx_locations_company ON service_locations(company_id);
                CREATE INDEX IF NOT EXISTS idx_runs_company ON generation_runs(company_id);
                CREATE INDEX IF NOT EXISTS idx_content_company ON content(company_id);
                CREATE INDEX IF NOT EXISTS idx_content_run ON content(run_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Company CRUD ──────────────────────────────────────────────────

    pub fn find_company_by_name(&self, name: &str) -> Result<Option<Company>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM companies WHERE name = ?1", COMPANY_COLUMNS),
                params![name],
                company_from_row,
            )
            .optional()
            .context("Failed to query company by name")
    }

    pub fn get_company(&self, id: i64) -> Result<Option<Company>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM companies WHERE id = ?1", COMPANY_COLUMNS),
                params![id],
                company_from_row,
            )
            .optional()
            .context("Failed to query company")
    }

    pub fn insert_company(&self, name: &str, industry: &str, website: &str) -> Result<Company> {
        self.conn
            .execute(
                "INSERT INTO companies (name, industry, website) VALUES (?1, ?2, ?3)",
                params![name, industry, website],
            )
            .context("Failed to insert company")?;
        let id = self.conn.last_insert_rowid();
        self.get_company(id)?
            .context("Company not found after insert")
    }

    pub fn update_company(&self, id: i64, industry: &str, website: &str) -> Result<Company> {
        let count = self
            .conn
            .execute(
                "UPDATE companies SET industry = ?1, website = ?2 WHERE id = ?3",
                params![industry, website, id],
            )
            .context("Failed to update company")?;
        if count == 0 {
            anyhow::bail!("Company {} not found", id);
        }
        self.get_company(id)?
            .context("Company not found after update")
    }

    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM companies ORDER BY id", COMPANY_COLUMNS))
            .context("Failed to prepare list_companies")?;
        let rows = stmt
            .query_map([], company_from_row)
            .context("Failed to query companies")?;
        let mut companies = Vec::new();
        for row in rows {
            companies.push(row.context("Failed to read company row")?);
        }
        Ok(companies)
    }

    // ── Services and locations ────────────────────────────────────────

    /// Swap the company's services for `names` in one transaction. Rows come
    /// back in input order; on any failure the old set is left untouched.
    pub fn replace_services(&self, company_id: i64, names: &[String]) -> Result<Vec<Service>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "DELETE FROM services WHERE company_id = ?1",
            params![company_id],
        )
        .context("Failed to delete services")?;
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            tx.execute(
                "INSERT INTO services (company_id, name) VALUES (?1, ?2)",
                params![company_id, name],
            )
            .context("Failed to insert service")?;
            ids.push(tx.last_insert_rowid());
        }
        tx.commit().context("Failed to commit service replace")?;

        let by_id = self.list_services(company_id)?;
        ids.iter()
            .map(|id| {
                by_id
                    .iter()
                    .find(|s| s.id == *id)
                    .cloned()
                    .context("Service not found after insert")
            })
            .collect()
    }

    pub fn list_services(&self, company_id: i64) -> Result<Vec<Service>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, company_id, name, created_at FROM services
                 WHERE company_id = ?1 ORDER BY created_at, id",
            )
            .context("Failed to prepare list_services")?;
        let rows = stmt
            .query_map(params![company_id], |row| {
                Ok(Service {
                    id: row.get(0)?,
                    company_id: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .context("Failed to query services")?;
        let mut services = Vec::new();
        for row in rows {
            services.push(row.context("Failed to read service row")?);
        }
        Ok(services)
    }

    /// Location counterpart of [`ContentDb::replace_services`].
    pub fn replace_locations(
        &self,
        company_id: i64,
        locations: &[String],
    ) -> Result<Vec<ServiceLocation>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "DELETE FROM service_locations WHERE company_id = ?1",
            params![company_id],
        )
        .context("Failed to delete service locations")?;
        let mut ids = Vec::with_capacity(locations.len());
        for location in locations {
            tx.execute(
                "INSERT INTO service_locations (company_id, location) VALUES (?1, ?2)",
                params![company_id, location],
            )
            .context("Failed to insert service location")?;
            ids.push(tx.last_insert_rowid());
        }
        tx.commit().context("Failed to commit location replace")?;

        let by_id = self.list_locations(company_id)?;
        ids.iter()
            .map(|id| {
                by_id
                    .iter()
                    .find(|l| l.id == *id)
                    .cloned()
                    .context("Service location not found after insert")
            })
            .collect()
    }

    pub fn list_locations(&self, company_id: i64) -> Result<Vec<ServiceLocation>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, company_id, location, created_at FROM service_locations
                 WHERE company_id = ?1 ORDER BY created_at, id",
            )
            .context("Failed to prepare list_locations")?;
        let rows = stmt
            .query_map(params![company_id], |row| {
                Ok(ServiceLocation {
                    id: row.get(0)?,
                    company_id: row.get(1)?,
                    location: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .context("Failed to query service locations")?;
        let mut locations = Vec::new();
        for row in rows {
            locations.push(row.context("Failed to read service location row")?);
        }
        Ok(locations)
    }

    // ── Generation runs ───────────────────────────────────────────────

    pub fn create_run(&self, company_id: i64, total: usize) -> Result<GenerationRun> {
        self.conn
            .execute(
                "INSERT INTO generation_runs (company_id, total) VALUES (?1, ?2)",
                params![company_id, total as i64],
            )
            .context("Failed to insert generation run")?;
        let id = self.conn.last_insert_rowid();
        self.get_run(id)?
            .context("Generation run not found after insert")
    }

    pub fn get_run(&self, id: i64) -> Result<Option<GenerationRun>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM generation_runs WHERE id = ?1", RUN_COLUMNS),
                params![id],
                run_row_from_row,
            )
            .optional()
            .context("Failed to query generation run")?;
        row.map(RunRow::into_run).transpose()
    }

    pub fn finish_run(
        &self,
        id: i64,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<GenerationRun> {
        self.conn
            .execute(
                "UPDATE generation_runs SET status = ?1, error = ?2, completed_at = datetime('now') WHERE id = ?3",
                params![status.as_str(), error, id],
            )
            .context("Failed to update generation run")?;
        self.get_run(id)?
            .context("Generation run not found after update")
    }

    pub fn latest_run(&self, company_id: i64) -> Result<Option<GenerationRun>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM generation_runs WHERE company_id = ?1 ORDER BY id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                params![company_id],
                run_row_from_row,
            )
            .optional()
            .context("Failed to query latest generation run")?;
        row.map(RunRow::into_run).transpose()
    }

    // ── Content work items ────────────────────────────────────────────

    pub fn insert_content_items(&self, items: &[NewContentItem]) -> Result<Vec<ContentWorkItem>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            if item.kind.requires_location() != item.location_id.is_some() {
                anyhow::bail!(
                    "{} item must {}have a location",
                    item.kind,
                    if item.kind.requires_location() { "" } else { "not " }
                );
            }
            tx.execute(
                "INSERT INTO content (company_id, run_id, service_id, location_id, kind, title)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    item.company_id,
                    item.run_id,
                    item.service_id,
                    item.location_id,
                    item.kind.as_str(),
                    item.title
                ],
            )
            .context("Failed to insert content item")?;
            ids.push(tx.last_insert_rowid());
        }
        tx.commit().context("Failed to commit content insert")?;

        let mut inserted = Vec::with_capacity(ids.len());
        for id in ids {
            inserted.push(
                self.get_content_item(id)?
                    .context("Content item not found after insert")?,
            );
        }
        Ok(inserted)
    }

    pub fn get_content_item(&self, id: i64) -> Result<Option<ContentWorkItem>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM content WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                item_row_from_row,
            )
            .optional()
            .context("Failed to query content item")?;
        row.map(ContentItemRow::into_item).transpose()
    }

    /// Settle a pending item. Items that already left `pending` are rejected.
    pub fn update_content_item(&self, id: i64, update: &ContentUpdate) -> Result<ContentWorkItem> {
        let count = match update {
            ContentUpdate::Generated { title, content } => self
                .conn
                .execute(
                    "UPDATE content SET title = ?1, content = ?2, status = ?3, updated_at = datetime('now')
                     WHERE id = ?4 AND status = 'pending'",
                    params![title, content, update.status().as_str(), id],
                )
                .context("Failed to update content item")?,
            ContentUpdate::Failed => self
                .conn
                .execute(
                    "UPDATE content SET status = ?1, updated_at = datetime('now')
                     WHERE id = ?2 AND status = 'pending'",
                    params![update.status().as_str(), id],
                )
                .context("Failed to update content item")?,
        };
        let item = self
            .get_content_item(id)?
            .with_context(|| format!("Content item {} not found", id))?;
        if count == 0 {
            anyhow::bail!("Content item {} is already {}", id, item.status);
        }
        Ok(item)
    }

    pub fn list_current_items(&self, company_id: i64) -> Result<Vec<ContentWorkItem>> {
        self.query_items(
            &format!(
                "SELECT {} FROM content
                 WHERE company_id = ?1
                   AND run_id = (SELECT MAX(id) FROM generation_runs WHERE company_id = ?1)
                 ORDER BY created_at, id",
                ITEM_COLUMNS
            ),
            company_id,
        )
    }

    pub fn list_content_items(&self, company_id: i64) -> Result<Vec<ContentWorkItem>> {
        self.query_items(
            &format!(
                "SELECT {} FROM content WHERE company_id = ?1 ORDER BY created_at, id",
                ITEM_COLUMNS
            ),
            company_id,
        )
    }

    fn query_items(&self, sql: &str, company_id: i64) -> Result<Vec<ContentWorkItem>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .context("Failed to prepare content query")?;
        let rows = stmt
            .query_map(params![company_id], item_row_from_row)
            .context("Failed to query content items")?;
        let mut items = Vec::new();
        for row in rows {
            let r = row.context("Failed to read content row")?;
            items.push(r.into_item()?);
        }
        Ok(items)
    }

    /// Returns the owning company id if a row was deleted.
    pub fn delete_content_item(&self, id: i64) -> Result<Option<i64>> {
        let company_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT company_id FROM content WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up content item")?;
        if company_id.is_none() {
            return Ok(None);
        }
        self.conn
            .execute("DELETE FROM content WHERE id = ?1", params![id])
            .context("Failed to delete content item")?;
        Ok(company_id)
    }

    /// Raw connection access for out-of-process style writes in tests.
    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn company_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        industry: row.get(2)?,
        website: row.get(3)?,
        created_at: row.get(4)?,
    })
}

struct RunRow {
    id: i64,
    company_id: i64,
    status: String,
    total: i64,
    error: Option<String>,
    started_at: String,
    completed_at: Option<String>,
}

fn run_row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        id: row.get(0)?,
        company_id: row.get(1)?,
        status: row.get(2)?,
        total: row.get(3)?,
        error: row.get(4)?,
        started_at: row.get(5)?,
        completed_at: row.get(6)?,
    })
}

impl RunRow {
    fn into_run(self) -> Result<GenerationRun> {
        let status = RunStatus::from_str(&self.status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse run status")?;
        Ok(GenerationRun {
            id: self.id,
            company_id: self.company_id,
            status,
            total: self.total,
            error: self.error,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

struct ContentItemRow {
    id: i64,
    company_id: i64,
    run_id: i64,
    service_id: i64,
    location_id: Option<i64>,
    kind: String,
    title: String,
    content: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

fn item_row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContentItemRow> {
    Ok(ContentItemRow {
        id: row.get(0)?,
        company_id: row.get(1)?,
        run_id: row.get(2)?,
        service_id: row.get(3)?,
        location_id: row.get(4)?,
        kind: row.get(5)?,
        title: row.get(6)?,
        content: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl ContentItemRow {
    fn into_item(self) -> Result<ContentWorkItem> {
        let kind = ContentKind::from_str(&self.kind)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse content kind")?;
        let status = ContentStatus::from_str(&self.status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse content status")?;
        Ok(ContentWorkItem {
            id: self.id,
            company_id: self.company_id,
            run_id: self.run_id,
            service_id: self.service_id,
            location_id: self.location_id,
            kind,
            title: self.title,
            content: self.content,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ── Async handle ──────────────────────────────────────────────────────

/// Async-safe [`RecordStore`] over SQLite.
///
/// Wraps `ContentDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`. Every successful write publishes
/// a [`ChangeEvent`] on the attached feed.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<std::sync::Mutex<ContentDb>>,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub fn new(db: ContentDb, feed: ChangeFeed) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
            feed,
        }
    }

    pub fn open(path: &Path, feed: ChangeFeed) -> Result<Self> {
        Ok(Self::new(ContentDb::new(path)?, feed))
    }

    pub fn new_in_memory(feed: ChangeFeed) -> Result<Self> {
        Ok(Self::new(ContentDb::new_in_memory()?, feed))
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&ContentDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    fn notify(&self, table: ChangeTable, op: ChangeOp, company_id: i64) {
        self.feed.publish(ChangeEvent {
            table,
            op,
            company_id,
        });
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_company_by_name(&self, name: &str) -> Result<Option<Company>> {
        let name = name.to_string();
        self.call(move |db| db.find_company_by_name(&name)).await
    }

    async fn insert_company(&self, name: &str, industry: &str, website: &str) -> Result<Company> {
        let (name, industry, website) = (name.to_string(), industry.to_string(), website.to_string());
        let company = self
            .call(move |db| db.insert_company(&name, &industry, &website))
            .await?;
        self.notify(ChangeTable::Company, ChangeOp::Insert, company.id);
        Ok(company)
    }

    async fn update_company(&self, id: i64, industry: &str, website: &str) -> Result<Company> {
        let (industry, website) = (industry.to_string(), website.to_string());
        let company = self
            .call(move |db| db.update_company(id, &industry, &website))
            .await?;
        self.notify(ChangeTable::Company, ChangeOp::Update, company.id);
        Ok(company)
    }

    async fn list_companies(&self) -> Result<Vec<Company>> {
        self.call(|db| db.list_companies()).await
    }

    async fn replace_services(&self, company_id: i64, names: &[String]) -> Result<Vec<Service>> {
        let names = names.to_vec();
        let services = self
            .call(move |db| db.replace_services(company_id, &names))
            .await?;
        self.notify(ChangeTable::Service, ChangeOp::Update, company_id);
        Ok(services)
    }

    async fn list_services(&self, company_id: i64) -> Result<Vec<Service>> {
        self.call(move |db| db.list_services(company_id)).await
    }

    async fn replace_locations(
        &self,
        company_id: i64,
        locations: &[String],
    ) -> Result<Vec<ServiceLocation>> {
        let locations = locations.to_vec();
        let replaced = self
            .call(move |db| db.replace_locations(company_id, &locations))
            .await?;
        self.notify(ChangeTable::Location, ChangeOp::Update, company_id);
        Ok(replaced)
    }

    async fn list_locations(&self, company_id: i64) -> Result<Vec<ServiceLocation>> {
        self.call(move |db| db.list_locations(company_id)).await
    }

    async fn create_run(&self, company_id: i64, total: usize) -> Result<GenerationRun> {
        self.call(move |db| db.create_run(company_id, total)).await
    }

    async fn finish_run(
        &self,
        id: i64,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<GenerationRun> {
        let error = error.map(str::to_string);
        self.call(move |db| db.finish_run(id, status, error.as_deref()))
            .await
    }

    async fn latest_run(&self, company_id: i64) -> Result<Option<GenerationRun>> {
        self.call(move |db| db.latest_run(company_id)).await
    }

    async fn insert_content_items(
        &self,
        items: Vec<NewContentItem>,
    ) -> Result<Vec<ContentWorkItem>> {
        let mut companies: Vec<i64> = items.iter().map(|i| i.company_id).collect();
        companies.dedup();
        let inserted = self.call(move |db| db.insert_content_items(&items)).await?;
        for company_id in companies {
            self.notify(ChangeTable::Content, ChangeOp::Insert, company_id);
        }
        Ok(inserted)
    }

    async fn update_content_item(&self, id: i64, update: ContentUpdate) -> Result<ContentWorkItem> {
        let item = self
            .call(move |db| db.update_content_item(id, &update))
            .await?;
        self.notify(ChangeTable::Content, ChangeOp::Update, item.company_id);
        Ok(item)
    }

    async fn list_current_items(&self, company_id: i64) -> Result<Vec<ContentWorkItem>> {
        self.call(move |db| db.list_current_items(company_id)).await
    }

    async fn list_content_items(&self, company_id: i64) -> Result<Vec<ContentWorkItem>> {
        self.call(move |db| db.list_content_items(company_id)).await
    }

    async fn delete_content_item(&self, id: i64) -> Result<bool> {
        let deleted = self.call(move |db| db.delete_content_item(id)).await?;
        match deleted {
            Some(company_id) => {
                self.notify(ChangeTable::Content, ChangeOp::Delete, company_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
