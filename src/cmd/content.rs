//! Company status, item listing and deletion: `contentforge status|list|delete`.

use anyhow::{Context, Result};
use console::style;

use contentforge::config::Config;
use contentforge::feed::ChangeFeed;
use contentforge::models::{Company, ContentStatus};
use contentforge::progress::aggregate;
use contentforge::store::{RecordStore, SqliteStore};
use contentforge::ui::progress::kind_icon;

fn open_store(config: &Config) -> Result<SqliteStore> {
    let db_path = config.db_path();
    if !db_path.exists() {
        anyhow::bail!(
            "No database at {}. Run 'contentforge init' first.",
            db_path.display()
        );
    }
    SqliteStore::open(&db_path, ChangeFeed::default())
}

async fn find_company(store: &SqliteStore, name: &str) -> Result<Company> {
    store
        .find_company_by_name(name)
        .await?
        .with_context(|| format!("No company named '{}' (names match exactly)", name))
}

pub async fn cmd_status(config: &Config, company: &str, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let company = find_company(&store, company).await?;
    let run = store.latest_run(company.id).await?;
    let items = store.list_current_items(company.id).await?;
    let snapshot = aggregate(&items);

    if json {
        let value = serde_json::json!({
            "company": company,
            "run": run,
            "progress": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("{} (id {})", style(&company.name).bold(), company.id);
    if !company.industry.is_empty() {
        println!("  Industry: {}", company.industry);
    }
    if !company.website.is_empty() {
        println!("  Website:  {}", company.website);
    }
    match &run {
        Some(run) => println!(
            "  Last run: #{} {} (started {})",
            run.id, run.status, run.started_at
        ),
        None => println!("  Last run: none"),
    }
    println!();
    println!(
        "  {} total, {} generated, {} pending, {} error ({}% complete)",
        snapshot.total,
        style(snapshot.generated).green(),
        snapshot.pending,
        style(snapshot.error).red(),
        snapshot.percent_complete
    );
    println!();
    Ok(())
}

pub async fn cmd_list(config: &Config, company: &str, json: bool, all: bool) -> Result<()> {
    let store = open_store(config)?;
    let company = find_company(&store, company).await?;
    let items = if all {
        store.list_content_items(company.id).await?
    } else {
        store.list_current_items(company.id).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No content items for '{}'.", company.name);
        return Ok(());
    }

    println!();
    println!("{:<6} {:<10} {:<10} Title", "Id", "Kind", "Status");
    println!("{:<6} {:<10} {:<10} -----", "------", "----------", "----------");
    for item in &items {
        let status = match item.status {
            ContentStatus::Generated => style(item.status.as_str()).green(),
            ContentStatus::Pending => style(item.status.as_str()).yellow(),
            ContentStatus::Error => style(item.status.as_str()).red(),
        };
        println!(
            "{:<6} {}{:<8} {:<10} {}",
            item.id,
            kind_icon(item.kind),
            item.kind.as_str(),
            status,
            item.title
        );
    }
    println!();
    println!("{} item(s)", items.len());
    Ok(())
}

pub async fn cmd_delete(config: &Config, item: i64) -> Result<()> {
    let store = open_store(config)?;
    if store.delete_content_item(item).await? {
        println!("Deleted content item {}", item);
        Ok(())
    } else {
        anyhow::bail!("No content item with id {}", item)
    }
}
