//! Project initialization: `contentforge init`.

use anyhow::{Context, Result};

use contentforge::config::{Config, ContentforgeToml};
use contentforge::feed::ChangeFeed;
use contentforge::store::SqliteStore;

pub fn cmd_init(config: &Config) -> Result<()> {
    let config_path = config.config_file();
    let existed = config_path.exists();

    config.ensure_directories()?;
    if !existed {
        ContentforgeToml::default().save(&config_path)?;
    }

    let db_path = config.db_path();
    SqliteStore::open(&db_path, ChangeFeed::default())
        .with_context(|| format!("Failed to initialize database at {}", db_path.display()))?;

    if existed {
        println!(
            "contentforge project already initialized at {}",
            config.config_dir.display()
        );
        println!("Database verified: {}", db_path.display());
        return Ok(());
    }

    println!(
        "Initialized contentforge project at {}",
        config.config_dir.display()
    );
    println!();
    println!("Created:");
    println!("  .contentforge/");
    println!("  ├── contentforge.toml   # Generator endpoint, timeouts, logging");
    println!("  └── content.db          # Companies, services, locations, content");
    println!();
    println!("Next steps:");
    println!("  1. Set [generator] endpoint in contentforge.toml (or CONTENTFORGE_GENERATOR_ENDPOINT)");
    println!("  2. Run `contentforge generate --profile business.toml`");
    Ok(())
}
