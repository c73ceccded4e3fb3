//! Configuration view and validation commands: `contentforge config`.

use anyhow::Result;

use contentforge::config::{Config, ContentforgeToml};

use super::super::ConfigCommands;

pub fn cmd_config(config: &Config, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("contentforge Configuration");
            println!("==========================");
            println!();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No contentforge.toml found at {}", config_path.display());
                println!("Run 'contentforge init' to create one.");
            }
            println!();
            println!("Effective values (with env/CLI overrides):");
            let toml = &config.toml;
            println!("[store]");
            println!("  path = \"{}\"", config.db_path().display());
            println!("[generator]");
            println!(
                "  endpoint = {}",
                toml.generator
                    .endpoint
                    .as_deref()
                    .map(|e| format!("\"{}\"", e))
                    .unwrap_or_else(|| "(unset)".to_string())
            );
            println!(
                "  api_key = {}",
                if toml.generator.api_key.is_some() { "(set)" } else { "(unset)" }
            );
            if let Some(model) = &toml.generator.model {
                println!("  model = \"{}\"", model);
            }
            println!("  timeout_secs = {}", toml.generator.timeout_secs);
            println!("[reconcile]");
            println!("  max_retries = {}", toml.reconcile.max_retries);
            println!("  retry_backoff_ms = {}", toml.reconcile.retry_backoff_ms);
            println!("[logging]");
            println!("  level = \"{}\"", toml.logging.level);
            println!("  format = \"{}\"", toml.logging.format);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("contentforge.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }
            std::fs::create_dir_all(&config.config_dir)?;
            ContentforgeToml::default().save(&config_path)?;
            println!("Created contentforge.toml at {}", config_path.display());
        }
    }

    Ok(())
}
