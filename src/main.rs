use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use contentforge::config::{Config, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "contentforge")]
#[command(version, about = "Expand a business profile into service, location and blog content")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Log output format. Overrides contentforge.toml.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .contentforge/ with a default config and an empty database
    Init,
    /// Run a generation for a business profile (TOML, JSON or YAML)
    Generate {
        /// Path to the profile file
        #[arg(short, long)]
        profile: PathBuf,

        /// Seed template title selection for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Print the final run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show progress of a company's latest run
    Status {
        /// Company name (exact match)
        #[arg(short, long)]
        company: String,

        #[arg(long)]
        json: bool,
    },
    /// List a company's content items
    List {
        /// Company name (exact match)
        #[arg(short, long)]
        company: String,

        #[arg(long)]
        json: bool,

        /// Include items from earlier runs
        #[arg(long)]
        all: bool,
    },
    /// Delete one content item
    Delete {
        /// Content item id
        #[arg(long)]
        item: i64,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default contentforge.toml
    Init,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("contentforge={},warn", config.toml.logging.level)))
        .unwrap_or_else(|_| EnvFilter::new("contentforge=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.toml.logging.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    if matches!(cli.command, Commands::Init) {
        std::fs::create_dir_all(&project_dir).context("Failed to create project directory")?;
    }

    let config = Config::with_cli_args(&project_dir, cli.verbose, cli.log_format)?;
    init_tracing(&config);

    match &cli.command {
        Commands::Init => cmd::cmd_init(&config)?,
        Commands::Generate {
            profile,
            seed,
            json,
        } => cmd::cmd_generate(&config, profile, *seed, *json).await?,
        Commands::Status { company, json } => cmd::cmd_status(&config, company, *json).await?,
        Commands::List { company, json, all } => {
            cmd::cmd_list(&config, company, *json, *all).await?
        }
        Commands::Delete { item } => cmd::cmd_delete(&config, *item).await?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
