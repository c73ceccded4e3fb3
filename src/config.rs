//! Layered configuration: defaults → `.contentforge/contentforge.toml` →
//! `CONTENTFORGE_*` environment variables → CLI flags.
//!
//! ```toml
//! [store]
//! path = ".contentforge/content.db"
//!
//! [generator]
//! endpoint = "http://localhost:8080/api"
//! api_key = "..."
//! model = "writer-v1"
//! timeout_secs = 30
//!
//! [reconcile]
//! max_retries = 3
//! retry_backoff_ms = 250
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::generator::{ContentGenerator, HttpGenerator, TitleGenerator, UnconfiguredGenerator};
use crate::orchestrator::OrchestratorOptions;
use crate::reconcile::RetryPolicy;

pub const CONFIG_DIR: &str = ".contentforge";
pub const CONFIG_FILE: &str = "contentforge.toml";
pub const ENV_PREFIX: &str = "CONTENTFORGE_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format '{}'. Valid values: pretty, json", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSection {
    /// Database path, relative to the project directory unless absolute.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("content.db")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Per-call limit for title and body requests.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// The complete contentforge.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentforgeToml {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default)]
    pub reconcile: ReconcileSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl ContentforgeToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse contentforge.toml")
    }

    /// Load `contentforge.toml` from `config_dir`, or defaults if absent.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize contentforge.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Overlay `CONTENTFORGE_*` variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.is_empty());

        if let Some(path) = var("STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(endpoint) = var("GENERATOR_ENDPOINT") {
            self.generator.endpoint = Some(endpoint);
        }
        if let Some(key) = var("GENERATOR_API_KEY") {
            self.generator.api_key = Some(key);
        }
        if let Some(model) = var("GENERATOR_MODEL") {
            self.generator.model = Some(model);
        }
        if let Some(secs) = var("GENERATOR_TIMEOUT_SECS") {
            self.generator.timeout_secs = secs
                .parse()
                .with_context(|| format!("Invalid {}GENERATOR_TIMEOUT_SECS '{}'", ENV_PREFIX, secs))?;
        }
        if let Some(retries) = var("RECONCILE_MAX_RETRIES") {
            self.reconcile.max_retries = retries
                .parse()
                .with_context(|| format!("Invalid {}RECONCILE_MAX_RETRIES '{}'", ENV_PREFIX, retries))?;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.generator.endpoint.as_deref() {
            None => warnings.push(
                "No generator endpoint configured: titles will come from templates and every body will end up 'error'"
                    .to_string(),
            ),
            Some(endpoint) if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") => {
                warnings.push(format!(
                    "Generator endpoint '{}' should start with http:// or https://",
                    endpoint
                ))
            }
            Some(_) => {}
        }

        if self.generator.timeout_secs == 0 {
            warnings.push("generator.timeout_secs is 0: every generator call will time out".to_string());
        }

        if self.reconcile.retry_backoff_ms == 0 && self.reconcile.max_retries > 0 {
            warnings.push("reconcile.retry_backoff_ms is 0: reload retries will not back off".to_string());
        }

        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            warnings.push(format!("Invalid logging.level '{}'", self.logging.level));
        }

        warnings
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub config_dir: PathBuf,
    pub toml: ContentforgeToml,
    pub verbose: bool,
}

impl Config {
    /// Load file and environment layers for `project_dir`.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let mut toml = ContentforgeToml::load_or_default(&config_dir)?;
        toml.apply_env(|key| std::env::var(key).ok())?;
        Ok(Self {
            project_dir,
            config_dir,
            toml,
            verbose: false,
        })
    }

    /// Load, then apply CLI overrides.
    pub fn with_cli_args(
        project_dir: &Path,
        verbose: bool,
        log_format: Option<LogFormat>,
    ) -> Result<Self> {
        let mut config = Self::load(project_dir)?;
        config.verbose = verbose;
        if verbose {
            config.toml.logging.level = "debug".to_string();
        }
        if let Some(format) = log_format {
            config.toml.logging.format = format;
        }
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn db_path(&self) -> PathBuf {
        if self.toml.store.path.is_absolute() {
            self.toml.store.path.clone()
        } else {
            self.project_dir.join(&self.toml.store.path)
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)
            .context("Failed to create .contentforge directory")?;
        if let Some(parent) = self.db_path().parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.generator.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.toml.reconcile.max_retries,
            backoff: Duration::from_millis(self.toml.reconcile.retry_backoff_ms),
        }
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            call_timeout: self.call_timeout(),
            retry: self.retry_policy(),
            template_seed: None,
        }
    }

    /// Title and body generators for the configured endpoint. Without an
    /// endpoint both fail every call.
    pub fn generators(&self) -> (Arc<dyn TitleGenerator>, Arc<dyn ContentGenerator>) {
        match self.toml.generator.endpoint.as_deref() {
            Some(endpoint) => {
                let http = Arc::new(HttpGenerator::new(
                    endpoint,
                    self.toml.generator.api_key.clone(),
                    self.toml.generator.model.clone(),
                ));
                let titles: Arc<dyn TitleGenerator> = http.clone();
                let content: Arc<dyn ContentGenerator> = http;
                (titles, content)
            }
            None => {
                let titles: Arc<dyn TitleGenerator> = Arc::new(UnconfiguredGenerator);
                let content: Arc<dyn ContentGenerator> = Arc::new(UnconfiguredGenerator);
                (titles, content)
            }
        }
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let toml = ContentforgeToml::parse("").unwrap();
        assert_eq!(toml, ContentforgeToml::default());
        assert_eq!(toml.store.path, PathBuf::from(".contentforge/content.db"));
        assert_eq!(toml.generator.timeout_secs, 30);
        assert_eq!(toml.reconcile.max_retries, 3);
        assert_eq!(toml.reconcile.retry_backoff_ms, 250);
        assert_eq!(toml.logging.level, "info");
        assert_eq!(toml.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_parse_sections() {
        let content = r#"
[store]
path = "data/content.db"

[generator]
endpoint = "https://gen.example/api"
model = "writer-v1"
timeout_secs = 10

[logging]
format = "json"
"#;
        let toml = ContentforgeToml::parse(content).unwrap();
        assert_eq!(toml.store.path, PathBuf::from("data/content.db"));
        assert_eq!(toml.generator.endpoint.as_deref(), Some("https://gen.example/api"));
        assert_eq!(toml.generator.model.as_deref(), Some("writer-v1"));
        assert_eq!(toml.generator.timeout_secs, 10);
        assert_eq!(toml.logging.format, LogFormat::Json);
        assert_eq!(toml.reconcile, ReconcileSection::default());
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        assert!(ContentforgeToml::parse("[logging]\nformat = \"xml\"\n").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut toml = ContentforgeToml::parse("[generator]\nendpoint = \"http://file\"\n").unwrap();
        toml.apply_env(env(&[
            ("CONTENTFORGE_GENERATOR_ENDPOINT", "http://env"),
            ("CONTENTFORGE_GENERATOR_TIMEOUT_SECS", "5"),
            ("CONTENTFORGE_LOG_FORMAT", "json"),
            ("CONTENTFORGE_STORE_PATH", ""),
        ]))
        .unwrap();
        assert_eq!(toml.generator.endpoint.as_deref(), Some("http://env"));
        assert_eq!(toml.generator.timeout_secs, 5);
        assert_eq!(toml.logging.format, LogFormat::Json);
        // Empty values are ignored.
        assert_eq!(toml.store.path, default_store_path());
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let mut toml = ContentforgeToml::default();
        let err = toml
            .apply_env(env(&[("CONTENTFORGE_GENERATOR_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("GENERATOR_TIMEOUT_SECS"));
    }

    #[test]
    fn test_validate_warns_without_endpoint() {
        let warnings = ContentforgeToml::default().validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("No generator endpoint"));
    }

    #[test]
    fn test_validate_clean_config() {
        let mut toml = ContentforgeToml::default();
        toml.generator.endpoint = Some("https://gen.example".to_string());
        assert!(toml.validate().is_empty());

        toml.generator.endpoint = Some("gen.example".to_string());
        toml.generator.timeout_secs = 0;
        assert_eq!(toml.validate().len(), 2);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut toml = ContentforgeToml::default();
        toml.generator.endpoint = Some("https://gen.example".to_string());
        toml.save(&path).unwrap();
        assert_eq!(ContentforgeToml::load(&path).unwrap(), toml);
    }

    #[test]
    fn test_config_paths_and_cli_overrides() {
        let dir = tempdir().unwrap();
        let config = Config::with_cli_args(dir.path(), true, Some(LogFormat::Json)).unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.config_file(), root.join(".contentforge/contentforge.toml"));
        assert!(config.db_path().starts_with(&root));
        assert_eq!(config.toml.logging.level, "debug");
        assert_eq!(config.toml.logging.format, LogFormat::Json);

        config.ensure_directories().unwrap();
        assert!(root.join(".contentforge").is_dir());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
