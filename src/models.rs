use std::path::Path;
use std::str::FromStr;

use anyhow::Context;

use serde::{Deserialize, Serialize};

use crate::errors::ProfileError;

/// Upper bound on services and locations accepted in one profile.
pub const MAX_PROFILE_ENTRIES: usize = 5;

/// User-submitted description of a business, decomposed into a Company plus
/// its Services and ServiceLocations when a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub company_name: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub website: String,
    pub services: Vec<String>,
    pub locations: Vec<String>,
}

impl BusinessProfile {
    /// Trim every field and check the 1..=5 bounds on services and locations.
    ///
    /// Returns the normalized profile; the original is left untouched.
    pub fn validate(&self) -> Result<BusinessProfile, ProfileError> {
        let company_name = self.company_name.trim().to_string();
        if company_name.is_empty() {
            return Err(ProfileError::MissingCompanyName);
        }
        let services = normalize_entries("services", &self.services)?;
        let locations = normalize_entries("locations", &self.locations)?;

        Ok(BusinessProfile {
            company_name,
            industry: self.industry.trim().to_string(),
            website: self.website.trim().to_string(),
            services,
            locations,
        })
    }

    /// Read a profile from a `.toml`, `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        Self::parse(&content, &extension)
            .with_context(|| format!("Failed to parse profile: {}", path.display()))
    }

    /// Parse profile text in the given format (`toml`, `json`, `yaml`/`yml`).
    pub fn parse(content: &str, format: &str) -> anyhow::Result<Self> {
        let profile = match format {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            "yaml" | "yml" => serde_yaml::from_str(content)?,
            other => anyhow::bail!(
                "Unsupported profile format '{}'. Use .toml, .json, .yaml or .yml",
                other
            ),
        };
        Ok(profile)
    }
}

fn normalize_entries(field: &'static str, entries: &[String]) -> Result<Vec<String>, ProfileError> {
    if entries.is_empty() || entries.len() > MAX_PROFILE_ENTRIES {
        return Err(ProfileError::EntryCount {
            field,
            count: entries.len(),
            max: MAX_PROFILE_ENTRIES,
        });
    }
    let mut normalized: Vec<String> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            return Err(ProfileError::EmptyEntry { field, index });
        }
        if normalized.iter().any(|e| e == trimmed) {
            return Err(ProfileError::DuplicateEntry {
                field,
                value: trimmed.to_string(),
            });
        }
        normalized.push(trimmed.to_string());
    }
    Ok(normalized)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub industry: String,
    pub website: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLocation {
    pub id: i64,
    pub company_id: i64,
    pub location: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Service,
    Location,
    Blog,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Location => "location",
            Self::Blog => "blog",
        }
    }

    /// Location and blog pages are always tied to a service location.
    pub fn requires_location(&self) -> bool {
        matches!(self, Self::Location | Self::Blog)
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(Self::Service),
            "location" => Ok(Self::Location),
            "blog" => Ok(Self::Blog),
            _ => Err(format!("Invalid content kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[default]
    Pending,
    Generated,
    Error,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generated => "generated",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Generated | Self::Error)
    }

    /// Status only moves forward: `pending -> generated | error`.
    pub fn can_transition_to(&self, next: ContentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Generated) | (Self::Pending, Self::Error)
        )
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "generated" => Ok(Self::Generated),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid content status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid run status: {}", s)),
        }
    }
}

/// One persisted generation run for a company. Work items belong to exactly
/// one run; a company's "current" items are those of its latest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRun {
    pub id: i64,
    pub company_id: i64,
    pub status: RunStatus,
    pub total: i64,
    pub error: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// A persisted unit of content: one service page, location page or blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentWorkItem {
    pub id: i64,
    pub company_id: i64,
    pub run_id: i64,
    pub service_id: i64,
    pub location_id: Option<i64>,
    pub kind: ContentKind,
    pub title: String,
    pub content: Option<String>,
    pub status: ContentStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Insert payload for a work item whose parent records already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContentItem {
    pub company_id: i64,
    pub run_id: i64,
    pub service_id: i64,
    pub location_id: Option<i64>,
    pub kind: ContentKind,
    pub title: String,
}

/// Body-phase outcome written back to one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentUpdate {
    Generated { title: String, content: String },
    Failed,
}

impl ContentUpdate {
    pub fn status(&self) -> ContentStatus {
        match self {
            Self::Generated { .. } => ContentStatus::Generated,
            Self::Failed => ContentStatus::Error,
        }
    }
}
