//! External title/body generators and the local title fallback.
//!
//! | Item                 | Role                                                  |
//! |----------------------|-------------------------------------------------------|
//! | `TitleGenerator`     | remote title source, may fail                         |
//! | `ContentGenerator`   | remote body source, may fail, no local fallback       |
//! | `TitleChain`         | remote title first, template title on any failure     |
//! | `templates`          | pseudo-random template titles                         |
//! | `http`               | JSON-over-HTTP implementation of both generator traits|

pub mod http;
pub mod templates;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::GeneratorError;
use crate::models::ContentKind;

pub use http::HttpGenerator;
pub use templates::{TemplateEngine, TemplateVars};

/// Context sent to the external generators for one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub kind: ContentKind,
    pub company_name: String,
    pub industry: String,
    pub website: String,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Set once the parent records exist (body phase only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<i64>,
    /// Title chosen in the title phase, passed along to the body call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl GenerationRequest {
    pub fn template_vars(&self) -> TemplateVars {
        TemplateVars {
            company: self.company_name.clone(),
            industry: self.industry.clone(),
            service: self.service_name.clone(),
            location: self.location.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub content: String,
    /// A refined title, if the generator produced one.
    #[serde(default)]
    pub title: Option<String>,
}

#[async_trait]
pub trait TitleGenerator: Send + Sync {
    async fn generate_title(&self, request: &GenerationRequest) -> Result<String, GeneratorError>;
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_content(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedContent, GeneratorError>;
}

/// Stand-in used when no generator endpoint is configured: every call fails,
/// so titles come from templates and bodies end up `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGenerator;

#[async_trait]
impl TitleGenerator for UnconfiguredGenerator {
    async fn generate_title(&self, _request: &GenerationRequest) -> Result<String, GeneratorError> {
        Err(GeneratorError::Unconfigured)
    }
}

#[async_trait]
impl ContentGenerator for UnconfiguredGenerator {
    async fn generate_content(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GeneratedContent, GeneratorError> {
        Err(GeneratorError::Unconfigured)
    }
}

/// Await `fut`, turning expiry of `limit` into [`GeneratorError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, GeneratorError>
where
    F: Future<Output = Result<T, GeneratorError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(GeneratorError::Timeout(limit)),
    }
}

/// Where a title came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleSource {
    Remote,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleOutcome {
    pub title: String,
    pub source: TitleSource,
}

/// Two-stage title strategy: ask the remote generator, and on any failure
/// (error, timeout, blank answer) render a local template instead.
pub struct TitleChain {
    remote: Arc<dyn TitleGenerator>,
    templates: TemplateEngine,
    timeout: Duration,
}

impl TitleChain {
    pub fn new(remote: Arc<dyn TitleGenerator>, templates: TemplateEngine, timeout: Duration) -> Self {
        Self {
            remote,
            templates,
            timeout,
        }
    }

    pub async fn title(&self, request: &GenerationRequest) -> TitleOutcome {
        let remote = with_timeout(self.timeout, self.remote.generate_title(request))
            .await
            .and_then(|title| {
                let trimmed = title.trim();
                if trimmed.is_empty() {
                    Err(GeneratorError::Empty("title"))
                } else {
                    Ok(trimmed.to_string())
                }
            });

        match remote {
            Ok(title) => TitleOutcome {
                title,
                source: TitleSource::Remote,
            },
            Err(e) => {
                warn!(
                    kind = %request.kind,
                    service = %request.service_name,
                    error = %e,
                    "title generator failed, using template"
                );
                TitleOutcome {
                    title: self.templates.title(request.kind, &request.template_vars()),
                    source: TitleSource::Template,
                }
            }
        }
    }
}
