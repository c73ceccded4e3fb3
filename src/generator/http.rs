use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ContentGenerator, GeneratedContent, GenerationRequest, TitleGenerator};
use crate::errors::GeneratorError;

/// JSON-over-HTTP client for a remote generation service.
///
/// `POST {endpoint}/title` answers `{"title": "..."}`;
/// `POST {endpoint}/content` answers `{"content": "...", "title": "..."?}`.
/// Timeouts are applied by the caller, not here.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Serialize)]
struct RequestBody<'a> {
    #[serde(flatten)]
    request: &'a GenerationRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TitleResponse {
    title: Option<String>,
}

impl HttpGenerator {
    pub fn new(endpoint: &str, api_key: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, path: &str, request: &GenerationRequest) -> Result<String, GeneratorError> {
        let url = format!("{}/{}", self.endpoint, path);
        debug!(%url, kind = %request.kind, "calling generator");

        let body = RequestBody {
            request,
            model: self.model.as_deref(),
        };
        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(GeneratorError::Http)?;
        let status = response.status();
        let text = response.text().await.map_err(GeneratorError::Http)?;
        if !status.is_success() {
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body: text.chars().take(500).collect(),
            });
        }
        Ok(text)
    }
}

/// Parse a `/title` response body.
pub fn parse_title(body: &str) -> Result<String, GeneratorError> {
    let parsed: TitleResponse =
        serde_json::from_str(body).map_err(|e| GeneratorError::Malformed(e.to_string()))?;
    match parsed.title.map(|t| t.trim().to_string()) {
        Some(title) if !title.is_empty() => Ok(title),
        _ => Err(GeneratorError::Empty("title")),
    }
}

/// Parse a `/content` response body.
pub fn parse_content(body: &str) -> Result<GeneratedContent, GeneratorError> {
    let parsed: GeneratedContent =
        serde_json::from_str(body).map_err(|e| GeneratorError::Malformed(e.to_string()))?;
    if parsed.content.trim().is_empty() {
        return Err(GeneratorError::Empty("content"));
    }
    let title = parsed
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    Ok(GeneratedContent {
        content: parsed.content,
        title,
    })
}

#[async_trait]
impl TitleGenerator for HttpGenerator {
    async fn generate_title(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        let body = self.post("title", request).await?;
        parse_title(&body)
    }
}

#[async_trait]
impl ContentGenerator for HttpGenerator {
    async fn generate_content(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedContent, GeneratorError> {
        let body = self.post("content", request).await?;
        parse_content(&body)
    }
}
