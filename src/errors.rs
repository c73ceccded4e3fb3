//! Typed error hierarchy for contentforge.
//!
//! - `ProfileError`: a submitted business profile is malformed
//! - `GeneratorError`: one external title or content call failed
//! - `GenerationError`: a run could not start or was aborted

use std::time::Duration;

use thiserror::Error;

/// Rejections raised while validating a `BusinessProfile`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Company name must not be empty")]
    MissingCompanyName,

    #[error("Expected 1 to {max} {field}, got {count}")]
    EntryCount {
        field: &'static str,
        count: usize,
        max: usize,
    },

    #[error("Entry {index} in {field} is empty")]
    EmptyEntry { field: &'static str, index: usize },

    #[error("Duplicate entry '{value}' in {field}")]
    DuplicateEntry { field: &'static str, value: String },
}

/// Failure of a single external generator call. Always recoverable at the
/// run level: titles fall back to templates, bodies mark the item `error`.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Generator call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generator request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Generator returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Generator response malformed: {0}")]
    Malformed(String),

    #[error("Generator returned an empty {0}")]
    Empty(&'static str),

    #[error("Generator not configured")]
    Unconfigured,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors surfaced to the caller of a generation run.
///
/// The store failures abort a run after it started; everything
/// per-item is absorbed into item status instead.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to upsert company '{name}': {source}")]
    CompanyUpsert {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to replace services for company {company_id}: {source}")]
    ReplaceServices {
        company_id: i64,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to replace locations for company {company_id}: {source}")]
    ReplaceLocations {
        company_id: i64,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to persist work items for company {company_id}: {source}")]
    PersistItems {
        company_id: i64,
        #[source]
        source: anyhow::Error,
    },

    #[error("A generation run is already in progress")]
    AlreadyRunning,

    #[error("Invalid business profile: {0}")]
    InvalidProfile(#[from] ProfileError),

    #[error("Generation run cancelled")]
    Cancelled,

    #[error("Generation task aborted: {0}")]
    Aborted(String),
}

impl GenerationError {
    /// Whether this error aborted a run that had already started writing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CompanyUpsert { .. }
                | Self::ReplaceServices { .. }
                | Self::ReplaceLocations { .. }
                | Self::PersistItems { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_error_entry_count_carries_bounds() {
        let err = ProfileError::EntryCount {
            field: "services",
            count: 7,
            max: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("services"));
        assert!(msg.contains('7'));
        assert!(msg.contains('5'));
    }

    #[test]
    fn generation_error_company_upsert_is_fatal() {
        let err = GenerationError::CompanyUpsert {
            name: "Acme".to_string(),
            source: anyhow::anyhow!("disk full"),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Acme"));
    }

    #[test]
    fn generation_error_already_running_is_not_fatal() {
        assert!(!GenerationError::AlreadyRunning.is_fatal());
        assert!(!GenerationError::Cancelled.is_fatal());
    }

    #[test]
    fn generation_error_converts_from_profile_error() {
        let err: GenerationError = ProfileError::MissingCompanyName.into();
        match &err {
            GenerationError::InvalidProfile(ProfileError::MissingCompanyName) => {}
            _ => panic!("Expected InvalidProfile(MissingCompanyName)"),
        }
    }

    #[test]
    fn generator_error_timeout_mentions_duration() {
        let err = GeneratorError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ProfileError::MissingCompanyName);
        assert_std_error(&GeneratorError::Empty("title"));
        assert_std_error(&GenerationError::AlreadyRunning);
    }
}
