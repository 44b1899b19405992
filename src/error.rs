//! Error types for the audit pipeline
//!
//! `AuditError` is what callers of the job service see. Stage-local errors
//! (`ExtractError`, `ProviderError`, `PersistenceError`) convert into it.

use thiserror::Error;

use crate::jobs::{JobId, JobStatus};

/// Result type alias for service-level operations
pub type AuditResult<T> = Result<T, AuditError>;

/// Errors surfaced by the job service and the pipeline stages
#[derive(Debug, Error)]
pub enum AuditError {
    /// Rejected input (bad URL, malformed job id); no job is created
    #[error("validation error: {0}")]
    Validation(String),

    /// Job id is well-formed but unknown to the store
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// Requested status change is not an edge of the job lifecycle
    #[error("job {id}: invalid transition from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    /// Job store unavailable or failed to persist
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Crawl stage failed
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Completion provider failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Pipeline stopped because the job was cancelled
    #[error("job cancelled")]
    Cancelled,

    /// Unexpected internal failure (panics, join errors)
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuditError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the full context chain
        Self::Internal(format!("{err:#}"))
    }
}

/// Errors from the page extractor
#[derive(Debug, Error)]
pub enum ExtractError {
    /// DNS failure, navigation timeout or a non-2xx main document response
    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// Required selector never appeared, or the in-page walk failed
    #[error("render failed for {url}: {reason}")]
    Render { url: String, reason: String },

    /// Browser could not be launched or a CDP command failed
    #[error("browser error: {0}")]
    Browser(String),

    /// Extraction abandoned because the job was cancelled
    #[error("extraction cancelled")]
    Cancelled,
}

impl ExtractError {
    pub fn navigation(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn render(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Render {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from a completion provider call
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider quota exhausted: {0}")]
    Quota(String),

    #[error("provider call timed out after {0}s")]
    Timeout(u64),

    #[error("provider blocked the request: {0}")]
    SafetyBlock(String),

    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("provider transport error: {0}")]
    Transport(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider call cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether a retry has a reasonable chance of succeeding
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Quota(_)
            | Self::SafetyBlock(_)
            | Self::MalformedResponse(_)
            | Self::Cancelled => false,
        }
    }
}

/// Errors from a job store backend
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("job store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Timeout(60).is_transient());
        assert!(ProviderError::Transport("reset".into()).is_transient());
        assert!(ProviderError::Http { status: 503, body: String::new() }.is_transient());
        assert!(ProviderError::Http { status: 429, body: String::new() }.is_transient());
        assert!(!ProviderError::Http { status: 400, body: String::new() }.is_transient());
        assert!(!ProviderError::Quota("monthly".into()).is_transient());
        assert!(!ProviderError::SafetyBlock("policy".into()).is_transient());
    }

    #[test]
    fn crawl_errors_keep_their_cause_in_the_message() {
        let err = AuditError::from(ExtractError::navigation(
            "https://example.com",
            "Page navigation timeout after 30 seconds",
        ));
        let msg = err.to_string();
        assert!(msg.contains("https://example.com"));
        assert!(msg.contains("timeout"));
    }
}
