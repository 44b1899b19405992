//! Job records and their lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::error::{AuditError, AuditResult};
use crate::page_extractor::CrawlSnapshot;

/// Opaque job identifier (UUID v4), immutable once issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied id, rejecting malformed input as a validation error
    pub fn parse(raw: &str) -> AuditResult<Self> {
        raw.parse()
            .map_err(|_| AuditError::Validation(format!("malformed job id '{raw}'")))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Lifecycle state of a job
///
/// `pending -> crawling -> analyzing -> completed`, with `failed` and
/// `cancelled` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Crawling,
    Analyzing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph
    ///
    /// Re-entering the current non-terminal state is allowed so progress
    /// updates within a phase are plain transitions.
    #[must_use]
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::{Analyzing, Cancelled, Completed, Crawling, Failed, Pending};

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Pending, Pending | Crawling)
                | (Crawling, Crawling | Analyzing)
                | (Analyzing, Analyzing | Completed)
                | (_, Failed | Cancelled)
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a completed job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub snapshot: CrawlSnapshot,
    pub analysis: AnalysisResult,
}

/// One audit request and everything known about it
///
/// `result` is set only in `completed` and `error` only in `failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub status: JobStatus,

    /// Advisory 0-100, never decreases while the job is running
    pub progress: u8,
    pub current_step: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Catalog prompts requested at submission; empty means the defaults
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prompt_ids: Vec<String>,
}

impl Job {
    /// A fresh `pending` job for `url`
    #[must_use]
    pub fn new(url: impl Into<String>, prompt_ids: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            url: url.into(),
            status: JobStatus::Pending,
            progress: 0,
            current_step: "queued".to_string(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            prompt_ids,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[must_use]
    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            id: self.id,
            status: self.status,
            progress: self.progress,
            current_step: self.current_step.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Lightweight answer to a status poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
    pub updated_at: DateTime<Utc>,
}

/// Selection for `JobStore::list`
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
}

impl JobFilter {
    #[must_use]
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            limit: None,
        }
    }

    #[must_use]
    pub fn matches(&self, job: &Job) -> bool {
        self.status.is_none_or(|s| s == job.status)
    }

    /// Filter, order newest first and apply the limit
    pub fn apply<I>(&self, jobs: I) -> Vec<Job>
    where
        I: IntoIterator<Item = Job>,
    {
        let mut selected: Vec<Job> = jobs.into_iter().filter(|j| self.matches(j)).collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}
