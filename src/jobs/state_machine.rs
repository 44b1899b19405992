//! Job lifecycle state machine
//!
//! Every mutation loads the current record, checks the requested edge
//! against `JobStatus::can_transition_to`, and writes the whole record
//! back. Writes to one job are serialized by a per-job lock so a `cancel`
//! from a caller and a checkpoint from the runner never interleave between
//! the read and the write. Reads take no lock.
//!
//! A job that is already terminal is never changed again: late updates are
//! reported as `TransitionOutcome::Ignored` rather than as errors.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::store::JobStore;
use super::types::{Job, JobFilter, JobId, JobResult, JobStatus};
use crate::error::{AuditError, AuditResult};

/// Cause recorded on jobs found mid-flight at start-up
pub const INTERRUPTED_ERROR: &str = "interrupted: process restarted";

/// What a mutating call did
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The change was written; holds the stored record
    Applied(Job),
    /// The job was already terminal; holds the unchanged record
    Ignored(Job),
}

impl TransitionOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    #[must_use]
    pub fn job(&self) -> &Job {
        match self {
            Self::Applied(job) | Self::Ignored(job) => job,
        }
    }

    #[must_use]
    pub fn into_job(self) -> Job {
        match self {
            Self::Applied(job) | Self::Ignored(job) => job,
        }
    }
}

pub struct JobStateMachine {
    store: Arc<dyn JobStore>,
    locks: DashMap<JobId, Arc<Mutex<()>>>,
}

impl JobStateMachine {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, id: JobId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    /// Allocate and persist a `pending` job
    pub async fn create(&self, url: &Url, prompt_ids: Vec<String>) -> AuditResult<Job> {
        let job = Job::new(url.as_str(), prompt_ids);
        self.store.upsert(&job).await?;
        info!(job_id = %job.id, url = %job.url, "Job created");
        Ok(job)
    }

    /// Read the current record
    pub async fn get(&self, id: &JobId) -> AuditResult<Job> {
        self.store.get(id).await?.ok_or(AuditError::NotFound(*id))
    }

    pub async fn list(&self, filter: &JobFilter) -> AuditResult<Vec<Job>> {
        Ok(self.store.list(filter).await?)
    }

    /// Move a running job to `status` with new progress and step label
    ///
    /// Progress never goes down; a lower value keeps the stored one.
    pub async fn transition(
        &self,
        id: &JobId,
        status: JobStatus,
        progress: u8,
        step: &str,
    ) -> AuditResult<TransitionOutcome> {
        self.mutate(id, status, |job| {
            job.progress = job.progress.max(progress.min(100));
            job.current_step = step.to_string();
            if status == JobStatus::Crawling && job.started_at.is_none() {
                job.started_at = Some(Utc::now());
            }
        })
        .await
    }

    /// Record a successful analysis; only valid from `analyzing`
    pub async fn complete(&self, id: &JobId, result: JobResult) -> AuditResult<TransitionOutcome> {
        self.mutate(id, JobStatus::Completed, |job| {
            job.progress = 100;
            job.current_step = "completed".to_string();
            job.result = Some(result);
            job.error = None;
        })
        .await
    }

    /// Record a terminal failure with a human-readable cause
    pub async fn fail(
        &self,
        id: &JobId,
        error: impl Into<String>,
    ) -> AuditResult<TransitionOutcome> {
        let error = error.into();
        self.mutate(id, JobStatus::Failed, |job| {
            job.current_step = "failed".to_string();
            job.result = None;
            job.error = Some(error);
        })
        .await
    }

    /// Cancel a running job; a no-op for terminal jobs
    pub async fn cancel(&self, id: &JobId) -> AuditResult<TransitionOutcome> {
        self.mutate(id, JobStatus::Cancelled, |job| {
            job.current_step = "cancelled".to_string();
            job.result = None;
        })
        .await
    }

    /// Fail every job a previous process left in a non-terminal state
    ///
    /// Returns how many jobs were recovered.
    pub async fn recover_interrupted(&self) -> AuditResult<usize> {
        let mut recovered = 0;
        for status in [JobStatus::Pending, JobStatus::Crawling, JobStatus::Analyzing] {
            for job in self.store.list(&JobFilter::with_status(status)).await? {
                if self.fail(&job.id, INTERRUPTED_ERROR).await?.is_applied() {
                    recovered += 1;
                }
            }
        }
        if recovered > 0 {
            warn!(recovered, "Marked interrupted jobs as failed");
        }
        Ok(recovered)
    }

    /// Drop the write lock of a finished job
    pub fn forget(&self, id: &JobId) {
        self.locks.remove(id);
    }

    async fn mutate<F>(
        &self,
        id: &JobId,
        target: JobStatus,
        apply: F,
    ) -> AuditResult<TransitionOutcome>
    where
        F: FnOnce(&mut Job),
    {
        let lock = self.lock_for(*id);
        let _guard = lock.lock().await;

        let mut job = self.get(id).await?;
        if job.is_terminal() {
            debug!(
                job_id = %id,
                status = %job.status,
                requested = %target,
                "Ignoring update to terminal job"
            );
            return Ok(TransitionOutcome::Ignored(job));
        }
        if !job.status.can_transition_to(target) {
            return Err(AuditError::InvalidTransition {
                id: *id,
                from: job.status,
                to: target,
            });
        }

        let previous = job.status;
        apply(&mut job);
        job.status = target;
        let now = Utc::now();
        job.updated_at = now;
        if target.is_terminal() {
            job.completed_at = Some(now);
        }
        self.store.upsert(&job).await?;

        if previous == target {
            debug!(job_id = %id, status = %target, progress = job.progress, "Job progress");
        } else {
            info!(
                job_id = %id,
                from = %previous,
                to = %target,
                progress = job.progress,
                "Job transition"
            );
        }
        Ok(TransitionOutcome::Applied(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::MemoryJobStore;

    fn machine() -> JobStateMachine {
        JobStateMachine::new(Arc::new(MemoryJobStore::new()))
    }

    fn url() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[tokio::test]
    async fn create_persists_a_pending_job() {
        let sm = machine();
        let job = sm.create(&url(), Vec::new()).await.unwrap();
        let stored = sm.get(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        assert_eq!(stored.progress, 0);
        assert!(stored.result.is_none() && stored.error.is_none());
    }

    #[tokio::test]
    async fn progress_never_decreases() {
        let sm = machine();
        let job = sm.create(&url(), Vec::new()).await.unwrap();
        sm.transition(&job.id, JobStatus::Crawling, 40, "crawled").await.unwrap();
        let outcome = sm
            .transition(&job.id, JobStatus::Crawling, 20, "again")
            .await
            .unwrap();
        assert_eq!(outcome.job().progress, 40);
        assert!(outcome.job().started_at.is_some());
    }

    #[tokio::test]
    async fn skipping_a_phase_is_rejected() {
        let sm = machine();
        let job = sm.create(&url(), Vec::new()).await.unwrap();
        let err = sm
            .transition(&job.id, JobStatus::Analyzing, 50, "analyzing")
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidTransition { .. }));
        assert_eq!(sm.get(&job.id).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn terminal_jobs_are_frozen() {
        let sm = machine();
        let job = sm.create(&url(), Vec::new()).await.unwrap();
        sm.transition(&job.id, JobStatus::Crawling, 20, "crawling").await.unwrap();
        let cancelled = sm.cancel(&job.id).await.unwrap().into_job();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());

        let late = sm
            .transition(&job.id, JobStatus::Analyzing, 50, "analyzing")
            .await
            .unwrap();
        assert!(!late.is_applied());
        let again = sm.cancel(&job.id).await.unwrap();
        assert!(!again.is_applied());
        let failed = sm.fail(&job.id, "late").await.unwrap();
        assert!(!failed.is_applied());

        let stored = sm.get(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.updated_at, cancelled.updated_at);
        assert!(stored.error.is_none());
    }

    #[tokio::test]
    async fn fail_sets_error_only() {
        let sm = machine();
        let job = sm.create(&url(), Vec::new()).await.unwrap();
        let failed = sm.fail(&job.id, "crawl failed: dns").await.unwrap().into_job();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("crawl failed: dns"));
        assert!(failed.result.is_none());
    }

    #[tokio::test]
    async fn unknown_jobs_are_not_found() {
        let sm = machine();
        let id = JobId::new();
        assert!(matches!(sm.get(&id).await, Err(AuditError::NotFound(_))));
        assert!(matches!(sm.cancel(&id).await, Err(AuditError::NotFound(_))));
    }

    #[tokio::test]
    async fn recovery_fails_unfinished_jobs() {
        let store = Arc::new(MemoryJobStore::new());
        let sm = JobStateMachine::new(store.clone());
        let running = sm.create(&url(), Vec::new()).await.unwrap();
        sm.transition(&running.id, JobStatus::Crawling, 20, "crawling").await.unwrap();
        let done = sm.create(&url(), Vec::new()).await.unwrap();
        sm.cancel(&done.id).await.unwrap();

        let restarted = JobStateMachine::new(store);
        assert_eq!(restarted.recover_interrupted().await.unwrap(), 1);
        let recovered = restarted.get(&running.id).await.unwrap();
        assert_eq!(recovered.status, JobStatus::Failed);
        assert_eq!(recovered.error.as_deref(), Some(INTERRUPTED_ERROR));
        assert_eq!(restarted.get(&done.id).await.unwrap().status, JobStatus::Cancelled);
    }
}
