//! Drives one job through crawl, analysis and completion
//!
//! The runner is the only writer of a job once it is submitted. It checks
//! the outcome of every checkpoint write: an `Ignored` outcome means the
//! job went terminal underneath it (normally a cancel) and the pipeline
//! stops without writing anything further.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use super::state_machine::{JobStateMachine, TransitionOutcome};
use super::types::{Job, JobId, JobResult, JobStatus};
use crate::analysis::{AnalysisOrchestrator, PromptCatalog, PromptSpec};
use crate::config::ExtractOptions;
use crate::error::{AuditError, ExtractError};
use crate::page_extractor::{CrawlSnapshot, PageExtractor};

const PROGRESS_CRAWLING: u8 = 20;
const PROGRESS_CRAWLED: u8 = 40;
const PROGRESS_ANALYZING: u8 = 50;
const PROGRESS_ANALYZED: u8 = 90;

/// Why `drive` returned early
#[derive(Debug)]
enum RunError {
    /// Job is terminal already, or the token fired; write nothing more
    Stopped,
    /// Record this message as the job's failure
    Failed(String),
}

impl From<AuditError> for RunError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Cancelled => Self::Stopped,
            other => Self::Failed(other.to_string()),
        }
    }
}

pub struct JobRunner {
    state: Arc<JobStateMachine>,
    extractor: Arc<dyn PageExtractor>,
    orchestrator: Arc<AnalysisOrchestrator>,
    catalog: Arc<dyn PromptCatalog>,
    extract_options: ExtractOptions,
}

impl JobRunner {
    pub fn new(
        state: Arc<JobStateMachine>,
        extractor: Arc<dyn PageExtractor>,
        orchestrator: Arc<AnalysisOrchestrator>,
        catalog: Arc<dyn PromptCatalog>,
        extract_options: ExtractOptions,
    ) -> Self {
        Self {
            state,
            extractor,
            orchestrator,
            catalog,
            extract_options,
        }
    }

    /// Run the pipeline for `id` to a terminal state
    ///
    /// Never panics and never returns with the job still running unless
    /// the process is shutting down: errors and panics inside the pipeline
    /// become a `failed` job, and a fired token becomes `cancelled`.
    pub async fn run(&self, id: JobId, cancel: CancellationToken) {
        let outcome = AssertUnwindSafe(self.drive(&id, &cancel))
            .catch_unwind()
            .await;

        // Browser resources go back on every path
        self.extractor.release().await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(RunError::Stopped)) => self.settle_stopped(&id).await,
            Ok(Err(RunError::Failed(message))) => self.record_failure(&id, message).await,
            Err(panic) => {
                let message = format!("internal error: {}", panic_message(panic.as_ref()));
                error!(job_id = %id, %message, "Job pipeline panicked");
                self.record_failure(&id, message).await;
            }
        }
    }

    async fn drive(&self, id: &JobId, cancel: &CancellationToken) -> Result<(), RunError> {
        let job = self.state.get(id).await?;
        let url = Url::parse(&job.url)
            .map_err(|e| RunError::Failed(format!("invalid job url '{}': {e}", job.url)))?;
        let prompts = self.resolve_prompts(&job);

        self.checkpoint(id, JobStatus::Crawling, PROGRESS_CRAWLING, "crawling", cancel)
            .await?;

        let crawled = self.crawl(&url, cancel).await;
        // The browsing resource is released before analysis starts
        self.extractor.release().await;
        let snapshot = crawled?;

        self.checkpoint(id, JobStatus::Crawling, PROGRESS_CRAWLED, "crawled", cancel)
            .await?;
        self.checkpoint(id, JobStatus::Analyzing, PROGRESS_ANALYZING, "analyzing", cancel)
            .await?;

        let analysis = self.orchestrator.analyze(&snapshot, &prompts, cancel).await;
        // A cancelled analysis holds defaults only; it must not be recorded
        if cancel.is_cancelled() {
            return Err(RunError::Stopped);
        }

        self.checkpoint(id, JobStatus::Analyzing, PROGRESS_ANALYZED, "analyzed", cancel)
            .await?;

        let failed_prompts = analysis.failed_prompts();
        let overall = analysis.scores.overall;
        match self.state.complete(id, JobResult { snapshot, analysis }).await? {
            TransitionOutcome::Applied(_) => {
                info!(job_id = %id, overall, failed_prompts, "Job completed");
                Ok(())
            }
            TransitionOutcome::Ignored(_) => Err(RunError::Stopped),
        }
    }

    fn resolve_prompts(&self, job: &Job) -> Vec<PromptSpec> {
        if job.prompt_ids.is_empty() {
            self.catalog.list_default()
        } else {
            self.catalog.list_by_ids(&job.prompt_ids)
        }
    }

    async fn crawl(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<CrawlSnapshot, RunError> {
        match self.extractor.extract(url, &self.extract_options, cancel).await {
            Ok(snapshot) => Ok(snapshot),
            Err(ExtractError::Cancelled) => Err(RunError::Stopped),
            Err(e) => Err(RunError::Failed(format!("crawl failed: {e}"))),
        }
    }

    /// Write a progress checkpoint; `Stopped` if the job can no longer advance
    async fn checkpoint(
        &self,
        id: &JobId,
        status: JobStatus,
        progress: u8,
        step: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        if cancel.is_cancelled() {
            return Err(RunError::Stopped);
        }
        match self.state.transition(id, status, progress, step).await? {
            TransitionOutcome::Applied(_) => Ok(()),
            TransitionOutcome::Ignored(job) => {
                info!(
                    job_id = %id,
                    status = %job.status,
                    "Job already finished, stopping pipeline"
                );
                Err(RunError::Stopped)
            }
        }
    }

    /// A stop that was not a persisted cancel (a fired token at shutdown)
    /// still leaves the job terminal
    async fn settle_stopped(&self, id: &JobId) {
        match self.state.cancel(id).await {
            Ok(TransitionOutcome::Applied(_)) => info!(job_id = %id, "Job cancelled"),
            Ok(TransitionOutcome::Ignored(_)) => {}
            Err(e) => warn!(job_id = %id, error = %e, "Failed to settle stopped job"),
        }
    }

    async fn record_failure(&self, id: &JobId, message: String) {
        warn!(job_id = %id, error = %message, "Job failed");
        if let Err(e) = self.state.fail(id, message).await {
            error!(job_id = %id, error = %e, "Failed to record job failure");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pipeline panicked".to_string()
    }
}
