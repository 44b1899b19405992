//! `AuditService`: the public face of the pipeline
//!
//! Submission validates the URL, persists a `pending` job and spawns its
//! runner, returning without waiting for any pipeline work. Status reads go
//! straight to the store. Each running job has a cancellation token in the
//! task registry; `cancel` persists the new status first and then trips
//! the token so in-flight browser and provider waits end early.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::file_store::JsonFileJobStore;
use super::runner::JobRunner;
use super::state_machine::{JobStateMachine, TransitionOutcome};
use super::store::{JobStore, MemoryJobStore};
use super::types::{Job, JobFilter, JobId, JobStatusView};
use crate::analysis::{
    AnalysisOrchestrator, CompletionProvider, OpenAiCompletionProvider, PromptCatalog,
    PromptExecutor, StaticPromptCatalog,
};
use crate::browser_manager::BrowserManager;
use crate::config::{AuditConfig, JobSettings};
use crate::error::{AuditError, AuditResult};
use crate::page_extractor::{ChromiumPageExtractor, PageExtractor};
use crate::utils::parse_audit_url;

/// Registry entry for one spawned runner
struct RunningTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
    started: Instant,
}

pub struct AuditService {
    state: Arc<JobStateMachine>,
    runner: Arc<JobRunner>,
    catalog: Arc<dyn PromptCatalog>,
    extractor: Arc<dyn PageExtractor>,
    tasks: DashMap<JobId, RunningTask>,
    settings: JobSettings,
    shutdown_token: CancellationToken,
}

impl AuditService {
    /// Wire the pipeline from its collaborators
    ///
    /// Jobs a previous process left running are failed before this returns.
    pub async fn new(
        store: Arc<dyn JobStore>,
        extractor: Arc<dyn PageExtractor>,
        provider: Arc<dyn CompletionProvider>,
        catalog: Arc<dyn PromptCatalog>,
        config: AuditConfig,
    ) -> AuditResult<Self> {
        let state = Arc::new(JobStateMachine::new(store));
        state.recover_interrupted().await?;

        let executor = PromptExecutor::new(provider, &config.analysis);
        let orchestrator = Arc::new(AnalysisOrchestrator::new(executor, config.analysis.clone()));
        let runner = Arc::new(JobRunner::new(
            state.clone(),
            extractor.clone(),
            orchestrator,
            catalog.clone(),
            config.extractor.clone(),
        ));

        Ok(Self {
            state,
            runner,
            catalog,
            extractor,
            tasks: DashMap::new(),
            settings: config.jobs,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Production wiring: Chromium extractor, OpenAI-compatible provider,
    /// built-in prompts, and a file or memory store per `config.jobs`
    pub async fn from_config(config: AuditConfig) -> AuditResult<Self> {
        let store: Arc<dyn JobStore> = match &config.jobs.store_path {
            Some(path) => Arc::new(JsonFileJobStore::open(path).await?),
            None => Arc::new(MemoryJobStore::new()),
        };
        let browsers = Arc::new(BrowserManager::new(config.extractor.clone()));
        let extractor = Arc::new(ChromiumPageExtractor::new(browsers));
        let provider = Arc::new(
            OpenAiCompletionProvider::new(&config.provider)
                .map_err(|e| AuditError::Validation(format!("{e:#}")))?,
        );
        let catalog = Arc::new(StaticPromptCatalog::default());

        Self::new(store, extractor, provider, catalog, config).await
    }

    /// Submit `url` with the default prompts
    pub async fn submit(&self, url: &str) -> AuditResult<Job> {
        self.submit_with_prompts(url, Vec::new()).await
    }

    /// Submit `url` with specific catalog prompts
    ///
    /// Returns the `pending` job as soon as it is persisted; the pipeline
    /// runs in the background.
    pub async fn submit_with_prompts(
        &self,
        url: &str,
        prompt_ids: Vec<String>,
    ) -> AuditResult<Job> {
        if self.shutdown_token.is_cancelled() {
            return Err(AuditError::Validation("service is shutting down".to_string()));
        }
        let url = parse_audit_url(url).map_err(AuditError::Validation)?;
        if !prompt_ids.is_empty() && self.catalog.list_by_ids(&prompt_ids).is_empty() {
            return Err(AuditError::Validation(format!(
                "none of the requested prompts exist: {}",
                prompt_ids.join(", ")
            )));
        }

        let job = self.state.create(&url, prompt_ids).await?;
        self.spawn_runner(job.id);
        Ok(job)
    }

    fn spawn_runner(&self, id: JobId) {
        let token = self.shutdown_token.child_token();
        let runner = self.runner.clone();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            runner.run(id, task_token).await;
        });
        self.tasks.insert(
            id,
            RunningTask {
                token,
                handle,
                started: Instant::now(),
            },
        );
    }

    pub async fn get_status(&self, id: &str) -> AuditResult<JobStatusView> {
        let id = JobId::parse(id)?;
        Ok(self.state.get(&id).await?.status_view())
    }

    /// Full record, including `result` or `error` once terminal
    pub async fn get_result(&self, id: &str) -> AuditResult<Job> {
        let id = JobId::parse(id)?;
        self.state.get(&id).await
    }

    /// Cancel a running job
    ///
    /// Cancelling a terminal job succeeds without changing it.
    pub async fn cancel(&self, id: &str) -> AuditResult<Job> {
        let id = JobId::parse(id)?;
        let outcome = self.state.cancel(&id).await?;
        if let TransitionOutcome::Applied(_) = &outcome
            && let Some(task) = self.tasks.get(&id)
        {
            task.token.cancel();
        }
        Ok(outcome.into_job())
    }

    pub async fn list(&self, filter: &JobFilter) -> AuditResult<Vec<Job>> {
        self.state.list(filter).await
    }

    /// Runners still in the task registry, finished or not
    #[must_use]
    pub fn tracked_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Drop finished runners older than the retention window
    ///
    /// Returns the number of registry entries removed.
    pub fn cleanup_tasks(&self) -> usize {
        let retention = Duration::from_secs(self.settings.task_retention_secs);
        let before = self.tasks.len();
        let mut finished = Vec::new();

        self.tasks.retain(|id, task| {
            let keep = !task.handle.is_finished() || task.started.elapsed() < retention;
            if !keep {
                debug!(job_id = %id, age = ?task.started.elapsed(), "Removing finished job task");
                finished.push(*id);
            }
            keep
        });
        for id in &finished {
            self.state.forget(id);
        }

        let cleaned = before.saturating_sub(self.tasks.len());
        if cleaned > 0 {
            info!(cleaned, "Cleaned up finished job tasks");
        }
        cleaned
    }

    /// Start the periodic registry cleanup (call once after wrapping in `Arc`)
    ///
    /// The task ends when `shutdown` is called.
    pub fn start_cleanup_task(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(self.settings.cleanup_interval_secs.max(1));
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = self.shutdown_token.cancelled() => break,
                    _ = interval.tick() => {
                        self.cleanup_tasks();
                    }
                }
            }
        })
    }

    /// Stop accepting work, cancel and await every runner, close the browser
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();

        let ids: Vec<JobId> = self.tasks.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, task)) = self.tasks.remove(&id)
                && let Err(e) = task.handle.await
            {
                warn!(job_id = %id, error = %e, "Job task ended abnormally");
            }
            self.state.forget(&id);
        }

        self.extractor.shutdown().await;
        info!("Audit service shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Completion, CompletionOptions, TokenUsage};
    use crate::config::ExtractOptions;
    use crate::error::{ExtractError, ProviderError};
    use crate::jobs::JobStatus;
    use crate::page_extractor::{CrawlSnapshot, PageMetrics, RawDocument, build_snapshot};
    use async_trait::async_trait;
    use url::Url;

    struct InstantExtractor;

    #[async_trait]
    impl PageExtractor for InstantExtractor {
        async fn extract(
            &self,
            url: &Url,
            _options: &ExtractOptions,
            _cancel: &CancellationToken,
        ) -> Result<CrawlSnapshot, ExtractError> {
            let raw = RawDocument {
                title: "Instant".into(),
                ..RawDocument::default()
            };
            Ok(build_snapshot(raw, url, PageMetrics::default()))
        }

        async fn release(&self) {}
    }

    struct EchoProvider;

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<Completion, ProviderError> {
            Ok(Completion {
                text: "{}".into(),
                usage: TokenUsage::default(),
            })
        }
    }

    async fn service(jobs: JobSettings) -> AuditService {
        let config = AuditConfig {
            jobs,
            ..AuditConfig::default()
        };
        AuditService::new(
            Arc::new(MemoryJobStore::new()),
            Arc::new(InstantExtractor),
            Arc::new(EchoProvider),
            Arc::new(StaticPromptCatalog::default()),
            config,
        )
        .await
        .unwrap()
    }

    async fn wait_terminal(service: &AuditService, id: &str) -> Job {
        for _ in 0..200 {
            let job = service.get_result(id).await.unwrap();
            if job.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never finished");
    }

    #[tokio::test]
    async fn rejects_bad_input_without_creating_jobs() {
        let svc = service(JobSettings::default()).await;
        assert!(matches!(
            svc.submit("not a url").await,
            Err(AuditError::Validation(_))
        ));
        assert!(matches!(
            svc.submit_with_prompts("https://example.com", vec!["nope".into()]).await,
            Err(AuditError::Validation(_))
        ));
        assert!(matches!(
            svc.get_status("garbage").await,
            Err(AuditError::Validation(_))
        ));
        assert!(matches!(
            svc.cancel(&JobId::new().to_string()).await,
            Err(AuditError::NotFound(_))
        ));
        assert!(svc.list(&JobFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn finished_tasks_are_cleaned_after_retention() {
        let svc = service(JobSettings {
            task_retention_secs: 0,
            ..JobSettings::default()
        })
        .await;
        let job = svc.submit("https://example.com").await.unwrap();
        let done = wait_terminal(&svc, &job.id.to_string()).await;
        assert_eq!(done.status, JobStatus::Completed);

        for _ in 0..100 {
            if svc.cleanup_tasks() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(svc.tracked_tasks(), 0);
    }

    #[tokio::test]
    async fn submissions_after_shutdown_are_refused() {
        let svc = service(JobSettings::default()).await;
        svc.shutdown().await;
        assert!(matches!(
            svc.submit("https://example.com").await,
            Err(AuditError::Validation(_))
        ));
    }
}
