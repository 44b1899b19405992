//! Fakes and helpers shared by the integration tests
//!
//! `FakeExtractor` and `ScriptedProvider` stand in for the browser and the
//! completion endpoint so whole pipelines run in milliseconds.

use async_trait::async_trait;
use seo_audit::analysis::{
    Completion, CompletionOptions, CompletionProvider, PromptCategory, PromptSpec,
    StaticPromptCatalog, TokenUsage,
};
use seo_audit::config::{AnalysisSettings, AuditConfig, ExtractOptions, JobSettings};
use seo_audit::error::{ExtractError, ProviderError};
use seo_audit::jobs::{AuditService, Job, JobStore, MemoryJobStore};
use seo_audit::page_extractor::{
    CrawlSnapshot, PageExtractor, PageMetrics, RawDocument, RawHeading, RawMeta, build_snapshot,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Marker in a prompt's content that makes `ScriptedProvider` time out
#[allow(dead_code)]
pub const TIMEOUT_MARKER: &str = "[[provider-timeout]]";

/// How `FakeExtractor` behaves for every call
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum CrawlBehavior {
    /// Return a snapshot after `delay`, honouring cancellation
    Succeed { delay: Duration },
    /// Return a snapshot after `delay` even if cancelled meanwhile
    SucceedIgnoringCancel { delay: Duration },
    /// Fail like a navigation that never finished
    NavigationTimeout,
    /// Panic inside the extractor
    Panic,
}

pub struct FakeExtractor {
    behavior: CrawlBehavior,
    pub calls: AtomicUsize,
    pub releases: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

#[allow(dead_code)]
impl FakeExtractor {
    pub fn new(behavior: CrawlBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// A small but realistic page
#[allow(dead_code)]
pub fn sample_snapshot(url: &Url) -> CrawlSnapshot {
    let raw = RawDocument {
        title: "Example Domain".into(),
        lang: Some("en".into()),
        meta: vec![
            RawMeta {
                key: "description".into(),
                content: "An illustrative page used in documentation and tests.".into(),
            },
            RawMeta {
                key: "viewport".into(),
                content: "width=device-width, initial-scale=1".into(),
            },
        ],
        headings: vec![RawHeading {
            level: 1,
            text: "Example Domain".into(),
            id: None,
        }],
        text_content: "This domain is for use in illustrative examples in documents.".into(),
        ..RawDocument::default()
    };
    build_snapshot(
        raw,
        url,
        PageMetrics {
            status_code: Some(200),
            load_time: Duration::from_millis(420),
            ..PageMetrics::default()
        },
    )
}

#[async_trait]
impl PageExtractor for FakeExtractor {
    async fn extract(
        &self,
        url: &Url,
        _options: &ExtractOptions,
        cancel: &CancellationToken,
    ) -> Result<CrawlSnapshot, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            CrawlBehavior::Succeed { delay } => {
                tokio::select! {
                    () = cancel.cancelled() => Err(ExtractError::Cancelled),
                    () = tokio::time::sleep(delay) => Ok(sample_snapshot(url)),
                }
            }
            CrawlBehavior::SucceedIgnoringCancel { delay } => {
                tokio::time::sleep(delay).await;
                Ok(sample_snapshot(url))
            }
            CrawlBehavior::NavigationTimeout => Err(ExtractError::navigation(
                url.as_str(),
                "Page navigation timeout after 30000 ms",
            )),
            CrawlBehavior::Panic => panic!("renderer crashed"),
        }
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// First lines of the three derived requests
#[allow(dead_code)]
pub const SCORES_STEP: &str = "Score the page";
#[allow(dead_code)]
pub const SUMMARY_STEP: &str = "Write a short executive summary";
#[allow(dead_code)]
pub const RECOMMENDATIONS_STEP: &str = "Turn the findings";

/// Provider keyed on request text
///
/// Derived requests get well-formed JSON unless listed in `failing_steps`,
/// in which case they get an HTTP 500. Catalog prompts carrying
/// `TIMEOUT_MARKER` fail with a timeout; everything else gets a finding.
#[derive(Default)]
pub struct ScriptedProvider {
    pub calls: AtomicUsize,
    failing_steps: Vec<&'static str>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn failing(steps: &[&'static str]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing_steps: steps.to_vec(),
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let usage = TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        if let Some(step) = self.failing_steps.iter().find(|s| prompt.starts_with(**s)) {
            return Err(ProviderError::Http {
                status: 500,
                body: format!("{step} backend error"),
            });
        }
        let text = if prompt.starts_with(SCORES_STEP) {
            r#"{"technical": 90, "content": 80, "performance": 70, "ux": 60, "accessibility": 50}"#
                .to_string()
        } else if prompt.starts_with(SUMMARY_STEP) {
            "The page is technically sound but thin on content.".to_string()
        } else if prompt.starts_with(RECOMMENDATIONS_STEP) {
            r#"{"recommendations": [
                {"title": "Expand body copy", "priority": "medium", "category": "content"},
                {"title": "Add structured data", "priority": "high", "category": "technical"}
            ]}"#
            .to_string()
        } else if prompt.contains(TIMEOUT_MARKER) {
            return Err(ProviderError::Timeout(60));
        } else {
            let first_line = prompt.lines().next().unwrap_or_default();
            format!("Finding for: {first_line}")
        };
        Ok(Completion { text, usage })
    }
}

#[allow(dead_code)]
pub fn prompt(id: &str, category: PromptCategory, content: &str) -> PromptSpec {
    PromptSpec {
        id: id.into(),
        name: id.replace('-', " "),
        category,
        content: content.into(),
    }
}

/// Config tuned for tests: no retries, sequential prompts
pub fn test_config() -> AuditConfig {
    AuditConfig {
        analysis: AnalysisSettings {
            max_retries: 0,
            retry_base_delay_ms: 0,
            ..AnalysisSettings::default()
        },
        jobs: JobSettings::default(),
        ..AuditConfig::default()
    }
}

#[allow(dead_code)]
pub async fn service_with(
    extractor: Arc<FakeExtractor>,
    catalog: StaticPromptCatalog,
) -> AuditService {
    service_with_store(extractor, catalog, Arc::new(MemoryJobStore::new())).await
}

pub async fn service_with_store(
    extractor: Arc<FakeExtractor>,
    catalog: StaticPromptCatalog,
    store: Arc<dyn JobStore>,
) -> AuditService {
    service_with_provider(
        extractor,
        catalog,
        store,
        Arc::new(ScriptedProvider::default()),
        test_config(),
    )
    .await
}

pub async fn service_with_provider(
    extractor: Arc<FakeExtractor>,
    catalog: StaticPromptCatalog,
    store: Arc<dyn JobStore>,
    provider: Arc<ScriptedProvider>,
    config: AuditConfig,
) -> AuditService {
    AuditService::new(store, extractor, provider, Arc::new(catalog), config)
        .await
        .expect("service should start")
}

/// Poll until the job is terminal
#[allow(dead_code)]
pub async fn wait_terminal(service: &AuditService, id: &str) -> Job {
    for _ in 0..500 {
        let job = service.get_result(id).await.expect("job should exist");
        if job.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not reach a terminal state");
}
