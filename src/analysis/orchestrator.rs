//! Analysis orchestrator
//!
//! Runs every prompt against the snapshot, keeps one outcome per prompt no
//! matter how many fail, then derives scores, a summary and recommendations
//! from whatever succeeded. Each derived step degrades to a default on
//! failure, so `analyze` always returns a result.

use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesOrdered;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::executor::PromptExecutor;
use super::language::{detect_language, locale_targets};
use super::payload::{prompt_request, recommendations_request, scores_request, summary_request};
use super::provider::CompletionOptions;
use super::recommendations::parse_recommendations;
use super::scoring::{heuristic_scores, parse_scores, scores_from};
use super::types::{
    AnalysisResult, DetectedLanguage, PromptOutcome, PromptSpec, Recommendation, ScoreSource,
    Scores, TokenUsage,
};
use crate::config::AnalysisSettings;
use crate::page_extractor::CrawlSnapshot;

pub struct AnalysisOrchestrator {
    executor: PromptExecutor,
    settings: AnalysisSettings,
}

impl AnalysisOrchestrator {
    pub fn new(executor: PromptExecutor, settings: AnalysisSettings) -> Self {
        Self { executor, settings }
    }

    fn options(&self, json_output: bool) -> CompletionOptions {
        CompletionOptions {
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            json_output,
        }
    }

    /// Analyze a snapshot with the given prompts
    ///
    /// At most `prompt_concurrency` prompts are in flight; outcomes are
    /// returned in the order of `prompts` regardless.
    pub async fn analyze(
        &self,
        snapshot: &CrawlSnapshot,
        prompts: &[PromptSpec],
        cancel: &CancellationToken,
    ) -> AnalysisResult {
        let language = detect_language(snapshot);
        info!(
            url = %snapshot.url,
            prompts = prompts.len(),
            language = %language.code,
            "Starting analysis"
        );

        let outcomes = self.run_prompts(snapshot, prompts, &language, cancel).await;
        let mut usage = TokenUsage::default();
        for outcome in &outcomes {
            usage += outcome.usage;
        }

        let scores = self
            .derive_scores(snapshot, &outcomes, &language, &mut usage, cancel)
            .await;
        let summary = self
            .derive_summary(snapshot, &outcomes, &language, &mut usage, cancel)
            .await;
        let recommendations = self
            .derive_recommendations(snapshot, &outcomes, &language, &mut usage, cancel)
            .await;

        let failed = outcomes.iter().filter(|o| !o.succeeded).count();
        info!(
            url = %snapshot.url,
            succeeded = outcomes.len() - failed,
            failed,
            overall = scores.overall,
            total_tokens = usage.total_tokens,
            "Analysis finished"
        );

        AnalysisResult {
            scores,
            summary,
            recommendations,
            outcomes,
            language,
            usage,
            analyzed_at: Utc::now(),
        }
    }

    async fn run_prompts(
        &self,
        snapshot: &CrawlSnapshot,
        prompts: &[PromptSpec],
        language: &DetectedLanguage,
        cancel: &CancellationToken,
    ) -> Vec<PromptOutcome> {
        let options = self.options(false);
        let limit = self.settings.prompt_concurrency.max(1);
        let budget = self.settings.content_budget_chars;

        // Each future owns its inputs so the job future stays `Send`
        let mut pending = prompts
            .iter()
            .map(|spec| {
                let request = prompt_request(spec, snapshot, language, budget);
                let executor = self.executor.clone();
                let spec = spec.clone();
                let options = options.clone();
                let cancel = cancel.clone();
                async move { executor.execute(&spec, &request, &options, &cancel).await }
            })
            .collect::<Vec<_>>()
            .into_iter();

        // `FuturesOrdered` yields in input order even when later prompts finish first
        let mut in_flight = FuturesOrdered::new();
        let mut outcomes = Vec::with_capacity(prompts.len());
        loop {
            while in_flight.len() < limit {
                match pending.next() {
                    Some(fut) => in_flight.push_back(fut),
                    None => break,
                }
            }
            match in_flight.next().await {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        outcomes
    }

    async fn derive_scores(
        &self,
        snapshot: &CrawlSnapshot,
        outcomes: &[PromptOutcome],
        language: &DetectedLanguage,
        usage: &mut TokenUsage,
        cancel: &CancellationToken,
    ) -> Scores {
        let request = scores_request(
            snapshot,
            outcomes,
            language,
            self.settings.content_budget_chars,
        );
        match self.executor.complete(&request, &self.options(true), cancel).await {
            Ok(completion) => {
                *usage += completion.usage;
                if let Some(categories) = parse_scores(&completion.text) {
                    return scores_from(categories, ScoreSource::Provider);
                }
                warn!(url = %snapshot.url, "Score reply had no usable scores, using heuristics");
            }
            Err(e) => warn!(url = %snapshot.url, error = %e, "Scoring failed, using heuristics"),
        }
        let targets = locale_targets(&language.code);
        scores_from(heuristic_scores(snapshot, &targets), ScoreSource::Heuristic)
    }

    async fn derive_summary(
        &self,
        snapshot: &CrawlSnapshot,
        outcomes: &[PromptOutcome],
        language: &DetectedLanguage,
        usage: &mut TokenUsage,
        cancel: &CancellationToken,
    ) -> String {
        let request = summary_request(
            snapshot,
            outcomes,
            language,
            self.settings.content_budget_chars,
        );
        match self.executor.complete(&request, &self.options(false), cancel).await {
            Ok(completion) => {
                *usage += completion.usage;
                completion.text
            }
            Err(e) => {
                warn!(url = %snapshot.url, error = %e, "Summary failed, using generic summary");
                generic_summary(snapshot, outcomes)
            }
        }
    }

    async fn derive_recommendations(
        &self,
        snapshot: &CrawlSnapshot,
        outcomes: &[PromptOutcome],
        language: &DetectedLanguage,
        usage: &mut TokenUsage,
        cancel: &CancellationToken,
    ) -> Vec<Recommendation> {
        let request = recommendations_request(
            snapshot,
            outcomes,
            language,
            self.settings.content_budget_chars,
        );
        match self.executor.complete(&request, &self.options(true), cancel).await {
            Ok(completion) => {
                *usage += completion.usage;
                parse_recommendations(&completion.text).unwrap_or_else(|| {
                    warn!(url = %snapshot.url, "Recommendation reply was not a JSON list");
                    Vec::new()
                })
            }
            Err(e) => {
                warn!(url = %snapshot.url, error = %e, "Recommendations failed");
                Vec::new()
            }
        }
    }
}

/// Summary used when the provider could not write one
pub fn generic_summary(snapshot: &CrawlSnapshot, outcomes: &[PromptOutcome]) -> String {
    let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
    let title = if snapshot.title.is_empty() {
        snapshot.url.as_str()
    } else {
        snapshot.title.as_str()
    };
    format!(
        "Automated summary unavailable. \"{title}\" was crawled successfully and {succeeded} of {} \
         analysis prompts completed; see the individual findings and scores for details.",
        outcomes.len()
    )
}
