//! Prompt executor
//!
//! Sends one request to the completion provider with a per-call timeout,
//! retries transient failures with exponential backoff plus jitter, and
//! normalizes the result. Holds no state between calls.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::provider::{Completion, CompletionOptions, CompletionProvider};
use super::types::{PromptOutcome, PromptSpec};
use crate::config::AnalysisSettings;
use crate::error::ProviderError;

#[derive(Clone)]
pub struct PromptExecutor {
    provider: Arc<dyn CompletionProvider>,
    max_retries: u32,
    retry_base_delay: Duration,
    call_timeout: Duration,
}

impl PromptExecutor {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: &AnalysisSettings) -> Self {
        Self {
            provider,
            max_retries: settings.max_retries,
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            call_timeout: Duration::from_secs(settings.prompt_timeout_secs),
        }
    }

    /// Run one prompt and record the outcome; never fails
    pub async fn execute(
        &self,
        spec: &PromptSpec,
        request_text: &str,
        options: &CompletionOptions,
        cancel: &CancellationToken,
    ) -> PromptOutcome {
        match self.complete(request_text, options, cancel).await {
            Ok(completion) => {
                debug!(
                    prompt_id = %spec.id,
                    tokens = completion.usage.total_tokens,
                    "Prompt succeeded"
                );
                PromptOutcome::success(spec, completion.text, completion.usage)
            }
            Err(e) => {
                warn!(prompt_id = %spec.id, error = %e, "Prompt failed");
                PromptOutcome::failure(spec, e)
            }
        }
    }

    /// Call the provider with timeout, retry and cancellation
    ///
    /// Blank completions are reported as `MalformedResponse`.
    pub async fn complete(
        &self,
        request_text: &str,
        options: &CompletionOptions,
        cancel: &CancellationToken,
    ) -> Result<Completion, ProviderError> {
        let mut retries = 0;
        loop {
            let attempt = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                result = self.attempt(request_text, options) => result,
            };

            match attempt {
                Ok(completion) => return Ok(completion),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if retries >= self.max_retries => {
                    warn!(max_retries = self.max_retries, error = %e, "Provider retries exhausted");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.backoff_delay(retries);
                    warn!(
                        attempt = retries + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provider error, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                    retries += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        request_text: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        let completion = tokio::time::timeout(
            self.call_timeout,
            self.provider.complete(request_text, options),
        )
        .await
        .map_err(|_| ProviderError::Timeout(self.call_timeout.as_secs()))??;

        let text = completion.text.trim();
        if text.is_empty() {
            return Err(ProviderError::MalformedResponse("empty completion".into()));
        }
        Ok(Completion {
            text: text.to_string(),
            usage: completion.usage,
        })
    }

    /// `2^retries * base` plus up to one `base` of jitter
    fn backoff_delay(&self, retries: u32) -> Duration {
        let base_ms = u64::try_from(self.retry_base_delay.as_millis()).unwrap_or(u64::MAX);
        let jitter = if base_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..base_ms)
        };
        Duration::from_millis(
            2u64.saturating_pow(retries)
                .saturating_mul(base_ms)
                .saturating_add(jitter),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{PromptCategory, TokenUsage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<Completion, ProviderError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Completion, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<Completion, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Transport("script exhausted".into())))
        }
    }

    fn ok(text: &str) -> Result<Completion, ProviderError> {
        Ok(Completion {
            text: text.to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
        })
    }

    fn executor(provider: Arc<Scripted>, max_retries: u32) -> PromptExecutor {
        let settings = AnalysisSettings {
            max_retries,
            retry_base_delay_ms: 0,
            ..AnalysisSettings::default()
        };
        PromptExecutor::new(provider, &settings)
    }

    fn spec() -> PromptSpec {
        PromptSpec {
            id: "p1".into(),
            name: "Prompt".into(),
            category: PromptCategory::Content,
            content: "Analyze".into(),
        }
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let provider = Scripted::new(vec![
            Err(ProviderError::Http {
                status: 503,
                body: "busy".into(),
            }),
            ok("  fine  "),
        ]);
        let exec = executor(Arc::clone(&provider), 1);
        let outcome = exec
            .execute(&spec(), "req", &CompletionOptions::default(), &CancellationToken::new())
            .await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.result_text.as_deref(), Some("fine"));
        assert_eq!(outcome.usage.total_tokens, 15);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn quota_errors_fail_fast() {
        let provider = Scripted::new(vec![Err(ProviderError::Quota("none left".into())), ok("x")]);
        let exec = executor(Arc::clone(&provider), 3);
        let outcome = exec
            .execute(&spec(), "req", &CompletionOptions::default(), &CancellationToken::new())
            .await;
        assert!(!outcome.succeeded);
        assert!(outcome.error_message.unwrap().contains("quota"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn blank_completion_is_malformed() {
        let provider = Scripted::new(vec![ok("   ")]);
        let exec = executor(provider, 0);
        let err = exec
            .complete("req", &CompletionOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let provider = Scripted::new(vec![ok("never")]);
        let exec = executor(Arc::clone(&provider), 0);
        let token = CancellationToken::new();
        token.cancel();
        let err = exec
            .complete("req", &CompletionOptions::default(), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let settings = AnalysisSettings {
            retry_base_delay_ms: 100,
            ..AnalysisSettings::default()
        };
        let exec = PromptExecutor::new(Scripted::new(vec![]), &settings);
        let first = exec.backoff_delay(0).as_millis();
        let third = exec.backoff_delay(2).as_millis();
        assert!((100..200).contains(&first));
        assert!((400..500).contains(&third));
    }
}
