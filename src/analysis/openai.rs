//! OpenAI-compatible chat completions provider

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::provider::{Completion, CompletionOptions, CompletionProvider};
use super::types::TokenUsage;
use crate::config::ProviderSettings;
use crate::error::ProviderError;
use crate::utils::safe_truncate_chars;

/// Longest error body kept in a `ProviderError::Http`
const MAX_ERROR_BODY_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "You are an expert SEO analyst. Base every statement on the page \
    data provided and answer in the language you are asked to use.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<UsageRaw>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageRaw {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// `CompletionProvider` speaking the `/chat/completions` protocol
#[derive(Clone)]
pub struct OpenAiCompletionProvider {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
    request_timeout_secs: u64,
}

impl OpenAiCompletionProvider {
    pub fn new(settings: &ProviderSettings) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http_client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            request_timeout_secs: settings.request_timeout_secs,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn map_transport_error(&self, err: &reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.request_timeout_secs)
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Classify a non-success response
fn classify_error_status(status: StatusCode, body: &str) -> ProviderError {
    let lowered = body.to_ascii_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS
        && (lowered.contains("insufficient_quota")
            || lowered.contains("exceeded your current quota"))
    {
        return ProviderError::Quota(safe_truncate_chars(body, MAX_ERROR_BODY_CHARS).to_string());
    }
    if status == StatusCode::BAD_REQUEST
        && (lowered.contains("content_filter") || lowered.contains("content_policy"))
    {
        return ProviderError::SafetyBlock(
            safe_truncate_chars(body, MAX_ERROR_BODY_CHARS).to_string(),
        );
    }
    ProviderError::Http {
        status: status.as_u16(),
        body: safe_truncate_chars(body, MAX_ERROR_BODY_CHARS).to_string(),
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options.json_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Completion request failed");
                self.map_transport_error(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body, "Completion provider returned an error");
            return Err(classify_error_status(status, &body));
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let choice = raw
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("response has no choices".into()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ProviderError::SafetyBlock(
                "completion stopped by content filter".into(),
            ));
        }

        let text = choice
            .message
            .content
            .ok_or_else(|| ProviderError::MalformedResponse("choice has no content".into()))?;

        let usage = raw
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis() as u64,
            total_tokens = usage.total_tokens,
            "Chat completion"
        );

        Ok(Completion { text, usage })
    }
}
