//! Completion provider seam

use async_trait::async_trait;

use super::types::TokenUsage;
use crate::error::ProviderError;

/// Per-call generation options
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object instead of free text
    pub json_output: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1_500,
            json_output: false,
        }
    }
}

/// Completion text plus usage metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// A language-model backend: prompt in, completion out
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, ProviderError>;
}
