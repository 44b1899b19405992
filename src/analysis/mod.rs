//! AI analysis of crawl snapshots
//!
//! `AnalysisOrchestrator` runs catalog prompts through the `PromptExecutor`
//! against any `CompletionProvider`, then derives scores, a summary and
//! recommendations.

pub mod executor;
pub mod language;
pub mod openai;
pub mod orchestrator;
pub mod payload;
pub mod prompts;
pub mod provider;
pub mod recommendations;
pub mod scoring;
pub mod types;

pub use executor::PromptExecutor;
pub use language::{LocaleTargets, detect_language, locale_targets};
pub use openai::OpenAiCompletionProvider;
pub use orchestrator::AnalysisOrchestrator;
pub use prompts::{PromptCatalog, StaticPromptCatalog};
pub use provider::{Completion, CompletionOptions, CompletionProvider};
pub use scoring::overall_score;
pub use types::{
    AnalysisResult, CategoryScores, DetectedLanguage, LanguageSource, Priority, PromptCategory,
    PromptOutcome, PromptSpec, Recommendation, ScoreSource, Scores, TokenUsage,
};
