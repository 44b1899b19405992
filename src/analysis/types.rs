//! Data types produced and consumed by the analysis stage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Score category a prompt contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptCategory {
    Technical,
    Content,
    Performance,
    Ux,
    Accessibility,
    /// Anything a catalog supplies outside the scored categories
    #[serde(other)]
    General,
}

impl PromptCategory {
    /// The five categories that carry a score, in report order
    pub const SCORED: [PromptCategory; 5] = [
        PromptCategory::Technical,
        PromptCategory::Content,
        PromptCategory::Performance,
        PromptCategory::Ux,
        PromptCategory::Accessibility,
    ];

    /// Fixed weight of the category in the overall score
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::Technical | Self::Content => 0.25,
            Self::Performance | Self::Ux => 0.20,
            Self::Accessibility => 0.10,
            Self::General => 0.0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Content => "content",
            Self::Performance => "performance",
            Self::Ux => "ux",
            Self::Accessibility => "accessibility",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for PromptCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One analysis prompt, supplied by a `PromptCatalog`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub id: String,
    pub name: String,
    pub category: PromptCategory,
    /// Instruction text sent ahead of the page data
    pub content: String,
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Result or failure of one prompt
///
/// Exactly one of `result_text` and `error_message` is set, matching
/// `succeeded`. Build through `PromptOutcome::success` / `PromptOutcome::failure`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOutcome {
    pub prompt_id: String,
    pub name: String,
    pub category: PromptCategory,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl PromptOutcome {
    pub fn success(spec: &PromptSpec, text: String, usage: TokenUsage) -> Self {
        Self {
            prompt_id: spec.id.clone(),
            name: spec.name.clone(),
            category: spec.category,
            succeeded: true,
            result_text: Some(text),
            error_message: None,
            executed_at: Utc::now(),
            usage,
        }
    }

    pub fn failure(spec: &PromptSpec, error: impl std::fmt::Display) -> Self {
        Self {
            prompt_id: spec.id.clone(),
            name: spec.name.clone(),
            category: spec.category,
            succeeded: false,
            result_text: None,
            error_message: Some(error.to_string()),
            executed_at: Utc::now(),
            usage: TokenUsage::default(),
        }
    }
}

/// Per-category scores; `None` when the category produced no number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub technical: Option<u8>,
    pub content: Option<u8>,
    pub performance: Option<u8>,
    pub ux: Option<u8>,
    pub accessibility: Option<u8>,
}

impl CategoryScores {
    #[must_use]
    pub fn get(&self, category: PromptCategory) -> Option<u8> {
        match category {
            PromptCategory::Technical => self.technical,
            PromptCategory::Content => self.content,
            PromptCategory::Performance => self.performance,
            PromptCategory::Ux => self.ux,
            PromptCategory::Accessibility => self.accessibility,
            PromptCategory::General => None,
        }
    }

    pub fn set(&mut self, category: PromptCategory, score: u8) {
        let slot = match category {
            PromptCategory::Technical => &mut self.technical,
            PromptCategory::Content => &mut self.content,
            PromptCategory::Performance => &mut self.performance,
            PromptCategory::Ux => &mut self.ux,
            PromptCategory::Accessibility => &mut self.accessibility,
            PromptCategory::General => return,
        };
        *slot = Some(score.min(100));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        PromptCategory::SCORED.iter().all(|c| self.get(*c).is_none())
    }
}

/// Where the scores came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Provider,
    /// Provider scoring failed; derived from the snapshot's technical data
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scores {
    #[serde(flatten)]
    pub categories: CategoryScores,
    /// Weighted average of the present categories, 0-100
    pub overall: u8,
    pub source: ScoreSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub priority: Priority,
    pub category: String,
    pub impact: String,
    pub effort: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LanguageSource {
    LangAttribute,
    TextMarkers,
    Default,
}

/// Detected page language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLanguage {
    /// Primary subtag, lower-case (`en`, `de`, ...)
    pub code: String,
    pub confidence: f32,
    pub source: LanguageSource,
}

/// Everything derived from a snapshot and its prompt outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub scores: Scores,
    pub summary: String,
    pub recommendations: Vec<Recommendation>,
    /// One entry per prompt attempted, in input order
    pub outcomes: Vec<PromptOutcome>,
    pub language: DetectedLanguage,
    pub usage: TokenUsage,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    #[must_use]
    pub fn failed_prompts(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded).count()
    }
}
