//! Prompt catalog
//!
//! Prompts are plain `PromptSpec` records dispatched uniformly; adding an
//! analysis means adding data, not a type.

use super::types::{PromptCategory, PromptSpec};

/// Source of analysis prompts
pub trait PromptCatalog: Send + Sync {
    /// Prompts run for a submission that names none
    fn list_default(&self) -> Vec<PromptSpec>;

    /// Prompts for the given ids, in the order requested
    ///
    /// Unknown ids are skipped.
    fn list_by_ids(&self, ids: &[String]) -> Vec<PromptSpec>;
}

/// In-memory catalog seeded with one prompt per score category
#[derive(Debug, Clone)]
pub struct StaticPromptCatalog {
    prompts: Vec<PromptSpec>,
}

impl StaticPromptCatalog {
    #[must_use]
    pub fn new(prompts: Vec<PromptSpec>) -> Self {
        Self { prompts }
    }
}

impl Default for StaticPromptCatalog {
    fn default() -> Self {
        Self::new(default_prompts())
    }
}

impl PromptCatalog for StaticPromptCatalog {
    fn list_default(&self) -> Vec<PromptSpec> {
        self.prompts.clone()
    }

    fn list_by_ids(&self, ids: &[String]) -> Vec<PromptSpec> {
        ids.iter()
            .filter_map(|id| self.prompts.iter().find(|p| &p.id == id).cloned())
            .collect()
    }
}

fn prompt(id: &str, name: &str, category: PromptCategory, content: &str) -> PromptSpec {
    PromptSpec {
        id: id.to_string(),
        name: name.to_string(),
        category,
        content: content.to_string(),
    }
}

/// Built-in prompts
pub fn default_prompts() -> Vec<PromptSpec> {
    vec![
        prompt(
            "technical-seo",
            "Technical SEO",
            PromptCategory::Technical,
            "You are a technical SEO auditor. Review the page data below for crawlability \
             and indexing problems: HTTP status, canonical tag, robots directives, heading \
             structure (a single H1, logical nesting), HTTPS, structured data validity and \
             internal linking. List each issue with its severity and a concrete fix.",
        ),
        prompt(
            "content-quality",
            "Content Quality",
            PromptCategory::Content,
            "You are an SEO content strategist. Evaluate the title, meta description, \
             headings and body text below. Judge relevance, keyword focus, readability and \
             depth. Propose an improved title and meta description that respect the length \
             targets given.",
        ),
        prompt(
            "performance",
            "Performance",
            PromptCategory::Performance,
            "You are a web performance engineer. Using the load time, request counts, \
             transferred bytes and failed requests below, assess the page against Core Web \
             Vitals expectations and name the most likely causes of slowness.",
        ),
        prompt(
            "user-experience",
            "User Experience",
            PromptCategory::Ux,
            "You are a UX reviewer focused on search visitors. From the page data below, \
             assess mobile readiness (viewport), navigation through internal links, clarity \
             of headings and how quickly the page answers the visitor's intent.",
        ),
        prompt(
            "accessibility",
            "Accessibility",
            PromptCategory::Accessibility,
            "You are an accessibility auditor. Check the page data below for missing image \
             alt text, heading order problems, a missing document language and link text \
             that is not descriptive. Reference WCAG success criteria where relevant.",
        ),
    ]
}
