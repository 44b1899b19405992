//! Request text for prompts and derived generation steps
//!
//! Page data is sent as compact JSON with the free-text body truncated to
//! the configured character budget.

use serde::Serialize;

use super::language::{LocaleTargets, language_name, locale_targets};
use super::types::{DetectedLanguage, PromptOutcome, PromptSpec};
use crate::page_extractor::{CrawlSnapshot, MetaTags, ResourceCounters, TechnicalFlags};
use crate::utils::{safe_truncate_boundary, safe_truncate_chars};

const MAX_HEADINGS: usize = 60;
const MAX_SAMPLE_IMAGES: usize = 20;
const MAX_SAMPLE_LINKS: usize = 25;

/// Body text budget for derived steps, which mostly work from findings
const DERIVED_TEXT_BUDGET: usize = 1_000;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PagePayload<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirected_to: Option<&'a str>,
    status_code: Option<u16>,
    load_time_ms: u64,
    title: &'a str,
    title_length: usize,
    lang: Option<&'a str>,
    meta: &'a MetaTags,
    canonical: Option<&'a str>,
    headings: Vec<HeadingPayload<'a>>,
    images: ImageSummary<'a>,
    links: LinkSummary<'a>,
    structured_data_types: Vec<String>,
    technical: &'a TechnicalFlags,
    resources: &'a ResourceCounters,
    text_content: &'a str,
    text_truncated: bool,
}

#[derive(Serialize)]
struct HeadingPayload<'a> {
    level: u8,
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageSummary<'a> {
    total: usize,
    missing_alt: usize,
    samples: Vec<ImageSample<'a>>,
}

#[derive(Serialize)]
struct ImageSample<'a> {
    src: &'a str,
    alt: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkSummary<'a> {
    internal: usize,
    external: usize,
    nofollow: usize,
    internal_samples: Vec<&'a str>,
}

/// Compact JSON view of a snapshot with body text capped at `text_budget` chars
pub fn page_payload(snapshot: &CrawlSnapshot, text_budget: usize) -> String {
    let end = safe_truncate_boundary(&snapshot.text_content, text_budget, ".,;:!?");
    let text_content = &snapshot.text_content[..end];

    let payload = PagePayload {
        url: &snapshot.url,
        redirected_to: (!snapshot.final_url.is_empty() && snapshot.final_url != snapshot.url)
            .then_some(snapshot.final_url.as_str()),
        status_code: snapshot.status_code,
        load_time_ms: snapshot.load_time_ms,
        title: &snapshot.title,
        title_length: snapshot.title.chars().count(),
        lang: snapshot.lang.as_deref(),
        meta: &snapshot.meta,
        canonical: snapshot.canonical.as_deref(),
        headings: snapshot
            .headings
            .iter()
            .take(MAX_HEADINGS)
            .map(|h| HeadingPayload {
                level: h.level,
                text: &h.text,
            })
            .collect(),
        images: ImageSummary {
            total: snapshot.images.len(),
            missing_alt: snapshot.images_missing_alt(),
            samples: snapshot
                .images
                .iter()
                .take(MAX_SAMPLE_IMAGES)
                .map(|img| ImageSample {
                    src: &img.src,
                    alt: img.alt.as_deref(),
                })
                .collect(),
        },
        links: LinkSummary {
            internal: snapshot.links.internal.len(),
            external: snapshot.links.external.len(),
            nofollow: snapshot
                .links
                .internal
                .iter()
                .chain(&snapshot.links.external)
                .filter(|l| l.nofollow)
                .count(),
            internal_samples: snapshot
                .links
                .internal
                .iter()
                .take(MAX_SAMPLE_LINKS)
                .map(|l| l.href.as_str())
                .collect(),
        },
        structured_data_types: structured_data_types(&snapshot.structured_data),
        technical: &snapshot.technical,
        resources: &snapshot.resources,
        text_content,
        text_truncated: end < snapshot.text_content.len(),
    };

    serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string())
}

/// `@type` values of the structured data blocks, deduplicated in order
fn structured_data_types(blocks: &[serde_json::Value]) -> Vec<String> {
    let mut types = Vec::new();
    for block in blocks {
        let found: Vec<&str> = match block.get("@type") {
            Some(serde_json::Value::String(t)) => vec![t.as_str()],
            Some(serde_json::Value::Array(items)) => {
                items.iter().filter_map(serde_json::Value::as_str).collect()
            }
            _ => Vec::new(),
        };
        for t in found {
            if !types.iter().any(|existing| existing == t) {
                types.push(t.to_string());
            }
        }
    }
    types
}

fn language_instruction(language: &DetectedLanguage) -> String {
    let LocaleTargets { title, description } = locale_targets(&language.code);
    format!(
        "Write your answer in {} (language code \"{}\"). Target title length: {}-{} characters. \
         Target meta description length: {}-{} characters.",
        language_name(&language.code),
        language.code,
        title.0,
        title.1,
        description.0,
        description.1
    )
}

/// Request text for one catalog prompt
pub fn prompt_request(
    spec: &PromptSpec,
    snapshot: &CrawlSnapshot,
    language: &DetectedLanguage,
    text_budget: usize,
) -> String {
    format!(
        "{}\n\n{}\n\nPage data (JSON):\n{}",
        spec.content.trim(),
        language_instruction(language),
        page_payload(snapshot, text_budget)
    )
}

/// Successful outcome texts, each capped so the digest fits `budget` chars
fn findings_digest(outcomes: &[PromptOutcome], budget: usize) -> String {
    let succeeded: Vec<&PromptOutcome> = outcomes.iter().filter(|o| o.succeeded).collect();
    if succeeded.is_empty() {
        return "No analysis findings are available; work from the page data alone.".to_string();
    }
    let per_finding = (budget / succeeded.len()).max(200);
    succeeded
        .iter()
        .map(|o| {
            let text = o.result_text.as_deref().unwrap_or_default();
            format!(
                "## {} ({})\n{}",
                o.name,
                o.category,
                safe_truncate_chars(text, per_finding)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn derived_request(
    instruction: &str,
    snapshot: &CrawlSnapshot,
    outcomes: &[PromptOutcome],
    language: &DetectedLanguage,
    budget: usize,
) -> String {
    format!(
        "{instruction}\n\n{}\n\nFindings:\n{}\n\nPage data (JSON):\n{}",
        language_instruction(language),
        findings_digest(outcomes, budget),
        page_payload(snapshot, DERIVED_TEXT_BUDGET.min(budget))
    )
}

pub fn scores_request(
    snapshot: &CrawlSnapshot,
    outcomes: &[PromptOutcome],
    language: &DetectedLanguage,
    budget: usize,
) -> String {
    derived_request(
        "Score the page from 0 to 100 in each SEO category based on the findings below. \
         Respond with a single JSON object with integer fields \"technical\", \"content\", \
         \"performance\", \"ux\" and \"accessibility\". Omit a field only if there is no \
         basis for it.",
        snapshot,
        outcomes,
        language,
        budget,
    )
}

pub fn summary_request(
    snapshot: &CrawlSnapshot,
    outcomes: &[PromptOutcome],
    language: &DetectedLanguage,
    budget: usize,
) -> String {
    derived_request(
        "Write a short executive summary (at most five sentences) of this page's SEO health \
         for a site owner. Mention the most important strength and the most urgent problem. \
         Plain text only.",
        snapshot,
        outcomes,
        language,
        budget,
    )
}

pub fn recommendations_request(
    snapshot: &CrawlSnapshot,
    outcomes: &[PromptOutcome],
    language: &DetectedLanguage,
    budget: usize,
) -> String {
    derived_request(
        "Turn the findings below into a prioritized list of concrete recommendations. \
         Respond with a JSON object {\"recommendations\": [...]} where each item has \
         \"title\", \"priority\" (\"high\", \"medium\" or \"low\"), \"category\", \
         \"impact\", \"effort\" and an optional \"description\".",
        snapshot,
        outcomes,
        language,
        budget,
    )
}
