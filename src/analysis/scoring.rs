//! Category scores and the weighted overall score

use serde_json::Value;

use super::language::LocaleTargets;
use super::types::{CategoryScores, PromptCategory, ScoreSource, Scores};
use crate::page_extractor::CrawlSnapshot;
use crate::utils::strip_code_fences;

/// Weighted average of the categories that have a score
///
/// Weights are renormalized over the present categories; the result is
/// rounded and clipped to 0-100. No scores at all gives 0.
#[must_use]
pub fn overall_score(categories: &CategoryScores) -> u8 {
    let (weighted, weight_sum) = PromptCategory::SCORED
        .iter()
        .filter_map(|c| categories.get(*c).map(|score| (f64::from(score.min(100)), c.weight())))
        .fold((0.0, 0.0), |(acc, total), (score, weight)| {
            (acc + score * weight, total + weight)
        });

    if weight_sum <= 0.0 {
        return 0;
    }
    (weighted / weight_sum).round().clamp(0.0, 100.0) as u8
}

pub fn scores_from(categories: CategoryScores, source: ScoreSource) -> Scores {
    Scores {
        overall: overall_score(&categories),
        categories,
        source,
    }
}

/// Parse a provider scoring reply
///
/// Accepts a bare object or one nested under `"scores"`, numbers or numeric
/// strings, and a few key spellings. `None` when no category is present.
pub fn parse_scores(text: &str) -> Option<CategoryScores> {
    let value: Value = serde_json::from_str(strip_code_fences(text)).ok()?;
    let object = match value.get("scores") {
        Some(nested @ Value::Object(_)) => nested,
        _ => &value,
    }
    .as_object()?;

    let mut categories = CategoryScores::default();
    for (key, raw) in object {
        let Some(category) = category_for_key(key) else {
            continue;
        };
        if let Some(score) = numeric(raw) {
            categories.set(category, score.round().clamp(0.0, 100.0) as u8);
        }
    }
    (!categories.is_empty()).then_some(categories)
}

fn category_for_key(key: &str) -> Option<PromptCategory> {
    let normalized: String = key
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "technical" | "technicalseo" => Some(PromptCategory::Technical),
        "content" | "contentquality" => Some(PromptCategory::Content),
        "performance" | "speed" => Some(PromptCategory::Performance),
        "ux" | "userexperience" | "usability" => Some(PromptCategory::Ux),
        "accessibility" | "a11y" => Some(PromptCategory::Accessibility),
        _ => None,
    }
}

fn numeric(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        Value::Object(inner) => inner.get("score").and_then(numeric),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

/// Scores derived from the snapshot alone, used when provider scoring fails
pub fn heuristic_scores(snapshot: &CrawlSnapshot, targets: &LocaleTargets) -> CategoryScores {
    let flags = &snapshot.technical;
    let mut categories = CategoryScores::default();

    let mut technical: i32 = 100;
    if !flags.has_h1 {
        technical -= 20;
    } else if flags.h1_count > 1 {
        technical -= 10;
    }
    if !flags.has_canonical {
        technical -= 15;
    }
    if !flags.has_ssl {
        technical -= 25;
    }
    if !flags.has_favicon {
        technical -= 5;
    }
    if snapshot.structured_data.is_empty() {
        technical -= 10;
    }
    categories.set(PromptCategory::Technical, clamp_score(technical));

    let mut content: i32 = 100;
    let title_len = snapshot.title.chars().count();
    if title_len == 0 {
        content -= 30;
    } else if !(targets.title.0..=targets.title.1).contains(&title_len) {
        content -= 10;
    }
    match snapshot.meta.description.as_deref() {
        None => content -= 20,
        Some(d)
            if !(targets.description.0..=targets.description.1)
                .contains(&d.chars().count()) =>
        {
            content -= 10;
        }
        Some(_) => {}
    }
    if snapshot.text_content.split_whitespace().count() < 300 {
        content -= 15;
    }
    categories.set(PromptCategory::Content, clamp_score(content));

    let mut performance: i32 = match snapshot.load_time_ms {
        0..=1_000 => 100,
        1_001..=2_500 => 85,
        2_501..=4_000 => 65,
        4_001..=6_000 => 45,
        _ => 25,
    };
    if snapshot.resources.failures > 0 {
        performance -= 10;
    }
    if snapshot.resources.bytes > 3 * 1024 * 1024 {
        performance -= 10;
    }
    categories.set(PromptCategory::Performance, clamp_score(performance));

    let mut ux: i32 = 100;
    if !flags.has_viewport_meta {
        ux -= 30;
    }
    if snapshot.links.internal.is_empty() {
        ux -= 15;
    }
    categories.set(PromptCategory::Ux, clamp_score(ux));

    let mut accessibility: i32 = if snapshot.images.is_empty() {
        100
    } else {
        let with_alt = snapshot.images.len() - snapshot.images_missing_alt();
        (with_alt * 100 / snapshot.images.len()) as i32
    };
    if snapshot.lang.is_none() {
        accessibility -= 10;
    }
    categories.set(PromptCategory::Accessibility, clamp_score(accessibility));

    categories
}

fn clamp_score(raw: i32) -> u8 {
    raw.clamp(0, 100) as u8
}
