//! Page language detection and per-locale length targets

use std::collections::HashSet;

use super::types::{DetectedLanguage, LanguageSource};
use crate::page_extractor::CrawlSnapshot;

pub const DEFAULT_LANGUAGE: &str = "en";

/// Minimum share of a marker list that must appear in the text
const MIN_MARKER_RATIO: f32 = 0.3;

/// Words scanned from the start of the body text
const MAX_SCANNED_WORDS: usize = 2_000;

const LANG_ATTRIBUTE_CONFIDENCE: f32 = 0.95;
const DEFAULT_CONFIDENCE: f32 = 0.1;

/// Ten frequent function words per candidate language
const MARKERS: &[(&str, [&str; 10])] = &[
    ("en", ["the", "and", "of", "to", "in", "is", "that", "for", "with", "you"]),
    ("de", ["der", "die", "und", "das", "ist", "nicht", "mit", "ein", "zu", "sie"]),
    ("fr", ["le", "la", "les", "et", "est", "des", "une", "pour", "dans", "que"]),
    ("es", ["el", "los", "las", "que", "y", "en", "una", "por", "con", "para"]),
    ("it", ["il", "che", "di", "per", "una", "non", "sono", "con", "gli", "della"]),
    ("nl", ["het", "een", "en", "van", "is", "dat", "niet", "op", "voor", "zijn"]),
    ("pt", ["o", "que", "não", "uma", "para", "com", "os", "em", "do", "da"]),
];

/// Recommended title and meta description lengths, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleTargets {
    pub title: (usize, usize),
    pub description: (usize, usize),
}

impl Default for LocaleTargets {
    fn default() -> Self {
        Self {
            title: (30, 60),
            description: (120, 160),
        }
    }
}

/// Length targets for a language code; unknown codes get the default
#[must_use]
pub fn locale_targets(code: &str) -> LocaleTargets {
    match code {
        "de" | "nl" => LocaleTargets {
            title: (30, 65),
            description: (120, 160),
        },
        "ja" | "zh" | "ko" => LocaleTargets {
            title: (15, 32),
            description: (50, 100),
        },
        _ => LocaleTargets::default(),
    }
}

/// English name used when instructing the provider
#[must_use]
pub fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "nl" => "Dutch",
        "pt" => "Portuguese",
        "ja" => "Japanese",
        "zh" => "Chinese",
        "ko" => "Korean",
        "pl" => "Polish",
        "sv" => "Swedish",
        other => other,
    }
}

/// Detect the page language
///
/// A meaningful `lang` attribute wins outright. Otherwise the body text is
/// scanned for marker words and the best language at or above the match
/// threshold is chosen; ties go to the earlier language in the table.
#[must_use]
pub fn detect_language(snapshot: &CrawlSnapshot) -> DetectedLanguage {
    if let Some(code) = snapshot.lang.as_deref().and_then(primary_subtag) {
        return DetectedLanguage {
            code,
            confidence: LANG_ATTRIBUTE_CONFIDENCE,
            source: LanguageSource::LangAttribute,
        };
    }

    let sample = format!("{} {}", snapshot.title, snapshot.text_content);
    match detect_from_text(&sample) {
        Some((code, ratio)) => DetectedLanguage {
            code: code.to_string(),
            confidence: ratio.min(0.9),
            source: LanguageSource::TextMarkers,
        },
        None => DetectedLanguage {
            code: DEFAULT_LANGUAGE.to_string(),
            confidence: DEFAULT_CONFIDENCE,
            source: LanguageSource::Default,
        },
    }
}

/// `"en-US"` -> `"en"`; placeholder values yield `None`
fn primary_subtag(lang: &str) -> Option<String> {
    let primary = lang
        .trim()
        .split(['-', '_'])
        .next()?
        .to_ascii_lowercase();
    if primary.is_empty()
        || matches!(primary.as_str(), "und" | "x" | "zxx" | "mul")
        || lang.trim().eq_ignore_ascii_case("x-default")
        || !primary.chars().all(|c| c.is_ascii_alphabetic())
    {
        return None;
    }
    Some(primary)
}

/// Best marker-list match and its ratio, if any reaches the threshold
fn detect_from_text(text: &str) -> Option<(&'static str, f32)> {
    let words: HashSet<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .take(MAX_SCANNED_WORDS)
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return None;
    }

    let mut best: Option<(&'static str, f32)> = None;
    for (code, markers) in MARKERS {
        let hits = markers.iter().filter(|m| words.contains(**m)).count();
        let ratio = hits as f32 / markers.len() as f32;
        if ratio >= MIN_MARKER_RATIO && best.is_none_or(|(_, r)| ratio > r) {
            best = Some((*code, ratio));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_extractor::{PageMetrics, RawDocument, build_snapshot};
    use url::Url;

    fn snapshot(lang: Option<&str>, text: &str) -> CrawlSnapshot {
        let raw = RawDocument {
            lang: lang.map(String::from),
            text_content: text.to_string(),
            ..RawDocument::default()
        };
        build_snapshot(
            raw,
            &Url::parse("https://example.com").unwrap(),
            PageMetrics::default(),
        )
    }

    #[test]
    fn lang_attribute_wins() {
        let detected = detect_language(&snapshot(Some("de-AT"), "the and of to in"));
        assert_eq!(detected.code, "de");
        assert_eq!(detected.source, LanguageSource::LangAttribute);
        assert!(detected.confidence > 0.9);
    }

    #[test]
    fn placeholder_lang_falls_back_to_text() {
        let text = "Der Hund und die Katze sind nicht mit ein Problem, das ist zu viel für sie";
        let detected = detect_language(&snapshot(Some("und"), text));
        assert_eq!(detected.code, "de");
        assert_eq!(detected.source, LanguageSource::TextMarkers);
    }

    #[test]
    fn french_text_is_detected() {
        let text = "Le chat est dans la maison et les enfants sont pour une fois calmes, que faire";
        assert_eq!(detect_language(&snapshot(None, text)).code, "fr");
    }

    #[test]
    fn too_few_markers_use_default() {
        let detected = detect_language(&snapshot(None, "Lorem ipsum dolor sit amet"));
        assert_eq!(detected.code, DEFAULT_LANGUAGE);
        assert_eq!(detected.source, LanguageSource::Default);
        assert!(detected.confidence < 0.5);
    }

    #[test]
    fn targets_default_for_unknown_languages() {
        assert_eq!(locale_targets("en"), LocaleTargets::default());
        assert_eq!(locale_targets("xx").description, (120, 160));
        assert_eq!(locale_targets("ja").title, (15, 32));
    }
}
