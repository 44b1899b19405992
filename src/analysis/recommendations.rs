//! Parsing of the provider's recommendation list

use serde_json::Value;

use super::types::{Priority, Recommendation};
use crate::utils::strip_code_fences;

/// Upper bound on recommendations kept from one reply
pub const MAX_RECOMMENDATIONS: usize = 25;

/// Parse a recommendation reply and order it by priority
///
/// Accepts a bare array or `{"recommendations": [...]}`. Items without a
/// title are dropped; missing fields get neutral defaults. The sort is
/// stable, so the provider's order is kept within a priority. `None` when
/// the reply is not a JSON list at all.
pub fn parse_recommendations(text: &str) -> Option<Vec<Recommendation>> {
    let value: Value = serde_json::from_str(strip_code_fences(text)).ok()?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map.get("recommendations")?.as_array()?,
        _ => return None,
    };

    let mut recommendations: Vec<Recommendation> =
        items.iter().filter_map(recommendation_from).collect();
    recommendations.sort_by_key(|r| r.priority);
    recommendations.truncate(MAX_RECOMMENDATIONS);
    Some(recommendations)
}

fn recommendation_from(item: &Value) -> Option<Recommendation> {
    let field = |name: &str| {
        item.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    let title = field("title")?;
    Some(Recommendation {
        title,
        priority: field("priority")
            .map(|p| parse_priority(&p))
            .unwrap_or(Priority::Medium),
        category: field("category").unwrap_or_else(|| "general".to_string()),
        impact: field("impact").unwrap_or_else(|| "medium".to_string()),
        effort: field("effort").unwrap_or_else(|| "medium".to_string()),
        description: field("description"),
    })
}

fn parse_priority(raw: &str) -> Priority {
    match raw.to_ascii_lowercase().as_str() {
        "high" | "critical" | "urgent" | "1" => Priority::High,
        "low" | "minor" | "3" => Priority::Low,
        _ => Priority::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_by_priority_and_keeps_order_within_priority() {
        let reply = r#"{"recommendations": [
            {"title": "Compress images", "priority": "medium", "category": "performance"},
            {"title": "Add H1", "priority": "HIGH", "category": "technical", "impact": "high", "effort": "low"},
            {"title": "Tweak footer", "priority": "low"},
            {"title": "Add canonical", "priority": "critical"},
            {"priority": "high"},
            {"title": "Fix alt text"}
        ]}"#;
        let recs = parse_recommendations(reply).unwrap();
        let titles: Vec<_> = recs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Add H1", "Add canonical", "Compress images", "Fix alt text", "Tweak footer"]
        );
        assert_eq!(recs[0].effort, "low");
        assert_eq!(recs[3].category, "general");
    }

    #[test]
    fn accepts_bare_arrays_in_fences() {
        let reply = "```json\n[{\"title\": \"Add meta description\", \"priority\": \"high\"}]\n```";
        let recs = parse_recommendations(reply).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].priority, Priority::High);
    }

    #[test]
    fn prose_is_rejected() {
        assert!(parse_recommendations("1. Add an H1\n2. Compress images").is_none());
        assert!(parse_recommendations("{\"advice\": []}").is_none());
    }
}
