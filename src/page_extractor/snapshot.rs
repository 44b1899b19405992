//! Pure derivation of a `CrawlSnapshot` from a `RawDocument`
//!
//! Nothing here touches the browser, so every rule about links, meta tags,
//! headings and technical flags is unit-testable.

use chrono::Utc;
use log::debug;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use super::schema::{
    CrawlSnapshot, HeadingEntry, ImageEntry, LinkEntry, LinkPartition, MetaTags, RawDocument,
    RawHeading, RawImage, RawLink, RawMeta, ResourceCounters, TechnicalFlags,
};
use crate::utils::{collapse_whitespace, is_internal_link};

/// Measurements taken outside the DOM walk
#[derive(Debug, Clone, Copy, Default)]
pub struct PageMetrics {
    pub status_code: Option<u16>,
    pub load_time: Duration,
    pub resources: ResourceCounters,
}

/// Turn the raw DOM walk into the snapshot handed to the rest of the pipeline
///
/// `page_url` is the submitted URL. Links and the SSL flag are judged
/// against the URL the walk reported, which differs after a redirect.
pub fn build_snapshot(raw: RawDocument, page_url: &Url, metrics: PageMetrics) -> CrawlSnapshot {
    let final_url = landed_url(raw.final_url.as_deref(), page_url);
    let meta = build_meta(&raw.meta);
    let headings = build_headings(&raw.headings);
    let links = partition_links(&final_url, raw.links);
    let images: Vec<ImageEntry> = raw.images.into_iter().filter_map(build_image).collect();
    let structured_data = parse_json_ld(&raw.json_ld);

    let canonical = raw
        .canonical
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let h1_count = headings.iter().filter(|h| h.level == 1).count();
    let technical = TechnicalFlags {
        has_h1: h1_count > 0,
        h1_count,
        has_canonical: canonical.is_some(),
        has_ssl: final_url.scheme() == "https",
        has_viewport_meta: meta.viewport.is_some(),
        has_favicon: raw.has_favicon,
    };

    let lang = raw
        .lang
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    CrawlSnapshot {
        url: page_url.to_string(),
        final_url: final_url.to_string(),
        status_code: metrics.status_code,
        load_time_ms: u64::try_from(metrics.load_time.as_millis()).unwrap_or(u64::MAX),
        title: collapse_whitespace(&raw.title),
        lang,
        meta,
        canonical,
        headings,
        images,
        links,
        structured_data,
        technical,
        resources: metrics.resources,
        text_content: collapse_whitespace(&raw.text_content),
        crawled_at: Utc::now(),
    }
}

/// Reported `location.href` if it is a usable http(s) URL, else the submitted one
fn landed_url(reported: Option<&str>, page_url: &Url) -> Url {
    reported
        .and_then(|href| Url::parse(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or_else(|| page_url.clone())
}

fn build_meta(tags: &[RawMeta]) -> MetaTags {
    let mut all = BTreeMap::new();
    for tag in tags {
        let key = tag.key.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        all.entry(key).or_insert_with(|| tag.content.trim().to_string());
    }

    let non_empty = |key: &str| all.get(key).filter(|v| !v.is_empty()).cloned();

    let keywords = all
        .get("keywords")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let prefixed = |prefix: &str| -> BTreeMap<String, String> {
        all.iter()
            .filter_map(|(k, v)| k.strip_prefix(prefix).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    };

    MetaTags {
        description: non_empty("description"),
        keywords,
        robots: non_empty("robots"),
        viewport: non_empty("viewport"),
        open_graph: prefixed("og:"),
        twitter_card: prefixed("twitter:"),
        all,
    }
}

fn build_headings(raw: &[RawHeading]) -> Vec<HeadingEntry> {
    let mut counters = [0usize; 6];
    raw.iter()
        .filter(|h| (1..=6).contains(&h.level))
        .enumerate()
        .map(|(position, h)| {
            let depth = usize::from(h.level);
            counters[depth - 1] += 1;
            for deeper in counters.iter_mut().skip(depth) {
                *deeper = 0;
            }
            HeadingEntry {
                level: h.level,
                text: collapse_whitespace(&h.text),
                position,
                ordinal: counters[..depth].to_vec(),
            }
        })
        .collect()
}

fn build_image(raw: RawImage) -> Option<ImageEntry> {
    let src = raw.src.trim().to_string();
    if src.is_empty() {
        return None;
    }
    let has_alt = raw.alt.as_deref().is_some_and(|a| !a.trim().is_empty());
    Some(ImageEntry {
        src,
        alt: raw.alt,
        width: raw.width.filter(|w| *w > 0),
        height: raw.height.filter(|h| *h > 0),
        has_alt,
    })
}

/// Split anchors into internal and external relative to the page origin
///
/// Hrefs that do not resolve to an http(s) URL (mailto, tel, javascript)
/// are dropped.
fn partition_links(page_url: &Url, raw: Vec<RawLink>) -> LinkPartition {
    let mut partition = LinkPartition::default();
    for link in raw {
        let Ok(resolved) = page_url.join(link.href.trim()) else {
            debug!("Skipping unresolvable href: {}", link.href);
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let nofollow = link
            .rel
            .as_deref()
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("nofollow")));
        let entry = LinkEntry {
            href: resolved.to_string(),
            text: collapse_whitespace(&link.text),
            nofollow,
        };

        if is_internal_link(page_url, resolved.as_str()) {
            partition.internal.push(entry);
        } else {
            partition.external.push(entry);
        }
    }
    partition
}

/// Parse JSON-LD blocks; a top-level array contributes each element
fn parse_json_ld(blocks: &[String]) -> Vec<serde_json::Value> {
    let mut parsed = Vec::new();
    for block in blocks {
        match serde_json::from_str::<serde_json::Value>(block.trim()) {
            Ok(serde_json::Value::Array(items)) => parsed.extend(items),
            Ok(value) => parsed.push(value),
            Err(e) => debug!("Skipping malformed JSON-LD block: {e}"),
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    fn heading(level: u8, text: &str) -> RawHeading {
        RawHeading {
            level,
            text: text.to_string(),
            id: None,
        }
    }

    fn link(href: &str, rel: Option<&str>) -> RawLink {
        RawLink {
            href: href.to_string(),
            text: "  some   link ".to_string(),
            rel: rel.map(String::from),
        }
    }

    fn meta(key: &str, content: &str) -> RawMeta {
        RawMeta {
            key: key.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn links_are_partitioned_by_origin() {
        let raw = RawDocument {
            links: vec![
                link("/about", None),
                link("https://example.com/contact", None),
                link("http://example.com/insecure", None),
                link("https://other.org/", Some("nofollow noopener")),
                link("mailto:hi@example.com", None),
                link("javascript:void(0)", None),
            ],
            ..RawDocument::default()
        };
        let snapshot = build_snapshot(raw, &page(), PageMetrics::default());

        let internal: Vec<_> = snapshot.links.internal.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(
            internal,
            vec!["https://example.com/about", "https://example.com/contact"]
        );
        // scheme change means a different origin
        assert_eq!(snapshot.links.external.len(), 2);
        assert!(snapshot.links.external[1].nofollow);
        assert_eq!(snapshot.links.internal[0].text, "some link");
    }

    #[test]
    fn heading_ordinals_reset_deeper_levels() {
        let raw = RawDocument {
            headings: vec![
                heading(1, "Intro"),
                heading(2, "A"),
                heading(3, "A.1"),
                heading(2, "B"),
                heading(1, "Second"),
                heading(2, "C"),
                heading(7, "bogus"),
            ],
            ..RawDocument::default()
        };
        let snapshot = build_snapshot(raw, &page(), PageMetrics::default());
        let ordinals: Vec<_> = snapshot.headings.iter().map(|h| h.ordinal.clone()).collect();
        assert_eq!(
            ordinals,
            vec![
                vec![1],
                vec![1, 1],
                vec![1, 1, 1],
                vec![1, 2],
                vec![2],
                vec![2, 1]
            ]
        );
        assert_eq!(snapshot.headings[5].position, 5);
        assert_eq!(snapshot.technical.h1_count, 2);
        assert!(snapshot.technical.has_h1);
    }

    #[test]
    fn meta_fields_are_derived() {
        let raw = RawDocument {
            meta: vec![
                meta("Description", "  A page about things "),
                meta("description", "duplicate ignored"),
                meta("keywords", "seo, audit, , rust"),
                meta("og:title", "OG Title"),
                meta("twitter:card", "summary"),
                meta("viewport", "width=device-width"),
                meta("robots", ""),
            ],
            ..RawDocument::default()
        };
        let snapshot = build_snapshot(raw, &page(), PageMetrics::default());
        assert_eq!(snapshot.meta.description.as_deref(), Some("A page about things"));
        assert_eq!(snapshot.meta.keywords, vec!["seo", "audit", "rust"]);
        assert_eq!(snapshot.meta.open_graph.get("title").map(String::as_str), Some("OG Title"));
        assert_eq!(snapshot.meta.twitter_card.get("card").map(String::as_str), Some("summary"));
        assert!(snapshot.meta.robots.is_none());
        assert!(snapshot.technical.has_viewport_meta);
    }

    #[test]
    fn malformed_json_ld_is_skipped() {
        let raw = RawDocument {
            json_ld: vec![
                r#"{"@type": "Organization", "name": "Example"}"#.to_string(),
                "{ not json".to_string(),
                r#"[{"@type": "WebSite"}, {"@type": "BreadcrumbList"}]"#.to_string(),
            ],
            ..RawDocument::default()
        };
        let snapshot = build_snapshot(raw, &page(), PageMetrics::default());
        assert_eq!(snapshot.structured_data.len(), 3);
        assert_eq!(snapshot.structured_data[0]["name"], "Example");
    }

    #[test]
    fn technical_flags_and_images() {
        let raw = RawDocument {
            title: "  Hello \n World ".to_string(),
            canonical: Some("https://example.com/blog/post".to_string()),
            has_favicon: true,
            images: vec![
                RawImage {
                    src: "/a.png".into(),
                    alt: Some("A chart".into()),
                    width: Some(640),
                    height: Some(0),
                },
                RawImage {
                    src: "/b.png".into(),
                    alt: Some("   ".into()),
                    ..RawImage::default()
                },
                RawImage {
                    src: "".into(),
                    ..RawImage::default()
                },
            ],
            ..RawDocument::default()
        };
        let metrics = PageMetrics {
            status_code: Some(200),
            load_time: Duration::from_millis(1234),
            resources: ResourceCounters {
                requests: 10,
                responses: 9,
                bytes: 4096,
                failures: 1,
            },
        };
        let snapshot = build_snapshot(raw, &page(), metrics);

        assert_eq!(snapshot.title, "Hello World");
        assert_eq!(snapshot.load_time_ms, 1234);
        assert_eq!(snapshot.images.len(), 2);
        assert_eq!(snapshot.images[0].height, None);
        assert_eq!(snapshot.images_missing_alt(), 1);
        assert!(snapshot.technical.has_ssl);
        assert!(snapshot.technical.has_canonical);
        assert!(snapshot.technical.has_favicon);
        assert!(!snapshot.technical.has_h1);
        assert_eq!(snapshot.resources.failures, 1);

        let http = Url::parse("http://example.com/").unwrap();
        let plain = build_snapshot(RawDocument::default(), &http, PageMetrics::default());
        assert!(!plain.technical.has_ssl);
        assert_eq!(plain.final_url, "http://example.com/");
    }

    #[test]
    fn redirect_target_decides_ssl_and_link_origin() {
        let submitted = Url::parse("http://example.com").unwrap();
        let raw = RawDocument {
            final_url: Some("https://www.example.com/".to_string()),
            links: vec![
                link("https://www.example.com/about", None),
                link("/contact", None),
                link("http://example.com/old", None),
            ],
            ..RawDocument::default()
        };
        let snapshot = build_snapshot(raw, &submitted, PageMetrics::default());

        assert_eq!(snapshot.url, "http://example.com/");
        assert_eq!(snapshot.final_url, "https://www.example.com/");
        assert!(snapshot.technical.has_ssl);
        let internal: Vec<_> = snapshot.links.internal.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(
            internal,
            vec!["https://www.example.com/about", "https://www.example.com/contact"]
        );
        assert_eq!(snapshot.links.external.len(), 1);
    }

    #[test]
    fn unusable_reported_url_falls_back_to_submitted() {
        for reported in ["about:blank", "chrome-error://chromewebdata/", "not a url"] {
            let raw = RawDocument {
                final_url: Some(reported.to_string()),
                links: vec![link("/about", None)],
                ..RawDocument::default()
            };
            let snapshot = build_snapshot(raw, &page(), PageMetrics::default());
            assert_eq!(snapshot.final_url, page().to_string());
            assert_eq!(snapshot.links.internal[0].href, "https://example.com/about");
        }
    }
}
