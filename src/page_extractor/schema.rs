use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Plain result of the in-page DOM walk
///
/// Deserialized straight from the value returned by `DOM_WALK_SCRIPT`;
/// carries no live references into the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDocument {
    pub title: String,
    pub lang: Option<String>,
    pub meta: Vec<RawMeta>,
    pub canonical: Option<String>,
    pub has_favicon: bool,
    pub headings: Vec<RawHeading>,
    pub images: Vec<RawImage>,
    pub links: Vec<RawLink>,
    /// Text of every `script[type="application/ld+json"]`, unparsed
    pub json_ld: Vec<String>,
    pub text_content: String,
    /// `location.href` at walk time, after any redirects
    pub final_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMeta {
    /// `name`, `property` or `http-equiv`, whichever the tag carries
    pub key: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawHeading {
    pub level: u8,
    pub text: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawImage {
    pub src: String,
    /// `None` when the attribute is missing, `Some("")` for decorative images
    pub alt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawLink {
    pub href: String,
    pub text: String,
    pub rel: Option<String>,
}

/// Immutable result of extracting one page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSnapshot {
    /// URL as submitted
    pub url: String,
    /// URL the page settled on after redirects; links and SSL are judged against it
    #[serde(default)]
    pub final_url: String,
    /// Main document status; `None` if the response event was never observed
    pub status_code: Option<u16>,
    pub load_time_ms: u64,
    pub title: String,
    pub lang: Option<String>,
    pub meta: MetaTags,
    pub canonical: Option<String>,
    pub headings: Vec<HeadingEntry>,
    pub images: Vec<ImageEntry>,
    pub links: LinkPartition,
    /// Parsed `application/ld+json` blocks; blocks that failed to parse are absent
    pub structured_data: Vec<serde_json::Value>,
    pub technical: TechnicalFlags,
    pub resources: ResourceCounters,
    pub text_content: String,
    pub crawled_at: DateTime<Utc>,
}

impl CrawlSnapshot {
    /// Headings of one level, in document order
    pub fn headings_at(&self, level: u8) -> impl Iterator<Item = &HeadingEntry> {
        self.headings.iter().filter(move |h| h.level == level)
    }

    /// Number of images without a usable alt attribute
    #[must_use]
    pub fn images_missing_alt(&self) -> usize {
        self.images.iter().filter(|img| !img.has_alt).count()
    }
}

/// Meta tags with the SEO-relevant fields pulled out
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaTags {
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub robots: Option<String>,
    pub viewport: Option<String>,
    /// `og:*` properties keyed without the prefix
    pub open_graph: BTreeMap<String, String>,
    /// `twitter:*` names keyed without the prefix
    pub twitter_card: BTreeMap<String, String>,
    /// Every meta tag seen, keyed by lower-cased name; first occurrence wins
    pub all: BTreeMap<String, String>,
}

/// Heading with its position in the document's heading hierarchy
///
/// `ordinal` is the hierarchical path of counters, e.g. `[1, 2, 1]` for
/// the first H3 under the second H2 under the first H1. A heading resets
/// every deeper counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingEntry {
    /// 1 for h1 through 6 for h6
    pub level: u8,
    pub text: String,
    /// Zero-based index among all headings in document order
    pub position: usize,
    pub ordinal: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub src: String,
    pub alt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// True when alt is present and not blank
    pub has_alt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Absolute URL after resolving against the page
    pub href: String,
    pub text: String,
    pub nofollow: bool,
}

/// Anchors split by origin relative to the crawled page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkPartition {
    pub internal: Vec<LinkEntry>,
    pub external: Vec<LinkEntry>,
}

impl LinkPartition {
    #[must_use]
    pub fn total(&self) -> usize {
        self.internal.len() + self.external.len()
    }
}

/// Technical flags derived once from the raw extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalFlags {
    pub has_h1: bool,
    pub h1_count: usize,
    pub has_canonical: bool,
    pub has_ssl: bool,
    pub has_viewport_meta: bool,
    pub has_favicon: bool,
}

/// Network activity observed between navigation start and extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCounters {
    pub requests: u64,
    pub responses: u64,
    pub bytes: u64,
    pub failures: u64,
}
