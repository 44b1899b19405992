//! Page extraction
//!
//! Drives the browser to one URL inside an isolated context and returns a
//! plain `CrawlSnapshot`: document data from a single DOM walk plus network
//! counters gathered while the page loaded.

pub mod extractor;
pub mod js_scripts;
pub mod network;
pub mod schema;
pub mod snapshot;
pub mod timeout;

pub use extractor::{ChromiumPageExtractor, PageExtractor};
pub use schema::{
    CrawlSnapshot, HeadingEntry, ImageEntry, LinkEntry, LinkPartition, MetaTags, RawDocument,
    RawHeading, RawImage, RawLink, RawMeta, ResourceCounters, TechnicalFlags,
};
pub use snapshot::{PageMetrics, build_snapshot};
