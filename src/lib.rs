//! Automated SEO audits of single web pages
//!
//! A submitted URL becomes a job that a headless browser crawls, a
//! language model analyzes against a set of prompts, and that ends as a
//! scored report or a recorded failure. `AuditService` is the entry point.

pub mod analysis;
pub mod browser_manager;
pub mod browser_setup;
pub mod config;
pub mod error;
pub mod jobs;
pub mod page_extractor;
pub mod utils;

pub use analysis::{
    AnalysisOrchestrator, AnalysisResult, CompletionProvider, OpenAiCompletionProvider,
    PromptCatalog, PromptSpec, StaticPromptCatalog,
};
pub use browser_manager::BrowserManager;
pub use browser_setup::{ProfileDir, launch_browser};
pub use config::{AnalysisSettings, AuditConfig, ExtractOptions, JobSettings, ProviderSettings};
pub use error::{AuditError, AuditResult, ExtractError, PersistenceError, ProviderError};
pub use jobs::{
    AuditService, Job, JobFilter, JobId, JobStatus, JobStatusView, JobStore, JsonFileJobStore,
    MemoryJobStore,
};
pub use page_extractor::{ChromiumPageExtractor, CrawlSnapshot, PageExtractor};
