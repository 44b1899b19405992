//! Configuration for the audit pipeline
//!
//! `AuditConfig` groups the settings of every stage: the page extractor,
//! the analysis orchestrator, the completion provider and the job service.
//! Each section has sensible defaults; `AuditConfig::from_env()` overlays
//! environment variables and the builders validate values up front.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::{AuditConfigBuilder, ExtractOptionsBuilder, WithApiKey};
pub use types::{AnalysisSettings, AuditConfig, ExtractOptions, JobSettings, ProviderSettings};
