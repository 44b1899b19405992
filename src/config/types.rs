//! Core configuration types
//!
//! Plain data with serde support so a whole `AuditConfig` can be loaded
//! from or dumped to JSON.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::constants::{
    CHROME_USER_AGENT, CLEANUP_INTERVAL_SECS, DEFAULT_CONTENT_BUDGET_CHARS,
    DEFAULT_NAVIGATION_TIMEOUT_SECS, DEFAULT_PROMPT_TIMEOUT_SECS, DEFAULT_PROVIDER_BASE_URL,
    DEFAULT_PROVIDER_MODEL, DEFAULT_PROVIDER_RETRIES, DEFAULT_REQUIRED_SELECTOR,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_SETTLE_DELAY_MS, DEFAULT_VIEWPORT_HEIGHT,
    DEFAULT_VIEWPORT_WIDTH, NETWORK_IDLE_MAX_WAIT_MS, NETWORK_IDLE_WINDOW_MS,
    TASK_RETENTION_SECS,
};

/// Top-level configuration for one audit service instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub extractor: ExtractOptions,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub jobs: JobSettings,
}

/// Options for a single page extraction
///
/// Fields are crate-private; read them through the getters and construct
/// through `ExtractOptions::builder()` so values are validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Timeout in seconds for navigation (`page.goto()` plus load events)
    ///
    /// Covers DNS resolution, connection setup and the main document response.
    /// Default: 30 seconds
    pub(crate) navigation_timeout_secs: u64,

    /// User agent sent with every request from the browsing context
    pub(crate) user_agent: String,

    pub(crate) viewport_width: u32,
    pub(crate) viewport_height: u32,

    /// Fixed delay after load for client-side rendering frameworks
    ///
    /// Default: 2000 ms
    pub(crate) settle_delay_ms: u64,

    /// CSS selector that must exist before extraction proceeds
    ///
    /// `None` disables the check. Default: `body`
    pub(crate) required_selector: Option<String>,

    /// Quiet period with zero in-flight requests that counts as network idle
    pub(crate) network_idle_window_ms: u64,

    /// Cap on the network-idle wait; long-polling pages proceed after this
    pub(crate) network_idle_max_wait_ms: u64,

    pub(crate) headless: bool,

    /// Chrome user data directory for browser profile isolation
    #[serde(skip)]
    pub(crate) chrome_data_dir: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT_SECS,
            user_agent: CHROME_USER_AGENT.to_string(),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            required_selector: Some(DEFAULT_REQUIRED_SELECTOR.to_string()),
            network_idle_window_ms: NETWORK_IDLE_WINDOW_MS,
            network_idle_max_wait_ms: NETWORK_IDLE_MAX_WAIT_MS,
            headless: true,
            chrome_data_dir: None,
        }
    }
}

/// Settings for the analysis orchestrator and prompt executor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Characters of free-text body content included in each request
    pub content_budget_chars: usize,

    /// Prompts executed at once within one job (1 = strictly sequential)
    ///
    /// Range: 1-3. Outcome order always follows the input prompt order.
    pub prompt_concurrency: usize,

    /// Retries for transient provider errors
    pub max_retries: u32,

    pub retry_base_delay_ms: u64,

    /// Per-call timeout, mapped to `ProviderError::Timeout`
    pub prompt_timeout_secs: u64,

    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            content_budget_chars: DEFAULT_CONTENT_BUDGET_CHARS,
            prompt_concurrency: 1,
            max_retries: DEFAULT_PROVIDER_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            prompt_timeout_secs: DEFAULT_PROMPT_TIMEOUT_SECS,
            temperature: 0.2,
            max_tokens: 1_500,
        }
    }
}

/// Connection settings for an OpenAI-compatible completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,

    /// Never serialized back out
    #[serde(skip_serializing)]
    pub api_key: String,

    pub model: String,
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_PROVIDER_MODEL.to_string(),
            request_timeout_secs: DEFAULT_PROMPT_TIMEOUT_SECS,
        }
    }
}

/// Settings for the job service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// JSON snapshot file for jobs; `None` keeps jobs in memory only
    pub store_path: Option<PathBuf>,

    /// How long finished task handles stay in the running-task registry
    pub task_retention_secs: u64,

    pub cleanup_interval_secs: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            store_path: None,
            task_retention_secs: TASK_RETENTION_SECS,
            cleanup_interval_secs: CLEANUP_INTERVAL_SECS,
        }
    }
}
