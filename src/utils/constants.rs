//! Shared configuration constants for the audit pipeline
//!
//! Default values used by the extractor, the analysis stage and the job
//! service, collected here to avoid magic numbers.

/// Navigation timeout for a single page load: 30 seconds
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;

/// Fixed settle delay applied after load so client-side frameworks can render
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

/// Quiet window with no in-flight requests that counts as "network idle"
pub const NETWORK_IDLE_WINDOW_MS: u64 = 500;

/// Upper bound on the network-idle wait; slow pages proceed after this
pub const NETWORK_IDLE_MAX_WAIT_MS: u64 = 10_000;

/// Selector that must be present before extraction proceeds
pub const DEFAULT_REQUIRED_SELECTOR: &str = "body";

/// Default viewport, matching a common desktop resolution
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Character budget for free-text body content sent to the provider
///
/// Keeps each request comfortably inside provider context limits.
pub const DEFAULT_CONTENT_BUDGET_CHARS: usize = 8_000;

/// Upper bound on concurrent prompt executions within one job
pub const MAX_PROMPT_CONCURRENCY: usize = 3;

/// Per-call provider timeout
pub const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 60;

/// Retries for transient provider errors (timeouts, 5xx, 429)
pub const DEFAULT_PROVIDER_RETRIES: u32 = 1;

/// Base delay for exponential provider backoff
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Default OpenAI-compatible endpoint and model
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4o-mini";

/// How long finished job task handles are kept in the running-task registry
pub const TASK_RETENTION_SECS: u64 = 5 * 60;

/// Interval of the background registry cleanup task
pub const CLEANUP_INTERVAL_SECS: u64 = 60;

/// Chrome user agent string
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
