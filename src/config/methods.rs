//! Environment loading for `AuditConfig`
//!
//! Recognised variables:
//! - `OPENAI_API_KEY` / `SEO_AUDIT_API_KEY` (the latter wins)
//! - `SEO_AUDIT_PROVIDER_URL`, `SEO_AUDIT_MODEL`
//! - `SEO_AUDIT_STORE` (path of the JSON job snapshot)
//! - `SEO_AUDIT_NAV_TIMEOUT_SECS`, `SEO_AUDIT_SETTLE_MS`, `SEO_AUDIT_SELECTOR`
//! - `SEO_AUDIT_PROMPT_CONCURRENCY`, `SEO_AUDIT_CONTENT_BUDGET`
//! - `SEO_AUDIT_HEADLESS` (`0`/`false` for a visible browser in debug builds)

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

use super::types::AuditConfig;

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_var(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Failed to parse {name}={raw}"))
        })
        .transpose()
}

impl AuditConfig {
    /// Build a config from defaults overlaid with environment variables
    ///
    /// Values are validated the same way the builders validate them.
    pub fn from_env() -> Result<Self> {
        let mut config = AuditConfig::default();

        if let Some(key) = env_var("SEO_AUDIT_API_KEY").or_else(|| env_var("OPENAI_API_KEY")) {
            config.provider.api_key = key;
        }
        if let Some(url) = env_var("SEO_AUDIT_PROVIDER_URL") {
            config.provider.base_url = url;
        }
        if let Some(model) = env_var("SEO_AUDIT_MODEL") {
            config.provider.model = model;
        }
        if let Some(path) = env_var("SEO_AUDIT_STORE") {
            config.jobs.store_path = Some(PathBuf::from(path));
        }

        let mut extractor = config.extractor.clone();
        if let Some(secs) = env_parse::<u64>("SEO_AUDIT_NAV_TIMEOUT_SECS")? {
            extractor.navigation_timeout_secs = secs;
        }
        if let Some(ms) = env_parse::<u64>("SEO_AUDIT_SETTLE_MS")? {
            extractor.settle_delay_ms = ms;
        }
        if let Some(selector) = env_var("SEO_AUDIT_SELECTOR") {
            extractor.required_selector = Some(selector);
        }
        if let Some(headless) = env_var("SEO_AUDIT_HEADLESS") {
            extractor.headless = !matches!(headless.trim(), "0" | "false" | "no");
        }
        config.extractor = rebuild_extractor(extractor)?;

        if let Some(limit) = env_parse::<usize>("SEO_AUDIT_PROMPT_CONCURRENCY")? {
            config.analysis.prompt_concurrency = limit;
        }
        if let Some(budget) = env_parse::<usize>("SEO_AUDIT_CONTENT_BUDGET")? {
            config.analysis.content_budget_chars = budget;
        }
        config.analysis.validate()?;

        Ok(config)
    }

    /// Whether a provider API key is configured
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        !self.provider.api_key.trim().is_empty()
    }
}

/// Run raw extractor values through the validating builder
fn rebuild_extractor(raw: super::ExtractOptions) -> Result<super::ExtractOptions> {
    let mut builder = super::ExtractOptions::builder()
        .navigation_timeout_secs(raw.navigation_timeout_secs)
        .user_agent(raw.user_agent)
        .viewport(raw.viewport_width, raw.viewport_height)
        .settle_delay_ms(raw.settle_delay_ms)
        .required_selector(raw.required_selector)
        .network_idle(raw.network_idle_window_ms, raw.network_idle_max_wait_ms)
        .headless(raw.headless);
    if let Some(dir) = raw.chrome_data_dir {
        builder = builder.chrome_data_dir(dir);
    }
    builder.build()
}
