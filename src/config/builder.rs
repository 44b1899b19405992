//! Builders for the configuration types
//!
//! `ExtractOptionsBuilder` is a plain fluent builder that validates on
//! `build()`. `AuditConfigBuilder` uses the typestate pattern so a config
//! meant for a real provider cannot be built without an API key.

use anyhow::{Result, anyhow};
use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::{AnalysisSettings, AuditConfig, ExtractOptions, JobSettings, ProviderSettings};
use crate::utils::constants::MAX_PROMPT_CONCURRENCY;

pub struct ExtractOptionsBuilder {
    inner: ExtractOptions,
}

impl ExtractOptions {
    /// Create a builder seeded with the defaults
    #[must_use]
    pub fn builder() -> ExtractOptionsBuilder {
        ExtractOptionsBuilder {
            inner: ExtractOptions::default(),
        }
    }
}

impl ExtractOptionsBuilder {
    #[must_use]
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.inner.navigation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.inner.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.inner.viewport_width = width;
        self.inner.viewport_height = height;
        self
    }

    #[must_use]
    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.inner.settle_delay_ms = ms;
        self
    }

    /// Selector that must appear before extraction; `None` disables the wait
    #[must_use]
    pub fn required_selector(mut self, selector: Option<impl Into<String>>) -> Self {
        self.inner.required_selector = selector.map(Into::into);
        self
    }

    #[must_use]
    pub fn network_idle(mut self, window_ms: u64, max_wait_ms: u64) -> Self {
        self.inner.network_idle_window_ms = window_ms;
        self.inner.network_idle_max_wait_ms = max_wait_ms;
        self
    }

    /// Set browser headless mode
    ///
    /// Headed mode is only honoured in debug builds; release builds force
    /// headless with a warning.
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.inner.headless = headless;
        self
    }

    #[must_use]
    pub fn chrome_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.inner.chrome_data_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<ExtractOptions> {
        let mut options = self.inner;

        if options.navigation_timeout_secs == 0 {
            return Err(anyhow!("navigation_timeout_secs must be greater than zero"));
        }
        if options.viewport_width == 0 || options.viewport_height == 0 {
            return Err(anyhow!(
                "viewport must be non-zero, got {}x{}",
                options.viewport_width,
                options.viewport_height
            ));
        }
        if options.user_agent.trim().is_empty() {
            return Err(anyhow!("user_agent must not be empty"));
        }
        if let Some(selector) = &options.required_selector
            && selector.trim().is_empty()
        {
            return Err(anyhow!("required_selector must not be blank; use None to disable"));
        }

        if !cfg!(debug_assertions) && !options.headless {
            tracing::warn!(
                "Forcing headless mode in release build. \
                Headed mode is only available in debug builds for development."
            );
            options.headless = true;
        }

        Ok(options)
    }
}

// Type states for the audit config builder
pub struct WithApiKey;

pub struct AuditConfigBuilder<State = ()> {
    extractor: ExtractOptions,
    analysis: AnalysisSettings,
    provider: ProviderSettings,
    jobs: JobSettings,
    _phantom: PhantomData<State>,
}

impl AuditConfig {
    /// Create a builder for an `AuditConfig`; an API key is required to build
    #[must_use]
    pub fn builder() -> AuditConfigBuilder<()> {
        AuditConfigBuilder {
            extractor: ExtractOptions::default(),
            analysis: AnalysisSettings::default(),
            provider: ProviderSettings::default(),
            jobs: JobSettings::default(),
            _phantom: PhantomData,
        }
    }
}

impl AuditConfigBuilder<()> {
    pub fn api_key(mut self, key: impl Into<String>) -> AuditConfigBuilder<WithApiKey> {
        self.provider.api_key = key.into();
        AuditConfigBuilder {
            extractor: self.extractor,
            analysis: self.analysis,
            provider: self.provider,
            jobs: self.jobs,
            _phantom: PhantomData,
        }
    }
}

// Build method only available once the API key is set
impl AuditConfigBuilder<WithApiKey> {
    pub fn build(self) -> Result<AuditConfig> {
        if self.provider.api_key.trim().is_empty() {
            return Err(anyhow!("provider api_key must not be blank"));
        }
        if self.provider.model.trim().is_empty() {
            return Err(anyhow!("provider model must not be blank"));
        }
        url::Url::parse(&self.provider.base_url)
            .map_err(|e| anyhow!("invalid provider base_url '{}': {e}", self.provider.base_url))?;
        self.analysis.validate()?;

        Ok(AuditConfig {
            extractor: self.extractor,
            analysis: self.analysis,
            provider: self.provider,
            jobs: self.jobs,
        })
    }
}

// Methods available at any state
impl<State> AuditConfigBuilder<State> {
    #[must_use]
    pub fn extractor(mut self, options: ExtractOptions) -> Self {
        self.extractor = options;
        self
    }

    #[must_use]
    pub fn analysis(mut self, settings: AnalysisSettings) -> Self {
        self.analysis = settings;
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.provider.model = model.into();
        self
    }

    #[must_use]
    pub fn provider_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.provider.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.jobs.store_path = Some(path.into());
        self
    }

    /// Set how many prompts of one job may run at once
    ///
    /// Validated on `build()` against the 1-3 range.
    #[must_use]
    pub fn prompt_concurrency(mut self, limit: usize) -> Self {
        self.analysis.prompt_concurrency = limit;
        self
    }
}

impl AnalysisSettings {
    /// Check ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.prompt_concurrency == 0 || self.prompt_concurrency > MAX_PROMPT_CONCURRENCY {
            return Err(anyhow!(
                "prompt_concurrency must be between 1 and {MAX_PROMPT_CONCURRENCY}, got {}",
                self.prompt_concurrency
            ));
        }
        if self.content_budget_chars == 0 {
            return Err(anyhow!("content_budget_chars must be greater than zero"));
        }
        if self.prompt_timeout_secs == 0 {
            return Err(anyhow!("prompt_timeout_secs must be greater than zero"));
        }
        Ok(())
    }
}
