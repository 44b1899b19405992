//! Getter methods for `ExtractOptions`

use std::path::PathBuf;
use std::time::Duration;

use super::types::ExtractOptions;

impl ExtractOptions {
    #[must_use]
    pub fn navigation_timeout_secs(&self) -> u64 {
        self.navigation_timeout_secs
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Viewport as (width, height)
    #[must_use]
    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn required_selector(&self) -> Option<&str> {
        self.required_selector.as_deref()
    }

    #[must_use]
    pub fn network_idle_window(&self) -> Duration {
        Duration::from_millis(self.network_idle_window_ms)
    }

    #[must_use]
    pub fn network_idle_max_wait(&self) -> Duration {
        Duration::from_millis(self.network_idle_max_wait_ms)
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn chrome_data_dir(&self) -> Option<&PathBuf> {
        self.chrome_data_dir.as_ref()
    }
}
