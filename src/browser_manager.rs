//! Process-wide browser lifecycle
//!
//! One Chromium process is shared by every extraction in the process. It is
//! launched lazily by the first `acquire()` and closed explicitly: jobs hold
//! a `BrowserLease` while they crawl, and the job runner calls
//! `shutdown_if_idle()` after each crawl so the process only stays up while
//! some job still needs it.

use anyhow::Result;
use chromiumoxide::Browser;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::browser_setup::{ProfileDir, launch_browser};
use crate::config::ExtractOptions;

/// Browser plus its CDP handler task and profile directory
///
/// The handler is aborted on drop; an owned profile directory is removed by
/// `cleanup_temp_dir()` once the browser process has exited.
pub struct BrowserWrapper {
    browser: Option<Arc<Browser>>,
    handler: JoinHandle<()>,
    profile: Option<ProfileDir>,
}

impl BrowserWrapper {
    /// Remove the profile directory if this crate created it
    ///
    /// MUST run after the browser process has exited; Windows refuses to
    /// delete files Chrome still holds open.
    pub fn cleanup_temp_dir(&mut self) {
        let Some(profile) = self.profile.take() else {
            return;
        };
        if !profile.owned {
            debug!("Keeping configured profile directory: {}", profile.path.display());
            return;
        }
        debug!("Cleaning up browser profile directory: {}", profile.path.display());
        if let Err(e) = std::fs::remove_dir_all(&profile.path) {
            warn!(
                "Failed to clean up profile directory {}: {}. Manual cleanup may be required.",
                profile.path.display(),
                e
            );
        }
    }

    fn shared(&self) -> Option<Arc<Browser>> {
        self.browser.as_ref().map(Arc::clone)
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();
        if self.profile.as_ref().is_some_and(|p| p.owned) {
            warn!("BrowserWrapper dropped without explicit cleanup - removing profile dir in Drop");
            self.cleanup_temp_dir();
        }
    }
}

/// Result of closing the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupResult {
    Success,
    /// Some steps failed; the process may already have been gone
    PartialFailure(Vec<String>),
}

/// Shared access to a handle for the duration of one crawl
///
/// Dropping the lease returns it, including when the crawl panics.
pub struct Lease<T> {
    handle: Arc<T>,
    // Must follow `handle`: the handle drops before the count falls
    _count: LeaseCount,
}

pub type BrowserLease = Lease<Browser>;

impl<T> Lease<T> {
    fn new(handle: Arc<T>, active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self {
            handle,
            _count: LeaseCount(Arc::clone(active)),
        }
    }
}

impl BrowserLease {
    #[must_use]
    pub fn browser(&self) -> &Browser {
        &self.handle
    }
}

struct LeaseCount(Arc<AtomicUsize>);

impl Drop for LeaseCount {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Lazily-launched, explicitly-closed browser shared across jobs
pub struct BrowserManager {
    launch_options: ExtractOptions,
    wrapper: Mutex<Option<BrowserWrapper>>,
    active_leases: Arc<AtomicUsize>,
}

impl BrowserManager {
    /// Create a manager; the browser is NOT launched until the first `acquire()`
    #[must_use]
    pub fn new(launch_options: ExtractOptions) -> Self {
        Self {
            launch_options,
            wrapper: Mutex::new(None),
            active_leases: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lease(&self, browser: Arc<Browser>) -> BrowserLease {
        Lease::new(browser, &self.active_leases)
    }

    /// Number of leases currently held
    #[must_use]
    pub fn active_leases(&self) -> usize {
        self.active_leases.load(Ordering::Acquire)
    }

    /// Lease the browser, launching it or replacing a crashed instance
    ///
    /// A running browser is health-checked with a `version()` CDP call. A
    /// crashed one is only replaced when nobody else holds a lease on it.
    pub async fn acquire(&self) -> Result<BrowserLease> {
        let mut wrapper = self.wrapper.lock().await;

        if let Some(browser) = wrapper.as_ref().and_then(BrowserWrapper::shared) {
            match browser.version().await {
                Ok(_) => return Ok(self.lease(browser)),
                Err(e) if self.active_leases() == 0 => {
                    warn!("Browser health check failed: {e}. Relaunching");
                    drop(browser);
                    if let Some(crashed) = wrapper.take()
                        && let CleanupResult::PartialFailure(errors) = close_wrapper(crashed).await
                    {
                        warn!(
                            "Closing crashed browser finished with errors: {}",
                            errors.join("; ")
                        );
                    }
                }
                Err(e) => {
                    return Err(anyhow::anyhow!(
                        "Browser is unhealthy and still leased by {} job(s): {e}",
                        self.active_leases()
                    ));
                }
            }
        }

        info!("Launching shared browser");
        let (browser, handler, profile) = launch_browser(&self.launch_options).await?;
        let browser = Arc::new(browser);
        *wrapper = Some(BrowserWrapper {
            browser: Some(Arc::clone(&browser)),
            handler,
            profile: Some(profile),
        });
        Ok(self.lease(browser))
    }

    /// Close the browser when no job holds a lease
    ///
    /// Returns `true` if a running browser was closed.
    pub async fn shutdown_if_idle(&self) -> bool {
        let mut wrapper = self.wrapper.lock().await;
        let active = self.active_leases();
        if active > 0 {
            debug!("Browser still leased by {active} job(s), keeping it running");
            return false;
        }
        match wrapper.take() {
            Some(running) => {
                if let CleanupResult::PartialFailure(errors) = close_wrapper(running).await {
                    warn!("Browser shutdown finished with errors: {}", errors.join("; "));
                }
                true
            }
            None => false,
        }
    }

    /// Close the browser unconditionally (process shutdown)
    ///
    /// Safe to call multiple times.
    pub async fn shutdown(&self) -> Result<()> {
        let mut wrapper = self.wrapper.lock().await;
        if let Some(running) = wrapper.take() {
            info!("Shutting down shared browser");
            if let CleanupResult::PartialFailure(errors) = close_wrapper(running).await {
                warn!("Browser shutdown finished with errors: {}", errors.join("; "));
            }
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.wrapper.lock().await.is_some()
    }
}

/// Close the browser process, wait for it to exit, then remove its profile
async fn close_wrapper(mut wrapper: BrowserWrapper) -> CleanupResult {
    let mut errors = Vec::new();

    match wrapper.browser.take().map(Arc::try_unwrap) {
        Some(Ok(mut browser)) => {
            if let Err(e) = browser.close().await {
                errors.push(format!("Browser close failed: {e}"));
            }
            if let Err(e) = browser.wait().await {
                errors.push(format!("Browser wait failed: {e}"));
            }
        }
        Some(Err(_still_shared)) => {
            errors.push("Browser handle still shared; relying on drop to kill the process".into());
        }
        None => {}
    }

    wrapper.cleanup_temp_dir();

    if errors.is_empty() {
        CleanupResult::Success
    } else {
        CleanupResult::PartialFailure(errors)
    }
}
