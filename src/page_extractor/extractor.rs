//! The `PageExtractor` seam and its Chromium implementation

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, Page};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::js_scripts::{DOM_WALK_SCRIPT, READY_STATE_SCRIPT, selector_probe_script};
use super::network::NetworkObserver;
use super::schema::{CrawlSnapshot, RawDocument};
use super::snapshot::{PageMetrics, build_snapshot};
use super::timeout::with_page_timeout;
use crate::browser_manager::BrowserManager;
use crate::config::ExtractOptions;
use crate::error::ExtractError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Produces a `CrawlSnapshot` for one URL
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Load `url` in a fresh browsing context and extract its data
    ///
    /// Returns `ExtractError::Cancelled` as soon as `cancel` fires; the
    /// browsing context is torn down either way.
    async fn extract(
        &self,
        url: &Url,
        options: &ExtractOptions,
        cancel: &CancellationToken,
    ) -> Result<CrawlSnapshot, ExtractError>;

    /// Release process-wide browser resources once a crawl has finished
    async fn release(&self);

    /// Release everything at process shutdown, even if crawls are in flight
    async fn shutdown(&self) {
        self.release().await;
    }
}

/// `PageExtractor` backed by the shared Chromium process
pub struct ChromiumPageExtractor {
    browsers: Arc<BrowserManager>,
}

impl ChromiumPageExtractor {
    #[must_use]
    pub fn new(browsers: Arc<BrowserManager>) -> Self {
        Self { browsers }
    }
}

#[async_trait]
impl PageExtractor for ChromiumPageExtractor {
    async fn extract(
        &self,
        url: &Url,
        options: &ExtractOptions,
        cancel: &CancellationToken,
    ) -> Result<CrawlSnapshot, ExtractError> {
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }

        let lease = self
            .browsers
            .acquire()
            .await
            .map_err(|e| ExtractError::Browser(format!("{e:#}")))?;
        let result = extract_in_isolated_context(lease.browser(), url, options, cancel).await;
        drop(lease);
        result
    }

    async fn release(&self) {
        if self.browsers.shutdown_if_idle().await {
            debug!("Shared browser closed after crawl");
        }
    }

    async fn shutdown(&self) {
        if let Err(e) = self.browsers.shutdown().await {
            warn!("Browser shutdown failed: {e:#}");
        }
    }
}

/// Everything that must be released after a crawl, success or failure
struct BrowsingContext {
    context_id: BrowserContextId,
    page: Page,
    observer: NetworkObserver,
}

async fn extract_in_isolated_context(
    browser: &Browser,
    url: &Url,
    options: &ExtractOptions,
    cancel: &CancellationToken,
) -> Result<CrawlSnapshot, ExtractError> {
    let context = open_context(browser, options)
        .await
        .map_err(|e| ExtractError::Browser(format!("{e:#}")))?;

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            info!("Extraction of {url} cancelled");
            Err(ExtractError::Cancelled)
        }
        result = run_extraction(&context.page, &context.observer, url, options) => result,
    };

    close_context(browser, context).await;
    outcome
}

async fn open_context(
    browser: &Browser,
    options: &ExtractOptions,
) -> anyhow::Result<BrowsingContext> {
    let context_id = browser
        .execute(CreateBrowserContextParams::default())
        .await
        .context("Failed to create isolated browser context")?
        .result
        .browser_context_id;

    let target = CreateTargetParams::builder()
        .url("about:blank")
        .browser_context_id(context_id.clone())
        .build()
        .map_err(anyhow::Error::msg)?;

    let page = match browser.new_page(target).await {
        Ok(page) => page,
        Err(e) => {
            dispose_context(browser, context_id).await;
            return Err(anyhow!("Failed to open page: {e}"));
        }
    };

    // Listeners go on before navigation so the first request is counted
    let prepared = async {
        let (width, height) = options.viewport();
        page.execute(SetUserAgentOverrideParams::new(options.user_agent()))
            .await
            .context("Failed to set user agent")?;
        page.execute(
            SetDeviceMetricsOverrideParams::builder()
                .width(i64::from(width))
                .height(i64::from(height))
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(anyhow::Error::msg)?,
        )
        .await
        .context("Failed to set viewport")?;
        NetworkObserver::attach(&page).await
    }
    .await;

    match prepared {
        Ok(observer) => Ok(BrowsingContext {
            context_id,
            page,
            observer,
        }),
        Err(e) => {
            if let Err(close_err) = page.close().await {
                debug!("Failed to close page after setup error: {close_err}");
            }
            dispose_context(browser, context_id).await;
            Err(e)
        }
    }
}

async fn close_context(browser: &Browser, context: BrowsingContext) {
    let BrowsingContext {
        context_id,
        page,
        observer,
    } = context;
    observer.detach();
    if let Err(e) = page.close().await {
        debug!("Failed to close page: {e}");
    }
    dispose_context(browser, context_id).await;
}

async fn dispose_context(browser: &Browser, context_id: BrowserContextId) {
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        warn!("Failed to dispose browser context: {e}");
    }
}

async fn run_extraction(
    page: &Page,
    observer: &NetworkObserver,
    url: &Url,
    options: &ExtractOptions,
) -> Result<CrawlSnapshot, ExtractError> {
    let started = Instant::now();
    info!("Extracting {url}");

    with_page_timeout(
        async {
            page.goto(url.as_str())
                .await
                .map(|_| ())
                .map_err(|e| anyhow!("{e}"))
        },
        options.navigation_timeout(),
        "Page navigation",
    )
    .await
    .map_err(|e| ExtractError::navigation(url.as_str(), e))?;

    let status_code = observer.document_status();
    if let Some(status) = status_code
        && !(200..300).contains(&status)
    {
        return Err(ExtractError::navigation(
            url.as_str(),
            format!("main document returned HTTP {status}"),
        ));
    }

    observer
        .wait_for_idle(options.network_idle_window(), options.network_idle_max_wait())
        .await;
    wait_for_dom_ready(page, options.network_idle_max_wait()).await;
    let load_time = started.elapsed();

    if let Some(selector) = options.required_selector() {
        wait_for_selector(page, selector, options.navigation_timeout())
            .await
            .map_err(|e| ExtractError::render(url.as_str(), e))?;
    }

    tokio::time::sleep(options.settle_delay()).await;

    let raw: RawDocument = page
        .evaluate(DOM_WALK_SCRIPT)
        .await
        .map_err(|e| ExtractError::render(url.as_str(), format!("DOM walk failed: {e}")))?
        .into_value()
        .map_err(|e| {
            ExtractError::render(url.as_str(), format!("DOM walk returned bad data: {e}"))
        })?;

    let metrics = PageMetrics {
        status_code,
        load_time,
        resources: observer.counters(),
    };
    let snapshot = build_snapshot(raw, url, metrics);
    info!(
        "Extracted {url}: {} headings, {} links, {} images in {}ms",
        snapshot.headings.len(),
        snapshot.links.total(),
        snapshot.images.len(),
        snapshot.load_time_ms
    );
    Ok(snapshot)
}

/// Poll until the DOM has been parsed; proceeds with a warning after `max_wait`
async fn wait_for_dom_ready(page: &Page, max_wait: Duration) {
    let start = Instant::now();
    loop {
        match page.evaluate(READY_STATE_SCRIPT).await {
            Ok(result) => {
                if let Ok(value) = result.into_value::<serde_json::Value>() {
                    let ready_state = value.get("readyState").and_then(|v| v.as_str());
                    let body_exists = value
                        .get("bodyExists")
                        .and_then(serde_json::Value::as_bool)
                        .unwrap_or(false);
                    if matches!(ready_state, Some("interactive" | "complete")) && body_exists {
                        return;
                    }
                }
            }
            Err(e) => debug!("Failed to check readyState: {e}, retrying"),
        }

        if start.elapsed() >= max_wait {
            warn!(
                "DOM not ready after {}ms, proceeding anyway",
                max_wait.as_millis()
            );
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn wait_for_selector(page: &Page, selector: &str, limit: Duration) -> anyhow::Result<()> {
    let probe = selector_probe_script(selector);
    let start = Instant::now();
    loop {
        let found = page
            .evaluate(probe.as_str())
            .await
            .ok()
            .and_then(|r| r.into_value::<bool>().ok())
            .unwrap_or(false);
        if found {
            return Ok(());
        }
        if start.elapsed() >= limit {
            return Err(anyhow!(
                "required selector '{selector}' did not appear within {}s",
                limit.as_secs()
            ));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
