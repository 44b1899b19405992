//! CDP network observers
//!
//! Listeners are attached to a page before navigation and count requests,
//! responses, bytes and failures until `detach()` (or drop) aborts them.

use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, ResourceType,
};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::schema::ResourceCounters;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    responses: AtomicU64,
    finished: AtomicU64,
    failures: AtomicU64,
    bytes: AtomicU64,
    /// 0 until the first document response arrives
    document_status: AtomicU16,
}

pub struct NetworkObserver {
    counters: Arc<Counters>,
    tasks: Vec<JoinHandle<()>>,
}

impl NetworkObserver {
    /// Enable the network domain and start the listeners
    pub async fn attach(page: &Page) -> Result<Self> {
        page.execute(EnableParams::default())
            .await
            .context("Failed to enable network domain")?;

        let counters = Arc::new(Counters::default());
        let mut tasks = Vec::with_capacity(4);

        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("Failed to listen for requests")?;
        let c = Arc::clone(&counters);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                // Redirect hops reuse the request id of the original request
                if event.redirect_response.is_none() {
                    c.requests.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .context("Failed to listen for responses")?;
        let c = Arc::clone(&counters);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                c.responses.fetch_add(1, Ordering::Relaxed);
                if event.r#type == ResourceType::Document {
                    let status = u16::try_from(event.response.status).unwrap_or(0);
                    let _ = c.document_status.compare_exchange(
                        0,
                        status,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    );
                }
            }
        }));

        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("Failed to listen for finished loads")?;
        let c = Arc::clone(&counters);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                c.finished.fetch_add(1, Ordering::Relaxed);
                if event.encoded_data_length.is_finite() && event.encoded_data_length > 0.0 {
                    c.bytes
                        .fetch_add(event.encoded_data_length as u64, Ordering::Relaxed);
                }
            }
        }));

        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .context("Failed to listen for failed loads")?;
        let c = Arc::clone(&counters);
        tasks.push(tokio::spawn(async move {
            while failed.next().await.is_some() {
                c.failures.fetch_add(1, Ordering::Relaxed);
            }
        }));

        Ok(Self { counters, tasks })
    }

    pub fn counters(&self) -> ResourceCounters {
        ResourceCounters {
            requests: self.counters.requests.load(Ordering::Relaxed),
            responses: self.counters.responses.load(Ordering::Relaxed),
            bytes: self.counters.bytes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Status of the main document response, if one was observed
    pub fn document_status(&self) -> Option<u16> {
        match self.counters.document_status.load(Ordering::Relaxed) {
            0 => None,
            status => Some(status),
        }
    }

    fn in_flight(&self) -> u64 {
        let started = self.counters.requests.load(Ordering::Relaxed);
        let done = self.counters.finished.load(Ordering::Relaxed)
            + self.counters.failures.load(Ordering::Relaxed);
        started.saturating_sub(done)
    }

    /// Wait until no request has been in flight for `window`
    ///
    /// Gives up after `max_wait` and returns `false`; pages with long-polling
    /// connections never go idle.
    pub async fn wait_for_idle(&self, window: Duration, max_wait: Duration) -> bool {
        let start = Instant::now();
        let mut idle_since: Option<Instant> = None;

        loop {
            if self.in_flight() == 0 {
                let since = *idle_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= window {
                    log::debug!(
                        "Network idle after {:.2}s",
                        start.elapsed().as_secs_f64()
                    );
                    return true;
                }
            } else {
                idle_since = None;
            }

            if start.elapsed() >= max_wait {
                log::warn!(
                    "Network still busy after {}ms ({} in flight), proceeding anyway",
                    max_wait.as_millis(),
                    self.in_flight()
                );
                return false;
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    /// Stop the listeners
    pub fn detach(mut self) {
        self.abort_all();
    }

    fn abort_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for NetworkObserver {
    fn drop(&mut self) {
        self.abort_all();
    }
}
