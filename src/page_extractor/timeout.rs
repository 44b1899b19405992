//! Timeout wrapper for page operations

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// Run a page operation with an explicit deadline
///
/// Distinguishes a timeout (`"<name> timeout after N ms"`) from the
/// operation's own failure, which is returned unchanged.
pub async fn with_page_timeout<F, T>(
    operation: F,
    limit: Duration,
    operation_name: &str,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "{operation_name} timeout after {} ms",
            limit.as_millis()
        )),
    }
}
