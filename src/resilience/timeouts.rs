//! Timeout enforcement.

use std::future::Future;
use std::time::Duration;

/// Run `fut` with a deadline, returning the elapsed budget on expiry.
pub async fn with_timeout<F: Future>(duration: Duration, fut: F) -> Result<F::Output, Duration> {
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| duration)
}
