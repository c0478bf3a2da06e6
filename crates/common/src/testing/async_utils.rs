//! Async testing utilities

#![allow(clippy::missing_panics_doc)]

use std::future::Future;
use std::time::Duration;

/// Poll `condition` every `interval` until it returns true or `timeout` elapses
///
/// Returns whether the condition became true. Useful for waiting until a
/// gated mock has observed a call before releasing it.
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use storefront_common::auth::TokenPair;
/// use storefront_common::testing::{poll_until, MockRefreshTransport};
///
/// # async fn demo() {
/// let transport = Arc::new(MockRefreshTransport::succeeding(TokenPair::new("t", None)).gated());
/// let observed = poll_until(Duration::from_secs(1), Duration::from_millis(5), || {
///     let transport = transport.clone();
///     async move { transport.calls() == 1 }
/// })
/// .await;
/// # }
/// ```
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }

    false
}

/// Await `future`, panicking if it does not finish within `timeout`
#[allow(clippy::panic)]
pub async fn within<F: Future>(timeout: Duration, future: F) -> F::Output {
    match tokio::time::timeout(timeout, future).await {
        Ok(output) => output,
        Err(_) => panic!("future did not complete within {timeout:?}"),
    }
}
