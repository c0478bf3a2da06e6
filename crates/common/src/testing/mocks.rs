//! Mock implementations of the session seams

#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::auth::{RefreshTransport, SessionObserver, SessionTerminated, TokenPair, TransportError};

type Response = Result<TokenPair, TransportError>;

const RELEASE_PERMITS: usize = 1024;

/// Scripted refresh transport
///
/// Queued responses are consumed first; once the queue is empty every call
/// returns the default response. A gated transport blocks each call (after
/// counting it) until [`release`](Self::release) is called, which lets tests
/// pile up concurrent callers behind one in-flight refresh.
pub struct MockRefreshTransport {
    queued: Mutex<VecDeque<Response>>,
    fallback: Mutex<Response>,
    calls: AtomicUsize,
    received: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
}

impl std::fmt::Debug for MockRefreshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRefreshTransport")
            .field("calls", &self.calls())
            .field("gated", &self.gate.is_some())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl MockRefreshTransport {
    fn with_fallback(fallback: Response) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
            gate: None,
            delay: None,
        }
    }

    /// Every call succeeds with `tokens`
    #[must_use]
    pub fn succeeding(tokens: TokenPair) -> Self {
        Self::with_fallback(Ok(tokens))
    }

    /// Every call fails with `error`
    #[must_use]
    pub fn failing(error: TransportError) -> Self {
        Self::with_fallback(Err(error))
    }

    /// Block calls until [`release`](Self::release)
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Sleep for `delay` before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Let every blocked and future call proceed
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(RELEASE_PERMITS);
        }
    }

    /// Queue a one-shot response ahead of the default
    pub fn push_response(&self, response: Response) {
        self.queued.lock().push_back(response);
    }

    /// Replace the default response
    pub fn set_fallback(&self, response: Response) {
        *self.fallback.lock() = response;
    }

    /// Number of refresh calls received
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens received, in call order
    #[must_use]
    pub fn received_tokens(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl RefreshTransport for MockRefreshTransport {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().push(refresh_token.to_string());

        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| TransportError::Network(format!("gate closed: {e}")))?;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.queued.lock().pop_front();
        queued.unwrap_or_else(|| self.fallback.lock().clone())
    }
}

/// Observer that records every termination event
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SessionTerminated>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events seen so far
    #[must_use]
    pub fn events(&self) -> Vec<SessionTerminated> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_session_terminated(&self, event: &SessionTerminated) {
        self.events.lock().push(event.clone());
    }
}
