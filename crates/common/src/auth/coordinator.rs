//! Single-flight token refresh
//!
//! [`RefreshCoordinator`] guarantees that at most one refresh call is in
//! flight at any time. Callers that arrive while a refresh is running await
//! the same outcome instead of starting their own.
//!
//! # In-flight handle
//!
//! The refresh runs in its own spawned task; its output is shared with every
//! waiter through [`futures::future::Shared`]. Dropping a waiter (caller
//! cancellation) therefore never cancels the refresh other callers depend
//! on. A drop guard owned by the task clears the handle slot once the task
//! ends, whatever the outcome, so a later 401 can refresh again. The guard
//! exists before the task is spawned, so a task dropped unpolled (runtime
//! shutdown) clears the slot too; its waiters get `Cancelled` and the
//! session is left as it was.
//!
//! # Outcomes
//!
//! - success: the new access token (and the refresh token, if rotated) is
//!   written to the session store before any waiter resumes
//! - failure: the session is cleared and a [`SessionTerminated`] event is
//!   emitted exactly once, then every waiter receives the same error
//!
//! Failed refreshes are never retried here; recovering is a re-login.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use storefront_domain::constants::DEFAULT_REFRESH_TIMEOUT_MS;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::events::{SessionEndReason, SessionEvents, SessionTerminated};
use super::store::SessionStore;
use super::traits::{RefreshTransport, TransportError};
use super::types::TokenPair;

/// Why a refresh failed
///
/// `Clone` because one failure is delivered to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token was stored; the transport was not called
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The backend rejected the refresh token (expired or revoked)
    #[error("Refresh token rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Network-level failure or unexpected server status
    #[error("Refresh transport failed: {0}")]
    Transport(String),

    /// The refresh call exceeded its deadline
    #[error("Refresh timed out after {0:?}")]
    Timeout(Duration),

    /// The refresh response could not be used
    #[error("Malformed refresh response: {0}")]
    MalformedResponse(String),

    /// Reading or writing the session store failed
    #[error("Session store error: {0}")]
    Store(String),

    /// The refresh task panicked
    #[error("Refresh task aborted: {0}")]
    Aborted(String),

    /// The refresh task was dropped before finishing; the session is kept
    #[error("Refresh cancelled before completing")]
    Cancelled,
}

impl RefreshError {
    /// Reason code carried by the termination event
    #[must_use]
    pub fn end_reason(&self) -> SessionEndReason {
        match self {
            Self::NoRefreshToken => SessionEndReason::NoRefreshToken,
            _ => SessionEndReason::TokenRefreshFailed,
        }
    }
}

impl From<TransportError> for RefreshError {
    fn from(err: TransportError) -> Self {
        let rejected = err.is_rejection();
        match err {
            TransportError::Status { status, body } if rejected => {
                Self::Rejected { status, message: body }
            }
            TransportError::Status { status, body } => {
                Self::Transport(format!("server returned {status}: {body}"))
            }
            TransportError::Network(message) => Self::Transport(message),
            TransportError::Timeout(timeout) => Self::Timeout(timeout),
            TransportError::MalformedBody(message) => Self::MalformedResponse(message),
        }
    }
}

/// Outcome shared by every caller of one refresh
pub type RefreshResult = Result<TokenPair, RefreshError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

struct InFlight {
    generation: u64,
    outcome: SharedRefresh,
}

struct Inner {
    sessions: SessionStore,
    transport: Arc<dyn RefreshTransport>,
    events: SessionEvents,
    timeout: Duration,
    slot: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    transport_calls: AtomicU64,
}

/// Coordinates token refreshes for one session
///
/// Cheap to clone; clones share the in-flight handle.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("timeout", &self.inner.timeout)
            .field("refreshing", &self.is_refreshing())
            .field("transport_calls", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

enum Start {
    Join(SharedRefresh),
    Ready(TokenPair),
}

impl RefreshCoordinator {
    /// Create a coordinator with the default refresh timeout
    #[must_use]
    pub fn new(
        sessions: SessionStore,
        transport: Arc<dyn RefreshTransport>,
        events: SessionEvents,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions,
                transport,
                events,
                timeout: Duration::from_millis(DEFAULT_REFRESH_TIMEOUT_MS),
                slot: Mutex::new(None),
                generation: AtomicU64::new(0),
                transport_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Bound every refresh call by `timeout`
    ///
    /// Must be called before the coordinator is shared.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => Inner { timeout, ..inner },
            Err(shared) => {
                warn!("with_timeout called on a shared coordinator; timeout unchanged");
                return Self { inner: shared };
            }
        };
        Self { inner: Arc::new(inner) }
    }

    /// Obtain a fresh token pair, coalescing with any refresh in flight
    ///
    /// # Errors
    /// Returns `RefreshError::NoRefreshToken` immediately when no refresh
    /// token is stored, otherwise the shared outcome of the refresh call.
    /// Every failure has already cleared the session and emitted a
    /// termination event when this returns.
    pub async fn refresh(&self) -> RefreshResult {
        match self.start(None)? {
            Start::Join(outcome) => outcome.await,
            Start::Ready(tokens) => Ok(tokens),
        }
    }

    /// Recover from a 401 received for `rejected_token`
    ///
    /// If the stored access token already differs from the one the server
    /// rejected, another caller refreshed in the meantime and the stored
    /// token is returned without a network call. If the session was ended
    /// after the request was sent, `NoRefreshToken` is returned without a
    /// second termination event. Otherwise this behaves like
    /// [`refresh`](Self::refresh).
    ///
    /// # Errors
    /// Same as [`refresh`](Self::refresh).
    pub async fn refresh_after_rejection(&self, rejected_token: Option<&str>) -> RefreshResult {
        match self.start(Some(rejected_token))? {
            Start::Join(outcome) => outcome.await,
            Start::Ready(tokens) => Ok(tokens),
        }
    }

    /// Whether a refresh call is currently in flight
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.slot.lock().is_some()
    }

    /// Number of refresh calls handed to the transport so far
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.inner.transport_calls.load(Ordering::SeqCst)
    }

    /// Session store this coordinator updates
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// Emitter used for termination events
    #[must_use]
    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    fn start(&self, rejected_token: Option<Option<&str>>) -> Result<Start, RefreshError> {
        let mut slot = self.inner.slot.lock();

        if let Some(in_flight) = slot.as_ref() {
            debug!(generation = in_flight.generation, "Joining in-flight refresh");
            return Ok(Start::Join(in_flight.outcome.clone()));
        }

        if let Some(rejected) = rejected_token {
            let current = self
                .inner
                .sessions
                .access_token()
                .map_err(|e| RefreshError::Store(e.to_string()));
            match current {
                Ok(Some(current)) if Some(current.as_str()) != rejected => {
                    debug!("Access token already replaced; skipping refresh");
                    return Ok(Start::Ready(TokenPair::new(current, None)));
                }
                Ok(None) if rejected.is_some() => {
                    // ended (failed refresh or logout) while the request was in flight
                    debug!("Session already ended; not announcing again");
                    return Err(RefreshError::NoRefreshToken);
                }
                Ok(_) => {}
                Err(err) => {
                    drop(slot);
                    return Err(self.inner.terminate(err));
                }
            }
        }

        let refresh_token = match self.inner.sessions.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                drop(slot);
                return Err(self.inner.terminate(RefreshError::NoRefreshToken));
            }
            Err(e) => {
                drop(slot);
                return Err(self.inner.terminate(RefreshError::Store(e.to_string())));
            }
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        let outcome = async move {
            // a closed channel means the task was dropped before finishing
            rx.await.unwrap_or(Err(RefreshError::Cancelled))
        }
        .boxed()
        .shared();

        *slot = Some(InFlight { generation, outcome: outcome.clone() });
        drop(slot);
        debug!(generation, "Started token refresh");

        // Built before spawning: a task dropped unpolled still clears the slot.
        let cleanup = SlotCleanup { inner: Arc::clone(&self.inner), generation };
        let task_inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = AssertUnwindSafe(task_inner.run(generation, refresh_token))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    warn!(generation, %message, "Token refresh task panicked");
                    Err(task_inner.terminate(RefreshError::Aborted(message)))
                });

            drop(cleanup);
            if tx.send(result).is_err() {
                debug!(generation, "No waiters left for refresh outcome");
            }
        });

        Ok(Start::Join(outcome))
    }
}

impl Inner {
    async fn run(&self, generation: u64, refresh_token: String) -> RefreshResult {
        self.transport_calls.fetch_add(1, Ordering::SeqCst);

        let result =
            match tokio::time::timeout(self.timeout, self.transport.refresh(&refresh_token)).await {
                Ok(Ok(tokens)) => self
                    .sessions
                    .apply_refresh(&tokens)
                    .map(|()| tokens)
                    .map_err(|e| RefreshError::Store(e.to_string())),
                Ok(Err(err)) => Err(RefreshError::from(err)),
                Err(_) => Err(RefreshError::Timeout(self.timeout)),
            };

        match result {
            Ok(tokens) => {
                info!(generation, rotated = tokens.refresh_token.is_some(), "Token refresh succeeded");
                Ok(tokens)
            }
            Err(err) => {
                warn!(generation, error = %err, "Token refresh failed");
                Err(self.terminate(err))
            }
        }
    }

    /// Clear the session and announce its end; returns `err` for propagation
    fn terminate(&self, err: RefreshError) -> RefreshError {
        if let Err(store_err) = self.sessions.end() {
            warn!(error = %store_err, "Failed to clear session after refresh failure");
        }

        self.events.emit(SessionTerminated { reason: err.end_reason(), message: err.to_string() });
        err
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "refresh task panicked".to_string())
}

/// Clears the in-flight slot when the refresh task ends, panics, or is
/// dropped without ever being polled
struct SlotCleanup {
    inner: Arc<Inner>,
    generation: u64,
}

impl Drop for SlotCleanup {
    fn drop(&mut self) {
        let mut slot = self.inner.slot.lock();
        if slot.as_ref().is_some_and(|in_flight| in_flight.generation == self.generation) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;

    use super::*;
    use crate::auth::types::Session;
    use crate::testing::{poll_until, MockRefreshTransport};

    fn coordinator_with(
        transport: Arc<MockRefreshTransport>,
        session: Option<Session>,
    ) -> RefreshCoordinator {
        let sessions = SessionStore::in_memory();
        if let Some(session) = session {
            sessions.begin(&session).unwrap();
        }
        RefreshCoordinator::new(sessions, transport, SessionEvents::new())
    }

    #[tokio::test]
    async fn no_refresh_token_fails_without_network_call() {
        let transport = Arc::new(MockRefreshTransport::succeeding(TokenPair::new("T2", None)));
        let coordinator = coordinator_with(transport.clone(), None);
        let mut events = coordinator.events().subscribe();

        let result = coordinator.refresh().await;

        assert_eq!(result, Err(RefreshError::NoRefreshToken));
        assert_eq!(transport.calls(), 0);
        assert_eq!(events.recv().await.unwrap().reason, SessionEndReason::NoRefreshToken);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn success_stores_access_token_and_keeps_unrotated_refresh_token() {
        let transport = Arc::new(MockRefreshTransport::succeeding(TokenPair::new("T2", None)));
        let coordinator = coordinator_with(transport.clone(), Some(Session::new("T1", "R1", None)));

        let tokens = coordinator.refresh().await.unwrap();

        assert_eq!(tokens.access_token, "T2");
        assert_eq!(transport.received_tokens(), vec!["R1".to_string()]);
        let session = coordinator.sessions().current().unwrap();
        assert_eq!(session.access_token.as_deref(), Some("T2"));
        assert_eq!(session.refresh_token.as_deref(), Some("R1"));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn rotated_refresh_token_overwrites_stored_one() {
        let transport = Arc::new(MockRefreshTransport::succeeding(TokenPair::new(
            "T2",
            Some("R2".into()),
        )));
        let coordinator = coordinator_with(transport, Some(Session::new("T1", "R1", None)));

        coordinator.refresh().await.unwrap();

        assert_eq!(coordinator.sessions().refresh_token().unwrap().as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let transport =
            Arc::new(MockRefreshTransport::succeeding(TokenPair::new("T2", None)).gated());
        let coordinator = coordinator_with(transport.clone(), Some(Session::new("T1", "R1", None)));

        let waiters = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { join_all((0..5).map(|_| coordinator.refresh())).await }
        });

        assert!(
            poll_until(Duration::from_secs(2), Duration::from_millis(5), || {
                let transport = transport.clone();
                async move { transport.calls() == 1 }
            })
            .await
        );
        assert!(coordinator.is_refreshing());
        transport.release();

        let results = waiters.await.unwrap();
        assert_eq!(results.len(), 5);
        for result in results {
            assert_eq!(result.unwrap().access_token, "T2");
        }
        assert_eq!(transport.calls(), 1);
        assert_eq!(coordinator.refresh_count(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn rejected_refresh_clears_session_and_emits_once() {
        let transport = Arc::new(
            MockRefreshTransport::failing(TransportError::Status {
                status: 401,
                body: "refresh token expired".into(),
            })
            .gated(),
        );
        let coordinator = coordinator_with(
            transport.clone(),
            Some(Session::new("T1", "R1", Some(serde_json::json!({"id": 1})))),
        );
        let mut events = coordinator.events().subscribe();

        let waiters = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { join_all((0..3).map(|_| coordinator.refresh())).await }
        });
        assert!(
            poll_until(Duration::from_secs(2), Duration::from_millis(5), || {
                let transport = transport.clone();
                async move { transport.calls() == 1 }
            })
            .await
        );
        transport.release();

        for result in waiters.await.unwrap() {
            assert!(matches!(result, Err(RefreshError::Rejected { status: 401, .. })));
        }

        assert!(coordinator.sessions().current().unwrap().is_empty());
        let event = events.recv().await.unwrap();
        assert_eq!(event.reason, SessionEndReason::TokenRefreshFailed);
        assert!(events.try_recv().is_err());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn refresh_can_run_again_after_failure() {
        let transport = Arc::new(MockRefreshTransport::failing(TransportError::Network(
            "connection reset".into(),
        )));
        let coordinator = coordinator_with(transport.clone(), Some(Session::new("T1", "R1", None)));

        assert!(matches!(coordinator.refresh().await, Err(RefreshError::Transport(_))));
        assert!(!coordinator.is_refreshing());

        // user signs in again
        coordinator.sessions().begin(&Session::new("T5", "R5", None)).unwrap();
        transport.push_response(Ok(TokenPair::new("T6", None)));

        assert_eq!(coordinator.refresh().await.unwrap().access_token, "T6");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn timeout_is_a_refresh_failure() {
        let transport = Arc::new(
            MockRefreshTransport::succeeding(TokenPair::new("T2", None))
                .with_delay(Duration::from_millis(200)),
        );
        let coordinator = coordinator_with(transport, Some(Session::new("T1", "R1", None)))
            .with_timeout(Duration::from_millis(20));

        let result = coordinator.refresh().await;

        assert_eq!(result, Err(RefreshError::Timeout(Duration::from_millis(20))));
        assert!(coordinator.sessions().current().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_cancel_refresh() {
        let transport =
            Arc::new(MockRefreshTransport::succeeding(TokenPair::new("T2", None)).gated());
        let coordinator = coordinator_with(transport.clone(), Some(Session::new("T1", "R1", None)));

        let cancelled = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.refresh().await }
        });
        let survivor = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.refresh().await }
        });
        assert!(
            poll_until(Duration::from_secs(2), Duration::from_millis(5), || {
                let transport = transport.clone();
                async move { transport.calls() == 1 }
            })
            .await
        );

        cancelled.abort();
        assert!(cancelled.await.unwrap_err().is_cancelled());
        transport.release();

        assert_eq!(survivor.await.unwrap().unwrap().access_token, "T2");
        assert_eq!(coordinator.sessions().access_token().unwrap().as_deref(), Some("T2"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn stale_rejection_reuses_newer_token() {
        let transport = Arc::new(MockRefreshTransport::succeeding(TokenPair::new("T3", None)));
        let coordinator = coordinator_with(transport.clone(), Some(Session::new("T2", "R1", None)));

        let tokens = coordinator.refresh_after_rejection(Some("T1")).await.unwrap();
        assert_eq!(tokens.access_token, "T2");
        assert_eq!(transport.calls(), 0);

        let tokens = coordinator.refresh_after_rejection(Some("T2")).await.unwrap();
        assert_eq!(tokens.access_token, "T3");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn rejection_after_session_ended_is_silent() {
        let transport = Arc::new(MockRefreshTransport::succeeding(TokenPair::new("T2", None)));
        let coordinator = coordinator_with(transport.clone(), None);
        let mut events = coordinator.events().subscribe();

        let result = coordinator.refresh_after_rejection(Some("T1")).await;

        assert_eq!(result, Err(RefreshError::NoRefreshToken));
        assert_eq!(transport.calls(), 0);
        assert!(events.try_recv().is_err());
    }

    struct PanickingTransport;

    #[async_trait::async_trait]
    impl RefreshTransport for PanickingTransport {
        async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, TransportError> {
            panic!("decoder blew up");
        }
    }

    #[test]
    fn refresh_dropped_with_runtime_leaves_coordinator_usable() {
        let transport = Arc::new(MockRefreshTransport::succeeding(TokenPair::new("T2", None)));
        let coordinator = coordinator_with(transport.clone(), Some(Session::new("T1", "R1", None)));

        // start a refresh, stop waiting on it, then shut the runtime down
        // before the spawned task is ever polled
        let first = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        first.block_on(async {
            tokio::select! {
                biased;
                _ = coordinator.refresh() => {}
                () = async {} => {}
            }
        });
        assert!(coordinator.is_refreshing());
        drop(first);

        assert!(!coordinator.is_refreshing());
        assert_eq!(transport.calls(), 0);
        assert_eq!(coordinator.sessions().refresh_token().unwrap().as_deref(), Some("R1"));

        let second = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let tokens = second.block_on(coordinator.refresh()).unwrap();
        assert_eq!(tokens.access_token, "T2");
        assert_eq!(transport.calls(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn panicking_transport_ends_session_once() {
        let sessions = SessionStore::in_memory();
        sessions.begin(&Session::new("T1", "R1", None)).unwrap();
        let coordinator =
            RefreshCoordinator::new(sessions, Arc::new(PanickingTransport), SessionEvents::new());
        let mut events = coordinator.events().subscribe();

        let results = join_all((0..3).map(|_| coordinator.refresh())).await;

        for result in results {
            match result {
                Err(RefreshError::Aborted(message)) => assert!(message.contains("decoder blew up")),
                other => panic!("expected Aborted, got {other:?}"),
            }
        }
        assert!(coordinator.sessions().current().unwrap().is_empty());
        assert_eq!(events.recv().await.unwrap().reason, SessionEndReason::TokenRefreshFailed);
        assert!(events.try_recv().is_err());
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.refresh_count(), 1);
    }

    #[test]
    fn transport_errors_map_to_refresh_errors() {
        assert_eq!(
            RefreshError::from(TransportError::Status { status: 403, body: "revoked".into() }),
            RefreshError::Rejected { status: 403, message: "revoked".into() }
        );
        assert!(matches!(
            RefreshError::from(TransportError::Status { status: 502, body: String::new() }),
            RefreshError::Transport(_)
        ));
        assert!(matches!(
            RefreshError::from(TransportError::MalformedBody("no accessToken".into())),
            RefreshError::MalformedResponse(_)
        ));
        assert_eq!(RefreshError::NoRefreshToken.end_reason(), SessionEndReason::NoRefreshToken);
        assert_eq!(
            RefreshError::Timeout(Duration::from_secs(1)).end_reason(),
            SessionEndReason::TokenRefreshFailed
        );
    }
}
