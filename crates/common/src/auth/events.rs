//! Session lifecycle notifications.
//!
//! The session core never navigates or renders; when a refresh fails it
//! emits [`SessionTerminated`] and lets presentation layers decide what to do
//! (redirect to login, show a message). Listeners either subscribe to the
//! broadcast channel or register a synchronous [`SessionObserver`].

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 16;

/// Why a session was terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// The refresh call failed (rejected token, network error, timeout)
    TokenRefreshFailed,
    /// A refresh was needed but no refresh token was stored
    NoRefreshToken,
}

impl SessionEndReason {
    /// Stable reason code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TokenRefreshFailed => "token_refresh_failed",
            Self::NoRefreshToken => "no_refresh_token",
        }
    }
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted exactly once per failed refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTerminated {
    pub reason: SessionEndReason,
    /// Human-readable failure description
    pub message: String,
}

/// Synchronous listener for session termination
pub trait SessionObserver: Send + Sync {
    fn on_session_terminated(&self, event: &SessionTerminated);
}

/// Emitter for session lifecycle events
///
/// Cheap to clone; clones share subscribers and observers.
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionTerminated>,
    observers: Arc<RwLock<Vec<Arc<dyn SessionObserver>>>>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEvents")
            .field("subscribers", &self.tx.receiver_count())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

impl SessionEvents {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx, observers: Arc::new(RwLock::new(Vec::new())) }
    }

    /// Receive every termination emitted after this call
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionTerminated> {
        self.tx.subscribe()
    }

    /// Register a synchronous observer
    pub fn observe(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().push(observer);
    }

    /// Notify every observer and subscriber
    ///
    /// Returns the number of broadcast subscribers that received the event.
    pub fn emit(&self, event: SessionTerminated) -> usize {
        warn!(reason = %event.reason, message = %event.message, "Session terminated");

        let observers = self.observers.read().clone();
        for observer in &observers {
            observer.on_session_terminated(&event);
        }

        match self.tx.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                debug!("No session event subscribers");
                0
            }
        }
    }
}
