//! Transport seam for the refresh call
//!
//! The refresh call must bypass the authenticated client entirely: routing it
//! through the interceptor chain would attach the expired token and could
//! recurse into 401 handling. [`RefreshTransport`] abstracts the raw,
//! interceptor-free call so the coordinator can be tested without a network.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::types::TokenPair;

/// Failures of the raw refresh call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection-level failure (DNS, refused, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// The call did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success status
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be decoded or lacked an access token
    #[error("Malformed response body: {0}")]
    MalformedBody(String),
}

impl TransportError {
    /// Whether the server explicitly rejected the refresh token
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { status: 400 | 401 | 403, .. })
    }
}

/// Performs the token refresh call without any request interception
///
/// Implementations must not attach the current access token and must not
/// route through the authenticated client.
#[async_trait]
pub trait RefreshTransport: Send + Sync {
    /// Exchange a refresh token for a new token pair
    ///
    /// # Errors
    /// Returns `TransportError` for network failures, non-2xx statuses and
    /// bodies without an access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_statuses() {
        for status in [400, 401, 403] {
            assert!(TransportError::Status { status, body: String::new() }.is_rejection());
        }
        assert!(!TransportError::Status { status: 500, body: String::new() }.is_rejection());
        assert!(!TransportError::Network("reset".into()).is_rejection());
        assert!(!TransportError::Timeout(Duration::from_secs(1)).is_rejection());
    }
}
