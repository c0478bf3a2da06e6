//! API-specific error types
//!
//! Provides error classification for authenticated requests with retry
//! metadata.

use std::time::Duration;

use storefront_common::auth::{RefreshError, StoreError};
use storefront_domain::StorefrontError;
use thiserror::Error;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401, 403, failed refresh) - re-login required
    Authentication,
    /// Rate limiting errors (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth) - non-retryable
    Client,
    /// Network/connection errors - retryable
    Network,
    /// Configuration and local errors - non-retryable
    Config,
}

/// Authenticated request errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 from an endpoint that never triggers a refresh (login, register...)
    #[error("{path} rejected credentials: {body}")]
    AuthExemptRejected { path: String, body: String },

    /// 401 after the single retry with a refreshed token
    #[error("{path} still unauthorized after token refresh: {body}")]
    RetryExhausted { path: String, body: String },

    /// The token refresh triggered by a 401 failed; the session has ended
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ApiError {
    /// Get the error category for this error
    #[must_use]
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::AuthExemptRejected { .. }
            | Self::RetryExhausted { .. }
            | Self::Refresh(_)
            | Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::RateLimit(_) => ApiErrorCategory::RateLimit,
            Self::Server(_) => ApiErrorCategory::Server,
            Self::Client(_) | Self::Decode(_) => ApiErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Config(_) | Self::Storage(_) | Self::Cancelled => ApiErrorCategory::Config,
        }
    }

    /// Check if the caller may retry this request as-is
    ///
    /// Authentication failures are not retryable: the client already spent
    /// its single refresh-and-retry.
    #[must_use]
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network
        )
    }

    /// Whether the session was terminated as part of this failure
    #[must_use]
    pub fn ended_session(&self) -> bool {
        matches!(self, Self::Refresh(err) if *err != RefreshError::Cancelled)
    }
}

impl From<StorefrontError> for ApiError {
    fn from(err: StorefrontError) -> Self {
        match err {
            StorefrontError::Network(message) => Self::Network(message),
            StorefrontError::Storage(message) => Self::Storage(StoreError::Io(message)),
            StorefrontError::Config(message)
            | StorefrontError::InvalidInput(message)
            | StorefrontError::Internal(message) => Self::Config(message),
        }
    }
}
