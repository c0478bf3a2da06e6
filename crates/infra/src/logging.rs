//! Tracing setup and structured request logging

use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{ApiError, ApiResponse};

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?} (expected text or json)")),
        }
    }
}

/// Install a global `fmt` subscriber filtered by `level` (an `EnvFilter`
/// directive such as `info` or `storefront_infra=debug`).
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests);
/// returns whether this call installed the subscriber.
pub fn init_tracing(format: LogFormat, level: &str) -> bool {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Json => fmt::fmt().with_env_filter(filter).json().try_init(),
        LogFormat::Text => fmt::fmt().with_env_filter(filter).try_init(),
    };
    result.is_ok()
}

/// Log the outcome of one authenticated request with structured fields.
///
/// `path` is the logical request path; callers must not pass URLs that embed
/// credentials.
#[inline]
pub fn log_request_outcome(
    method: &str,
    path: &str,
    outcome: Result<&ApiResponse, &ApiError>,
    elapsed: Duration,
) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(response) => info!(
            method,
            path,
            status = response.status,
            retried = response.retried,
            duration_ms,
            "request_success"
        ),
        Err(err) => warn!(
            method,
            path,
            error_type = error_label(err),
            error = %err,
            duration_ms,
            "request_failure"
        ),
    }
}

/// Convert an `ApiError` into a stable label suitable for logging.
#[inline]
#[must_use]
pub fn error_label(error: &ApiError) -> &'static str {
    match error {
        ApiError::AuthExemptRejected { .. } => "auth_exempt_rejected",
        ApiError::RetryExhausted { .. } => "retry_exhausted",
        ApiError::Refresh(_) => "refresh_failed",
        ApiError::Auth(_) => "auth",
        ApiError::RateLimit(_) => "rate_limit",
        ApiError::Server(_) => "server",
        ApiError::Client(_) => "client",
        ApiError::Network(_) => "network",
        ApiError::Config(_) => "config",
        ApiError::Storage(_) => "storage",
        ApiError::Decode(_) => "decode",
        ApiError::Timeout(_) => "timeout",
        ApiError::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use storefront_common::auth::RefreshError;

    use super::*;

    #[test]
    fn parses_log_formats() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(error_label(&ApiError::Refresh(RefreshError::NoRefreshToken)), "refresh_failed");
        assert_eq!(
            error_label(&ApiError::RetryExhausted { path: "/cart".into(), body: String::new() }),
            "retry_exhausted"
        );
        assert_eq!(error_label(&ApiError::Cancelled), "cancelled");
    }

    #[test]
    fn init_is_idempotent() {
        init_tracing(LogFormat::Text, "debug");
        assert!(!init_tracing(LogFormat::Json, "info"));
    }

    #[test]
    fn logging_outcomes_does_not_panic() {
        let response = ApiResponse { status: 200, body: serde_json::Value::Null, retried: true };
        log_request_outcome("GET", "/cart", Ok(&response), Duration::from_millis(12));
        log_request_outcome("GET", "/cart", Err(&ApiError::Cancelled), Duration::ZERO);
    }
}
