//! Request and response values for the authenticated client

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::errors::ApiError;

/// Immutable description of one logical request
///
/// The same descriptor is replayed verbatim on the single retry after a
/// token refresh; only the bearer token changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the base URL (e.g. `/cart`)
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None, headers: Vec::new() }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Overrides the client's request timeout
    pub timeout: Option<Duration>,
    /// Abandons the request (not any shared refresh) when cancelled
    pub cancellation: Option<CancellationToken>,
}

impl RequestOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Successful response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Decoded JSON body; `Value::Null` for empty bodies and 204/205
    pub body: Value,
    /// Whether the response came from the retry after a token refresh
    pub retried: bool,
}

impl ApiResponse {
    /// Deserialize the body into `T`
    ///
    /// # Errors
    /// Returns `ApiError::Decode` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let status = self.status;
        serde_json::from_value(self.body).map_err(|e| {
            ApiError::Decode(format!("response ({status}) cannot be deserialized: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builders_compose() {
        let request = RequestDescriptor::post("/cart")
            .with_body(json!({"productId": 7, "quantity": 2}))
            .with_query("currency", "EUR")
            .with_header("X-Client", "web");

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.query, vec![("currency".to_string(), "EUR".to_string())]);
        assert_eq!(request.body.as_ref().unwrap()["quantity"], 2);
    }

    #[test]
    fn no_content_decodes_to_unit() {
        let response = ApiResponse { status: 204, body: Value::Null, retried: false };
        response.json::<()>().unwrap();
    }

    #[test]
    fn mismatched_body_is_decode_error() {
        let response = ApiResponse { status: 200, body: json!({"a": 1}), retried: false };
        assert!(matches!(response.json::<Vec<u32>>(), Err(ApiError::Decode(_))));
    }
}
