//! Interceptor-free transport for the token refresh call
//!
//! [`RawTransport`] owns its own [`HttpClient`] and never attaches a bearer
//! token, so the refresh call can never recurse into 401 handling.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use storefront_common::auth::{RefreshTransport, TokenPair, TransportError};
use storefront_domain::constants::endpoints;
use storefront_domain::{ClientConfig, StorefrontError};
use tracing::debug;
use url::Url;

use super::client::{HttpClient, HttpError};

/// Raw HTTP transport used solely for refreshing tokens
#[derive(Debug, Clone)]
pub struct RawTransport {
    http: HttpClient,
    refresh_url: Url,
}

impl RawTransport {
    #[must_use]
    pub fn new(http: HttpClient, refresh_url: Url) -> Self {
        Self { http, refresh_url }
    }

    /// Build a transport for the configured refresh endpoint
    ///
    /// # Errors
    /// Returns `StorefrontError::Config` if the refresh endpoint is missing
    /// or the resulting URL does not parse.
    pub fn from_config(config: &ClientConfig) -> Result<Self, StorefrontError> {
        let path = config.endpoints.path(endpoints::REFRESH_TOKEN, &[])?;
        let refresh_url = join_url(&config.base_url, &path)?;
        let http = HttpClient::builder()
            .timeout(config.refresh_timeout())
            .build()
            .map_err(|e| StorefrontError::Config(e.to_string()))?;

        Ok(Self::new(http, refresh_url))
    }

    /// Endpoint the refresh call is posted to
    #[must_use]
    pub fn refresh_url(&self) -> &Url {
        &self.refresh_url
    }

    /// POST `body` as JSON and return the decoded response body
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    ///
    /// # Errors
    /// - `TransportError::Status` for any non-2xx status (body included)
    /// - `TransportError::Network` / `Timeout` for failures below HTTP
    /// - `TransportError::MalformedBody` if a 2xx body is not JSON
    pub async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, TransportError> {
        let request = self.http.request(Method::POST, url.clone()).json(body);
        let response = self.http.send(request, None).await.map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status { status: status.as_u16(), body: text });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| TransportError::MalformedBody(e.to_string()))
    }
}

#[async_trait]
impl RefreshTransport for RawTransport {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TransportError> {
        debug!(path = self.refresh_url.path(), "Posting refresh request");
        let body = self.post_json(&self.refresh_url, &json!({ "refreshToken": refresh_token })).await?;
        parse_token_pair(&body)
    }
}

/// Extract a token pair from a refresh (or login) response body
///
/// Accepts camelCase or snake_case field names, either at the top level or
/// nested under `data`.
///
/// # Errors
/// Returns `TransportError::MalformedBody` if no non-empty access token is
/// present.
pub fn parse_token_pair(body: &Value) -> Result<TokenPair, TransportError> {
    let payload = body.get("data").filter(|data| data.is_object()).unwrap_or(body);

    let access_token = string_field(payload, &["accessToken", "access_token"])
        .ok_or_else(|| TransportError::MalformedBody("response has no access token".into()))?;
    let refresh_token = string_field(payload, &["refreshToken", "refresh_token"]);

    Ok(TokenPair::new(access_token, refresh_token))
}

fn string_field(payload: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| payload.get(*name).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Join a base URL and an absolute path without dropping the base path
///
/// # Errors
/// Returns `StorefrontError::Config` if the result is not a valid URL.
pub fn join_url(base_url: &str, path: &str) -> Result<Url, StorefrontError> {
    let joined = format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse(&joined).map_err(|e| StorefrontError::Config(format!("invalid URL {joined:?}: {e}")))
}

fn transport_error(err: HttpError) -> TransportError {
    match err {
        HttpError::Timeout(timeout) => TransportError::Timeout(timeout),
        HttpError::Connect(message) | HttpError::Request(message) | HttpError::Build(message) => {
            TransportError::Network(message)
        }
    }
}
