//! Authenticated API client with single refresh-and-retry on 401
//!
//! Every request carries the stored access token as a bearer token. A 401 is
//! handled once per request:
//!
//! 1. already retried: fail with `ApiError::RetryExhausted`
//! 2. auth-exempt endpoint: fail with `ApiError::AuthExemptRejected`
//! 3. otherwise: ask the [`RefreshCoordinator`] for a fresh token and resubmit
//!    the same request exactly once
//!
//! Concurrent 401s share one refresh through the coordinator; a failed
//! refresh has already ended the session when the error reaches the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::ACCEPT;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use storefront_common::auth::{
    RefreshCoordinator, RefreshTransport, SessionEvents, SessionStore, TokenStore,
};
use storefront_domain::{ClientConfig, EndpointTable};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::errors::ApiError;
use super::exempt::ExemptSet;
use super::request::{ApiResponse, RequestDescriptor, RequestOptions};
use crate::config::build_token_store;
use crate::http::{join_url, HttpClient, HttpError, RawTransport};
use crate::logging::log_request_outcome;

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for the API (e.g. `https://shop.example.com/api`)
    pub base_url: Url,
    /// Default timeout for API requests
    pub timeout: Duration,
    /// Logical endpoint table
    pub endpoints: EndpointTable,
    /// Path templates whose 401 never triggers a refresh
    pub exempt_paths: Vec<String>,
}

impl ApiClientConfig {
    /// Derive client settings from the workspace configuration
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the configuration is invalid.
    pub fn from_client_config(config: &ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::Config(format!("invalid base_url: {e}")))?;

        Ok(Self {
            base_url,
            timeout: config.request_timeout(),
            endpoints: config.endpoints.clone(),
            exempt_paths: config.exempt_paths()?,
        })
    }
}

/// API client with bearer authentication and token refresh
///
/// Cheap to clone; clones share the session store and refresh coordinator.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    config: Arc<ApiClientConfig>,
    exempt: Arc<ExemptSet>,
    sessions: SessionStore,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    /// Create a client that refreshes through `coordinator`
    ///
    /// The session store is the one the coordinator updates.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the HTTP client cannot be built.
    pub fn new(config: ApiClientConfig, coordinator: RefreshCoordinator) -> Result<Self, ApiError> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HttpClient: {e}")))?;
        let exempt = ExemptSet::new(&config.base_url, &config.exempt_paths);

        Ok(Self {
            http,
            exempt: Arc::new(exempt),
            sessions: coordinator.sessions().clone(),
            config: Arc::new(config),
            coordinator,
        })
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Session store shared with the refresh coordinator
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Session termination events
    #[must_use]
    pub fn events(&self) -> &SessionEvents {
        self.coordinator.events()
    }

    #[must_use]
    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Render a logical endpoint into a request path
    ///
    /// # Errors
    /// Returns `ApiError::Config` for unknown endpoints or missing parameters.
    pub fn endpoint(&self, name: &str, params: &[(&str, &str)]) -> Result<String, ApiError> {
        Ok(self.config.endpoints.path(name, params)?)
    }

    /// Whether a 401 on `path` is propagated without refreshing
    #[must_use]
    pub fn is_auth_exempt(&self, path: &str) -> bool {
        self.exempt.matches(path)
    }

    /// Send a request, refreshing and retrying once on 401
    ///
    /// # Errors
    /// - `ApiError::AuthExemptRejected` for a 401 from an exempt endpoint
    /// - `ApiError::RetryExhausted` for a 401 on the retried request
    /// - `ApiError::Refresh` when the refresh failed (session ended)
    /// - `ApiError::Cancelled` when `options.cancellation` fires
    /// - status, network and decode errors otherwise
    #[instrument(skip(self, request, options), fields(method = %request.method, path = %request.path))]
    pub async fn send(
        &self,
        request: &RequestDescriptor,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let started = Instant::now();

        let outcome = match options.cancellation.as_ref() {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(ApiError::Cancelled),
                result = self.dispatch(request, options.timeout) => result,
            },
            None => self.dispatch(request, options.timeout).await,
        };

        log_request_outcome(
            request.method.as_str(),
            &request.path,
            outcome.as_ref(),
            started.elapsed(),
        );
        outcome
    }

    /// Send a request and deserialize the JSON response
    ///
    /// # Errors
    /// See [`send`](Self::send); additionally `ApiError::Decode`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        options: &RequestOptions,
    ) -> Result<T, ApiError> {
        self.send(request, options).await?.json()
    }

    /// Execute a GET request
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(&RequestDescriptor::get(path), &RequestOptions::default()).await
    }

    /// Execute a POST request with a JSON body
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn post<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, ApiError> {
        let request = RequestDescriptor::post(path).with_body(to_body(body)?);
        self.request(&request, &RequestOptions::default()).await
    }

    /// Execute a PUT request with a JSON body
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn put<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, ApiError> {
        let request = RequestDescriptor::put(path).with_body(to_body(body)?);
        self.request(&request, &RequestOptions::default()).await
    }

    /// Execute a PATCH request with a JSON body
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn patch<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, ApiError> {
        let request = RequestDescriptor::patch(path).with_body(to_body(body)?);
        self.request(&request, &RequestOptions::default()).await
    }

    /// Execute a DELETE request
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.request(&RequestDescriptor::delete(path), &RequestOptions::default()).await
    }

    async fn dispatch(
        &self,
        request: &RequestDescriptor,
        timeout: Option<Duration>,
    ) -> Result<ApiResponse, ApiError> {
        let mut token = self.sessions.access_token()?;
        let mut retried = false;

        loop {
            let response = self.execute(request, token.as_deref(), timeout).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Self::complete(&request.path, response, retried).await;
            }

            let body = response.text().await.unwrap_or_default();
            if retried {
                warn!("Request unauthorized after token refresh");
                return Err(ApiError::RetryExhausted { path: request.path.clone(), body });
            }
            if self.exempt.matches(&request.path) {
                debug!("401 from auth-exempt endpoint; not refreshing");
                return Err(ApiError::AuthExemptRejected { path: request.path.clone(), body });
            }

            retried = true;
            let tokens = self.coordinator.refresh_after_rejection(token.as_deref()).await?;
            debug!("Retrying request with refreshed token");
            token = Some(tokens.access_token);
        }
    }

    async fn execute(
        &self,
        request: &RequestDescriptor,
        token: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Response, ApiError> {
        let mut url = join_url(self.config.base_url.as_str(), &request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        let mut builder =
            self.http.request(request.method.clone(), url).header(ACCEPT, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        self.http.send(builder, timeout).await.map_err(map_http_error)
    }

    async fn complete(
        path: &str,
        response: Response,
        retried: bool,
    ) -> Result<ApiResponse, ApiError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(map_status_error(status, path, text));
        }

        // 204/205 have no body by RFC
        let body = if status == StatusCode::NO_CONTENT
            || status == StatusCode::RESET_CONTENT
            || text.trim().is_empty()
        {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ApiError::Decode(format!("Failed to parse response: {e}")))?
        };

        if retried {
            info!(path, "Request succeeded after token refresh");
        }
        Ok(ApiResponse { status: status.as_u16(), body, retried })
    }
}

fn to_body<T: Serialize + ?Sized>(body: &T) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Client(format!("Failed to serialize body: {e}")))
}

fn map_status_error(status: StatusCode, path: &str, body: String) -> ApiError {
    let message = if body.is_empty() {
        format!("{path} returned status {status}")
    } else {
        format!("{path} returned status {status}: {body}")
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ApiError::Auth(message)
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiError::RateLimit(message)
    } else if status.is_server_error() {
        ApiError::Server(message)
    } else if status.is_client_error() {
        ApiError::Client(message)
    } else {
        ApiError::Network(message)
    }
}

fn map_http_error(err: HttpError) -> ApiError {
    match err {
        HttpError::Timeout(timeout) => ApiError::Timeout(timeout),
        HttpError::Connect(message) | HttpError::Request(message) => ApiError::Network(message),
        HttpError::Build(message) => ApiError::Config(message),
    }
}

/// Builder for the API client
///
/// Everything is optional: the configuration defaults to
/// [`ClientConfig::default`], the token store to the configured back-end and
/// the refresh transport to a [`RawTransport`] for the configured endpoint.
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    token_store: Option<Arc<dyn TokenStore>>,
    events: Option<SessionEvents>,
    transport: Option<Arc<dyn RefreshTransport>>,
}

impl std::fmt::Debug for ApiClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClientBuilder")
            .field("config", &self.config)
            .field("custom_store", &self.token_store.is_some())
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClientBuilder {
    /// Set the client configuration
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `store` instead of the configured storage back-end
    #[must_use]
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Emit session events through `events`
    #[must_use]
    pub fn events(mut self, events: SessionEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the refresh transport
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn RefreshTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the API client
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the storage back-end
    /// cannot be opened.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.unwrap_or_default();
        let api_config = ApiClientConfig::from_client_config(&config)?;

        let store = match self.token_store {
            Some(store) => store,
            None => build_token_store(&config.storage)?,
        };
        let transport: Arc<dyn RefreshTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(RawTransport::from_config(&config)?),
        };

        let coordinator = RefreshCoordinator::new(
            SessionStore::new(store),
            transport,
            self.events.unwrap_or_default(),
        )
        .with_timeout(config.refresh_timeout());

        ApiClient::new(api_config, coordinator)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use storefront_common::auth::{Session, TokenPair};
    use storefront_common::testing::MockRefreshTransport;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer, transport: Arc<MockRefreshTransport>) -> ApiClient {
        ApiClient::builder()
            .config(ClientConfig::new(server.uri()))
            .transport(transport)
            .build()
            .unwrap()
    }

    fn idle_transport() -> Arc<MockRefreshTransport> {
        Arc::new(MockRefreshTransport::succeeding(TokenPair::new("T2", None)))
    }

    fn signed_in(client: &ApiClient, access: &str) {
        client.sessions().begin(&Session::new(access, "R1", None)).unwrap();
    }

    #[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
    struct TestResponse {
        message: String,
    }

    #[tokio::test]
    async fn test_get_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "success".to_string(),
            }))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, idle_transport());
        signed_in(&client, "T1");

        let result: TestResponse = client.get("/products").await.unwrap();
        assert_eq!(result.message, "success");
    }

    #[tokio::test]
    async fn test_request_without_token_is_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blogs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, idle_transport());
        let posts: Vec<Value> = client.get("/blogs").await.unwrap();

        assert!(posts.is_empty());
        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_query_and_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("page", "2"))
            .and(header("X-Client", "cli"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, idle_transport());
        let request = RequestDescriptor::get("/products")
            .with_query("page", "2")
            .with_header("X-Client", "cli");

        let response = client.send(&request, &RequestOptions::default()).await.unwrap();
        assert_eq!(response.status, 200);
        assert!(!response.retried);
    }

    #[tokio::test]
    async fn test_204_and_205_decode_to_unit() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/wishlist/5"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/cart/reset"))
            .respond_with(ResponseTemplate::new(205))
            .mount(&server)
            .await;

        let client = client_for(&server, idle_transport());

        client.delete::<()>("/wishlist/5").await.unwrap();
        client.post::<_, ()>("/cart/reset", &json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_401_errors_are_classified() {
        let server = MockServer::start().await;
        let routes = [("/forbidden", 403), ("/limited", 429), ("/broken", 502), ("/missing", 404)];
        for (route, status) in routes {
            Mock::given(path(route)).respond_with(ResponseTemplate::new(status)).mount(&server).await;
        }
        let transport = idle_transport();
        let client = client_for(&server, transport.clone());
        signed_in(&client, "T1");

        assert!(matches!(client.get::<Value>("/forbidden").await, Err(ApiError::Auth(_))));
        assert!(matches!(client.get::<Value>("/limited").await, Err(ApiError::RateLimit(_))));
        assert!(matches!(client.get::<Value>("/broken").await, Err(ApiError::Server(_))));
        assert!(matches!(client.get::<Value>("/missing").await, Err(ApiError::Client(_))));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(path("/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, idle_transport());
        assert!(matches!(client.get::<Value>("/profile").await, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = ApiClient::builder().config(ClientConfig::new("ftp://shop.test")).build();
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[test]
    fn test_endpoint_rendering_and_exemptions() {
        let client =
            ApiClient::builder().config(ClientConfig::new("http://shop.test/api")).build().unwrap();

        assert_eq!(client.endpoint("addressDetail", &[("id", "9")]).unwrap(), "/addresses/9");
        assert!(client.is_auth_exempt("/auth/login"));
        assert!(client.is_auth_exempt("/api/auth/refresh-token/"));
        assert!(!client.is_auth_exempt("/cart"));
    }
}
