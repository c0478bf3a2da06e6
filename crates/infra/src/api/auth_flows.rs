//! Session-creating flows: login, registration, OAuth callback, logout
//!
//! Login and registration post to auth-exempt endpoints, so bad credentials
//! surface as `ApiError::AuthExemptRejected` and never trigger a refresh.

use serde::Serialize;
use serde_json::Value;
use storefront_common::auth::Session;
use storefront_domain::constants::endpoints;
use tracing::info;

use super::client::ApiClient;
use super::errors::ApiError;
use crate::http::parse_token_pair;

/// Login, registration and logout over an [`ApiClient`]
#[derive(Debug, Clone)]
pub struct AuthFlows {
    client: ApiClient,
}

impl AuthFlows {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Sign in with `credentials` (e.g. `{"email": .., "password": ..}`)
    ///
    /// # Errors
    /// `ApiError::AuthExemptRejected` for rejected credentials,
    /// `ApiError::Decode` if the response carries no token pair.
    pub async fn login<C: Serialize + ?Sized>(&self, credentials: &C) -> Result<Session, ApiError> {
        self.authenticate(endpoints::LOGIN, credentials).await
    }

    /// Create an account and sign in
    ///
    /// # Errors
    /// Same as [`login`](Self::login).
    pub async fn register<P: Serialize + ?Sized>(&self, payload: &P) -> Result<Session, ApiError> {
        self.authenticate(endpoints::REGISTER, payload).await
    }

    /// Store the tokens delivered by an OAuth callback
    ///
    /// # Errors
    /// Returns `ApiError::Storage` if the session cannot be written.
    pub fn complete_oauth(
        &self,
        access_token: &str,
        refresh_token: &str,
        user: Option<Value>,
    ) -> Result<Session, ApiError> {
        let session = Session::new(access_token, refresh_token, user);
        self.client.sessions().begin(&session)?;
        info!("OAuth session stored");
        Ok(session)
    }

    /// End the session locally
    ///
    /// No termination event is emitted; events are reserved for sessions
    /// that end because a refresh failed.
    ///
    /// # Errors
    /// Returns `ApiError::Storage` if the store cannot be cleared.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.client.sessions().end()?;
        Ok(())
    }

    async fn authenticate<P: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &P,
    ) -> Result<Session, ApiError> {
        let path = self.client.endpoint(endpoint, &[])?;
        let body: Value = self.client.post(&path, payload).await?;
        let session = session_from_response(&body)?;

        self.client.sessions().begin(&session)?;
        info!(endpoint, "Signed in");
        Ok(session)
    }
}

/// Build a session from `{accessToken, refreshToken, user}` (optionally
/// nested under `data`)
///
/// # Errors
/// Returns `ApiError::Decode` unless both tokens are present.
pub fn session_from_response(body: &Value) -> Result<Session, ApiError> {
    let tokens = parse_token_pair(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    let refresh_token = tokens
        .refresh_token
        .ok_or_else(|| ApiError::Decode("auth response has no refresh token".into()))?;

    let payload = body.get("data").filter(|data| data.is_object()).unwrap_or(body);
    let user = payload.get("user").filter(|user| !user.is_null()).cloned();

    Ok(Session::new(tokens.access_token, refresh_token, user))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn session_from_flat_response() {
        let session = session_from_response(&json!({
            "accessToken": "A1",
            "refreshToken": "R1",
            "user": {"id": 5, "email": "ada@example.com"}
        }))
        .unwrap();

        assert_eq!(session.access_token.as_deref(), Some("A1"));
        assert_eq!(session.refresh_token.as_deref(), Some("R1"));
        assert_eq!(session.user_info.unwrap()["id"], 5);
    }

    #[test]
    fn session_from_nested_response_without_user() {
        let session =
            session_from_response(&json!({"data": {"access_token": "A1", "refresh_token": "R1"}}))
                .unwrap();
        assert_eq!(session.user_info, None);
    }

    #[test]
    fn both_tokens_are_required() {
        assert!(matches!(
            session_from_response(&json!({"accessToken": "A1"})),
            Err(ApiError::Decode(_))
        ));
        assert!(matches!(
            session_from_response(&json!({"refreshToken": "R1"})),
            Err(ApiError::Decode(_))
        ));
    }
}
