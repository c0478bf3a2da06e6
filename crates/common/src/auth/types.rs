//! Session types and persisted key names
//!
//! The session is persisted as three independent string entries so that the
//! layout stays compatible with simple key/value storage back-ends.

use std::fmt;

use serde::{Deserialize, Serialize};
use storefront_domain::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_INFO_KEY};

/// Fixed keys of the persisted session layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Short-lived bearer credential
    AccessToken,
    /// Long-lived credential exchanged for new access tokens
    RefreshToken,
    /// JSON document describing the signed-in user
    UserInfo,
}

impl StorageKey {
    /// Every key, in the order they are cleared
    pub const ALL: [Self; 3] = [Self::AccessToken, Self::RefreshToken, Self::UserInfo];

    /// Documented storage name for this key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => ACCESS_TOKEN_KEY,
            Self::RefreshToken => REFRESH_TOKEN_KEY,
            Self::UserInfo => USER_INFO_KEY,
        }
    }

    /// Parse a documented storage name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful token refresh
///
/// The refresh token is optional because the server may choose not to rotate
/// it; in that case the stored refresh token stays in place.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Snapshot of the persisted session
///
/// Access and refresh tokens are set together when a session begins; only
/// the refresh coordinator replaces them afterwards.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_info: Option<serde_json::Value>,
}

impl Session {
    /// Start a new session from a login/registration/OAuth result
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        user_info: Option<serde_json::Value>,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            user_info,
        }
    }

    /// Whether an access token is present
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Whether every field is absent
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user_info.is_none()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user_info", &self.user_info)
            .finish()
    }
}
