//! Session token storage
//!
//! [`TokenStore`] is the key/value seam every back-end implements. It is
//! synchronous on purpose: request and response paths read and write it
//! without awaiting, and each call holds its internal lock only for the
//! duration of a single map operation.
//!
//! [`SessionStore`] layers session semantics (begin, refresh, end) on top of
//! any `TokenStore`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use super::types::{Session, StorageKey, TokenPair};

/// Errors raised by token storage back-ends
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("Session file error: {0}")]
    Io(String),

    /// Platform keychain access failed
    #[error("Keychain error: {0}")]
    Keychain(String),

    /// Persisted data could not be decoded
    #[error("Corrupt session data: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Process-wide key/value holder for the session
///
/// Implementations perform no validation of token contents.
pub trait TokenStore: Send + Sync {
    /// Read a value; `Ok(None)` when absent
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one
    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError>;

    /// Delete a value (idempotent)
    fn remove(&self, key: StorageKey) -> Result<(), StoreError>;

    /// Delete every session value
    fn clear(&self) -> Result<(), StoreError> {
        for key in StorageKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// In-memory token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<StorageKey, String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        self.entries.write().insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        self.entries.write().remove(&key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.entries.write().clear();
        Ok(())
    }
}

/// Session-level operations over a [`TokenStore`]
///
/// Cheap to clone; every clone shares the same underlying store.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn TokenStore>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Session store backed by process memory
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    /// Underlying key/value store
    #[must_use]
    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Replace the persisted session with `session`
    ///
    /// Absent fields are removed, so a previous session never leaks into the
    /// new one.
    ///
    /// # Errors
    /// Returns the back-end error if any write fails.
    pub fn begin(&self, session: &Session) -> Result<(), StoreError> {
        self.write_optional(StorageKey::AccessToken, session.access_token.as_deref())?;
        self.write_optional(StorageKey::RefreshToken, session.refresh_token.as_deref())?;

        let user_info = session.user_info.as_ref().map(serde_json::to_string).transpose()?;
        self.write_optional(StorageKey::UserInfo, user_info.as_deref())?;

        info!(has_user_info = session.user_info.is_some(), "Session started");
        Ok(())
    }

    /// Read the full persisted session
    ///
    /// # Errors
    /// Returns `StoreError::Corrupt` if the user info is not valid JSON.
    pub fn current(&self) -> Result<Session, StoreError> {
        let user_info = self
            .store
            .get(StorageKey::UserInfo)?
            .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
            .transpose()?;

        Ok(Session {
            access_token: self.store.get(StorageKey::AccessToken)?,
            refresh_token: self.store.get(StorageKey::RefreshToken)?,
            user_info,
        })
    }

    /// Current access token, if any
    ///
    /// # Errors
    /// Returns the back-end error if the read fails.
    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(StorageKey::AccessToken)
    }

    /// Current refresh token, if any
    ///
    /// # Errors
    /// Returns the back-end error if the read fails.
    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(StorageKey::RefreshToken)
    }

    /// Decode the stored user info into `T`
    ///
    /// # Errors
    /// Returns `StoreError::Corrupt` if the stored JSON does not match `T`.
    pub fn user_info<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        self.store
            .get(StorageKey::UserInfo)?
            .map(|raw| serde_json::from_str(&raw).map_err(StoreError::from))
            .transpose()
    }

    /// Persist the result of a refresh
    ///
    /// The refresh token is only overwritten when the server rotated it.
    ///
    /// # Errors
    /// Returns the back-end error if a write fails.
    pub fn apply_refresh(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        self.store.set(StorageKey::AccessToken, &tokens.access_token)?;
        if let Some(refresh_token) = tokens.refresh_token.as_deref() {
            self.store.set(StorageKey::RefreshToken, refresh_token)?;
        }

        debug!(rotated = tokens.refresh_token.is_some(), "Stored refreshed tokens");
        Ok(())
    }

    /// Remove every session field
    ///
    /// # Errors
    /// Returns the back-end error if clearing fails.
    pub fn end(&self) -> Result<(), StoreError> {
        self.store.clear()?;
        info!("Session cleared");
        Ok(())
    }

    fn write_optional(&self, key: StorageKey, value: Option<&str>) -> Result<(), StoreError> {
        match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        }
    }
}
