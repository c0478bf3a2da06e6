//! Session storage in the platform keychain.
//!
//! Each [`StorageKey`] maps to one keychain entry under the configured
//! service name (macOS Keychain, Windows Credential Manager, Linux Secret
//! Service via the `keyring` crate).

use keyring::Entry;
use tracing::debug;

use super::store::{StoreError, TokenStore};
use super::types::StorageKey;

/// Token store backed by the platform keychain
#[derive(Debug, Clone)]
pub struct KeychainTokenStore {
    service_name: String,
}

impl KeychainTokenStore {
    /// Create a store for a specific keychain service (e.g. `"Storefront.session"`)
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    /// Keychain service name
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn entry(&self, key: StorageKey) -> Result<Entry, StoreError> {
        Entry::new(&self.service_name, key.as_str()).map_err(|e| {
            StoreError::Keychain(format!("Failed to open keychain entry {key}: {e}"))
        })
    }
}

impl TokenStore for KeychainTokenStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keychain(format!("Failed to read {key}: {e}"))),
        }
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        debug!(service = %self.service_name, key = %key, "Storing session value in keychain");

        self.entry(key)?
            .set_password(value)
            .map_err(|e| StoreError::Keychain(format!("Failed to store {key}: {e}")))
    }

    fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keychain(format!("Failed to delete {key}: {e}"))),
        }
    }
}
