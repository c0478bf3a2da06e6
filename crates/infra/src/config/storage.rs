//! Token store selection from configuration

use std::sync::Arc;

use storefront_common::auth::{FileTokenStore, KeychainTokenStore, MemoryTokenStore, TokenStore};
use storefront_domain::{Result, StorageConfig, StorefrontError};
use tracing::info;

/// Open the session back-end named by `storage`
///
/// # Errors
/// Returns `StorefrontError::Storage` if the session file exists but cannot
/// be read or decoded.
pub fn build_token_store(storage: &StorageConfig) -> Result<Arc<dyn TokenStore>> {
    let store: Arc<dyn TokenStore> = match storage {
        StorageConfig::Memory => Arc::new(MemoryTokenStore::new()),
        StorageConfig::File { path } => Arc::new(
            FileTokenStore::open(path).map_err(|e| StorefrontError::Storage(e.to_string()))?,
        ),
        StorageConfig::Keychain { service } => Arc::new(KeychainTokenStore::new(service)),
    };

    info!(backend = backend_name(storage), "Session storage ready");
    Ok(store)
}

fn backend_name(storage: &StorageConfig) -> &'static str {
    match storage {
        StorageConfig::Memory => "memory",
        StorageConfig::File { .. } => "file",
        StorageConfig::Keychain { .. } => "keychain",
    }
}
