//! Client configuration structures
//!
//! Loading (environment, files) lives in `storefront-infra::config`; this
//! module only defines the shape and its validation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTH_EXEMPT, DEFAULT_ENDPOINTS, DEFAULT_KEYCHAIN_SERVICE, DEFAULT_REFRESH_TIMEOUT_MS,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
use crate::errors::{Result, StorefrontError};

/// Top-level configuration for the session client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST backend (e.g. `https://shop.example.com/api`)
    pub base_url: String,
    /// Timeout applied to every authenticated request
    pub request_timeout_ms: u64,
    /// Timeout applied to the token refresh call
    pub refresh_timeout_ms: u64,
    /// Logical endpoint name to path template
    pub endpoints: EndpointTable,
    /// Endpoints (logical names or literal paths) whose 401 never triggers a refresh
    pub auth_exempt: Vec<String>,
    /// Where the session tokens are persisted
    pub storage: StorageConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refresh_timeout_ms: DEFAULT_REFRESH_TIMEOUT_MS,
            endpoints: EndpointTable::default(),
            auth_exempt: DEFAULT_AUTH_EXEMPT.iter().map(|name| (*name).to_string()).collect(),
            storage: StorageConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default endpoints for the given base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    /// Request timeout as a [`Duration`]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Refresh timeout as a [`Duration`]
    #[must_use]
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Resolve the auth-exempt entries to path templates
    ///
    /// Entries starting with `/` are taken literally; anything else is looked
    /// up in the endpoint table.
    ///
    /// # Errors
    /// Returns `StorefrontError::Config` if an entry names an unknown endpoint.
    pub fn exempt_paths(&self) -> Result<Vec<String>> {
        self.auth_exempt
            .iter()
            .map(|entry| {
                if entry.starts_with('/') {
                    Ok(entry.clone())
                } else {
                    self.endpoints.template(entry).map(str::to_string)
                }
            })
            .collect()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `StorefrontError::Config` if the base URL is not http(s),
    /// a timeout is zero, or an exempt entry cannot be resolved.
    pub fn validate(&self) -> Result<()> {
        let scheme_ok =
            self.base_url.starts_with("http://") || self.base_url.starts_with("https://");
        if !scheme_ok {
            return Err(StorefrontError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.request_timeout_ms == 0 || self.refresh_timeout_ms == 0 {
            return Err(StorefrontError::Config("timeouts must be greater than zero".into()));
        }
        self.exempt_paths()?;
        Ok(())
    }
}

/// Session storage back-end selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Process memory only; the session ends with the process
    #[default]
    Memory,
    /// JSON document on disk
    File { path: PathBuf },
    /// Platform keychain
    Keychain {
        #[serde(default = "default_keychain_service")]
        service: String,
    },
}

fn default_keychain_service() -> String {
    DEFAULT_KEYCHAIN_SERVICE.to_string()
}

/// Static table mapping logical operation names to path templates
///
/// Templates may contain `:name` segments (e.g. `/addresses/:id`).
/// Deserialized tables are layered over the built-in defaults, so a config
/// file only needs to list the entries it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct EndpointTable {
    entries: BTreeMap<String, String>,
}

impl Default for EndpointTable {
    fn default() -> Self {
        let entries = DEFAULT_ENDPOINTS
            .iter()
            .map(|(name, path)| ((*name).to_string(), (*path).to_string()))
            .collect();
        Self { entries }
    }
}

impl From<BTreeMap<String, String>> for EndpointTable {
    fn from(overrides: BTreeMap<String, String>) -> Self {
        let mut table = Self::default();
        table.entries.extend(overrides);
        table
    }
}

impl From<EndpointTable> for BTreeMap<String, String> {
    fn from(table: EndpointTable) -> Self {
        table.entries
    }
}

impl EndpointTable {
    /// Look up the path template for a logical endpoint name
    ///
    /// # Errors
    /// Returns `StorefrontError::Config` if the name is unknown.
    pub fn template(&self, name: &str) -> Result<&str> {
        self.entries
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| StorefrontError::Config(format!("unknown endpoint: {name}")))
    }

    /// Add or replace a template
    pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.entries.insert(name.into(), template.into());
    }

    /// Render a template, substituting `:name` segments from `params`
    ///
    /// # Errors
    /// Returns `StorefrontError::Config` for an unknown endpoint and
    /// `StorefrontError::InvalidInput` when a parameter is missing or empty.
    pub fn path(&self, name: &str, params: &[(&str, &str)]) -> Result<String> {
        let template = self.template(name)?;
        let mut rendered = String::with_capacity(template.len());

        for segment in template.split('/').skip(1) {
            rendered.push('/');
            match segment.strip_prefix(':') {
                Some(param) => {
                    let value = params
                        .iter()
                        .find(|(key, _)| *key == param)
                        .map(|(_, value)| *value)
                        .filter(|value| !value.is_empty())
                        .ok_or_else(|| {
                            StorefrontError::InvalidInput(format!(
                                "missing path parameter `{param}` for endpoint {name}"
                            ))
                        })?;
                    rendered.push_str(value);
                }
                None => rendered.push_str(segment),
            }
        }

        Ok(rendered)
    }

    /// Iterate over `(name, template)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, path)| (name.as_str(), path.as_str()))
    }
}
