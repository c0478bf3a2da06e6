//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `STOREFRONT_API_BASE_URL` is unset, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `STOREFRONT_API_BASE_URL`: Backend base URL (required for env loading)
//! - `STOREFRONT_REQUEST_TIMEOUT_MS`: Request timeout in milliseconds
//! - `STOREFRONT_REFRESH_TIMEOUT_MS`: Refresh timeout in milliseconds
//! - `STOREFRONT_STORAGE`: `memory`, `file` or `keychain`
//! - `STOREFRONT_STORAGE_PATH`: Session file (required for `file`)
//! - `STOREFRONT_KEYCHAIN_SERVICE`: Keychain service name
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./storefront.toml` or `./storefront.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. `../storefront.toml` or `../storefront.json` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};

use storefront_domain::constants::DEFAULT_KEYCHAIN_SERVICE;
use storefront_domain::{ClientConfig, Result, StorageConfig, StorefrontError};

pub const ENV_BASE_URL: &str = "STOREFRONT_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "STOREFRONT_REQUEST_TIMEOUT_MS";
pub const ENV_REFRESH_TIMEOUT_MS: &str = "STOREFRONT_REFRESH_TIMEOUT_MS";
pub const ENV_STORAGE: &str = "STOREFRONT_STORAGE";
pub const ENV_STORAGE_PATH: &str = "STOREFRONT_STORAGE_PATH";
pub const ENV_KEYCHAIN_SERVICE: &str = "STOREFRONT_KEYCHAIN_SERVICE";

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `StorefrontError::Config` if configuration cannot be loaded from
/// either source or fails validation.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from the process environment
///
/// # Errors
/// Returns `StorefrontError::Config` if `STOREFRONT_API_BASE_URL` is missing
/// or any variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup
///
/// Unset optional variables keep their defaults.
///
/// # Errors
/// Same as [`load_from_env`].
pub fn load_from_lookup<F>(lookup: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let base_url = lookup(ENV_BASE_URL)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| StorefrontError::Config(format!("Missing environment variable: {ENV_BASE_URL}")))?;

    let mut config = ClientConfig::new(base_url);
    if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
        config.request_timeout_ms = parse_millis(ENV_REQUEST_TIMEOUT_MS, &raw)?;
    }
    if let Some(raw) = lookup(ENV_REFRESH_TIMEOUT_MS) {
        config.refresh_timeout_ms = parse_millis(ENV_REFRESH_TIMEOUT_MS, &raw)?;
    }
    if let Some(backend) = lookup(ENV_STORAGE) {
        config.storage = storage_from_env(&backend, &lookup)?;
    }

    config.validate()?;
    Ok(config)
}

fn storage_from_env<F>(backend: &str, lookup: &F) -> Result<StorageConfig>
where
    F: Fn(&str) -> Option<String>,
{
    match backend.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(StorageConfig::Memory),
        "file" => {
            let path = lookup(ENV_STORAGE_PATH).ok_or_else(|| {
                StorefrontError::Config(format!("{ENV_STORAGE_PATH} is required for file storage"))
            })?;
            Ok(StorageConfig::File { path: PathBuf::from(path) })
        }
        "keychain" => Ok(StorageConfig::Keychain {
            service: lookup(ENV_KEYCHAIN_SERVICE)
                .unwrap_or_else(|| DEFAULT_KEYCHAIN_SERVICE.to_string()),
        }),
        other => Err(StorefrontError::Config(format!(
            "Invalid {ENV_STORAGE} value {other:?} (expected memory, file or keychain)"
        ))),
    }
}

fn parse_millis(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| StorefrontError::Config(format!("Invalid {name}: {e}")))
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `StorefrontError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StorefrontError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            StorefrontError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| StorefrontError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StorefrontError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| StorefrontError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(StorefrontError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidate_files(&cwd));
        if let Some(parent) = cwd.parent() {
            candidates.extend(candidate_files(parent).into_iter().take(2));
        }
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_files(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.is_file())
}

fn candidate_files(dir: &Path) -> [PathBuf; 4] {
    [
        dir.join("storefront.toml"),
        dir.join("storefront.json"),
        dir.join("config.toml"),
        dir.join("config.json"),
    ]
}
