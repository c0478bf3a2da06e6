//! Command-line arguments and configuration resolution

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use storefront_domain::{ClientConfig, StorageConfig};
use storefront_infra::config;
use storefront_infra::config::loader::ENV_BASE_URL;
use storefront_infra::logging::LogFormat;

/// Storefront session client
#[derive(Debug, Parser)]
#[command(name = "storefront", version, about)]
pub struct Cli {
    /// Configuration file (TOML or JSON). Probed from standard locations when
    /// omitted.
    #[arg(long, env = "STOREFRONT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend base URL; overrides the configuration file.
    #[arg(long, env = "STOREFRONT_API_BASE_URL")]
    pub base_url: Option<String>,

    /// Persist the session to this file instead of the configured back-end.
    #[arg(long, env = "STOREFRONT_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Log format: text or json.
    #[arg(long, env = "STOREFRONT_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Log filter directive (e.g. `debug`, `storefront_infra=trace`).
    #[arg(long, env = "STOREFRONT_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in with email and password and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Clear the stored session
    Logout,
    /// Show whether a session is stored and who it belongs to
    Status,
    /// Send one authenticated request and print the JSON response
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,
        /// Path relative to the base URL, or a logical endpoint name prefixed
        /// with `@` (e.g. `@cart`)
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
        /// Per-request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

impl Cli {
    /// Build the client configuration from the file/env layers plus flags
    ///
    /// # Errors
    /// Fails when no base URL can be found or the result does not validate.
    pub fn resolve_config(&self) -> anyhow::Result<ClientConfig> {
        let mut resolved = match (&self.config, &self.base_url) {
            (Some(path), _) => config::load_from_file(Some(path.clone()))
                .with_context(|| format!("loading {}", path.display()))?,
            (None, Some(base_url)) => config_for_base_url(
                base_url,
                config::probe_config_paths(),
                |key| std::env::var(key).ok(),
            )?,
            (None, None) => config::load().context(
                "no configuration found; pass --base-url or --config, or set STOREFRONT_API_BASE_URL",
            )?,
        };

        if let Some(base_url) = &self.base_url {
            resolved.base_url.clone_from(base_url);
        }
        if let Some(path) = &self.session_file {
            resolved.storage = StorageConfig::File { path: path.clone() };
        }

        resolved.validate()?;
        Ok(resolved)
    }
}

/// Configuration layers used when `--base-url` is given without `--config`
///
/// Same precedence as [`config::load`] (environment, then a probed file), but
/// the flag stands in for a missing base URL instead of failing. A probed
/// file or environment value that does not parse is an error.
fn config_for_base_url<F>(
    base_url: &str,
    probed: Option<PathBuf>,
    lookup: F,
) -> anyhow::Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if lookup(ENV_BASE_URL).is_some_and(|value| !value.trim().is_empty()) {
        return config::load_from_lookup(lookup).context("invalid STOREFRONT_* environment");
    }
    if let Some(path) = probed {
        return config::load_from_file(Some(path.clone()))
            .with_context(|| format!("loading {}", path.display()));
    }

    config::load_from_lookup(|key| {
        if key == ENV_BASE_URL {
            Some(base_url.to_string())
        } else {
            lookup(key)
        }
    })
    .context("invalid STOREFRONT_* environment")
}

/// Parse a user-supplied HTTP method
///
/// # Errors
/// Rejects anything other than the methods the API uses.
pub fn parse_method(raw: &str) -> anyhow::Result<reqwest::Method> {
    let method = raw.to_ascii_uppercase();
    match method.as_str() {
        "GET" | "POST" | "PUT" | "PATCH" | "DELETE" => Ok(method.parse()?),
        _ => bail!("unsupported method {raw:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_command() {
        let cli = Cli::try_parse_from([
            "storefront",
            "--base-url",
            "http://localhost:8080/api",
            "--log-format",
            "json",
            "request",
            "post",
            "/cart",
            "--data",
            r#"{"productId":1}"#,
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Command::Request { method, path, data, timeout_ms } => {
                assert_eq!(method, "post");
                assert_eq!(path, "/cart");
                assert!(data.is_some());
                assert_eq!(timeout_ms, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_log_format() {
        let result = Cli::try_parse_from(["storefront", "--log-format", "xml", "status"]);
        assert!(result.is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("storefront.toml");
        std::fs::write(&file, "base_url = \"https://shop.example.com/api\"\n").unwrap();
        let session = dir.path().join("session.json");

        let cli = Cli::try_parse_from([
            "storefront",
            "--config",
            file.to_str().unwrap(),
            "--base-url",
            "http://127.0.0.1:3000",
            "--session-file",
            session.to_str().unwrap(),
            "logout",
        ])
        .unwrap();

        let resolved = cli.resolve_config().unwrap();
        assert_eq!(resolved.base_url, "http://127.0.0.1:3000");
        assert_eq!(resolved.storage, StorageConfig::File { path: session });
    }

    #[test]
    fn base_url_flag_does_not_hide_broken_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("storefront.toml");
        std::fs::write(&file, "base_url = [not toml").unwrap();

        let err = config_for_base_url("http://127.0.0.1:3000", Some(file), |_| None).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid TOML format"));
    }

    #[test]
    fn base_url_flag_fills_in_when_nothing_is_configured() {
        let resolved = config_for_base_url("http://127.0.0.1:3000", None, |key| {
            (key == config::loader::ENV_REFRESH_TIMEOUT_MS).then(|| "2500".to_string())
        })
        .unwrap();

        assert_eq!(resolved.base_url, "http://127.0.0.1:3000");
        assert_eq!(resolved.refresh_timeout_ms, 2500);

        let err = config_for_base_url("http://127.0.0.1:3000", None, |key| {
            (key == config::loader::ENV_STORAGE).then(|| "redis".to_string())
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("STOREFRONT_STORAGE"));
    }

    #[test]
    fn method_parsing() {
        assert_eq!(parse_method("patch").unwrap(), reqwest::Method::PATCH);
        assert!(parse_method("TRACE").is_err());
    }
}
