//! `storefront` binary: sign in, inspect the session and send authenticated
//! requests from the command line.

mod args;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use storefront_common::auth::SessionTerminated;
use storefront_infra::api::{ApiClient, AuthFlows, RequestDescriptor, RequestOptions};
use storefront_infra::logging::init_tracing;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::args::{parse_method, Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format, &cli.log_level);

    match run(cli).await {
        Ok(()) => {}
        Err(e) => {
            error!("fatal: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.resolve_config()?;
    let client = ApiClient::builder().config(config).build().context("building API client")?;
    let mut terminations = client.events().subscribe();

    match cli.command {
        Command::Login { email, password } => {
            let session = AuthFlows::new(client.clone())
                .login(&json!({ "email": email, "password": password }))
                .await?;
            info!("Signed in");
            print_json(&json!({ "signedIn": true, "user": session.user_info }))?;
        }
        Command::Logout => {
            AuthFlows::new(client.clone()).logout()?;
            print_json(&json!({ "signedIn": false }))?;
        }
        Command::Status => {
            let session = client.sessions().current()?;
            print_json(&json!({
                "signedIn": session.is_authenticated(),
                "hasRefreshToken": session.refresh_token.is_some(),
                "user": session.user_info,
            }))?;
        }
        Command::Request { method, path, data, timeout_ms } => {
            let path = resolve_path(&client, &path)?;
            let mut request = RequestDescriptor::new(parse_method(&method)?, path);
            if let Some(raw) = data {
                let body: Value = serde_json::from_str(&raw).context("--data is not valid JSON")?;
                request = request.with_body(body);
            }
            let mut options = RequestOptions::default();
            if let Some(ms) = timeout_ms {
                options = options.with_timeout(Duration::from_millis(ms));
            }

            let result = client.send(&request, &options).await;
            report_terminations(&mut terminations);
            let response = result?;
            print_json(&response.body)?;
        }
    }

    Ok(())
}

/// `@name` looks up a logical endpoint; anything else is used as-is.
fn resolve_path(client: &ApiClient, raw: &str) -> anyhow::Result<String> {
    match raw.strip_prefix('@') {
        Some(name) => Ok(client.endpoint(name, &[])?),
        None => Ok(raw.to_string()),
    }
}

fn report_terminations(rx: &mut broadcast::Receiver<SessionTerminated>) {
    while let Ok(event) = rx.try_recv() {
        warn!(reason = %event.reason, "Session ended: {}", event.message);
        eprintln!("session ended ({}); sign in again", event.reason);
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
