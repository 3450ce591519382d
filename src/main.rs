//! Copilot token pool
//!
//! Exchanges one or more GitHub credentials for Copilot session tokens,
//! keeps them refreshed, and serves a small status API.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use copilot_token_pool::{
    config::{load_credentials, Settings},
    logging::init_tracing,
    server::App,
    services::{build_facade, token_status, GithubTokenExchange, RefreshScheduler},
};

/// Copilot token pool
///
/// Rotates across several GitHub credentials when one is rate limited or revoked.
#[derive(Parser, Debug)]
#[command(name = "copilot-token-pool")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides PORT env var)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST env var)
    #[arg(long)]
    host: Option<String>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Also write JSON logs to this file (10MB rotation)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// GitHub credential(s), comma or newline separated (overrides GH_TOKENS / GH_TOKEN)
    #[arg(short = 'g', long)]
    github_token: Option<String>,

    /// Log credentials and session tokens in clear text
    #[arg(long)]
    show_token: bool,

    /// Rounds through the pool before giving up on a request
    #[arg(long)]
    max_retry_rounds: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(rounds) = args.max_retry_rounds {
        settings.max_retry_rounds = rounds;
    }
    if args.show_token {
        settings.show_token = true;
    }
    settings.github_token = args.github_token;

    init_tracing(&settings.log_level, args.log_file.as_deref())?;
    settings.validate()?;

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        host = %settings.host,
        port = %settings.port,
        "Starting application"
    );

    let (_, credentials) = load_credentials(
        settings.github_token.as_deref(),
        |key| std::env::var(key).ok(),
        &settings.secret_paths,
    )
    .context("No GitHub credential found; set GH_TOKENS, GH_TOKEN or pass --github-token")?;

    let facade = build_facade(credentials, settings.derived_ttl())?;
    if let Some(stats) = token_status(facade.as_ref()) {
        tracing::info!(
            total = stats.total,
            available = stats.available,
            "Credential pool ready"
        );
    }

    let exchange = GithubTokenExchange::new(
        settings.github_api_base_url.as_str(),
        settings.vscode_version.as_str(),
        settings.exchange_timeout(),
    )?;
    let scheduler = Arc::new(RefreshScheduler::new(
        facade.clone(),
        Arc::new(exchange),
        settings.refresh_config(),
    ));

    let refresh_in = scheduler
        .refresh()
        .await
        .context("Initial session token refresh failed")?;
    let refresh_task = scheduler.spawn(refresh_in);

    let result = App::new(settings, facade).run_with_graceful_shutdown().await;

    refresh_task.abort();
    tracing::info!("Application shutdown complete");

    result
}
