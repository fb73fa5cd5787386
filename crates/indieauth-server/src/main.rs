//! IndieAuth Server - Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use indieauth_server::{client::HttpClient, config::Config, server::IndieAuthServer};

#[derive(Parser, Debug)]
#[command(name = "indieauth-server")]
#[command(about = "IndieAuth authorization server with Ticket-Auth")]
#[command(version)]
struct Cli {
    /// Public base URL of this server (e.g., https://auth.example.com/)
    #[arg(long, env = "INDIEAUTH_ISSUER")]
    issuer: Option<Url>,

    /// HTTP server port
    #[arg(long, default_value = "3000", env = "PORT")]
    port: u16,

    /// Password required to approve authorization requests
    #[arg(long, env = "INDIEAUTH_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting IndieAuth server");

    let mut config = Config::from_env()?;
    if let Some(issuer) = cli.issuer {
        config = config.with_issuer(issuer);
    }
    if cli.auth_token.is_some() {
        config.auth_token = cli.auth_token;
    }
    config.port = cli.port;
    config.validate()?;

    if config.auth_token.is_none() {
        tracing::warn!("No INDIEAUTH_AUTH_TOKEN set; consent approvals are not password protected");
    }
    tracing::debug!(config = ?config, "Configuration loaded");

    let transport = Arc::new(HttpClient::new(&config)?);
    IndieAuthServer::new(config, transport).run_http().await
}
