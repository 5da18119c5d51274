//! Keepsake API server binary.
//!
//! Usage:
//!   keepsake-api --config keepsake.toml
//!   keepsake-api --port 8080 --bind 0.0.0.0
//!   keepsake-api --snapshot ./data/items.json

use clap::Parser;
use keepsake_api::{ApiKeyConfig, AppState, KeepsakeConfig, serve};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "keepsake-api", version, about = "Keepsake memory service")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (overrides the config file)
    #[arg(short, long, env = "KEEPSAKE_BIND_ADDR")]
    bind: Option<String>,

    /// JSON snapshot file for the item collection
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Bearer token required on every route except /health and /login
    #[arg(long, env = "KEEPSAKE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Allowed CORS origins (comma-separated)
    #[arg(long, env = "KEEPSAKE_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keepsake_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            KeepsakeConfig::from_file(path)?
        }
        None => {
            tracing::info!("Using default configuration");
            KeepsakeConfig::default()
        }
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(snapshot) = cli.snapshot {
        config.store.snapshot_path = Some(snapshot);
    }
    if let Some(origins) = cli.cors_origins {
        config.server.cors_origins = Some(
            origins
                .into_iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        );
    }

    if config.server.bind == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0; the API is reachable on all interfaces. \
             Set KEEPSAKE_API_KEY and put a firewall in front of it."
        );
    }

    let mut state = AppState::from_config(&config).await?;

    match cli.api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => {
            state = state.with_api_key(ApiKeyConfig::new(key));
            tracing::info!("API key authentication enabled");
        }
        None => tracing::warn!(
            "KEEPSAKE_API_KEY not set; the API runs without authentication"
        ),
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    serve(Arc::new(state), addr, config.server.cors_origins.clone()).await?;

    Ok(())
}
