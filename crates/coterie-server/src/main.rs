//! # Coterie Server
//!
//! Invite-gated realtime chat server.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! coterie
//!
//! # Run with custom config
//! COTERIE_PORT=8080 COTERIE_INVITE_CODE=winter-retreat coterie
//! ```
//!
//! Configuration is read from `coterie.toml` if present, with `COTERIE_*`
//! environment variables as the fallback defaults.

mod auth;
mod config;
mod error;
mod handlers;
mod metrics;
mod ws;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coterie=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Coterie server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
