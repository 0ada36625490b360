//! # roomsync
//!
//! Merges a feed of event deliveries into reconciled room state.
//!
//! ## Usage
//!
//! ```bash
//! # Read JSON-lines deliveries from stdin
//! roomsync < session.jsonl
//!
//! # Run with a custom config
//! roomsync /path/to/roomsync.toml
//!
//! # Run with environment variables
//! ROOMSYNC_USER_ID=@me:example.org ROOMSYNC_FEED=session.jsonl roomsync
//! ```

mod config;
mod feed;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomsync=info,roomsync_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => config::Config::from_file(path)?,
        None => config::Config::load()?,
    };
    config.validate()?;

    tracing::info!(
        feed = %config.feed.path,
        format = ?config.feed.format,
        user = ?config.identity.user_id,
        "Starting roomsync"
    );

    // Initialize metrics
    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            tracing::error!("Failed to start metrics server: {}", e);
        }
    }

    let summary = feed::run(config).await?;
    tracing::info!(
        deliveries = summary.deliveries,
        events = summary.events.total(),
        applied = summary.events.applied,
        "Done"
    );

    Ok(())
}
