//! eventrelay-query: reference view service
//!
//! Folds parent/child events into a queryable view. On startup it replays
//! the relay's full history before serving; afterwards it receives live
//! deliveries and fills any gap from the relay's history.
//!
//! ## Configuration
//! - `server {host, port}`: bind address (register this with the relay)
//! - `relay {address, timeout_ms}`: where to fetch history
//! - `projection {gap_policy, max_pending}`: hold (default) or skip

use std::sync::Arc;

use tracing::{error, info};

use eventrelay::client::RelayClient;
use eventrelay::config::Config;
use eventrelay::handlers::{serve, view};
use eventrelay::projectors::ThreadProjector;
use eventrelay::subscriber::ViewSubscriber;
use eventrelay::utils::bootstrap::{
    connect_with_retry, init_tracing, parse_config_path, shutdown_signal,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!("Starting eventrelay-query");

    let relay = Arc::new(RelayClient::new(&config.relay)?);
    let projector = ThreadProjector::new(config.projection.gap_policy);
    info!(gap_policy = ?projector.gap_policy(), "Thread projection configured");

    let subscriber = ViewSubscriber::builder("query", projector)
        .replay_feed(relay.clone())
        .max_pending(config.projection.max_pending)
        .build();

    // Replay before serving so the first GET /view is complete.
    let report = connect_with_retry("relay", relay.base_url(), || subscriber.catch_up()).await?;
    info!(
        fetched = report.fetched,
        watermark = report.watermark,
        "Startup replay complete"
    );

    let app = view::router(subscriber);
    serve(app, &config.server.bind_address(), shutdown_signal()).await?;

    info!("eventrelay-query stopped");
    Ok(())
}
