//! eventrelay-threads: reference producer and reactor
//!
//! Creates parents and children by submitting `ParentCreated` and
//! `ChildCreated` to the relay, and answers every `ChildModerated` it is
//! delivered with a `ChildUpdated`. Holds no state of its own.
//!
//! ## Configuration
//! - `server {host, port}`: bind address (register this with the relay)
//! - `relay {address, timeout_ms}`: where to submit events

use std::sync::Arc;

use tracing::{error, info};

use eventrelay::client::RelayClient;
use eventrelay::config::Config;
use eventrelay::handlers::{serve, threads};
use eventrelay::producer::{ModerationReactor, ThreadProducer};
use eventrelay::replay::ReplayFeed;
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

    info!("Starting eventrelay-threads");

    let relay = Arc::new(RelayClient::new(&config.relay)?);
    let head = connect_with_retry("relay", relay.base_url(), || relay.last_sequence()).await?;
    info!(relay = %relay.base_url(), head, "Relay reachable");

    let app = threads::router(
        ThreadProducer::new(relay.clone()),
        ModerationReactor::new(relay),
    );
    serve(app, &config.server.bind_address(), shutdown_signal()).await?;

    info!("eventrelay-threads stopped");
    Ok(())
}
