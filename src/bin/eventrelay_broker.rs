//! eventrelay-broker: the relay
//!
//! Records every submitted event in the event log and fans it out to the
//! registered subscribers. Serves the full history for replay.
//!
//! ## Architecture
//! ```text
//! [Producer] -> POST /events -> [Broadcaster] -> [Event Store]
//!                                     |
//!                                     v (registration order)
//!                       [posts] [comments] [query] [moderation]
//!
//! [Subscriber startup] -> GET /events -> full history
//! ```
//!
//! ## Configuration
//! - `server {host, port}`: bind address (default 0.0.0.0:4005)
//! - `storage {type, path, max_events}`: memory (default) or sqlite
//! - `subscribers [{name, address}]`: delivery targets, in order
//! - `delivery {mode, timeout_ms, max_retries}`: fan-out behaviour

use std::sync::Arc;

use tracing::{error, info};

use eventrelay::bus::{Broadcaster, HttpSubscriber, Subscriber};
use eventrelay::config::Config;
use eventrelay::handlers::{relay, serve};
use eventrelay::storage::init_storage;
use eventrelay::utils::bootstrap::{init_tracing, parse_config_path, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!("Starting eventrelay-broker");

    let store = init_storage(&config.storage).await?;

    let mut subscribers = Vec::with_capacity(config.subscribers.len());
    for endpoint in &config.subscribers {
        let handler = HttpSubscriber::new(endpoint, &config.delivery)?;
        info!(subscriber = %endpoint.name, url = %handler.url(), "Subscriber registered");
        subscribers.push(Subscriber::new(endpoint.name.clone(), Arc::new(handler)));
    }

    let broadcaster = Arc::new(
        Broadcaster::builder(store)
            .subscribers(subscribers)
            .delivery(config.delivery.clone())
            .build(),
    );

    let app = relay::router(Arc::clone(&broadcaster));
    serve(app, &config.server.bind_address(), shutdown_signal()).await?;

    broadcaster.shutdown().await;
    info!("eventrelay-broker stopped");
    Ok(())
}
