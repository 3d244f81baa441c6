//! Bootstrap utilities for eventrelay binaries.
//!
//! Shared initialization code for the broker and subscriber binaries.

use std::future::Future;

use backon::Retryable;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::retry::connection_backoff;
use crate::config::{LOG_ENV_VAR, LOG_FORMAT_ENV_VAR};

/// Initialize tracing with the EVENTRELAY_LOG environment variable.
///
/// Defaults to "info" level if EVENTRELAY_LOG is not set. Set
/// EVENTRELAY_LOG_FORMAT=json for structured output.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Config file path from `--config <path>` / `-c <path>` on the command line.
pub fn parse_config_path() -> Option<String> {
    config_path_from(std::env::args().skip(1))
}

fn config_path_from(mut args: impl Iterator<Item = String>) -> Option<String> {
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}

/// Run `op` until it succeeds, with exponential backoff.
///
/// # Arguments
/// * `service_name` - Human-readable name for logging (e.g., "relay")
/// * `address` - Where the service is expected
/// * `op` - Async operation that attempts to reach the service
///
/// # Returns
/// The operation's value on success, or the last error after max retries.
pub async fn connect_with_retry<T, E, F, Fut>(
    service_name: &str,
    address: &str,
    op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let result = op
        .retry(connection_backoff())
        .notify(|e: &E, delay| {
            warn!(
                service = service_name,
                address,
                error = %e,
                ?delay,
                "Service not reachable, retrying"
            );
        })
        .await;

    match &result {
        Ok(_) => info!(service = service_name, address, "Connected"),
        Err(e) => error!(
            service = service_name,
            address,
            error = %e,
            "Giving up on service"
        ),
    }
    result
}

/// Resolve when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
