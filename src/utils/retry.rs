//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Provides the backoff
//! for subscriber deliveries and the backoff for reaching the relay at startup.

use std::time::Duration;

use backon::ExponentialBuilder;
use reqwest::StatusCode;

/// Backoff for one delivery to one subscriber.
///
/// - Min delay: 50ms
/// - Max delay: 1s
/// - Max attempts: `max_retries`
/// - Jitter enabled
///
/// The whole delivery is still bounded by the delivery timeout.
pub fn delivery_backoff(max_retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(max_retries)
        .with_jitter()
}

/// Backoff for reaching the relay at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}

/// Determines if an HTTP status is worth retrying.
///
/// Retryable: 429 (rate limit) and 5xx. Everything else is a refusal that
/// will not change on retry.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Determines if a transport error is worth retrying (timeouts, connect errors).
pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
