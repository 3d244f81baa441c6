//! Event distribution.
//!
//! This module contains:
//! - `EventHandler` trait: delivery of one sequenced event to one subscriber
//! - `Broadcaster`: the single entry point that appends and fans out
//! - Fan-out strategies (synchronous, queued) and delivery reporting
//! - Handlers: HTTP webhook, lossy wrapper for failure drills

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, warn};

use crate::event::SequencedEvent;
use crate::storage::StorageError;

pub mod broadcaster;
pub mod dispatch;
pub mod http;
#[cfg(feature = "lossy")]
pub mod lossy;
pub mod queued;

pub use broadcaster::{Broadcaster, BroadcasterBuilder, SubmitReceipt};
pub use dispatch::OrderedDispatcher;
pub use http::HttpSubscriber;
#[cfg(feature = "lossy")]
pub use lossy::{LossyConfig, LossyHandler, LossyStats};
pub use queued::QueuedFanout;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur while appending, delivering or replaying events.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The event could not be recorded. Nothing was delivered.
    #[error("Append failed: {0}")]
    Append(#[source] StorageError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Delivery to '{subscriber}' failed: {message}")]
    Delivery { subscriber: String, message: String },

    #[error("Delivery to '{subscriber}' timed out after {timeout:?}")]
    Timeout {
        subscriber: String,
        timeout: Duration,
    },

    #[error("Endpoint answered HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Event dropped by lossy delivery")]
    Dropped,

    #[error("Replay failed: {0}")]
    Replay(String),

    #[error("Invalid bus configuration: {0}")]
    Config(String),
}

/// Delivers sequenced events to one subscriber.
///
/// Implementations must not reorder: the broadcaster awaits (or queues) one
/// delivery at a time per subscriber, in sequence order.
pub trait EventHandler: Send + Sync {
    /// Deliver one event. `Ok` means the subscriber accepted it.
    fn handle(&self, event: Arc<SequencedEvent>) -> BoxFuture<'static, Result<()>>;
}

/// A named delivery target, registered at startup.
#[derive(Clone)]
pub struct Subscriber {
    pub name: String,
    pub handler: Arc<dyn EventHandler>,
}

impl Subscriber {
    pub fn new(name: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("name", &self.name).finish()
    }
}

/// Outcome of a single delivery attempt (including its retries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The subscriber accepted the event.
    Delivered,
    /// Handed to the subscriber's ordered lane; outcome logged asynchronously.
    Queued,
    /// The subscriber failed or refused the event.
    Failed { error: String },
    /// No answer within the delivery timeout.
    TimedOut,
}

impl DeliveryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::TimedOut)
    }
}

/// Per-subscriber entry of a delivery report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRecord {
    pub subscriber: String,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
}

tokio::task_local! {
    /// Set while a handler runs. A submit made from inside a delivery must
    /// not wait for its own fan-out, which queues behind the current one.
    static IN_DELIVERY: ();
}

/// True when called from inside a handler that `deliver` is running.
pub fn in_delivery() -> bool {
    IN_DELIVERY.try_with(|_| ()).is_ok()
}

/// Deliver one event to one subscriber, bounded by `timeout`.
///
/// Failures are logged and reported, never propagated: a subscriber that
/// misses an event recovers through replay.
pub async fn deliver(
    subscriber: &Subscriber,
    event: &Arc<SequencedEvent>,
    timeout: Duration,
) -> DeliveryOutcome {
    let handled = IN_DELIVERY.scope((), subscriber.handler.handle(Arc::clone(event)));
    match tokio::time::timeout(timeout, handled).await {
        Ok(Ok(())) => {
            debug!(
                subscriber = %subscriber.name,
                sequence = event.sequence,
                "Event delivered"
            );
            DeliveryOutcome::Delivered
        }
        Ok(Err(e)) => {
            warn!(
                subscriber = %subscriber.name,
                sequence = event.sequence,
                error = %e,
                "Delivery failed, subscriber will recover on replay"
            );
            DeliveryOutcome::Failed {
                error: e.to_string(),
            }
        }
        Err(_) => {
            let error = BusError::Timeout {
                subscriber: subscriber.name.clone(),
                timeout,
            };
            warn!(
                subscriber = %subscriber.name,
                sequence = event.sequence,
                error = %error,
                "Delivery timed out, subscriber will recover on replay"
            );
            DeliveryOutcome::TimedOut
        }
    }
}
