//! The broadcaster: single authoritative entry point for new events.
//!
//! `submit` appends to the event store and only then announces the event to
//! every registered subscriber, in registration order. Producers get success
//! as soon as the append succeeded; per-subscriber failures are reported and
//! logged but never propagated, because subscribers recover through replay.
//!
//! The submit lock covers the append and the hand-off to delivery, never the
//! deliveries themselves.
//!
//! ```text
//! producer -> submit -> [EventStore.append] -> seq
//!                              |
//!                              v
//!               sub[0] -> sub[1] -> ... -> sub[n-1]
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use super::dispatch::{OrderedDispatcher, Report};
use super::{
    in_delivery, BusError, DeliveryRecord, EventHandler, QueuedFanout, Result, Subscriber,
};
use crate::config::{DeliveryConfig, DeliveryMode};
use crate::event::{Event, Sequence, SequencedEvent};
use crate::replay::StoreReplayFeed;
use crate::storage::EventStore;

/// Result of a successful `submit`.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    /// Sequence assigned by the store.
    pub sequence: Sequence,
    /// One record per subscriber, in registration order.
    pub deliveries: Vec<DeliveryRecord>,
}

impl SubmitReceipt {
    /// True if no subscriber failed or timed out.
    pub fn all_delivered(&self) -> bool {
        !self.deliveries.iter().any(|d| d.outcome.is_failure())
    }

    /// Names of subscribers whose delivery failed or timed out.
    pub fn failed_subscribers(&self) -> Vec<&str> {
        self.deliveries
            .iter()
            .filter(|d| d.outcome.is_failure())
            .map(|d| d.subscriber.as_str())
            .collect()
    }
}

/// How events leave the broadcaster.
enum Fanout {
    /// One dispatcher delivers to every subscriber in turn; `submit` waits.
    Synchronous(OrderedDispatcher),
    /// Hand off to one ordered lane per subscriber.
    Queued(QueuedFanout),
}

/// Appends events and fans them out to registered subscribers.
///
/// Owns the event store: it is the only writer. The append and the hand-off
/// to delivery happen under one submit lock, so every subscriber observes
/// the append order. Deliveries themselves run outside the lock.
pub struct Broadcaster {
    store: Arc<dyn EventStore>,
    subscribers: Vec<Subscriber>,
    fanout: Fanout,
    submit_lock: Mutex<()>,
}

impl Broadcaster {
    /// Start building a broadcaster over `store`.
    pub fn builder(store: Arc<dyn EventStore>) -> BroadcasterBuilder {
        BroadcasterBuilder {
            store,
            subscribers: Vec::new(),
            delivery: DeliveryConfig::default(),
        }
    }

    /// Read-only history access over the owned store.
    pub fn replay_feed(&self) -> StoreReplayFeed {
        StoreReplayFeed::new(Arc::clone(&self.store))
    }

    /// Registered subscriber names, in delivery order.
    pub fn subscriber_names(&self) -> Vec<&str> {
        self.subscribers.iter().map(|s| s.name.as_str()).collect()
    }

    /// Record an event and announce it to every subscriber.
    ///
    /// Returns `BusError::Append` if the store refused the event, in which
    /// case nothing was delivered. Otherwise returns the assigned sequence
    /// and the delivery report.
    ///
    /// Called from inside a delivery handler, the event is appended and
    /// dispatched after the current one, and the report reads `Queued`.
    #[tracing::instrument(name = "relay.submit", skip_all, fields(event_type = %event.event_type))]
    pub async fn submit(&self, event: Event) -> Result<SubmitReceipt> {
        let (sequence, report) = {
            let _guard = self.submit_lock.lock().await;

            let sequence = self.store.append(event.clone()).await.map_err(|e| {
                error!(error = %e, "Failed to append event; nothing delivered");
                BusError::Append(e)
            })?;

            let sequenced = Arc::new(SequencedEvent::new(sequence, event));
            let report = match &self.fanout {
                Fanout::Synchronous(dispatcher) => {
                    dispatcher.dispatch(&sequenced, !in_delivery()).await
                }
                Fanout::Queued(queued) => Report::Ready(queued.enqueue(&sequenced).await),
            };
            (sequence, report)
        };

        let deliveries = report.resolve().await;

        let failed = deliveries.iter().filter(|d| d.outcome.is_failure()).count();
        info!(
            sequence,
            subscribers = deliveries.len(),
            failed,
            "Event broadcast"
        );

        Ok(SubmitReceipt {
            sequence,
            deliveries,
        })
    }

    /// Stop accepting work and wait for pending deliveries to finish.
    pub async fn shutdown(&self) {
        match &self.fanout {
            Fanout::Synchronous(dispatcher) => dispatcher.shutdown().await,
            Fanout::Queued(queued) => queued.shutdown().await,
        }
    }
}

/// Builder for [`Broadcaster`].
///
/// Subscribers are delivered to in the order they are added.
pub struct BroadcasterBuilder {
    store: Arc<dyn EventStore>,
    subscribers: Vec<Subscriber>,
    delivery: DeliveryConfig,
}

impl BroadcasterBuilder {
    /// Register a subscriber.
    pub fn subscriber(mut self, name: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.subscribers.push(Subscriber::new(name, handler));
        self
    }

    /// Register several subscribers, keeping their order.
    pub fn subscribers(mut self, subscribers: impl IntoIterator<Item = Subscriber>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    /// Set delivery configuration.
    pub fn delivery(mut self, delivery: DeliveryConfig) -> Self {
        self.delivery = delivery;
        self
    }

    /// Build the broadcaster.
    ///
    /// Spawns the delivery tasks and therefore must run inside a Tokio
    /// runtime.
    pub fn build(self) -> Broadcaster {
        let timeout = self.delivery.timeout();
        let fanout = match self.delivery.mode {
            DeliveryMode::Synchronous => {
                Fanout::Synchronous(OrderedDispatcher::spawn(&self.subscribers, timeout))
            }
            DeliveryMode::Queued => Fanout::Queued(QueuedFanout::spawn(
                &self.subscribers,
                timeout,
                self.delivery.queue_capacity,
            )),
        };

        info!(
            subscribers = ?self.subscribers.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            mode = ?self.delivery.mode,
            timeout_ms = self.delivery.timeout_ms,
            "Broadcaster initialized"
        );

        Broadcaster {
            store: self.store,
            subscribers: self.subscribers,
            fanout,
            submit_lock: Mutex::new(()),
        }
    }
}
