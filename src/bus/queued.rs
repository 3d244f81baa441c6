//! Queued fan-out: one ordered lane per subscriber.
//!
//! `submit` hands the event to every lane and returns immediately. Each lane
//! is drained by its own worker, one event at a time, so a slow subscriber
//! only delays itself and per-subscriber ordering is kept. Lanes are bounded:
//! once a lane is full further events are reported failed for that
//! subscriber, which recovers them through replay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{deliver, DeliveryOutcome, DeliveryRecord, Subscriber};
use crate::event::SequencedEvent;

struct Lane {
    name: String,
    tx: mpsc::Sender<Arc<SequencedEvent>>,
}

/// Per-subscriber ordered delivery lanes.
pub struct QueuedFanout {
    lanes: RwLock<Vec<Lane>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl QueuedFanout {
    /// Spawn one worker per subscriber. Must be called inside a runtime.
    pub fn spawn(subscribers: &[Subscriber], timeout: Duration, capacity: usize) -> Self {
        let mut lanes = Vec::with_capacity(subscribers.len());
        let mut workers = Vec::with_capacity(subscribers.len());

        for subscriber in subscribers {
            let (tx, mut rx) = mpsc::channel::<Arc<SequencedEvent>>(capacity.max(1));
            let name = subscriber.name.clone();
            let subscriber = subscriber.clone();

            workers.push(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    // Outcome is logged inside deliver
                    deliver(&subscriber, &event, timeout).await;
                }
                debug!(subscriber = %subscriber.name, "Delivery lane closed");
            }));

            lanes.push(Lane { name, tx });
        }

        Self {
            lanes: RwLock::new(lanes),
            workers: Mutex::new(workers),
        }
    }

    /// Enqueue an event on every lane, in registration order.
    pub async fn enqueue(&self, event: &Arc<SequencedEvent>) -> Vec<DeliveryRecord> {
        let lanes = self.lanes.read().await;
        lanes
            .iter()
            .map(|lane| {
                let outcome = match lane.tx.try_send(Arc::clone(event)) {
                    Ok(()) => DeliveryOutcome::Queued,
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            subscriber = %lane.name,
                            sequence = event.sequence,
                            "Delivery lane full, subscriber will recover on replay"
                        );
                        DeliveryOutcome::Failed {
                            error: "delivery lane full".to_string(),
                        }
                    }
                    Err(TrySendError::Closed(_)) => {
                        error!(
                            subscriber = %lane.name,
                            sequence = event.sequence,
                            "Delivery lane closed, event not queued"
                        );
                        DeliveryOutcome::Failed {
                            error: "delivery lane closed".to_string(),
                        }
                    }
                };
                DeliveryRecord {
                    subscriber: lane.name.clone(),
                    outcome,
                }
            })
            .collect()
    }

    /// Close every lane and wait for workers to finish what is queued.
    pub async fn shutdown(&self) {
        self.lanes.write().await.clear();

        let workers: Vec<_> = self.workers.lock().await.drain(..).collect();
        let count = workers.len();
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Delivery worker panicked");
            }
        }
        info!(lanes = count, "Queued fan-out drained");
    }
}
