//! Synchronous fan-out.
//!
//! A single dispatcher task walks the subscribers in registration order for
//! one event at a time and sends the delivery report back to the submitter.
//! The broadcaster only holds its submit lock while appending and handing
//! the event over, so a handler may submit a follow-up event from inside its
//! own delivery: the follow-up is appended at once and dispatched after the
//! current event.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{deliver, DeliveryOutcome, DeliveryRecord, Subscriber};
use crate::event::SequencedEvent;

struct Job {
    event: Arc<SequencedEvent>,
    reply: Option<oneshot::Sender<Vec<DeliveryRecord>>>,
}

/// Delivery report that may still be in progress.
pub enum Report {
    Ready(Vec<DeliveryRecord>),
    Waiting {
        names: Vec<String>,
        rx: oneshot::Receiver<Vec<DeliveryRecord>>,
    },
}

impl Report {
    /// Wait for the report.
    pub async fn resolve(self) -> Vec<DeliveryRecord> {
        match self {
            Self::Ready(records) => records,
            Self::Waiting { names, rx } => rx
                .await
                .unwrap_or_else(|_| records_for(&names, closed())),
        }
    }
}

fn closed() -> DeliveryOutcome {
    DeliveryOutcome::Failed {
        error: "dispatcher closed".to_string(),
    }
}

fn records_for(names: &[String], outcome: DeliveryOutcome) -> Vec<DeliveryRecord> {
    names
        .iter()
        .map(|name| DeliveryRecord {
            subscriber: name.clone(),
            outcome: outcome.clone(),
        })
        .collect()
}

/// Ordered, one-event-at-a-time delivery to every subscriber.
pub struct OrderedDispatcher {
    names: Vec<String>,
    // Unbounded: every waiting submitter holds at most one job, and a
    // follow-up submitted from a handler must never block its own dispatch.
    tx: RwLock<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl OrderedDispatcher {
    /// Spawn the dispatcher task. Must be called inside a runtime.
    pub fn spawn(subscribers: &[Subscriber], timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let names: Vec<String> = subscribers.iter().map(|s| s.name.clone()).collect();
        let subscribers = subscribers.to_vec();

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let mut records = Vec::with_capacity(subscribers.len());
                for subscriber in &subscribers {
                    let outcome = deliver(subscriber, &job.event, timeout).await;
                    records.push(DeliveryRecord {
                        subscriber: subscriber.name.clone(),
                        outcome,
                    });
                }
                if let Some(reply) = job.reply {
                    if reply.send(records).is_err() {
                        debug!(
                            sequence = job.event.sequence,
                            "Submitter went away before the delivery report"
                        );
                    }
                }
            }
            debug!("Dispatcher closed");
        });

        Self {
            names,
            tx: RwLock::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Hand an event to the dispatcher.
    ///
    /// With `wait`, the returned report resolves once every subscriber has
    /// been tried. Without it, every subscriber is reported as `Queued`.
    pub async fn dispatch(&self, event: &Arc<SequencedEvent>, wait: bool) -> Report {
        let tx = self.tx.read().await;
        let Some(tx) = tx.as_ref() else {
            error!(sequence = event.sequence, "Dispatcher closed, event not delivered");
            return Report::Ready(records_for(&self.names, closed()));
        };

        let (reply, rx) = if wait {
            let (reply, rx) = oneshot::channel();
            (Some(reply), Some(rx))
        } else {
            (None, None)
        };

        let job = Job {
            event: Arc::clone(event),
            reply,
        };
        if tx.send(job).is_err() {
            error!(sequence = event.sequence, "Dispatcher closed, event not delivered");
            return Report::Ready(records_for(&self.names, closed()));
        }

        match rx {
            Some(rx) => Report::Waiting {
                names: self.names.clone(),
                rx,
            },
            None => Report::Ready(records_for(&self.names, DeliveryOutcome::Queued)),
        }
    }

    /// Stop accepting events and wait for the dispatched ones.
    pub async fn shutdown(&self) {
        self.tx.write().await.take();
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                error!(error = %e, "Dispatcher panicked");
            }
        }
        info!("Dispatcher drained");
    }
}
