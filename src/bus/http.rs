//! HTTP webhook subscriber.
//!
//! POSTs each sequenced event as JSON to `{address}/events`. Transient
//! failures (connect errors, timeouts, 429, 5xx) are retried with backoff;
//! any other non-2xx answer is a refusal and fails the delivery at once.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use futures::future::BoxFuture;
use reqwest::Client;
use tracing::{debug, error, warn};

use super::{BusError, EventHandler, Result};
use crate::config::{DeliveryConfig, SubscriberEndpoint};
use crate::event::SequencedEvent;
use crate::utils::retry::{delivery_backoff, is_retryable_error, is_retryable_status};

struct Inner {
    name: String,
    url: String,
    client: Client,
    max_retries: usize,
    attempt_timeout: Duration,
}

/// Delivers events to a remote subscriber over HTTP.
#[derive(Clone)]
pub struct HttpSubscriber {
    inner: Arc<Inner>,
}

impl HttpSubscriber {
    /// Create a subscriber for `endpoint`.
    ///
    /// Each HTTP attempt gets a share of the delivery timeout, so an attempt
    /// that hangs still leaves time to retry within the same delivery.
    pub fn new(endpoint: &SubscriberEndpoint, delivery: &DeliveryConfig) -> Result<Self> {
        if endpoint.address.trim().is_empty() {
            return Err(BusError::Config(format!(
                "subscriber '{}' has no address",
                endpoint.name
            )));
        }

        let attempt_timeout = delivery.attempt_timeout();
        let client = Client::builder().timeout(attempt_timeout).build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                name: endpoint.name.clone(),
                url: format!("{}/events", endpoint.address.trim_end_matches('/')),
                client,
                max_retries: delivery.max_retries,
                attempt_timeout,
            }),
        })
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Deadline of a single HTTP attempt.
    pub fn attempt_timeout(&self) -> Duration {
        self.inner.attempt_timeout
    }

    fn is_transient(err: &BusError) -> bool {
        match err {
            BusError::Http(e) => is_retryable_error(e),
            BusError::Rejected { status, .. } => reqwest::StatusCode::from_u16(*status)
                .map(is_retryable_status)
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl Inner {
    async fn post(&self, event: &SequencedEvent) -> Result<()> {
        let response = self.client.post(&self.url).json(event).send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(
                subscriber = %self.name,
                sequence = event.sequence,
                "Event posted"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if is_retryable_status(status) {
            warn!(
                subscriber = %self.name,
                status = %status,
                body = %body,
                "Subscriber returned retryable status"
            );
        } else {
            error!(
                subscriber = %self.name,
                status = %status,
                body = %body,
                "Subscriber refused event"
            );
        }

        Err(BusError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}

impl EventHandler for HttpSubscriber {
    fn handle(&self, event: Arc<SequencedEvent>) -> BoxFuture<'static, Result<()>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let max_retries = inner.max_retries;
            (|| async { inner.post(&event).await })
                .retry(delivery_backoff(max_retries))
                .when(HttpSubscriber::is_transient)
                .notify(|e, delay| {
                    debug!(
                        subscriber = %inner.name,
                        sequence = event.sequence,
                        error = %e,
                        ?delay,
                        "Retrying delivery"
                    );
                })
                .await
        })
    }
}
