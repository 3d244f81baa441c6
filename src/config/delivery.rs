//! Subscriber registry and delivery configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Floor for a single HTTP attempt.
const MIN_ATTEMPT_TIMEOUT_MS: u64 = 50;

/// Delivery mode discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// `submit` waits for every subscriber (each bounded by the timeout).
    #[default]
    Synchronous,
    /// One ordered lane per subscriber; `submit` returns after enqueueing.
    Queued,
}

/// Delivery configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Fan-out strategy.
    pub mode: DeliveryMode,
    /// Deadline for one delivery to one subscriber, retries included.
    pub timeout_ms: u64,
    /// Retries for transient failures (connect errors, timeouts, 5xx).
    pub max_retries: usize,
    /// Events a queued lane holds before further events are reported failed.
    pub queue_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Synchronous,
            timeout_ms: 5_000,
            max_retries: 2,
            queue_capacity: 1024,
        }
    }
}

impl DeliveryConfig {
    /// Delivery deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Set the delivery mode.
    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the delivery deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the per-lane queue bound (queued mode).
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Deadline for one HTTP attempt.
    ///
    /// The delivery timeout is split across the first attempt and every
    /// retry, so a hung attempt still leaves room for the next one.
    pub fn attempt_timeout(&self) -> Duration {
        let attempts = self.max_retries as u32 + 1;
        (self.timeout() / attempts).max(Duration::from_millis(MIN_ATTEMPT_TIMEOUT_MS))
    }
}

/// A registered subscriber endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubscriberEndpoint {
    /// Subscriber identifier, unique within the registry.
    pub name: String,
    /// Base URL; events are POSTed to `{address}/events`.
    pub address: String,
}

impl SubscriberEndpoint {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}
