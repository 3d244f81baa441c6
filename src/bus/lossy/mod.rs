//! Lossy delivery wrapper for testing unreliable subscribers.
//!
//! Wraps any `EventHandler` and drops deliveries based on a configurable
//! probability, an explicit set of sequences, or an offline switch. A drop
//! surfaces as `BusError::Dropped`, so the broadcaster records a failed
//! delivery exactly as it would for a subscriber that is down.
//!
//! # Example
//!
//! ```ignore
//! use eventrelay::bus::{LossyConfig, LossyHandler};
//!
//! // Drop 10% of deliveries to the query service
//! let lossy = LossyHandler::new(query_handler, LossyConfig::with_drop_rate(0.1));
//!
//! // Or lose exactly event #3
//! let lossy = LossyHandler::new(query_handler, LossyConfig::none().dropping([3]));
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use rand::Rng;
use tracing::{debug, warn};

use super::{BusError, EventHandler, Result};
use crate::event::{Sequence, SequencedEvent};

/// Configuration for lossy behavior.
#[derive(Clone, Debug, Default)]
pub struct LossyConfig {
    /// Probability of dropping a delivery (0.0 to 1.0).
    /// - 0.0 = never drop (pass-through)
    /// - 0.5 = drop 50% of deliveries
    /// - 1.0 = drop all deliveries
    pub drop_rate: f64,
    /// Sequences that are always dropped, regardless of `drop_rate`.
    pub drop_sequences: HashSet<Sequence>,
}

impl LossyConfig {
    /// Create a config that never drops deliveries (pass-through).
    pub fn none() -> Self {
        Self::default()
    }

    /// Create a config with a specific drop rate.
    ///
    /// # Arguments
    /// * `rate` - Drop probability (0.0 to 1.0), clamped to valid range
    pub fn with_drop_rate(rate: f64) -> Self {
        Self {
            drop_rate: rate.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    /// Create a config that drops all deliveries.
    pub fn drop_all() -> Self {
        Self::with_drop_rate(1.0)
    }

    /// Always drop the given sequences.
    pub fn dropping(mut self, sequences: impl IntoIterator<Item = Sequence>) -> Self {
        self.drop_sequences.extend(sequences);
        self
    }

    /// Check if this config has any lossy behavior enabled.
    pub fn is_lossy(&self) -> bool {
        self.drop_rate > 0.0 || !self.drop_sequences.is_empty()
    }
}

/// Statistics for the lossy wrapper.
#[derive(Debug, Default)]
pub struct LossyStats {
    /// Total deliveries attempted.
    pub total: AtomicU64,
    /// Deliveries that were dropped.
    pub dropped: AtomicU64,
    /// Deliveries that were passed through.
    pub passed: AtomicU64,
}

impl LossyStats {
    /// Get a snapshot of current stats as `(total, dropped, passed)`.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.total.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
            self.passed.load(Ordering::Relaxed),
        )
    }

    /// Get the actual drop rate observed.
    pub fn observed_drop_rate(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            self.dropped.load(Ordering::Relaxed) as f64 / total as f64
        }
    }
}

/// Handler wrapper that drops deliveries for failure drills.
///
/// With the default config and online, this is a pure pass-through.
pub struct LossyHandler {
    inner: Arc<dyn EventHandler>,
    config: LossyConfig,
    offline: AtomicBool,
    stats: Arc<LossyStats>,
}

impl LossyHandler {
    /// Create a new lossy wrapper around an existing handler.
    pub fn new(inner: Arc<dyn EventHandler>, config: LossyConfig) -> Self {
        if config.is_lossy() {
            warn!(
                drop_rate = config.drop_rate,
                drop_sequences = config.drop_sequences.len(),
                "Lossy delivery enabled - events may be dropped"
            );
        }

        Self {
            inner,
            config,
            offline: AtomicBool::new(false),
            stats: Arc::new(LossyStats::default()),
        }
    }

    /// Create a pass-through wrapper (no loss until taken offline).
    pub fn passthrough(inner: Arc<dyn EventHandler>) -> Self {
        Self::new(inner, LossyConfig::none())
    }

    /// Get current statistics.
    pub fn stats(&self) -> Arc<LossyStats> {
        Arc::clone(&self.stats)
    }

    /// Simulate the subscriber going down (`true`) or coming back (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Check if a delivery should be dropped based on current config.
    fn should_drop(&self, sequence: Sequence) -> bool {
        if self.is_offline() || self.config.drop_sequences.contains(&sequence) {
            return true;
        }
        if self.config.drop_rate <= 0.0 {
            return false;
        }
        if self.config.drop_rate >= 1.0 {
            return true;
        }
        rand::rng().random::<f64>() < self.config.drop_rate
    }
}

impl EventHandler for LossyHandler {
    fn handle(&self, event: Arc<SequencedEvent>) -> BoxFuture<'static, Result<()>> {
        self.stats.total.fetch_add(1, Ordering::Relaxed);

        if self.should_drop(event.sequence) {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(
                sequence = event.sequence,
                event_type = %event.event_type(),
                "Lossy handler dropped delivery"
            );
            return Box::pin(async { Err(BusError::Dropped) });
        }

        self.stats.passed.fetch_add(1, Ordering::Relaxed);
        self.inner.handle(event)
    }
}

#[cfg(test)]
mod tests;
